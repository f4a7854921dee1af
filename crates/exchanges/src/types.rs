//! Domain types handed to application code
//!
//! All price, quantity and notional values stay as the exact decimal text the
//! exchange sent. Callers doing boundary checks parse them with exact decimal
//! arithmetic on their side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Order types the application knows how to place.
///
/// Any other tag coming from the exchange is dropped when rules are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    StopLimit,
    StopMarket,
    Oco,
    TrailingStopMarket,
    LimitMaker,
    StopLoss,
    StopLossLimit,
    TakeProfit,
    TakeProfitLimit,
}

impl OrderType {
    pub const ALL: [OrderType; 11] = [
        OrderType::Limit,
        OrderType::Market,
        OrderType::StopLimit,
        OrderType::StopMarket,
        OrderType::Oco,
        OrderType::TrailingStopMarket,
        OrderType::LimitMaker,
        OrderType::StopLoss,
        OrderType::StopLossLimit,
        OrderType::TakeProfit,
        OrderType::TakeProfitLimit,
    ];

    /// Map an exchange tag onto the whitelist
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "LIMIT" => Some(OrderType::Limit),
            "MARKET" => Some(OrderType::Market),
            "STOP_LIMIT" => Some(OrderType::StopLimit),
            "STOP_MARKET" => Some(OrderType::StopMarket),
            "OCO" => Some(OrderType::Oco),
            "TRAILING_STOP_MARKET" => Some(OrderType::TrailingStopMarket),
            "LIMIT_MAKER" => Some(OrderType::LimitMaker),
            "STOP_LOSS" => Some(OrderType::StopLoss),
            "STOP_LOSS_LIMIT" => Some(OrderType::StopLossLimit),
            "TAKE_PROFIT" => Some(OrderType::TakeProfit),
            "TAKE_PROFIT_LIMIT" => Some(OrderType::TakeProfitLimit),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
            OrderType::StopLimit => "STOP_LIMIT",
            OrderType::StopMarket => "STOP_MARKET",
            OrderType::Oco => "OCO",
            OrderType::TrailingStopMarket => "TRAILING_STOP_MARKET",
            OrderType::LimitMaker => "LIMIT_MAKER",
            OrderType::StopLoss => "STOP_LOSS",
            OrderType::StopLossLimit => "STOP_LOSS_LIMIT",
            OrderType::TakeProfit => "TAKE_PROFIT",
            OrderType::TakeProfitLimit => "TAKE_PROFIT_LIMIT",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Price granularity and bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRules {
    pub tick_size: String,
    pub min_price: String,
    pub max_price: String,
}

/// Quantity granularity and bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityRules {
    pub step_size: String,
    pub min_qty: String,
    pub max_qty: String,
}

/// Trading rules for one actively traded symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTradingRules {
    pub symbol: String,
    pub price_rules: PriceRules,
    pub quantity_rules: QuantityRules,
    pub min_notional: String,
    pub allowed_order_types: BTreeSet<OrderType>,
}

impl SymbolTradingRules {
    pub fn allows(&self, order_type: OrderType) -> bool {
        self.allowed_order_types.contains(&order_type)
    }
}

/// Non-zero holding of a single asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

impl AssetBalance {
    pub fn new(asset: impl Into<String>, free: impl Into<String>, locked: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            free: free.into(),
            locked: locked.into(),
        }
    }
}

impl std::fmt::Display for AssetBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} free={} locked={}", self.asset, self.free, self.locked)
    }
}
