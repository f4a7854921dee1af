//! Binance wire types and the validation that turns them into domain types
//!
//! Upstream payloads are loosely typed. Filters and stream events are modeled
//! as closed tagged enums so validation is an exhaustive match with explicit
//! reject and ignore arms.

use crate::types::{AssetBalance, OrderType, PriceRules, QuantityRules, SymbolTradingRules};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Status marker of an actively tradable symbol
pub const TRADING_STATUS: &str = "TRADING";

/// Event tag of an account balance change on the user stream
pub const ACCOUNT_POSITION_EVENT: &str = "outboundAccountPosition";

/// Binance account balance.
///
/// Accepts both the REST field names and the abbreviated stream names
/// (`a`, `f`, `l`); anything else in the object is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinanceBalance {
    #[serde(alias = "a")]
    pub asset: String,
    #[serde(alias = "f")]
    pub free: String,
    #[serde(alias = "l")]
    pub locked: String,
}

impl BinanceBalance {
    pub fn new(asset: impl Into<String>, free: impl Into<String>, locked: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            free: free.into(),
            locked: locked.into(),
        }
    }

    /// True if either amount is strictly positive. Unparseable text counts as zero.
    pub fn is_non_zero(&self) -> bool {
        is_positive(&self.free) || is_positive(&self.locked)
    }
}

impl From<BinanceBalance> for AssetBalance {
    fn from(balance: BinanceBalance) -> Self {
        AssetBalance {
            asset: balance.asset,
            free: balance.free,
            locked: balance.locked,
        }
    }
}

fn is_positive(amount: &str) -> bool {
    match Decimal::from_str(amount.trim()) {
        Ok(value) => value > Decimal::ZERO,
        Err(_) => {
            debug!("Ignoring non-decimal balance amount {:?}", amount);
            false
        }
    }
}

/// Keep only assets with a positive free or locked amount, preserving order
pub fn filter_non_zero_balances<I>(balances: I) -> Vec<AssetBalance>
where
    I: IntoIterator<Item = BinanceBalance>,
{
    balances
        .into_iter()
        .filter(BinanceBalance::is_non_zero)
        .map(AssetBalance::from)
        .collect()
}

/// Deserialize a JSON string that holds a decimal number, keeping the text verbatim
fn decimal_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    Decimal::from_str(&text)
        .map_err(|e| serde::de::Error::custom(format!("{text:?} is not a decimal: {e}")))?;
    Ok(text)
}

/// `PRICE_FILTER`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceFilter {
    #[serde(rename = "minPrice", deserialize_with = "decimal_text")]
    pub min_price: String,
    #[serde(rename = "maxPrice", deserialize_with = "decimal_text")]
    pub max_price: String,
    #[serde(rename = "tickSize", deserialize_with = "decimal_text")]
    pub tick_size: String,
}

/// `LOT_SIZE`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LotSizeFilter {
    #[serde(rename = "minQty", deserialize_with = "decimal_text")]
    pub min_qty: String,
    #[serde(rename = "maxQty", deserialize_with = "decimal_text")]
    pub max_qty: String,
    #[serde(rename = "stepSize", deserialize_with = "decimal_text")]
    pub step_size: String,
}

/// `MIN_NOTIONAL`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MinNotionalFilter {
    #[serde(rename = "minNotional", deserialize_with = "decimal_text")]
    pub min_notional: String,
}

/// Symbol filter, discriminated by `filterType`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER")]
    Price(PriceFilter),
    #[serde(rename = "LOT_SIZE")]
    LotSize(LotSizeFilter),
    #[serde(rename = "MIN_NOTIONAL")]
    MinNotional(MinNotionalFilter),
    #[serde(other)]
    Other,
}

impl SymbolFilter {
    /// Filter types a symbol must carry to be cached
    pub const REQUIRED: [&'static str; 3] = ["PRICE_FILTER", "LOT_SIZE", "MIN_NOTIONAL"];
}

/// Symbol descriptor as sent by the exchange
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolDescriptor {
    pub symbol: String,
    pub status: String,
    #[serde(rename = "orderTypes", default)]
    pub order_types: Vec<Value>,
    #[serde(default)]
    pub filters: Vec<Value>,
}

/// Why a symbol descriptor was left out of the cache
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("status {0} is not TRADING")]
    NotTrading(String),

    #[error("missing {0} filter")]
    MissingFilter(&'static str),

    #[error("malformed {filter_type} filter: {reason}")]
    MalformedFilter { filter_type: String, reason: String },
}

/// Validate one symbol descriptor and build its rules
pub fn parse_symbol(raw: &Value) -> std::result::Result<SymbolTradingRules, RejectReason> {
    let descriptor = SymbolDescriptor::deserialize(raw)
        .map_err(|e| RejectReason::MalformedDescriptor(e.to_string()))?;

    if descriptor.status != TRADING_STATUS {
        return Err(RejectReason::NotTrading(descriptor.status));
    }

    let mut price: Option<PriceFilter> = None;
    let mut lot_size: Option<LotSizeFilter> = None;
    let mut min_notional: Option<MinNotionalFilter> = None;

    for filter in &descriptor.filters {
        match SymbolFilter::deserialize(filter) {
            Ok(SymbolFilter::Price(f)) => {
                price.get_or_insert(f);
            }
            Ok(SymbolFilter::LotSize(f)) => {
                lot_size.get_or_insert(f);
            }
            Ok(SymbolFilter::MinNotional(f)) => {
                min_notional.get_or_insert(f);
            }
            Ok(SymbolFilter::Other) => {}
            Err(e) => {
                let filter_type = filter.get("filterType").and_then(Value::as_str);
                match filter_type {
                    Some(tag) if SymbolFilter::REQUIRED.contains(&tag) => {
                        return Err(RejectReason::MalformedFilter {
                            filter_type: tag.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    // Not one of ours: a shape we do not model
                    _ => debug!("{}: ignoring unrecognized filter entry: {}", descriptor.symbol, e),
                }
            }
        }
    }

    let price = price.ok_or(RejectReason::MissingFilter("PRICE_FILTER"))?;
    let lot_size = lot_size.ok_or(RejectReason::MissingFilter("LOT_SIZE"))?;
    let min_notional = min_notional.ok_or(RejectReason::MissingFilter("MIN_NOTIONAL"))?;

    let allowed_order_types: BTreeSet<OrderType> = descriptor
        .order_types
        .iter()
        .filter_map(Value::as_str)
        .filter_map(OrderType::from_tag)
        .collect();

    Ok(SymbolTradingRules {
        symbol: descriptor.symbol,
        price_rules: PriceRules {
            tick_size: price.tick_size,
            min_price: price.min_price,
            max_price: price.max_price,
        },
        quantity_rules: QuantityRules {
            step_size: lot_size.step_size,
            min_qty: lot_size.min_qty,
            max_qty: lot_size.max_qty,
        },
        min_notional: min_notional.min_notional,
        allowed_order_types,
    })
}

/// Build the full rules map from an exchange metadata document.
///
/// Never fails: a document without a `symbols` array yields an empty map, and
/// every rejected descriptor is simply left out.
pub fn parse_exchange_info(document: &Value) -> HashMap<String, SymbolTradingRules> {
    let Some(symbols) = document.get("symbols").and_then(Value::as_array) else {
        warn!("⚠️ Exchange metadata has no symbols array, nothing to cache");
        return HashMap::new();
    };

    let mut rules = HashMap::with_capacity(symbols.len());
    let mut rejected = 0usize;

    for raw in symbols {
        match parse_symbol(raw) {
            Ok(symbol_rules) => {
                rules.insert(symbol_rules.symbol.clone(), symbol_rules);
            }
            Err(RejectReason::NotTrading(_)) => rejected += 1,
            Err(reason) => {
                rejected += 1;
                let name = raw.get("symbol").and_then(Value::as_str).unwrap_or("<unnamed>");
                debug!("Skipping symbol {}: {}", name, reason);
            }
        }
    }

    debug!("Parsed {} tradable symbols, skipped {}", rules.len(), rejected);
    rules
}

/// Account position payload of `outboundAccountPosition`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountPositionEvent {
    #[serde(rename = "E", default)]
    pub event_time: u64,
    #[serde(rename = "u", default)]
    pub last_account_update: u64,
    #[serde(rename = "B")]
    pub balances: Vec<BinanceBalance>,
}

/// User stream events, discriminated by `e`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "e")]
pub enum UserStreamEvent {
    #[serde(rename = "outboundAccountPosition")]
    AccountPosition(AccountPositionEvent),
    #[serde(other)]
    Other,
}

/// Outcome of decoding one inbound stream frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Event(UserStreamEvent),
    /// Valid JSON without an event tag, e.g. a request acknowledgement
    NonEvent(Value),
}

/// Decode one inbound text frame
pub fn parse_stream_message(text: &str) -> crate::errors::Result<StreamMessage> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("e").is_none() {
        return Ok(StreamMessage::NonEvent(value));
    }
    let event = UserStreamEvent::deserialize(&value)
        .map_err(|e| crate::errors::ExchangeError::MalformedMessage(e.to_string()))?;
    Ok(StreamMessage::Event(event))
}
