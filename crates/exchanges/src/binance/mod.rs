//! Binance integration
//!
//! Wire formats, credentials and configuration, plus the two managers built
//! on top of the capability traits.

pub mod auth;
pub mod balances;
pub mod config;
pub mod file_provider;
pub mod trading_rules;
pub mod types;

pub use auth::BinanceCredentials;
pub use balances::{BalanceManager, BalanceStreamConfig, BalanceSubscriber, ConnectionState};
pub use config::BinanceConfig;
pub use file_provider::JsonFileMetadataProvider;
pub use trading_rules::{RulesCacheConfig, TradingRulesManager};
pub use types::{
    AccountPositionEvent, BinanceBalance, RejectReason, StreamMessage, SymbolFilter, UserStreamEvent,
    filter_non_zero_balances, parse_exchange_info, parse_stream_message, parse_symbol,
};
