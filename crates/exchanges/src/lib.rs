//! # Tradegate Exchange Layer
//!
//! Client-side caching and subscription layer in front of the Binance spot
//! REST and user-stream APIs.
//!
//! ## Components
//!
//! - **TradingRulesManager** - per-symbol rules with TTL and retry backoff
//! - **BalanceManager** - balance snapshots and one shared update stream
//! - **Capability traits** - providers and transports are plugged in by the application

pub mod binance;
pub mod errors;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export main types
pub use binance::{BalanceManager, BinanceConfig, BinanceCredentials, TradingRulesManager};
pub use errors::{ExchangeError, Result};
pub use traits::{AccountProvider, MetadataProvider, StreamConnection, StreamEvents, StreamingTransport};
pub use types::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::binance::{
        BalanceManager, BalanceStreamConfig, BalanceSubscriber, BinanceConfig, BinanceCredentials,
        ConnectionState, JsonFileMetadataProvider, RulesCacheConfig, TradingRulesManager,
    };
    pub use crate::errors::{ExchangeError, Result};
    pub use crate::traits::{AccountProvider, MetadataProvider, StreamConnection, StreamEvents, StreamingTransport};
    pub use crate::types::*;
    pub use tradegate_core::prelude::*;
}
