//! Capability traits the managers are built on
//!
//! The REST and websocket clients that implement these live outside this
//! crate. Everything here is single-threaded (`?Send`): the managers run on
//! one monoio thread and share state through `Rc`.

use crate::binance::auth::BinanceCredentials;
use crate::binance::types::BinanceBalance;
use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::rc::Rc;

/// Source of exchange-wide symbol metadata (`/api/v3/exchangeInfo`)
#[async_trait(?Send)]
pub trait MetadataProvider {
    /// Fetch the raw exchange metadata document.
    ///
    /// The payload is loosely typed on purpose; validation happens per symbol
    /// in the rules cache.
    async fn fetch_exchange_metadata(&self) -> Result<Value>;
}

/// Source of the full account balance snapshot
#[async_trait(?Send)]
pub trait AccountProvider {
    async fn fetch_account_balances(&self) -> Result<Vec<BinanceBalance>>;
}

/// Callbacks a transport invokes for an open connection
pub trait StreamEvents {
    /// One inbound text frame
    fn on_message(&self, text: &str);

    fn on_close(&self);

    fn on_error(&self, error: &str);
}

/// Handle to one open streaming connection
#[async_trait(?Send)]
pub trait StreamConnection {
    /// Ask the exchange to start pushing account updates on this connection
    async fn send_account_subscribe_request(&self, recv_window_ms: u64) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

/// Factory for streaming connections
#[async_trait(?Send)]
pub trait StreamingTransport {
    async fn open(
        &self,
        credentials: &BinanceCredentials,
        events: Rc<dyn StreamEvents>,
    ) -> Result<Rc<dyn StreamConnection>>;
}
