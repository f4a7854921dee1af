//! Binance configuration
//!
//! One serializable struct the application builds at startup and hands to the
//! managers as their individual configs.

use crate::binance::auth::BinanceCredentials;
use crate::binance::balances::BalanceStreamConfig;
use crate::binance::trading_rules::RulesCacheConfig;
use crate::errors::{ExchangeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const RULES_TTL_ENV: &str = "TRADEGATE_RULES_TTL_MS";
pub const RULES_BACKOFF_ENV: &str = "TRADEGATE_RULES_BACKOFF_MS";
pub const RECV_WINDOW_ENV: &str = "TRADEGATE_RECV_WINDOW_MS";

pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 30 * 1000;
pub const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

/// Binance exchange configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub api_key: String,
    pub api_secret: String,
    /// How long a successful rules refresh stays fresh
    pub cache_ttl_ms: u64,
    /// Minimum spacing between rules refresh attempts
    pub retry_backoff_ms: u64,
    /// `recvWindow` sent with the account subscribe request
    pub recv_window_ms: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
        }
    }
}

impl BinanceConfig {
    pub fn with_credentials(mut self, api_key: String, api_secret: String) -> Self {
        self.api_key = api_key;
        self.api_secret = api_secret;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = duration_millis(ttl);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = duration_millis(backoff);
        self
    }

    pub fn with_recv_window(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    pub fn with_env_credentials(mut self) -> Result<Self> {
        let credentials = BinanceCredentials::from_env()?;
        self.api_key = credentials.api_key;
        self.api_secret = credentials.secret_key;
        Ok(self)
    }

    /// Apply any of the `TRADEGATE_*` timing variables that are set
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(ttl) = read_env_millis(RULES_TTL_ENV)? {
            self.cache_ttl_ms = ttl;
        }
        if let Some(backoff) = read_env_millis(RULES_BACKOFF_ENV)? {
            self.retry_backoff_ms = backoff;
        }
        if let Some(recv_window) = read_env_millis(RECV_WINDOW_ENV)? {
            self.recv_window_ms = recv_window;
        }
        Ok(self)
    }

    pub fn credentials(&self) -> BinanceCredentials {
        BinanceCredentials::new(self.api_key.clone(), self.api_secret.clone())
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_valid()
    }

    pub fn rules_cache_config(&self) -> RulesCacheConfig {
        RulesCacheConfig {
            cache_ttl: Duration::from_millis(self.cache_ttl_ms),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn balance_stream_config(&self) -> BalanceStreamConfig {
        BalanceStreamConfig {
            recv_window_ms: self.recv_window_ms,
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn read_env_millis(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ExchangeError::ConfigurationError(format!("{name}={raw:?}: {e}"))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ExchangeError::ConfigurationError(format!("{name}: {e}"))),
    }
}
