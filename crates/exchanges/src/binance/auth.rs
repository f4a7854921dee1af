//! Binance API credentials
//!
//! Request signing is the transport's job; this crate only carries the key
//! pair to it and refuses to open a stream with an incomplete one.

use crate::errors::{ExchangeError, Result};

pub const API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const SECRET_KEY_ENV: &str = "BINANCE_SECRET_KEY";

/// Binance API credentials
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BinanceCredentials {
    pub api_key: String,
    pub secret_key: String,
}

impl BinanceCredentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| ExchangeError::MissingCredentials(API_KEY_ENV.to_string()))?;
        let secret_key = std::env::var(SECRET_KEY_ENV)
            .map_err(|_| ExchangeError::MissingCredentials(SECRET_KEY_ENV.to_string()))?;

        Ok(Self::new(api_key, secret_key))
    }

    /// Check if credentials are valid (non-empty)
    pub fn is_valid(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.secret_key.trim().is_empty()
    }

    /// Fail with a configuration error unless both halves are present
    pub fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ExchangeError::ConfigurationError(format!(
                "Binance API credentials not found. Please check {API_KEY_ENV} and {SECRET_KEY_ENV}"
            )))
        }
    }

    /// API key with only its first and last four characters visible
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl std::fmt::Debug for BinanceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceCredentials")
            .field("api_key", &self.masked_api_key())
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
