//! Exchange-specific error types
//!
//! Only configuration problems, snapshot failures and transport open failures
//! ever reach callers. Provider failures during a rules refresh and malformed
//! stream messages are logged and absorbed by the managers.

use thiserror::Error;

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Exchange operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP error {0}: {1}")]
    HttpError(u16, String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Public face of any account snapshot failure. The cause is logged where
    /// it happens and deliberately not carried here.
    #[error("Failed to fetch account balances")]
    BalanceFetchFailed,

    #[error("I/O error: {0}")]
    Io(String),
}

impl ExchangeError {
    /// Whether this error stems from missing or unusable configuration
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ConfigurationError(_) | Self::MissingCredentials(_))
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
