//! Configuration loading from the environment
//!
//! These mutate process-wide environment variables and therefore run serially.

use serial_test::serial;
use std::time::Duration;
use tradegate_exchanges::binance::auth::{API_KEY_ENV, SECRET_KEY_ENV};
use tradegate_exchanges::binance::config::{RECV_WINDOW_ENV, RULES_BACKOFF_ENV, RULES_TTL_ENV};
use tradegate_exchanges::{BinanceConfig, BinanceCredentials, ExchangeError};

fn clear_env() {
    for name in [API_KEY_ENV, SECRET_KEY_ENV, RULES_TTL_ENV, RULES_BACKOFF_ENV, RECV_WINDOW_ENV] {
        std::env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_env_credentials_loaded() {
    clear_env();
    std::env::set_var(API_KEY_ENV, "env_api_key");
    std::env::set_var(SECRET_KEY_ENV, "env_secret_key");

    let config = BinanceConfig::default().with_env_credentials().unwrap();
    assert_eq!(config.credentials(), BinanceCredentials::new("env_api_key", "env_secret_key"));
    assert_eq!(BinanceCredentials::from_env().unwrap(), config.credentials());

    clear_env();
}

#[test]
#[serial]
fn test_missing_secret_names_variable() {
    clear_env();
    std::env::set_var(API_KEY_ENV, "env_api_key");

    let err = BinanceConfig::default().with_env_credentials().unwrap_err();
    assert_eq!(err, ExchangeError::MissingCredentials(SECRET_KEY_ENV.to_string()));
    assert!(err.is_configuration());

    clear_env();
}

#[test]
#[serial]
fn test_timing_overrides() {
    clear_env();
    std::env::set_var(RULES_TTL_ENV, "60000");
    std::env::set_var(RULES_BACKOFF_ENV, " 2500 ");
    std::env::set_var(RECV_WINDOW_ENV, "10000");

    let config = BinanceConfig::default().with_env_overrides().unwrap();
    let rules = config.rules_cache_config();
    assert_eq!(rules.cache_ttl, Duration::from_secs(60));
    assert_eq!(rules.retry_backoff, Duration::from_millis(2500));
    assert_eq!(config.balance_stream_config().recv_window_ms, 10_000);

    clear_env();
}

#[test]
#[serial]
fn test_unset_overrides_keep_defaults() {
    clear_env();

    let config = BinanceConfig::default().with_env_overrides().unwrap();
    assert_eq!(config, BinanceConfig::default());
}

#[test]
#[serial]
fn test_invalid_override_is_configuration_error() {
    clear_env();
    std::env::set_var(RULES_TTL_ENV, "five minutes");

    let err = BinanceConfig::default().with_env_overrides().unwrap_err();
    assert!(matches!(err, ExchangeError::ConfigurationError(ref msg) if msg.contains(RULES_TTL_ENV)));

    clear_env();
}
