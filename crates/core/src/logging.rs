//! Unified logging integration
//!
//! Installs a `tracing-subscriber` formatter once per process. The level is
//! taken from `RUST_LOG`, defaulting to `info`.

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Initialize unified logging system. Safe to call more than once.
pub fn init_logging() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info"))
            )
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .finish();

        // Another subscriber may already be installed by the host application
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::info!("📝 Initialized tracing logging");
        }
    });
}

#[macro_export]
macro_rules! log_latency {
    ($operation:expr, $duration_micros:expr) => {
        if $duration_micros < 1000 {
            tracing::debug!("⚡ {} completed in {}μs", $operation, $duration_micros);
        } else {
            tracing::info!("⚡ {} completed in {:.3}ms", $operation, $duration_micros as f64 / 1000.0);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($operation:expr, $error:expr) => {
        tracing::error!("❌ {} failed: {}", $operation, $error);
    };
}
