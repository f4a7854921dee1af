//! Timestamps, latency measurement and injectable clocks
//!
//! Cache freshness decisions read time through the [`Clock`] trait so that
//! tests can drive TTL and backoff windows without sleeping.

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub millis: u64,
}

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self { millis: system_millis() }
    }

    /// Milliseconds from `earlier` to `self`, zero if `earlier` is in the future
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.millis.saturating_sub(earlier.millis)
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis as i64).unwrap_or_else(Utc::now)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self { millis: dt.timestamp_millis().max(0) as u64 }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%d %H:%M:%S%.3f UTC"))
    }
}

/// Nanoseconds since Unix epoch
#[inline]
pub fn nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[inline]
pub fn system_millis() -> u64 {
    nanos() / 1_000_000
}

/// Source of "now" for time-gated logic
pub trait Clock {
    fn now(&self) -> Timestamp;

    fn name(&self) -> &str {
        "Clock"
    }
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}

/// Clock that only moves when told to.
///
/// Single-threaded by construction (`Cell`), matching the runtime model of
/// the managers that consume it.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: Cell<u64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { millis: Cell::new(start.millis) }
    }

    pub fn advance_millis(&self, millis: u64) {
        self.millis.set(self.millis.get().saturating_add(millis));
    }

    pub fn advance(&self, duration: std::time::Duration) {
        self.advance_millis(duration.as_millis() as u64);
    }

    pub fn set(&self, at: Timestamp) {
        self.millis.set(at.millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.get())
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}

/// Performance measurement utilities
pub struct PerfTimer {
    start_nanos: u64,
    name: String,
}

impl PerfTimer {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start_nanos: nanos(),
            name: name.into(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        nanos().saturating_sub(self.start_nanos) / 1_000
    }

    /// Log the elapsed time
    pub fn log_elapsed(&self) {
        let micros = self.elapsed_micros();
        if micros < 1000 {
            tracing::debug!("⏱️  {} took {}μs", self.name, micros);
        } else {
            tracing::debug!("⏱️  {} took {:.3}ms", self.name, micros as f64 / 1000.0);
        }
    }
}
