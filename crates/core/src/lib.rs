//! # Tradegate Core
//!
//! Small shared kernel used by the exchange crates:
//!
//! 1. **Timing** - millisecond timestamps and a latency `PerfTimer`
//! 2. **Clocks** - `Clock` trait with system and manually driven implementations
//! 3. **Unified logging** - one-time `tracing` subscriber installation

pub mod logging;
pub mod timing;

pub use logging::init_logging;
pub use timing::{nanos, Clock, ManualClock, PerfTimer, SystemClock, Timestamp};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::logging::init_logging;
    pub use crate::timing::{nanos, Clock, ManualClock, PerfTimer, SystemClock, Timestamp};

    pub use serde::{Deserialize, Serialize};
}
