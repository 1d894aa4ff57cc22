//! Shared utilities for the hnsw wallet.

pub mod logging;
pub mod shutdown;
pub mod sleeper;
pub mod stats;
pub mod time;

pub use logging::{init_logging, try_init_logging, LogFormat};
pub use shutdown::ShutdownController;
pub use sleeper::{Sleeper, TokioSleeper};
pub use stats::StatsCounter;
pub use time::format_duration;
