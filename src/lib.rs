// Antenna Analyzer Core - RF sweep and calibration engine
// DDS-driven SWR sweeps, match rating and empirical detector calibration

// Module declarations
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod managers;
pub mod rating;
pub mod storage;
pub mod sweep;
pub mod swr;
pub mod testing;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::{EngineEvent, EngineEventKind, EngineHandle};
pub use error::ErrorCode;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber for `tracing` and `log` records.
///
/// Honours `RUST_LOG`, defaulting to `info`. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
