//! Test infrastructure for the NRP decomposer and activation core
//!
//! Provides:
//! - Topology and endpoint fixtures
//! - Recording activation drivers and builders
//! - Call log and decomposition verification helpers
//! - Test logging setup

pub mod drivers;
pub mod fixtures;
mod verification;

pub use drivers::*;
pub use fixtures::*;
pub use verification::*;

use tracing_subscriber::EnvFilter;

/// Install a test subscriber honoring `RUST_LOG`; repeated calls are no-ops
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
