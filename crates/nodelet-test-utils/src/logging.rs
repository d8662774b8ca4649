//! `tracing` subscribers for tests and demos.
//!
//! Library crates never install a subscriber; these helpers do it for the
//! binaries and test harnesses that want to see the output.

use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

/// Install a global subscriber writing to stdout, filtered by `RUST_LOG`
/// (default `info`).
pub fn init_subscriber() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .init();
}

/// Install a subscriber for the current test thread only.
///
/// Output goes through the test harness's capture. The subscriber is
/// removed when the returned guard drops.
pub fn init_test_subscriber() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_test_writer())
        .set_default()
}
