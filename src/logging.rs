//! Logging setup for the provider process.
//!
//! Logs go to **stderr**: stdout carries the handshake line the host parses.
//! Filtering follows `RUST_LOG`, for example:
//!
//! ```bash
//! RUST_LOG=hemmer_provider_webarena=trace ./hemmer-provider-webarena
//! ```
//!
//! Resource operations log at `trace` (one line per API round trip) and the
//! gRPC layer logs at `debug`/`info`, so `info` is a quiet default.

use tracing_subscriber::{fmt, prelude::*, registry::Registry, EnvFilter};

/// The level used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LEVEL: &str = "info";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    Registry::default().with(filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the stderr subscriber with `info` as the default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Install the stderr subscriber with a custom default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Install the subscriber unless one is already set.
///
/// Returns `false` if another subscriber got there first, which is the
/// normal case when several tests in one process call this.
pub fn try_init_logging() -> bool {
    subscriber(DEFAULT_LEVEL).try_init().is_ok()
}
