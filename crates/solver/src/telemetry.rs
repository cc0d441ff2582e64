//! Logging setup shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Installs a `tracing` subscriber writing to stderr.
///
/// Stdout carries the solution lines only. Calling this twice is harmless.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
