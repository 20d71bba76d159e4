//! Logging initialisation.
//!
//! All modules log through `tracing`; this installs the `fmt` subscriber.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialises logging with `info` as the default level.
///
/// # Environment
/// - `RUST_LOG`: filter directive, overrides the default
///   (e.g. `RUST_LOG=debug` or `RUST_LOG=u_bomgen::generation=trace`)
///
/// # Example
/// ```no_run
/// use u_bomgen::logging;
/// logging::init();
/// ```
pub fn init() {
    init_with_default("info");
}

/// Initialises logging with `default_level` used when `RUST_LOG` is unset.
///
/// # Panics
/// Panics if a global subscriber is already installed.
pub fn init_with_default(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// Initialises logging for tests at `debug`, routed through the test writer.
/// Safe to call from several tests.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
