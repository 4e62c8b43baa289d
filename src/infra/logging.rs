//! Tracing subscriber setup for the binary
//!
//! Library code only emits events; installing a subscriber is the
//! binary's job so embedders can bring their own.

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins when set; otherwise
/// `--quiet` drops to warnings. Safe to call more than once.
pub fn init(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}
