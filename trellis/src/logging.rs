//! Trace presentation on stderr.
//!
//! Trace lines reach `tracing` through [`crate::trace::TracingSink`]; this
//! module installs the subscriber that renders them, with severity levels,
//! optional timestamps, and colour when stderr is a terminal.

use std::io::IsTerminal;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` if set; otherwise shows everything at or above
/// `config.verbosity`.
///
/// # Example
/// ```bash
/// RUST_LOG=trellis=debug trellis provision --region eu
/// ```
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.as_str()));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.color && std::io::stderr().is_terminal())
        .with_target(false);

    let registry = tracing_subscriber::registry().with(filter);
    if config.timestamps {
        registry.with(layer).init();
    } else {
        registry.with(layer.without_time()).init();
    }
}
