//! Tracing setup for the `forge` binary
//!
//! Logs go to stderr so stdout stays clean for `--json` output.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub const LEVEL_ENV: &str = "FORGE_LOG_LEVEL";

/// Filter directive: `RUST_LOG`, else `FORGE_LOG_LEVEL`, else `info`.
/// `verbose` forces `debug`.
pub fn filter_directive(verbose: bool, rust_log: Option<&str>, forge_level: Option<&str>) -> String {
    if verbose {
        return "debug".to_string();
    }
    rust_log
        .or(forge_level)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("info")
        .to_string()
}

/// Initialize the global subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let forge_level = std::env::var(LEVEL_ENV).ok();
    let directive = filter_directive(verbose, rust_log.as_deref(), forge_level.as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
