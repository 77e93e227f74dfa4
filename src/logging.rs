//! Structured logging setup
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for report
//! output so it can be piped into files or other tools.
//!
//! ```bash
//! # Everything at debug
//! investor-index --snapshot data.json --log-level debug totals
//!
//! # RUST_LOG wins over --log-level
//! RUST_LOG=investor_index::core::synchronizer=debug investor-index --snapshot data.json accrue
//! ```

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Build the filter: `RUST_LOG` if set and valid, otherwise `level`
///
/// An unparsable `level` falls back to `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber writing compact lines to stderr
///
/// Calling it twice is harmless: the second install fails and is ignored.
pub fn init_logging(level: &str) {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(layer)
        .try_init();
}
