//! Logging prelude module for convenient access to tracing macros.
//!
//! This module provides convenient re-exports of common tracing macros
//! to reduce verbosity and maintain consistency across the codebase.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("This is an info message");
//! warn!("This is a warning");
//! error!("An error occurred");
//! debug!("Debug information");
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `level` is the default directive (usually taken from `--log-level`);
/// the `RUST_LOG` environment variable overrides it:
///
/// ```bash
/// RUST_LOG=debug duplexr sync
/// RUST_LOG=duplexr::engine=trace duplexr daemon
/// ```
///
/// Timestamps are omitted unless `timestamps` is set, since the daemon
/// usually runs under a supervisor that stamps lines itself.
pub fn init_tracing(level: &str, timestamps: bool) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
	let builder = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false);
	if timestamps {
		builder.init();
	} else {
		builder.without_time().init();
	}
}

// vim: ts=4
