//! Tracing setup
//!
//! Logs go to stderr so stdout only carries driver output.

use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// Install the global subscriber; `RUST_LOG` overrides `level`
pub fn configure_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
