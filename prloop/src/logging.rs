//! Diagnostic tracing for the loop and its commands.
//!
//! Diagnostics go to stderr and are filtered by `RUST_LOG`. Command output
//! (JSON, tables, confirmations) is printed to stdout separately and is never
//! affected by the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global subscriber.
///
/// `default_directive` applies when `RUST_LOG` is unset, e.g. `warn` for
/// one-shot commands and `info` for `run-loop`.
///
/// # Example
/// ```bash
/// RUST_LOG=prloop=debug prloop run-loop
/// ```
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
