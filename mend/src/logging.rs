//! Development-time tracing for debugging the repair loop.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: dev diagnostics via `RUST_LOG`, output to
//!   stderr. Not persisted, not part of product output.
//!
//! - **Run artifacts (`io/session_log`)**: `events.jsonl` and `report.json`
//!   under `.mend/runs/`. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=mend=debug cargo run -- run --target-dir ./fixtures
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
