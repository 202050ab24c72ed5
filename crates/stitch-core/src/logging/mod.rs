//! Structured logging with `tracing`.
//!
//! Every stitch crate logs through `tracing` macros with structured fields
//! (`session_id`, `message_id`, `event_id`, `state`). Binaries embedding the
//! repair engine call [`init_subscriber`] once at startup; tests use
//! [`capture_logs`] to assert on emitted events.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Initialize the global tracing subscriber on stderr.
///
/// `RUST_LOG` wins over `level` when set. With `json` the output is one JSON
/// object per line, otherwise compact human-readable text. Subsequent calls
/// are no-ops.
pub fn init_subscriber(level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails if a global subscriber is already set; that is fine
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.compact().try_init();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
