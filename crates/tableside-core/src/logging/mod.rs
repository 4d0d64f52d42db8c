//! Structured logging with `tracing`.
//!
//! - [`init_subscriber`] installs the global stderr subscriber
//! - [`test_utils::capture_logs`] captures events in memory for assertions
//!
//! Channel context (connection id, attempt, event type) travels as
//! structured fields on each event rather than as formatted strings.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Default filter when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_LEVEL: &str = "info";

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let level = if level.trim().is_empty() {
        DEFAULT_LEVEL
    } else {
        level
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails if a global subscriber is already installed
    let _ = subscriber.try_init();
}
