//! Test utilities for capturing and asserting on tracing events.
//!
//! The capture is thread-local (`set_default`), so tests that assert on
//! logs must run the code under test on the same thread, e.g. with the
//! current-thread Tokio runtime used by `#[tokio::test]`.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// A captured tracing event for assertion.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// The log level.
    pub level: Level,
    /// The target module.
    pub target: String,
    /// The formatted message.
    pub message: String,
    /// Field key-value pairs.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Value of a structured field, if recorded.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Thread-safe store for captured events.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    fn lock(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        // a panicking test thread must not hide the logs from the next assertion
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Get all captured events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().clone()
    }

    /// Check if any event contains the given message substring.
    pub fn has_message(&self, message_contains: &str) -> bool {
        self.lock()
            .iter()
            .any(|e| e.message.contains(message_contains))
    }

    /// Check if any event at the given level contains the message substring.
    pub fn has_event(&self, level: Level, message_contains: &str) -> bool {
        self.lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(message_contains))
    }

    /// Count events at a specific level.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.lock().iter().filter(|e| e.level == level).count()
    }

    /// Events filtered by target module prefix.
    pub fn events_for_target(&self, target_prefix: &str) -> Vec<CapturedEvent> {
        self.lock()
            .iter()
            .filter(|e| e.target.starts_with(target_prefix))
            .cloned()
            .collect()
    }

    /// Clear all captured logs.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// A tracing layer that captures events for testing.
struct CaptureLayer {
    logs: CapturedLogs,
}

/// Visitor that extracts the message and fields from an event.
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let val = format!("{value:?}");
        if field.name() == "message" {
            self.message = val;
        } else {
            self.fields.push((field.name().to_owned(), val));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.push((field.name().to_owned(), value.to_string()));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.push((field.name().to_owned(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.push((field.name().to_owned(), value.to_string()));
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);

        self.logs.lock().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Install a thread-local subscriber that captures all events.
///
/// Returns `(CapturedLogs, DefaultGuard)`; keep the guard alive for the
/// duration of the test.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let layer = CaptureLayer { logs: logs.clone() };

    let subscriber = tracing_subscriber::registry()
        .with(layer)
        .with(LevelFilter::TRACE);

    let guard = subscriber.set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_warn_event_with_fields() {
        let (logs, _guard) = capture_logs();
        tracing::warn!(event_type = "menu_changed", attempt = 3u64, "dropping unknown event");
        assert!(logs.has_event(Level::WARN, "dropping unknown event"));

        let events = logs.events();
        assert_eq!(events[0].field("event_type"), Some("menu_changed"));
        assert_eq!(events[0].field("attempt"), Some("3"));
    }

    #[test]
    fn filter_by_level_and_target() {
        let (logs, _guard) = capture_logs();
        tracing::info!(target: "tableside_realtime::channel", "opened");
        tracing::error!(target: "tableside_api::client", "refresh failed");

        assert_eq!(logs.count_at_level(Level::INFO), 1);
        assert_eq!(logs.count_at_level(Level::ERROR), 1);
        assert_eq!(logs.events_for_target("tableside_realtime").len(), 1);
    }

    #[test]
    fn clear_resets() {
        let (logs, _guard) = capture_logs();
        tracing::info!("one");
        logs.clear();
        assert!(logs.events().is_empty());
        assert!(!logs.has_message("one"));
    }
}
