//! Event dispatch: dedup, heartbeat filtering, and fan-out to handlers.
//!
//! Handlers are keyed by [`EventKind`] and run in registration order on the
//! channel's driver task. Each dispatch iterates over a snapshot of the
//! handler list, so a handler may unregister itself or others mid-dispatch.
//!
//! Dedup is single-slot: an event whose id equals the immediately preceding
//! id-bearing event's id is dropped. Duplicates separated by other events
//! are delivered.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use metrics::counter;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tableside_core::events::{EventKind, FrameError, InboundEvent, RealtimeEvent};
use tableside_core::{ErrorCategory, EventId};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::transport::Frame;

type Handler = Arc<dyn Fn(&InboundEvent) + Send + Sync>;

/// Failures turning a frame into something a handler can use. Always
/// logged and dropped; never affects channel state.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The frame is not a valid event object.
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),
    /// The payload does not match its event type's schema.
    #[error("payload for {kind} does not decode: {source}")]
    Payload {
        /// Event kind.
        kind: EventKind,
        /// Decode failure.
        source: serde_json::Error,
    },
}

impl DispatchError {
    /// Always [`ErrorCategory::Malformed`].
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Malformed
    }
}

/// Decode a transport frame into an event, using the frame's event name
/// and id when the JSON lacks its own.
pub fn decode_frame(frame: &Frame) -> Result<InboundEvent, DispatchError> {
    Ok(InboundEvent::decode(
        &frame.data,
        frame.event.as_deref(),
        frame.id.as_deref(),
    )?)
}

/// What [`Dispatcher::dispatch`] did with an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered to this many handlers.
    Delivered(usize),
    /// Liveness-only event; not forwarded.
    Heartbeat,
    /// Same id as the previous event; dropped.
    Duplicate,
    /// Known type with no registered handlers.
    Unhandled,
    /// Unrecognized type; logged and dropped.
    Unknown,
}

struct Entry {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<Entry>>,
    last_event_id: Option<EventId>,
}

impl Registry {
    fn remove(&mut self, kind: EventKind, id: u64) -> bool {
        let Some(entries) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }
}

/// Routes inbound events to registered handlers. Clones share one registry.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl Dispatcher {
    /// Empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, kind: EventKind, handler: Handler) -> Subscription {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push(Entry { id, handler });
        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Register a handler that receives the raw `data` payload.
    pub fn register<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.insert(kind, Arc::new(move |event: &InboundEvent| handler(&event.data)))
    }

    /// Register a handler that receives the typed event. Payloads that do
    /// not match the kind's schema are logged and skipped.
    pub fn register_event<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.insert(
            kind,
            Arc::new(move |event: &InboundEvent| {
                match RealtimeEvent::from_parts(kind, &event.data) {
                    Ok(typed) => handler(&typed),
                    Err(source) => log_bad_payload(&DispatchError::Payload { kind, source }, event),
                }
            }),
        )
    }

    /// Register a handler that receives `data` decoded as `T`. Payloads
    /// that do not decode are logged and skipped.
    pub fn register_typed<T, F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.insert(
            kind,
            Arc::new(move |event: &InboundEvent| {
                match T::deserialize(&event.data) {
                    Ok(payload) => handler(payload),
                    Err(source) => log_bad_payload(&DispatchError::Payload { kind, source }, event),
                }
            }),
        )
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registry
            .lock()
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Id of the most recent id-bearing event seen.
    pub fn last_event_id(&self) -> Option<EventId> {
        self.registry.lock().last_event_id.clone()
    }

    /// Route one event.
    pub fn dispatch(&self, event: &InboundEvent) -> DispatchOutcome {
        let snapshot: Vec<Handler> = {
            let mut registry = self.registry.lock();

            if let Some(id) = &event.id {
                if registry.last_event_id.as_ref() == Some(id) {
                    debug!(event_id = %id, event_type = %event.event_type, "dropping duplicate event");
                    counter!("realtime_events_dropped_total", "reason" => "duplicate").increment(1);
                    return DispatchOutcome::Duplicate;
                }
                registry.last_event_id = Some(id.clone());
            }

            let Some(kind) = event.kind() else {
                warn!(event_type = %event.event_type, "dropping event of unknown type");
                counter!("realtime_events_dropped_total", "reason" => "unknown_type").increment(1);
                return DispatchOutcome::Unknown;
            };
            if kind.is_heartbeat() {
                trace!("heartbeat");
                return DispatchOutcome::Heartbeat;
            }

            registry
                .handlers
                .get(&kind)
                .map(|entries| entries.iter().map(|e| Arc::clone(&e.handler)).collect())
                .unwrap_or_default()
        };

        if snapshot.is_empty() {
            debug!(event_type = %event.event_type, "no handlers registered");
            counter!("realtime_events_dropped_total", "reason" => "unhandled").increment(1);
            return DispatchOutcome::Unhandled;
        }

        for handler in &snapshot {
            handler(event);
        }
        counter!("realtime_events_dispatched_total").increment(1);
        DispatchOutcome::Delivered(snapshot.len())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock();
        let handlers: usize = registry.handlers.values().map(Vec::len).sum();
        f.debug_struct("Dispatcher")
            .field("handlers", &handlers)
            .field("last_event_id", &registry.last_event_id)
            .finish()
    }
}

fn log_bad_payload(error: &DispatchError, event: &InboundEvent) {
    warn!(
        event_type = %event.event_type,
        event_id = event.id.as_ref().map(EventId::as_str),
        error = %error,
        "dropping event with undecodable payload"
    );
    counter!("realtime_events_dropped_total", "reason" => "bad_payload").increment(1);
}

/// Capability to remove one registered handler.
///
/// Dropping it leaves the handler registered; removal is explicit.
#[must_use = "keep the Subscription to be able to unregister the handler"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Event kind the handler is registered for.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the handler. Returns false if it was already gone.
    pub fn unregister(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.lock().remove(self.kind, self.id))
    }
}
