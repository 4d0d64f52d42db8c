//! Wire event types.
//!
//! Inbound frames (SSE `data:` payloads or WebSocket text frames) share one
//! JSON shape: `{type, data, timestamp?, id?}`. Each frame is decoded into an
//! immutable [`InboundEvent`]; handlers that want typed payloads go through
//! [`RealtimeEvent`], a tagged union keyed by [`EventKind`].
//!
//! The admin dashboard speaks the snake_case family (`order_created`, ...)
//! while the kitchen display speaks the SCREAMING family (`NEW_ORDER`, ...).
//! Both are first-class kinds here.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::errors::ErrorCategory;
use crate::ids::{EventId, OrderId, RestaurantId};

// ─────────────────────────────────────────────────────────────────────────────
// Event kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Closed set of event types the backend emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// `order_created`
    OrderCreated,
    /// `order_updated`
    OrderUpdated,
    /// `order_completed`
    OrderCompleted,
    /// `order_cancelled`
    OrderCancelled,
    /// `statistics_update`
    StatisticsUpdate,
    /// `heartbeat`
    Heartbeat,
    /// `NEW_ORDER` (kitchen display)
    NewOrder,
    /// `ORDER_STATUS_UPDATE` (kitchen display)
    OrderStatusUpdate,
    /// `ORDER_CANCELLED` (kitchen display)
    KitchenOrderCancelled,
    /// `PRIORITY_UPDATE` (kitchen display)
    PriorityUpdate,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::OrderCreated,
        Self::OrderUpdated,
        Self::OrderCompleted,
        Self::OrderCancelled,
        Self::StatisticsUpdate,
        Self::Heartbeat,
        Self::NewOrder,
        Self::OrderStatusUpdate,
        Self::KitchenOrderCancelled,
        Self::PriorityUpdate,
    ];

    /// The wire `type` string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderCreated => "order_created",
            Self::OrderUpdated => "order_updated",
            Self::OrderCompleted => "order_completed",
            Self::OrderCancelled => "order_cancelled",
            Self::StatisticsUpdate => "statistics_update",
            Self::Heartbeat => "heartbeat",
            Self::NewOrder => "NEW_ORDER",
            Self::OrderStatusUpdate => "ORDER_STATUS_UPDATE",
            Self::KitchenOrderCancelled => "ORDER_CANCELLED",
            Self::PriorityUpdate => "PRIORITY_UPDATE",
        }
    }

    /// Resolve a wire `type` string. Matching is exact.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Whether this kind only proves liveness.
    #[must_use]
    pub const fn is_heartbeat(self) -> bool {
        matches!(self, Self::Heartbeat)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognized event type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| UnknownEventType(s.to_owned()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound frames
// ─────────────────────────────────────────────────────────────────────────────

/// Reasons a frame cannot become an [`InboundEvent`].
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload is not a JSON object of the expected shape.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// Neither the payload nor the transport supplied an event type.
    #[error("frame has no event type")]
    MissingType,
}

impl FrameError {
    /// Malformed frames are dropped; they never affect channel state.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Malformed
    }
}

#[derive(Deserialize)]
struct WireFrame {
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

/// Scalar JSON values (strings, numbers) rendered as a string.
fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// One decoded inbound event. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InboundEvent {
    /// Wire `type` string, kept verbatim so unknown types can be logged.
    pub event_type: String,
    /// Event payload.
    pub data: Value,
    /// Backend-assigned id, if any.
    pub id: Option<EventId>,
    /// Backend timestamp, verbatim.
    pub timestamp: Option<String>,
    /// When this client received the frame.
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Build an event received now.
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            id: None,
            timestamp: None,
            received_at: Utc::now(),
        }
    }

    /// Attach a backend event id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Decode a JSON frame.
    ///
    /// `fallback_type` and `fallback_id` come from the transport (the SSE
    /// `event:` and `id:` fields) and are used only when the JSON payload
    /// does not carry its own `type` / `id`.
    pub fn decode(
        payload: &str,
        fallback_type: Option<&str>,
        fallback_id: Option<&str>,
    ) -> Result<Self, FrameError> {
        let frame: WireFrame = serde_json::from_str(payload)?;

        let event_type = frame
            .event_type
            .filter(|t| !t.is_empty())
            .or_else(|| fallback_type.filter(|t| !t.is_empty()).map(str::to_owned))
            .ok_or(FrameError::MissingType)?;

        let id = frame
            .id
            .and_then(scalar_to_string)
            .or_else(|| fallback_id.filter(|id| !id.is_empty()).map(str::to_owned))
            .map(EventId::from);

        Ok(Self {
            event_type,
            data: frame.data,
            id,
            timestamp: frame.timestamp.and_then(scalar_to_string),
            received_at: Utc::now(),
        })
    }

    /// The typed kind, if the wire type is recognized.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_wire(&self.event_type)
    }

    /// Decode into the typed union.
    ///
    /// Returns `None` for unknown types and `Some(Err(_))` when the payload
    /// does not match the kind's schema.
    pub fn to_typed(&self) -> Option<Result<RealtimeEvent, serde_json::Error>> {
        self.kind()
            .map(|kind| RealtimeEvent::from_parts(kind, &self.data))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of an order. Both the lowercase (admin) and uppercase
/// (kitchen) spellings are accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, not yet accepted.
    #[serde(alias = "PENDING")]
    Pending,
    /// Accepted by the restaurant.
    #[serde(alias = "CONFIRMED")]
    Confirmed,
    /// Being cooked.
    #[serde(alias = "PREPARING", alias = "IN_PROGRESS", alias = "in_progress")]
    Preparing,
    /// Ready for pickup or serving.
    #[serde(alias = "READY")]
    Ready,
    /// Handed to the customer.
    #[serde(alias = "SERVED", alias = "DELIVERED", alias = "delivered")]
    Served,
    /// Finished and paid.
    #[serde(alias = "COMPLETED")]
    Completed,
    /// Cancelled by staff or customer.
    #[serde(alias = "CANCELLED", alias = "canceled", alias = "CANCELED")]
    Cancelled,
    /// A status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Canonical wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Served => "served",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the order has left the active board.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a status string that is not a known status.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match serde_json::from_value(Value::String(s.to_owned())) {
            Ok(Self::Unknown) | Err(_) => Err(UnknownOrderStatus(s.to_owned())),
            Ok(status) => Ok(status),
        }
    }
}

/// Kitchen priority of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Below normal.
    #[serde(alias = "LOW")]
    Low,
    /// Default priority.
    #[serde(alias = "NORMAL")]
    Normal,
    /// Bumped by staff.
    #[serde(alias = "HIGH")]
    High,
    /// Must go out next.
    #[serde(alias = "URGENT")]
    Urgent,
    /// A priority this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Order snapshot carried by order lifecycle events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    /// Order id.
    #[serde(alias = "order_id", alias = "orderId")]
    pub id: OrderId,
    /// Human-facing order number.
    #[serde(default, alias = "orderNumber", skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    /// Current status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    /// Kitchen priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Remaining fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `ORDER_STATUS_UPDATE` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Order id.
    #[serde(alias = "id", alias = "orderId")]
    pub order_id: OrderId,
    /// New status.
    pub status: OrderStatus,
    /// Status before the change, when the backend reports it.
    #[serde(default, alias = "previousStatus", skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<OrderStatus>,
    /// Remaining fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `ORDER_CANCELLED` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Order id.
    #[serde(alias = "id", alias = "orderId")]
    pub order_id: OrderId,
    /// Cancellation reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Remaining fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `PRIORITY_UPDATE` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityChange {
    /// Order id.
    #[serde(alias = "id", alias = "orderId")]
    pub order_id: OrderId,
    /// New priority.
    pub priority: Priority,
    /// Remaining fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Statistics panel payload (`statistics_update`, and the dashboard snapshot).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Orders placed today.
    #[serde(default, alias = "todayOrders", skip_serializing_if = "Option::is_none")]
    pub today_orders: Option<u64>,
    /// Revenue today.
    #[serde(default, alias = "todayRevenue", skip_serializing_if = "Option::is_none")]
    pub today_revenue: Option<f64>,
    /// Orders waiting to be accepted.
    #[serde(default, alias = "pendingOrders", skip_serializing_if = "Option::is_none")]
    pub pending_orders: Option<u64>,
    /// Orders in the kitchen.
    #[serde(default, alias = "activeOrders", skip_serializing_if = "Option::is_none")]
    pub active_orders: Option<u64>,
    /// Remaining fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Typed union over every [`EventKind`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RealtimeEvent {
    /// A customer placed an order.
    #[serde(rename = "order_created")]
    OrderCreated(OrderPayload),
    /// An order's fields changed.
    #[serde(rename = "order_updated")]
    OrderUpdated(OrderPayload),
    /// An order completed.
    #[serde(rename = "order_completed")]
    OrderCompleted(OrderPayload),
    /// An order was cancelled.
    #[serde(rename = "order_cancelled")]
    OrderCancelled(OrderPayload),
    /// Fresh statistics for the dashboard panel.
    #[serde(rename = "statistics_update")]
    StatisticsUpdate(Statistics),
    /// Liveness proof; payload is ignored.
    #[serde(rename = "heartbeat")]
    Heartbeat(Value),
    /// Kitchen: a new order arrived.
    #[serde(rename = "NEW_ORDER")]
    NewOrder(OrderPayload),
    /// Kitchen: an order changed status.
    #[serde(rename = "ORDER_STATUS_UPDATE")]
    OrderStatusUpdate(StatusChange),
    /// Kitchen: an order was cancelled.
    #[serde(rename = "ORDER_CANCELLED")]
    KitchenOrderCancelled(Cancellation),
    /// Kitchen: an order's priority changed.
    #[serde(rename = "PRIORITY_UPDATE")]
    PriorityUpdate(PriorityChange),
}

impl RealtimeEvent {
    /// Decode a payload for a known kind.
    pub fn from_parts(kind: EventKind, data: &Value) -> Result<Self, serde_json::Error> {
        let tagged = serde_json::json!({ "type": kind.as_str(), "data": data });
        serde_json::from_value(tagged)
    }

    /// The variant tag.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::OrderCreated(_) => EventKind::OrderCreated,
            Self::OrderUpdated(_) => EventKind::OrderUpdated,
            Self::OrderCompleted(_) => EventKind::OrderCompleted,
            Self::OrderCancelled(_) => EventKind::OrderCancelled,
            Self::StatisticsUpdate(_) => EventKind::StatisticsUpdate,
            Self::Heartbeat(_) => EventKind::Heartbeat,
            Self::NewOrder(_) => EventKind::NewOrder,
            Self::OrderStatusUpdate(_) => EventKind::OrderStatusUpdate,
            Self::KitchenOrderCancelled(_) => EventKind::KitchenOrderCancelled,
            Self::PriorityUpdate(_) => EventKind::PriorityUpdate,
        }
    }

    /// The order this event concerns, if any.
    #[must_use]
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            Self::OrderCreated(o)
            | Self::OrderUpdated(o)
            | Self::OrderCompleted(o)
            | Self::OrderCancelled(o)
            | Self::NewOrder(o) => Some(&o.id),
            Self::OrderStatusUpdate(s) => Some(&s.order_id),
            Self::KitchenOrderCancelled(c) => Some(&c.order_id),
            Self::PriorityUpdate(p) => Some(&p.order_id),
            Self::StatisticsUpdate(_) | Self::Heartbeat(_) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound (WebSocket only)
// ─────────────────────────────────────────────────────────────────────────────

/// Messages a client may send over a bidirectional channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Start receiving a restaurant's events.
    Subscribe {
        /// Restaurant to follow.
        restaurant_id: RestaurantId,
    },
    /// Stop receiving a restaurant's events.
    Unsubscribe {
        /// Restaurant to drop.
        restaurant_id: RestaurantId,
    },
    /// Application-level keepalive.
    Ping {
        /// Client clock, epoch milliseconds.
        timestamp: i64,
    },
    /// Kitchen staff moved an order to a new status.
    StatusUpdate {
        /// Order to update.
        order_id: OrderId,
        /// Target status.
        status: OrderStatus,
    },
}

impl OutboundMessage {
    /// A ping stamped with the current time.
    #[must_use]
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Serialize to the wire text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
