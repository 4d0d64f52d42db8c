//! Presentation sinks: the view state event handlers mutate.
//!
//! [`OrderBoard`] is an in-memory board of orders, a statistics panel, and
//! an alert queue. It is what the kitchen display and admin dashboard keep
//! on screen; a UI layer reads snapshots from it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tableside_core::OrderId;
use tableside_core::dashboard::DashboardSnapshot;
use tableside_core::events::{
    EventKind, OrderPayload, OrderStatus, Priority, RealtimeEvent, Statistics,
};

use crate::dispatcher::{Dispatcher, Subscription};

/// Alerts kept before the oldest is dropped.
const MAX_ALERTS: usize = 100;

/// Completed or cancelled orders kept before the oldest leaves the board.
const MAX_FINISHED_ORDERS: usize = 200;

/// Receives typed events.
pub trait PresentationSink: Send + Sync {
    /// Apply one event to the view state.
    fn apply(&self, event: &RealtimeEvent);
}

/// One order as shown on the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardOrder {
    /// Order id.
    pub id: OrderId,
    /// Human-facing order number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    /// Current status.
    pub status: OrderStatus,
    /// Kitchen priority.
    pub priority: Priority,
}

impl BoardOrder {
    fn from_payload(payload: &OrderPayload, default_status: OrderStatus) -> Self {
        Self {
            id: payload.id.clone(),
            order_number: payload.order_number.clone(),
            status: payload.status.unwrap_or(default_status),
            priority: payload.priority.unwrap_or(Priority::Normal),
        }
    }

    fn merge(&mut self, payload: &OrderPayload) {
        if payload.order_number.is_some() {
            self.order_number.clone_from(&payload.order_number);
        }
        if let Some(status) = payload.status {
            self.status = status;
        }
        if let Some(priority) = payload.priority {
            self.priority = priority;
        }
    }

    fn bare(id: &OrderId) -> Self {
        Self {
            id: id.clone(),
            order_number: None,
            status: OrderStatus::Pending,
            priority: Priority::Normal,
        }
    }
}

/// Audio/visual alert material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// A new order arrived.
    NewOrder {
        /// Order id.
        order_id: OrderId,
        /// Human-facing order number.
        order_number: Option<String>,
    },
    /// An order was cancelled.
    Cancelled {
        /// Order id.
        order_id: OrderId,
        /// Cancellation reason, when given.
        reason: Option<String>,
    },
}

#[derive(Default)]
struct BoardState {
    orders: BTreeMap<OrderId, BoardOrder>,
    statistics: Statistics,
    alerts: VecDeque<Alert>,
    /// Terminal orders, oldest first.
    finished: VecDeque<OrderId>,
}

impl BoardState {
    fn push_alert(&mut self, alert: Alert) {
        if self.alerts.len() == MAX_ALERTS {
            let _ = self.alerts.pop_front();
        }
        self.alerts.push_back(alert);
    }

    fn upsert(&mut self, payload: &OrderPayload, default_status: OrderStatus) {
        let _ = self
            .orders
            .entry(payload.id.clone())
            .and_modify(|order| order.merge(payload))
            .or_insert_with(|| BoardOrder::from_payload(payload, default_status));
    }

    fn order_mut(&mut self, id: &OrderId) -> &mut BoardOrder {
        self.orders
            .entry(id.clone())
            .or_insert_with(|| BoardOrder::bare(id))
    }

    /// Track `id` if it just reached a terminal status, then evict the
    /// oldest finished orders over the cap. Orders reopened since they
    /// were tracked stay on the board.
    fn retire(&mut self, id: &OrderId) {
        let finished = self.orders.get(id).is_some_and(|o| o.status.is_terminal());
        if finished && !self.finished.contains(id) {
            self.finished.push_back(id.clone());
        }
        self.evict_finished();
    }

    fn evict_finished(&mut self) {
        while self.finished.len() > MAX_FINISHED_ORDERS {
            let Some(oldest) = self.finished.pop_front() else {
                break;
            };
            if self.orders.get(&oldest).is_some_and(|o| o.status.is_terminal()) {
                let _ = self.orders.remove(&oldest);
            }
        }
    }
}

/// In-memory order board. Clones share state.
#[derive(Clone, Default)]
pub struct OrderBoard {
    state: Arc<Mutex<BoardState>>,
}

impl OrderBoard {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register handlers for every order and statistics event kind.
    pub fn attach(&self, dispatcher: &Dispatcher) -> Vec<Subscription> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| !kind.is_heartbeat())
            .map(|kind| {
                let board = self.clone();
                dispatcher.register_event(kind, move |event| board.apply(event))
            })
            .collect()
    }

    /// Replace statistics and orders with an authoritative snapshot.
    pub fn apply_dashboard(&self, snapshot: &DashboardSnapshot) {
        let mut state = self.state.lock();
        state.statistics = snapshot.statistics.clone();
        state.orders = snapshot
            .recent_orders
            .iter()
            .map(|payload| {
                (
                    payload.id.clone(),
                    BoardOrder::from_payload(payload, OrderStatus::Pending),
                )
            })
            .collect();
        state.finished = state
            .orders
            .values()
            .filter(|order| order.status.is_terminal())
            .map(|order| order.id.clone())
            .collect();
        state.evict_finished();
    }

    /// All orders, sorted by id.
    pub fn orders(&self) -> Vec<BoardOrder> {
        self.state.lock().orders.values().cloned().collect()
    }

    /// Orders not yet completed or cancelled.
    pub fn active_orders(&self) -> Vec<BoardOrder> {
        self.state
            .lock()
            .orders
            .values()
            .filter(|order| !order.status.is_terminal())
            .cloned()
            .collect()
    }

    /// One order.
    pub fn order(&self, id: &OrderId) -> Option<BoardOrder> {
        self.state.lock().orders.get(id).cloned()
    }

    /// Latest statistics.
    pub fn statistics(&self) -> Statistics {
        self.state.lock().statistics.clone()
    }

    /// Take all pending alerts, oldest first.
    pub fn drain_alerts(&self) -> Vec<Alert> {
        self.state.lock().alerts.drain(..).collect()
    }
}

impl PresentationSink for OrderBoard {
    fn apply(&self, event: &RealtimeEvent) {
        let mut state = self.state.lock();
        let touched = match event {
            RealtimeEvent::OrderCreated(order) | RealtimeEvent::NewOrder(order) => {
                state.upsert(order, OrderStatus::Pending);
                state.push_alert(Alert::NewOrder {
                    order_id: order.id.clone(),
                    order_number: order.order_number.clone(),
                });
                &order.id
            }
            RealtimeEvent::OrderUpdated(order) => {
                state.upsert(order, OrderStatus::Pending);
                &order.id
            }
            RealtimeEvent::OrderCompleted(order) => {
                state.upsert(order, OrderStatus::Completed);
                state.order_mut(&order.id).status = OrderStatus::Completed;
                &order.id
            }
            RealtimeEvent::OrderCancelled(order) => {
                state.upsert(order, OrderStatus::Cancelled);
                state.order_mut(&order.id).status = OrderStatus::Cancelled;
                state.push_alert(Alert::Cancelled {
                    order_id: order.id.clone(),
                    reason: order
                        .extra
                        .get("reason")
                        .and_then(|r| r.as_str())
                        .map(str::to_owned),
                });
                &order.id
            }
            RealtimeEvent::KitchenOrderCancelled(cancel) => {
                state.order_mut(&cancel.order_id).status = OrderStatus::Cancelled;
                state.push_alert(Alert::Cancelled {
                    order_id: cancel.order_id.clone(),
                    reason: cancel.reason.clone(),
                });
                &cancel.order_id
            }
            RealtimeEvent::OrderStatusUpdate(change) => {
                state.order_mut(&change.order_id).status = change.status;
                &change.order_id
            }
            RealtimeEvent::PriorityUpdate(change) => {
                state.order_mut(&change.order_id).priority = change.priority;
                return;
            }
            RealtimeEvent::StatisticsUpdate(stats) => {
                state.statistics = stats.clone();
                return;
            }
            RealtimeEvent::Heartbeat(_) => return,
        };
        state.retire(touched);
    }
}

impl std::fmt::Debug for OrderBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OrderBoard")
            .field("orders", &state.orders.len())
            .field("alerts", &state.alerts.len())
            .finish_non_exhaustive()
    }
}
