//! Authoritative dashboard snapshot returned by `GET /analytics/dashboard`.
//!
//! The event layer gives no replay guarantee, so after a reconnect gap the
//! client refetches this snapshot and overwrites its statistics panel and
//! active orders with it.

use serde::{Deserialize, Serialize};

use crate::events::{OrderPayload, Statistics};

/// Dashboard snapshot. Statistics fields sit at the top level of the body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// Headline counters.
    #[serde(flatten)]
    pub statistics: Statistics,
    /// Orders currently on the board.
    #[serde(default, alias = "recentOrders", alias = "orders")]
    pub recent_orders: Vec<OrderPayload>,
}
