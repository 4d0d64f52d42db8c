//! # tableside-core
//!
//! Foundation types shared by every Tableside crate:
//!
//! - **Branded IDs**: `EventId`, `OrderId`, `RestaurantId`, `ConnectionId`
//! - **Wire events**: [`events::InboundEvent`], the typed [`events::RealtimeEvent`]
//!   union, and outbound WebSocket messages
//! - **Dashboard**: REST reconciliation snapshot types
//! - **Errors**: [`errors::ErrorCategory`] taxonomy used by every error enum
//! - **Retry**: backoff configuration and delay math
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod dashboard;
pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod retry;

pub use errors::ErrorCategory;
pub use ids::{ConnectionId, EventId, OrderId, RestaurantId};
