//! # tableside-api
//!
//! REST client the live board uses to reconcile after a reconnect gap:
//! the dashboard snapshot, order status updates, and bearer token refresh.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod tokens;

pub use client::ApiClient;
pub use errors::{ApiError, Result};
pub use tokens::{TokenStore, Tokens};
