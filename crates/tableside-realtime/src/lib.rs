//! # tableside-realtime
//!
//! Live event delivery for the Tableside order board.
//!
//! - [`transport`]: [`Connector`] trait with SSE, WebSocket, and mock
//!   implementations
//! - [`channel`]: the [`Channel`] state machine (connect, heartbeat,
//!   backoff reconnect, disconnect)
//! - [`heartbeat`]: [`HeartbeatMonitor`] staleness detection
//! - [`reconnect`]: [`RetryPolicy`] attempt budget and backoff
//! - [`dispatcher`]: [`Dispatcher`] dedup and typed fan-out
//! - [`sink`]: [`OrderBoard`] presentation state
//!
//! ```no_run
//! # async fn demo() {
//! use tableside_realtime::{Channel, ChannelConfig, OrderBoard, connector_for};
//! use tableside_settings::RealtimeSettings;
//!
//! let settings = RealtimeSettings::default();
//! let channel = Channel::new(ChannelConfig::from_settings(&settings), connector_for(&settings, None));
//! let board = OrderBoard::new();
//! let _subs = board.attach(channel.dispatcher());
//! let _ = channel.connect();
//! # }
//! ```

#![deny(unsafe_code)]

pub mod channel;
pub mod dispatcher;
pub mod heartbeat;
pub mod reconnect;
pub mod sink;
pub mod transport;

pub use channel::{
    Channel, ChannelConfig, ChannelError, ChannelNotice, ChannelState, ConnectionHandle,
};
pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher, Subscription};
pub use heartbeat::HeartbeatMonitor;
pub use reconnect::{RetryDecision, RetryPolicy, RetryState};
pub use sink::{Alert, BoardOrder, OrderBoard, PresentationSink};
pub use transport::{
    BearerSource, ConnectTarget, Connection, Connector, Frame, TransportError, connector_for,
};
