//! The transport channel: one logical, long-lived event connection.
//!
//! A [`Channel`] is a cheap-to-clone handle. [`Channel::connect`] spawns a
//! single driver task that owns the connection lifecycle:
//!
//! ```text
//! Idle --connect()--> Connecting --(open)--> Open --(error/close/stale)--> Failed
//! Failed --(attempts remaining)--> Connecting
//! Failed --(attempts exhausted)--> Closed (terminal, reported)
//! Open/Connecting/Failed --disconnect()--> Closed (terminal, manual)
//! ```
//!
//! Shared state sits behind a `parking_lot::Mutex` that is never held
//! across an await. Every driver is tagged with a generation; a driver
//! whose generation is no longer current stops touching state, so a
//! `disconnect()` racing a retry timer can never be undone by it.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tableside_core::events::OutboundMessage;
use tableside_core::retry::RetryConfig;
use tableside_core::{ConnectionId, ErrorCategory, EventId, RestaurantId};
use tableside_settings::RealtimeSettings;
use thiserror::Error;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{Dispatcher, decode_frame};
use crate::heartbeat::HeartbeatMonitor;
use crate::reconnect::{RetryDecision, RetryPolicy, RetryState};
use crate::transport::{ConnectTarget, Connection, Connector, Frame, TransportError};

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Never connected.
    #[default]
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected and receiving.
    Open,
    /// The connection dropped; a retry may be pending.
    Failed,
    /// Stopped, manually or by exhaustion.
    Closed,
}

impl ChannelState {
    /// Connecting or open.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// User-facing status changes (toast/banner material).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelNotice {
    /// A connection opened. `resumed` is set on every open after the
    /// first; consumers should reconcile state over REST.
    Connected {
        /// Id of the opened connection.
        connection_id: ConnectionId,
        /// Whether this open follows an earlier one.
        resumed: bool,
    },
    /// An open connection dropped.
    Disconnected {
        /// What ended it.
        reason: String,
    },
    /// A reconnect is scheduled.
    Retrying {
        /// 1-based attempt number.
        attempt: u32,
        /// Wait before connecting.
        delay: Duration,
    },
    /// The retry budget is spent; the channel is closed.
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
    /// The channel was closed by `disconnect()`.
    Closed,
}

/// Snapshot of the current connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionHandle {
    /// Id of this connection attempt.
    pub connection_id: ConnectionId,
    /// State at snapshot time.
    pub state: ChannelState,
    /// Last inbound activity (or the attempt start).
    pub last_activity: Instant,
    /// Most recent event id seen on the channel.
    pub last_event_id: Option<EventId>,
}

/// Errors surfaced by channel operations. Transport failures never appear
/// here; they drive the state machine instead.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel is not open.
    #[error("channel is not open")]
    NotOpen,
    /// The transport cannot send.
    #[error("transport is receive-only")]
    ReceiveOnly,
    /// The outbound queue is full.
    #[error("outbound queue is full")]
    QueueFull,
    /// The retry budget is spent.
    #[error("reconnect budget exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
    },
    /// An outbound message failed to serialize.
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChannelError {
    /// Error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotOpen | Self::QueueFull => ErrorCategory::Network,
            Self::ReceiveOnly => ErrorCategory::Config,
            Self::RetriesExhausted { .. } => ErrorCategory::Exhausted,
            Self::Encode(_) => ErrorCategory::Malformed,
        }
    }
}

/// Channel parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    /// Endpoint URL.
    pub url: String,
    /// Restaurant to follow.
    pub restaurant_id: Option<RestaurantId>,
    /// Silence before the connection is declared stale.
    pub heartbeat_timeout: Duration,
    /// Reconnection backoff.
    pub retry: RetryConfig,
    /// Notice broadcast buffer.
    pub notice_capacity: usize,
}

impl ChannelConfig {
    /// Defaults for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::from_settings(&RealtimeSettings::default())
        }
    }

    /// Configuration from realtime settings.
    pub fn from_settings(settings: &RealtimeSettings) -> Self {
        Self {
            url: settings.endpoint.clone(),
            restaurant_id: settings.restaurant_id.clone().map(RestaurantId::from),
            heartbeat_timeout: Duration::from_millis(settings.heartbeat_timeout_ms),
            retry: settings.retry.clone(),
            notice_capacity: settings.notice_capacity,
        }
    }

    /// Follow a restaurant.
    #[must_use]
    pub fn with_restaurant(mut self, restaurant_id: impl Into<RestaurantId>) -> Self {
        self.restaurant_id = Some(restaurant_id.into());
        self
    }

    /// Override the heartbeat timeout.
    #[must_use]
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Override the retry parameters.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channel
// ─────────────────────────────────────────────────────────────────────────────

struct ChannelCore {
    state: ChannelState,
    generation: u64,
    cancel: Option<CancellationToken>,
    manual_close: bool,
    retry: RetryState,
    url: String,
    last_event_id: Option<EventId>,
    outbound: Option<mpsc::Sender<String>>,
    handle: Option<ConnectionHandle>,
    ever_opened: bool,
}

struct ChannelInner {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    dispatcher: Dispatcher,
    core: Mutex<ChannelCore>,
    state_tx: watch::Sender<ChannelState>,
    notices: broadcast::Sender<ChannelNotice>,
}

/// Handle to one logical event channel. Clones share the channel.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// Channel with a fresh dispatcher.
    pub fn new(config: ChannelConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_dispatcher(config, connector, Dispatcher::new())
    }

    /// Channel routing events into an existing dispatcher.
    pub fn with_dispatcher(
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
        dispatcher: Dispatcher,
    ) -> Self {
        let policy = RetryPolicy::new(config.retry.clone());
        let (state_tx, _) = watch::channel(ChannelState::Idle);
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        let core = ChannelCore {
            state: ChannelState::Idle,
            generation: 0,
            cancel: None,
            manual_close: false,
            retry: policy.initial_state(),
            url: config.url.clone(),
            last_event_id: None,
            outbound: None,
            handle: None,
            ever_opened: false,
        };
        Self {
            inner: Arc::new(ChannelInner {
                config,
                connector,
                policy,
                dispatcher,
                core: Mutex::new(core),
                state_tx,
                notices,
            }),
        }
    }

    /// Start connecting to the configured URL. No-op (returns false) while
    /// a driver is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) -> bool {
        self.start(None, None)
    }

    /// Start connecting to `url`, resuming from `last_event_id` when given.
    /// No-op (returns false) while a driver is already running.
    pub fn connect_to(&self, url: impl Into<String>, last_event_id: Option<EventId>) -> bool {
        self.start(Some(url.into()), last_event_id)
    }

    fn start(&self, url: Option<String>, last_event_id: Option<EventId>) -> bool {
        let (generation, cancel) = {
            let mut core = self.inner.core.lock();
            if core.cancel.is_some() {
                debug!(state = %core.state, "connect ignored, channel already running");
                return false;
            }
            if let Some(url) = url {
                core.url = url;
            }
            if last_event_id.is_some() {
                core.last_event_id = last_event_id;
            }
            core.manual_close = false;
            core.retry.exhausted = false;
            core.generation += 1;
            let cancel = CancellationToken::new();
            core.cancel = Some(cancel.clone());
            self.inner.set_state(&mut core, ChannelState::Connecting);
            (core.generation, cancel)
        };

        let inner = Arc::clone(&self.inner);
        let _driver = tokio::spawn(async move { inner.drive(generation, cancel).await });
        true
    }

    /// Close the channel and suppress any pending reconnect. No-op when
    /// idle or already closed.
    pub fn disconnect(&self) {
        let cancel = {
            let mut core = self.inner.core.lock();
            if matches!(core.state, ChannelState::Idle | ChannelState::Closed) && core.cancel.is_none()
            {
                return;
            }
            core.manual_close = true;
            core.generation += 1;
            core.outbound = None;
            self.inner.set_state(&mut core, ChannelState::Closed);
            core.cancel.take()
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        info!("channel closed by disconnect");
        self.inner.notify(ChannelNotice::Closed);
    }

    /// Queue an outbound message. Returns false, without side effect,
    /// unless the channel is open on a bidirectional transport.
    pub fn send(&self, message: &OutboundMessage) -> bool {
        match self.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "outbound message not sent");
                false
            }
        }
    }

    /// Queue an outbound message, reporting why it could not be sent.
    pub fn try_send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        self.try_send_text(message.to_json()?)
    }

    /// Queue a raw outbound text frame.
    pub fn try_send_text(&self, text: String) -> Result<(), ChannelError> {
        let core = self.inner.core.lock();
        if core.state != ChannelState::Open {
            return Err(ChannelError::NotOpen);
        }
        let Some(outbound) = &core.outbound else {
            return Err(ChannelError::ReceiveOnly);
        };
        outbound.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ChannelError::NotOpen,
        })
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.inner.core.lock().state
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to notices. Only notices sent after subscribing arrive.
    pub fn notices(&self) -> broadcast::Receiver<ChannelNotice> {
        self.inner.notices.subscribe()
    }

    /// Most recent event id seen (the resume point).
    pub fn last_event_id(&self) -> Option<EventId> {
        self.inner.core.lock().last_event_id.clone()
    }

    /// Current retry bookkeeping.
    pub fn retry_state(&self) -> RetryState {
        self.inner.core.lock().retry
    }

    /// Snapshot of the current connection, if one was ever attempted.
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.inner.core.lock().handle.clone()
    }

    /// Dispatcher events are routed to.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Channel parameters.
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// `RetriesExhausted` once the budget is spent.
    pub fn exhausted(&self) -> Option<ChannelError> {
        let core = self.inner.core.lock();
        core.retry.exhausted.then_some(ChannelError::RetriesExhausted {
            attempts: core.retry.attempt_count,
        })
    }

    /// Wait until the channel is closed. Returns the exhaustion error when
    /// the channel gave up on its own. Never resolves for an idle channel.
    pub async fn closed(&self) -> Result<(), ChannelError> {
        let mut state = self.watch_state();
        let _ = state.wait_for(|s| *s == ChannelState::Closed).await;
        self.exhausted().map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

impl ChannelInner {
    fn set_state(&self, core: &mut ChannelCore, state: ChannelState) {
        core.state = state;
        if let Some(handle) = core.handle.as_mut() {
            handle.state = state;
        }
        let _ = self.state_tx.send_replace(state);
    }

    fn notify(&self, notice: ChannelNotice) {
        // no receivers is fine
        let _ = self.notices.send(notice);
    }

    /// Lock the core if `generation` is still current.
    fn current(&self, generation: u64) -> Option<parking_lot::MutexGuard<'_, ChannelCore>> {
        let core = self.core.lock();
        (core.generation == generation && !core.manual_close).then_some(core)
    }

    async fn drive(self: Arc<Self>, generation: u64, cancel: CancellationToken) {
        loop {
            let target = {
                let Some(mut core) = self.current(generation) else {
                    return;
                };
                let mut target = ConnectTarget::new(core.url.clone());
                target.restaurant_id.clone_from(&self.config.restaurant_id);
                target.last_event_id.clone_from(&core.last_event_id);
                core.handle = Some(ConnectionHandle {
                    connection_id: target.connection_id.clone(),
                    state: ChannelState::Connecting,
                    last_activity: Instant::now(),
                    last_event_id: core.last_event_id.clone(),
                });
                self.set_state(&mut core, ChannelState::Connecting);
                target
            };
            debug!(
                connection_id = %target.connection_id,
                url = %target.url,
                transport = %self.connector.kind(),
                "connecting"
            );

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                result = self.connector.connect(&target) => result,
            };

            let (reason, was_open) = match result {
                Ok(connection) => match self.run_open(generation, &cancel, &target, connection).await {
                    Some(reason) => (reason, true),
                    None => return,
                },
                Err(e) => {
                    warn!(
                        connection_id = %target.connection_id,
                        category = %e.category(),
                        error = %e,
                        "connect failed"
                    );
                    (e.to_string(), false)
                }
            };

            let decision = {
                let Some(mut core) = self.current(generation) else {
                    return;
                };
                core.outbound = None;
                self.set_state(&mut core, ChannelState::Failed);
                let (next, decision) = self.policy.schedule_retry(core.retry);
                core.retry = next;
                if matches!(decision, RetryDecision::Exhausted { .. }) {
                    core.cancel = None;
                    self.set_state(&mut core, ChannelState::Closed);
                }
                decision
            };
            if was_open {
                self.notify(ChannelNotice::Disconnected { reason });
            }

            match decision {
                RetryDecision::Retry { attempt, delay } => {
                    info!(
                        connection_id = %target.connection_id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "reconnect scheduled"
                    );
                    counter!("realtime_reconnect_attempts_total").increment(1);
                    self.notify(ChannelNotice::Retrying { attempt, delay });
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::Exhausted { attempts } => {
                    error!(attempts, url = %target.url, "reconnect budget exhausted, giving up");
                    self.notify(ChannelNotice::Exhausted { attempts });
                    return;
                }
            }
        }
    }

    /// Pump an open connection until it fails (`Some(reason)`) or the
    /// driver is cancelled (`None`).
    async fn run_open(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        target: &ConnectTarget,
        connection: Connection,
    ) -> Option<String> {
        let Connection {
            mut frames,
            outbound,
        } = connection;

        let resumed = {
            let mut core = self.current(generation)?;
            core.retry = self.policy.reset(core.retry);
            core.outbound = outbound;
            if let Some(handle) = core.handle.as_mut() {
                handle.last_activity = Instant::now();
            }
            self.set_state(&mut core, ChannelState::Open);
            std::mem::replace(&mut core.ever_opened, true)
        };
        info!(connection_id = %target.connection_id, resumed, "channel open");
        self.notify(ChannelNotice::Connected {
            connection_id: target.connection_id.clone(),
            resumed,
        });

        let stale = Arc::new(Notify::new());
        let mut monitor = HeartbeatMonitor::new(self.config.heartbeat_timeout);
        {
            let stale = Arc::clone(&stale);
            monitor.start(move || stale.notify_one());
        }

        let reason = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    monitor.stop();
                    return None;
                }
                () = stale.notified() => {
                    warn!(
                        connection_id = %target.connection_id,
                        idle_ms = u64::try_from(monitor.idle_for().as_millis()).unwrap_or(u64::MAX),
                        "connection stale, forcing reconnect"
                    );
                    break format!(
                        "no activity for {}ms",
                        self.config.heartbeat_timeout.as_millis()
                    );
                }
                frame = frames.next() => match frame {
                    Some(Ok(frame)) => {
                        monitor.reset();
                        self.on_frame(generation, target, &frame);
                    }
                    Some(Err(e)) => {
                        warn!(connection_id = %target.connection_id, error = %e, "connection lost");
                        break e.to_string();
                    }
                    None => {
                        warn!(connection_id = %target.connection_id, "connection closed by remote");
                        break TransportError::closed().to_string();
                    }
                }
            }
        };
        monitor.stop();
        Some(reason)
    }

    fn on_frame(&self, generation: u64, target: &ConnectTarget, frame: &Frame) {
        let event = match decode_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    connection_id = %target.connection_id,
                    category = %e.category(),
                    error = %e,
                    "dropping malformed frame"
                );
                counter!("realtime_events_dropped_total", "reason" => "malformed").increment(1);
                return;
            }
        };

        {
            let Some(mut core) = self.current(generation) else {
                return;
            };
            if event.id.is_some() {
                core.last_event_id.clone_from(&event.id);
            }
            let last_event_id = core.last_event_id.clone();
            if let Some(handle) = core.handle.as_mut() {
                handle.last_activity = Instant::now();
                handle.last_event_id = last_event_id;
            }
        }

        let outcome = self.dispatcher.dispatch(&event);
        debug!(
            connection_id = %target.connection_id,
            event_type = %event.event_type,
            event_id = event.id.as_ref().map(EventId::as_str),
            ?outcome,
            "event dispatched"
        );
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;
    use tableside_core::events::EventKind;
    use tableside_settings::TransportKind;

    use super::*;
    use crate::transport::MockConnector;

    fn channel(mock: &MockConnector, max_attempts: u32) -> Channel {
        let config = ChannelConfig::new("http://mock/events").with_retry(RetryConfig {
            max_attempts,
            ..RetryConfig::default()
        });
        Channel::new(config, Arc::new(mock.clone()))
    }

    #[test]
    fn config_from_settings() {
        let settings = RealtimeSettings {
            restaurant_id: Some("r1".into()),
            heartbeat_timeout_ms: 90_000,
            ..RealtimeSettings::default()
        };
        let config = ChannelConfig::from_settings(&settings);
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(90));
        assert_eq!(config.restaurant_id.as_deref(), Some("r1"));
        assert_eq!(config.retry.max_attempts, 10);
    }

    #[test]
    fn new_channel_is_idle() {
        let mock = MockConnector::new(TransportKind::Sse);
        let channel = channel(&mock, 3);
        assert_eq!(channel.state(), ChannelState::Idle);
        assert!(channel.connection().is_none());
        assert!(channel.exhausted().is_none());
        channel.disconnect();
        assert_eq!(channel.state(), ChannelState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_noop_while_running() {
        let mock = MockConnector::new(TransportKind::Sse);
        let _remote = mock.push_open();
        let channel = channel(&mock, 3);

        assert!(channel.connect());
        assert_eq!(channel.state(), ChannelState::Connecting);
        assert!(!channel.connect());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(channel.state(), ChannelState::Open);
        assert!(!channel.connect());
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_requires_open_bidirectional() {
        let sse = MockConnector::new(TransportKind::Sse);
        let _remote = sse.push_open();
        let channel = channel(&sse, 3);
        assert!(!channel.send(&OutboundMessage::ping()));
        assert_matches!(channel.try_send(&OutboundMessage::ping()), Err(ChannelError::NotOpen));

        let _ = channel.connect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_matches!(
            channel.try_send(&OutboundMessage::ping()),
            Err(ChannelError::ReceiveOnly)
        );

        let ws = MockConnector::new(TransportKind::WebSocket);
        let mut remote = ws.push_open();
        let channel = Channel::new(ChannelConfig::new("ws://mock"), Arc::new(ws.clone()));
        let _ = channel.connect();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let message = OutboundMessage::Subscribe {
            restaurant_id: RestaurantId::from("r1"),
        };
        assert!(channel.send(&message));
        let sent = remote.recv_outbound().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&sent).unwrap();
        assert_eq!(value, json!({"type": "subscribe", "restaurant_id": "r1"}));
    }

    #[tokio::test(start_paused = true)]
    async fn frames_update_last_event_id_and_dispatch() {
        let mock = MockConnector::new(TransportKind::Sse);
        let remote = mock.push_open();
        let channel = channel(&mock, 3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = channel.dispatcher().register(EventKind::OrderUpdated, move |data| {
            sink.lock().push(data.clone());
        });

        let _ = channel.connect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(remote.send_json(&json!({"type": "order_updated", "id": "e3", "data": {"id": "o1"}})));
        assert!(remote.send_frame(Frame::data("{ broken")));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(seen.lock().clone(), vec![json!({"id": "o1"})]);
        assert_eq!(channel.last_event_id().as_deref(), Some("e3"));
        assert_eq!(channel.state(), ChannelState::Open, "malformed frame must not affect state");
        let handle = channel.connection().unwrap();
        assert_eq!(handle.state, ChannelState::Open);
        assert_eq!(handle.last_event_id.as_deref(), Some("e3"));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_resumes_from_last_event_id() {
        let mock = MockConnector::new(TransportKind::Sse);
        let first = mock.push_open();
        let _second = mock.push_open();
        let channel = channel(&mock, 3);
        let mut notices = channel.notices();

        let _ = channel.connect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(first.send_json(&json!({"type": "heartbeat", "id": "e7"})));
        tokio::time::sleep(Duration::from_millis(10)).await;
        first.close();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let targets = mock.targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].last_event_id, None);
        assert_eq!(targets[1].last_event_id.as_deref(), Some("e7"));
        assert_ne!(targets[0].connection_id, targets[1].connection_id);

        assert_matches!(notices.recv().await.unwrap(), ChannelNotice::Connected { resumed: false, .. });
        assert_matches!(notices.recv().await.unwrap(), ChannelNotice::Disconnected { .. });
        assert_matches!(
            notices.recv().await.unwrap(),
            ChannelNotice::Retrying { attempt: 1, delay } if delay == Duration::from_secs(1)
        );
        assert_matches!(notices.recv().await.unwrap(), ChannelNotice::Connected { resumed: true, .. });
    }

    #[test]
    fn error_categories() {
        assert_eq!(
            ChannelError::RetriesExhausted { attempts: 3 }.category(),
            ErrorCategory::Exhausted
        );
        assert_eq!(ChannelError::ReceiveOnly.category(), ErrorCategory::Config);
        assert_eq!(
            ChannelError::RetriesExhausted { attempts: 3 }.to_string(),
            "reconnect budget exhausted after 3 attempts"
        );
    }
}
