//! Transports: one live SSE or WebSocket connection per [`Connector::connect`].
//!
//! A connector only opens the connection. Everything after that (frames,
//! heartbeats, reconnects) is driven by [`crate::channel::Channel`], which
//! consumes the returned [`Connection`].

pub mod mock;
pub mod sse;
pub mod websocket;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Url;
use tableside_core::{ConnectionId, ErrorCategory, EventId, RestaurantId};
use tableside_settings::{RealtimeSettings, TransportKind};
use thiserror::Error;
use tokio::sync::mpsc;

pub use mock::{MockConnector, MockRemote};
pub use sse::SseConnector;
pub use websocket::WebSocketConnector;

/// Yields the current bearer token; called once per connect attempt.
pub type BearerSource = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Where and how to open one connection attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectTarget {
    /// Endpoint URL.
    pub url: String,
    /// Restaurant whose events to receive.
    pub restaurant_id: Option<RestaurantId>,
    /// Resume point for transports that support it.
    pub last_event_id: Option<EventId>,
    /// Id of this attempt, for log correlation.
    pub connection_id: ConnectionId,
}

impl ConnectTarget {
    /// Target for a fresh attempt against `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            restaurant_id: None,
            last_event_id: None,
            connection_id: ConnectionId::new(),
        }
    }

    /// Full request URL with `restaurant_id` and, when `with_resume` is set,
    /// `lastEventId` query parameters appended.
    pub fn request_url(&self, with_resume: bool) -> Result<Url, TransportError> {
        let mut url =
            Url::parse(&self.url).map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", self.url)))?;
        let resume = self.last_event_id.as_ref().filter(|_| with_resume);
        if self.restaurant_id.is_some() || resume.is_some() {
            let mut pairs = url.query_pairs_mut();
            if let Some(restaurant_id) = &self.restaurant_id {
                let _ = pairs.append_pair("restaurant_id", restaurant_id.as_str());
            }
            if let Some(last_event_id) = resume {
                let _ = pairs.append_pair("lastEventId", last_event_id.as_str());
            }
        }
        Ok(url)
    }
}

/// One raw inbound frame, before JSON decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    /// Transport-level event name (SSE `event:`), if any.
    pub event: Option<String>,
    /// Frame body, expected to be a JSON event object.
    pub data: String,
    /// Transport-level id (SSE `id:`), if any.
    pub id: Option<String>,
}

impl Frame {
    /// A bare data frame.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }
}

/// Inbound frames of an open connection. `None` means the remote closed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// An open connection.
pub struct Connection {
    /// Inbound frames.
    pub frames: FrameStream,
    /// Outbound text frames; `None` for receive-only transports.
    pub outbound: Option<mpsc::Sender<String>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("bidirectional", &self.outbound.is_some())
            .finish_non_exhaustive()
    }
}

/// Transport failures. Never returned to `Channel` callers; the driver
/// turns them into state transitions.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {status}")]
    Http {
        /// Status code.
        status: u16,
    },
    /// The endpoint rejected our credentials.
    #[error("endpoint rejected credentials")]
    Unauthorized,
    /// The stream broke mid-flight.
    #[error("stream error: {0}")]
    Stream(String),
    /// The remote closed the connection.
    #[error("closed by remote{}", reason_suffix(.code, .reason))]
    Closed {
        /// Close code, when the transport has one.
        code: Option<u16>,
        /// Close reason, possibly empty.
        reason: String,
    },
    /// The endpoint URL does not parse.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
}

fn reason_suffix(code: &Option<u16>, reason: &str) -> String {
    match (code, reason.is_empty()) {
        (Some(code), false) => format!(" ({code}: {reason})"),
        (Some(code), true) => format!(" ({code})"),
        (None, false) => format!(" ({reason})"),
        (None, true) => String::new(),
    }
}

impl TransportError {
    /// Error category, used for logging only. Every failure is retried.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connect(_) | Self::Stream(_) | Self::Closed { .. } => ErrorCategory::Network,
            Self::Http { status } => ErrorCategory::from_status(*status),
            Self::Unauthorized => ErrorCategory::Auth,
            Self::InvalidUrl(_) => ErrorCategory::Config,
        }
    }

    /// A remote close with no code or reason.
    pub fn closed() -> Self {
        Self::Closed {
            code: None,
            reason: String::new(),
        }
    }
}

/// Opens connections of one transport kind.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Transport this connector speaks.
    fn kind(&self) -> TransportKind;

    /// Open one connection.
    async fn connect(&self, target: &ConnectTarget) -> Result<Connection, TransportError>;
}

/// The connector `settings.transport` selects. The bearer source is only
/// used by SSE; WebSocket backends authenticate via the URL.
pub fn connector_for(settings: &RealtimeSettings, bearer: Option<BearerSource>) -> Arc<dyn Connector> {
    match settings.transport {
        TransportKind::Sse => {
            let connector = SseConnector::new();
            Arc::new(match bearer {
                Some(source) => connector.with_bearer_source(source),
                None => connector,
            })
        }
        TransportKind::WebSocket => Arc::new(WebSocketConnector::from_settings(settings)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_for_follows_transport_setting() {
        let mut settings = RealtimeSettings::default();
        assert_eq!(connector_for(&settings, None).kind(), TransportKind::Sse);
        settings.transport = TransportKind::WebSocket;
        assert_eq!(
            connector_for(&settings, Some(Arc::new(|| Some("tok".to_owned())))).kind(),
            TransportKind::WebSocket
        );
    }

    #[test]
    fn request_url_without_params() {
        let target = ConnectTarget::new("https://api.example/events");
        assert_eq!(
            target.request_url(true).unwrap().as_str(),
            "https://api.example/events"
        );
    }

    #[test]
    fn request_url_appends_restaurant_and_resume() {
        let mut target = ConnectTarget::new("https://api.example/events?v=2");
        target.restaurant_id = Some(RestaurantId::from("r 1"));
        target.last_event_id = Some(EventId::from("e42"));

        let url = target.request_url(true).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example/events?v=2&restaurant_id=r+1&lastEventId=e42"
        );

        let url = target.request_url(false).unwrap();
        assert_eq!(url.as_str(), "https://api.example/events?v=2&restaurant_id=r+1");
    }

    #[test]
    fn request_url_rejects_garbage() {
        let target = ConnectTarget::new("not a url");
        assert!(matches!(
            target.request_url(true),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn each_target_gets_fresh_connection_id() {
        let a = ConnectTarget::new("ws://x");
        let b = ConnectTarget::new("ws://x");
        assert_ne!(a.connection_id, b.connection_id);
    }

    #[test]
    fn error_categories() {
        assert_eq!(TransportError::Connect("refused".into()).category(), ErrorCategory::Network);
        assert_eq!(TransportError::Http { status: 503 }.category(), ErrorCategory::Server);
        assert_eq!(TransportError::Unauthorized.category(), ErrorCategory::Auth);
        assert_eq!(TransportError::InvalidUrl("x".into()).category(), ErrorCategory::Config);
        assert_eq!(TransportError::closed().category(), ErrorCategory::Network);
    }

    #[test]
    fn closed_display() {
        assert_eq!(TransportError::closed().to_string(), "closed by remote");
        let err = TransportError::Closed {
            code: Some(1001),
            reason: "going away".into(),
        };
        assert_eq!(err.to_string(), "closed by remote (1001: going away)");
    }
}
