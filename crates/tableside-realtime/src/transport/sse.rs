//! Server-Sent Events transport over `reqwest` + `eventsource-stream`.
//!
//! Receive only: [`Connection::outbound`] is always `None`. The resume
//! point is sent both as the `Last-Event-ID` header and as a `lastEventId`
//! query parameter, since backends behind proxies often only see one.

use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tableside_settings::TransportKind;
use tracing::debug;

use super::{BearerSource, ConnectTarget, Connection, Connector, Frame, TransportError};

const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Default SSE event name; carries no type information.
const DEFAULT_EVENT: &str = "message";

/// Opens SSE streams.
#[derive(Clone, Default)]
pub struct SseConnector {
    client: reqwest::Client,
    bearer: Option<BearerSource>,
}

impl std::fmt::Debug for SseConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseConnector")
            .field("bearer", &self.bearer.is_some())
            .finish_non_exhaustive()
    }
}

impl SseConnector {
    /// Connector with a default HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            bearer: None,
        }
    }

    /// Send `Authorization: Bearer <token>` on every connect.
    #[must_use]
    pub fn with_bearer_token(self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.with_bearer_source(Arc::new(move || Some(token.clone())))
    }

    /// Read the bearer token from `source` on every connect, so a token
    /// refreshed elsewhere is picked up by the next reconnect.
    #[must_use]
    pub fn with_bearer_source(mut self, source: BearerSource) -> Self {
        self.bearer = Some(source);
        self
    }
}

#[async_trait]
impl Connector for SseConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    async fn connect(&self, target: &ConnectTarget) -> Result<Connection, TransportError> {
        let url = target.request_url(true)?;
        debug!(connection_id = %target.connection_id, %url, "opening SSE stream");

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(last_event_id) = &target.last_event_id {
            request = request.header(LAST_EVENT_ID, last_event_id.as_str());
        }
        if let Some(token) = self.bearer.as_ref().and_then(|source| source()) {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TransportError::Unauthorized);
        }
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            });
        }

        // The stream's last `id:` stays on every later event, matching the
        // EventSource `lastEventId`; the dispatcher's dedup slot decides.
        let frames = response.bytes_stream().eventsource().map(|item| -> Result<Frame, TransportError> {
            let event = item.map_err(|e| TransportError::Stream(e.to_string()))?;
            Ok(Frame {
                event: (!event.event.is_empty() && event.event != DEFAULT_EVENT)
                    .then_some(event.event),
                data: event.data,
                id: (!event.id.is_empty()).then_some(event.id),
            })
        });

        Ok(Connection {
            frames: Box::pin(frames),
            outbound: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tableside_core::{EventId, RestaurantId};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn sse_body(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body)
    }

    #[tokio::test]
    async fn streams_frames_with_event_name_and_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(sse_body(
                "id: e1\nevent: order_created\ndata: {\"data\":{\"id\":\"o1\"}}\n\n\
                 data: {\"type\":\"heartbeat\"}\n\n",
            ))
            .mount(&server)
            .await;

        let target = ConnectTarget::new(format!("{}/events", server.uri()));
        let mut conn = SseConnector::new().connect(&target).await.unwrap();
        assert!(conn.outbound.is_none());

        let first = conn.frames.next().await.unwrap().unwrap();
        assert_eq!(first.event.as_deref(), Some("order_created"));
        assert_eq!(first.id.as_deref(), Some("e1"));

        // no `id:` of its own, so the stream's last id carries over
        let second = conn.frames.next().await.unwrap().unwrap();
        assert_eq!(second.event, None);
        assert_eq!(second.id.as_deref(), Some("e1"));
        assert_eq!(second.data, "{\"type\":\"heartbeat\"}");

        assert!(conn.frames.next().await.is_none());
    }

    #[tokio::test]
    async fn sends_resume_header_query_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(header("last-event-id", "e9"))
            .and(header("authorization", "Bearer tok"))
            .and(query_param("lastEventId", "e9"))
            .and(query_param("restaurant_id", "r1"))
            .respond_with(sse_body(""))
            .expect(1)
            .mount(&server)
            .await;

        let mut target = ConnectTarget::new(format!("{}/events", server.uri()));
        target.restaurant_id = Some(RestaurantId::from("r1"));
        target.last_event_id = Some(EventId::from("e9"));

        let connector = SseConnector::new().with_bearer_token("tok");
        let _ = connector.connect(&target).await.unwrap();
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let connector = SseConnector::new();
        let denied = connector
            .connect(&ConnectTarget::new(format!("{}/denied", server.uri())))
            .await;
        assert_eq!(denied.unwrap_err(), TransportError::Unauthorized);

        let down = connector
            .connect(&ConnectTarget::new(format!("{}/down", server.uri())))
            .await;
        assert_eq!(down.unwrap_err(), TransportError::Http { status: 503 });
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let target = ConnectTarget::new("http://127.0.0.1:1/events");
        let err = SseConnector::new().connect(&target).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
