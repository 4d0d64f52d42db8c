//! WebSocket transport over `tokio-tungstenite`.
//!
//! The socket is split: a writer task owns the sink and drains the outbound
//! queue (plus optional application-level pings), and the read half becomes
//! the connection's [`FrameStream`]. Dropping the outbound sender ends the
//! writer, which closes the socket.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tableside_core::events::OutboundMessage;
use tableside_settings::{RealtimeSettings, TransportKind};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use super::{ConnectTarget, Connection, Connector, Frame, FrameStream, TransportError};

const DEFAULT_SEND_QUEUE: usize = 64;

/// Opens WebSocket connections.
#[derive(Clone, Debug)]
pub struct WebSocketConnector {
    ping_interval: Option<Duration>,
    send_queue_capacity: usize,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self {
            ping_interval: None,
            send_queue_capacity: DEFAULT_SEND_QUEUE,
        }
    }
}

impl WebSocketConnector {
    /// Connector without client pings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector configured from realtime settings.
    pub fn from_settings(settings: &RealtimeSettings) -> Self {
        Self {
            ping_interval: (settings.ping_interval_ms > 0)
                .then(|| Duration::from_millis(settings.ping_interval_ms)),
            send_queue_capacity: settings.send_queue_capacity.max(1),
        }
    }

    /// Send `{"type":"ping"}` every `interval` while connected.
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = (!interval.is_zero()).then_some(interval);
        self
    }
}

fn map_connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status().as_u16();
            if status == 401 {
                TransportError::Unauthorized
            } else {
                TransportError::Http { status }
            }
        }
        tungstenite::Error::Url(e) => TransportError::InvalidUrl(e.to_string()),
        other => TransportError::Connect(other.to_string()),
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn connect(&self, target: &ConnectTarget) -> Result<Connection, TransportError> {
        let url = target.request_url(false)?;
        debug!(connection_id = %target.connection_id, %url, "opening WebSocket");

        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(map_connect_error)?;
        let (mut sink, mut stream) = socket.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(self.send_queue_capacity);
        let ping_interval = self.ping_interval;
        let connection_id = target.connection_id.clone();

        let _writer = tokio::spawn(async move {
            let period = ping_interval.unwrap_or(Duration::from_secs(3600));
            let mut ping = interval_at(Instant::now() + period, period);
            loop {
                let text = tokio::select! {
                    queued = outbound_rx.recv() => match queued {
                        Some(text) => text,
                        None => break,
                    },
                    _ = ping.tick(), if ping_interval.is_some() => {
                        match OutboundMessage::ping().to_json() {
                            Ok(text) => text,
                            Err(_) => continue,
                        }
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!(%connection_id, error = %e, "WebSocket write failed");
                    return;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        let frames: FrameStream = Box::pin(async_stream::stream! {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => yield Ok(Frame::data(text.as_str())),
                    Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                        Ok(text) => yield Ok(Frame::data(text)),
                        Err(_) => warn!(len = bytes.len(), "dropping non-UTF-8 binary frame"),
                    },
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame
                            .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                            .unwrap_or_default();
                        yield Err(TransportError::Closed { code, reason });
                        return;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                    Err(e) => {
                        yield Err(TransportError::Stream(e.to_string()));
                        return;
                    }
                }
            }
        });

        Ok(Connection {
            frames,
            outbound: Some(outbound_tx),
        })
    }
}
