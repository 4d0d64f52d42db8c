//! Scripted in-memory connector for tests and demos.
//!
//! Each call to [`Connector::connect`] pops the next scripted outcome:
//! a failure, or an open connection controlled through a [`MockRemote`].
//! With nothing scripted, connects fail with [`TransportError::Connect`].

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tableside_settings::TransportKind;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{ConnectTarget, Connection, Connector, Frame, TransportError};

enum Scripted {
    Fail(TransportError),
    Open {
        frames: UnboundedReceiverStream<Result<Frame, TransportError>>,
        outbound: Option<mpsc::Sender<String>>,
    },
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Scripted>,
    targets: Vec<ConnectTarget>,
}

/// Scripted connector.
#[derive(Clone)]
pub struct MockConnector {
    kind: TransportKind,
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// A mock of the given transport kind. WebSocket mocks expose an
    /// outbound queue on each opened connection.
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Script the next connect to fail.
    pub fn push_failure(&self, error: TransportError) {
        self.state.lock().script.push_back(Scripted::Fail(error));
    }

    /// Script the next connect to succeed; returns the server side.
    pub fn push_open(&self) -> MockRemote {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = if self.kind.is_bidirectional() {
            let (tx, rx) = mpsc::channel(64);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        self.state.lock().script.push_back(Scripted::Open {
            frames: UnboundedReceiverStream::new(frame_rx),
            outbound,
        });
        MockRemote {
            frames: frame_tx,
            outbound: outbound_rx,
        }
    }

    /// Number of connect calls made so far.
    pub fn attempts(&self) -> usize {
        self.state.lock().targets.len()
    }

    /// Every target passed to connect, in order.
    pub fn targets(&self) -> Vec<ConnectTarget> {
        self.state.lock().targets.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn connect(&self, target: &ConnectTarget) -> Result<Connection, TransportError> {
        let next = {
            let mut state = self.state.lock();
            state.targets.push(target.clone());
            state.script.pop_front()
        };
        match next {
            Some(Scripted::Open { frames, outbound }) => Ok(Connection {
                frames: Box::pin(frames),
                outbound,
            }),
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(TransportError::Connect("no scripted connection".to_string())),
        }
    }
}

/// Server side of a scripted open connection.
pub struct MockRemote {
    frames: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    outbound: Option<mpsc::Receiver<String>>,
}

impl MockRemote {
    /// Deliver a raw frame. Returns false once the client dropped the
    /// connection.
    pub fn send_frame(&self, frame: Frame) -> bool {
        self.frames.send(Ok(frame)).is_ok()
    }

    /// Deliver a JSON event object as a data frame.
    pub fn send_json(&self, value: &Value) -> bool {
        self.send_frame(Frame::data(value.to_string()))
    }

    /// Break the stream with an error.
    pub fn fail(&self, error: TransportError) -> bool {
        self.frames.send(Err(error)).is_ok()
    }

    /// End the stream as a clean remote close.
    pub fn close(self) {
        drop(self);
    }

    /// Whether the client side has dropped the connection.
    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }

    /// Next text the client sent, if any is queued.
    pub fn try_recv_outbound(&mut self) -> Option<String> {
        self.outbound.as_mut()?.try_recv().ok()
    }

    /// Wait for the next text the client sends.
    pub async fn recv_outbound(&mut self) -> Option<String> {
        self.outbound.as_mut()?.recv().await
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn scripted_outcomes_in_order() {
        let mock = MockConnector::new(TransportKind::Sse);
        mock.push_failure(TransportError::Http { status: 502 });
        let remote = mock.push_open();

        let target = ConnectTarget::new("http://mock/events");
        let err = mock.connect(&target).await.unwrap_err();
        assert_eq!(err, TransportError::Http { status: 502 });

        let mut conn = mock.connect(&target).await.unwrap();
        assert!(conn.outbound.is_none());
        assert!(remote.send_json(&json!({"type": "heartbeat"})));
        let frame = conn.frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, r#"{"type":"heartbeat"}"#);

        remote.close();
        assert!(conn.frames.next().await.is_none());

        assert!(mock.connect(&target).await.is_err());
        assert_eq!(mock.attempts(), 3);
    }

    #[tokio::test]
    async fn websocket_mock_carries_outbound() {
        let mock = MockConnector::new(TransportKind::WebSocket);
        let mut remote = mock.push_open();
        let conn = mock.connect(&ConnectTarget::new("ws://mock")).await.unwrap();

        let outbound = conn.outbound.clone().unwrap();
        outbound.send("hello".to_string()).await.unwrap();
        assert_eq!(remote.recv_outbound().await.as_deref(), Some("hello"));
        assert_eq!(remote.try_recv_outbound(), None);

        drop(conn);
        assert!(remote.is_closed());
    }
}
