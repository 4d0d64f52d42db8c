//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a partial
//! settings file only needs the fields it changes.

use serde::{Deserialize, Serialize};
use tableside_core::retry::RetryConfig;

/// Which transport a channel uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Server-Sent Events (receive only).
    #[default]
    Sse,
    /// WebSocket (bidirectional).
    #[serde(alias = "ws")]
    WebSocket,
}

impl TransportKind {
    /// Parse a user-supplied transport name (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sse" | "eventsource" => Some(Self::Sse),
            "websocket" | "ws" => Some(Self::WebSocket),
            _ => None,
        }
    }

    /// Whether the transport can carry outbound messages.
    pub fn is_bidirectional(self) -> bool {
        matches!(self, Self::WebSocket)
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sse => f.write_str("sse"),
            Self::WebSocket => f.write_str("websocket"),
        }
    }
}

/// Root settings type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TablesideSettings {
    /// Settings schema version.
    pub version: String,
    /// Live event channel settings.
    pub realtime: RealtimeSettings,
    /// REST reconciliation API settings.
    pub api: ApiSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for TablesideSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            realtime: RealtimeSettings::default(),
            api: ApiSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Live event channel settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// Event endpoint URL (`http(s)://` for SSE, `ws(s)://` for WebSocket).
    pub endpoint: String,
    /// Transport used for the endpoint.
    pub transport: TransportKind,
    /// Restaurant whose events to follow (`restaurant_id` query parameter).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,
    /// Silence after which the channel is declared stale, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Application-level ping interval for WebSocket channels, in
    /// milliseconds. Zero disables client pings.
    pub ping_interval_ms: u64,
    /// Capacity of the status notice broadcast buffer.
    pub notice_capacity: usize,
    /// Capacity of the outbound WebSocket send queue.
    pub send_queue_capacity: usize,
    /// Reconnection backoff.
    pub retry: RetryConfig,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8787/events".to_string(),
            transport: TransportKind::Sse,
            restaurant_id: None,
            heartbeat_timeout_ms: 60_000,
            ping_interval_ms: 25_000,
            notice_capacity: 64,
            send_queue_capacity: 64,
            retry: RetryConfig::default(),
        }
    }
}

/// REST reconciliation API settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL the REST paths are joined onto.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787/api".to_string(),
            request_timeout_ms: 15_000,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter (overridden by `RUST_LOG`).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = TablesideSettings::default();
        assert_eq!(settings.realtime.transport, TransportKind::Sse);
        assert_eq!(settings.realtime.heartbeat_timeout_ms, 60_000);
        assert_eq!(settings.realtime.retry.max_attempts, 10);
        assert_eq!(settings.api.request_timeout_ms, 15_000);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn camel_case_wire_format() {
        let json = serde_json::to_value(TablesideSettings::default()).unwrap();
        assert!(json["realtime"]["heartbeatTimeoutMs"].is_u64());
        assert!(json["realtime"]["retry"]["maxAttempts"].is_u64());
        assert!(json["api"]["baseUrl"].is_string());
        assert!(json["realtime"].get("restaurantId").is_none());
    }

    #[test]
    fn transport_parse() {
        assert_eq!(TransportKind::parse("SSE"), Some(TransportKind::Sse));
        assert_eq!(TransportKind::parse("ws"), Some(TransportKind::WebSocket));
        assert_eq!(TransportKind::parse(" websocket "), Some(TransportKind::WebSocket));
        assert_eq!(TransportKind::parse("carrier-pigeon"), None);
        assert!(TransportKind::WebSocket.is_bidirectional());
        assert!(!TransportKind::Sse.is_bidirectional());
    }

    #[test]
    fn transport_serde() {
        let kind: TransportKind = serde_json::from_str("\"ws\"").unwrap();
        assert_eq!(kind, TransportKind::WebSocket);
        assert_eq!(serde_json::to_string(&TransportKind::WebSocket).unwrap(), "\"websocket\"");
    }
}
