//! Error taxonomy shared across crates.
//!
//! Every error enum in the workspace classifies itself into an
//! [`ErrorCategory`] so callers can decide between retrying, re-authenticating,
//! and surfacing a terminal failure without matching on crate-specific types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad classification of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Transient network failure: refused connection, reset stream, timeout.
    Network,
    /// Server-side failure (5xx).
    Server,
    /// Authentication or authorization failure (401/403).
    Auth,
    /// The retry budget has been consumed.
    Exhausted,
    /// A frame or response body could not be decoded.
    Malformed,
    /// Invalid configuration (bad URL, out-of-range value).
    Config,
    /// Anything else.
    Unknown,
}

impl ErrorCategory {
    /// Whether failures in this category are worth retrying automatically.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Server)
    }

    /// Classify an HTTP status code.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            408 | 429 => Self::Network,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Server => "server",
            Self::Auth => "auth",
            Self::Exhausted => "exhausted",
            Self::Malformed => "malformed",
            Self::Config => "config",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_categories() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Exhausted.is_retryable());
        assert!(!ErrorCategory::Malformed.is_retryable());
    }

    #[test]
    fn status_classification() {
        assert_eq!(ErrorCategory::from_status(401), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::Network);
        assert_eq!(ErrorCategory::from_status(503), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::Unknown);
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(ErrorCategory::Exhausted.to_string(), "exhausted");
        let json = serde_json::to_string(&ErrorCategory::Malformed).unwrap();
        assert_eq!(json, "\"malformed\"");
    }
}
