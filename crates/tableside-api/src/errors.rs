//! REST client errors.

use tableside_core::ErrorCategory;
use thiserror::Error;

/// Errors returned by [`crate::ApiClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Status code.
        status: u16,
        /// Server-provided message, or the raw body.
        message: String,
    },

    /// Refresh failed or the retried call was rejected again. Stored
    /// tokens have been cleared; the user must sign in again.
    #[error("session expired, sign in again")]
    SessionExpired,

    /// The response body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL cannot carry path segments.
    #[error("invalid API base url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Error category for logging and retry decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http(_) => ErrorCategory::Network,
            Self::Status { status, .. } => ErrorCategory::from_status(*status),
            Self::SessionExpired => ErrorCategory::Auth,
            Self::Decode(_) => ErrorCategory::Malformed,
            Self::InvalidUrl(_) => ErrorCategory::Config,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(ApiError::SessionExpired.category(), ErrorCategory::Auth);
        assert_eq!(
            ApiError::Status {
                status: 502,
                message: String::new()
            }
            .category(),
            ErrorCategory::Server
        );
        assert_eq!(
            ApiError::Status {
                status: 404,
                message: String::new()
            }
            .category(),
            ErrorCategory::Unknown
        );
        assert_eq!(ApiError::InvalidUrl("x".into()).category(), ErrorCategory::Config);
        let decode = serde_json::from_str::<u8>("nope").unwrap_err();
        assert_eq!(ApiError::from(decode).category(), ErrorCategory::Malformed);
    }

    #[test]
    fn display() {
        let err = ApiError::Status {
            status: 409,
            message: "order already served".into(),
        };
        assert_eq!(err.to_string(), "HTTP 409: order already served");
    }
}
