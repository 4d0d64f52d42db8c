//! In-memory bearer token store.

use parking_lot::RwLock;
use serde::Deserialize;

/// Access and refresh token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Tokens {
    /// Bearer token sent on every request.
    pub access_token: String,
    /// Token exchanged for a new access token on 401.
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Shared token slot. Empty means signed out.
#[derive(Debug, Default)]
pub struct TokenStore {
    inner: RwLock<Option<Tokens>>,
}

impl TokenStore {
    /// Store seeded with `tokens`.
    pub fn new(tokens: Option<Tokens>) -> Self {
        Self {
            inner: RwLock::new(tokens),
        }
    }

    /// Current access token.
    pub fn access_token(&self) -> Option<String> {
        self.inner.read().as_ref().map(|t| t.access_token.clone())
    }

    /// Current refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.inner.read().as_ref().and_then(|t| t.refresh_token.clone())
    }

    /// Whether any tokens are held.
    pub fn is_signed_in(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Replace both tokens.
    pub fn set(&self, tokens: Tokens) {
        *self.inner.write() = Some(tokens);
    }

    /// Apply a refresh response. The refresh token is kept unless the
    /// server rotated it.
    pub(crate) fn apply_refresh(&self, refreshed: RefreshResponse) {
        let mut inner = self.inner.write();
        let refresh_token = refreshed
            .refresh_token
            .or_else(|| inner.as_ref().and_then(|t| t.refresh_token.clone()));
        *inner = Some(Tokens {
            access_token: refreshed.access_token,
            refresh_token,
        });
    }

    /// Forget everything (forced logout).
    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

/// Body of `POST /auth/refresh`, after envelope unwrapping.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    #[serde(alias = "accessToken", alias = "token")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: Option<&str>) -> Tokens {
        Tokens {
            access_token: access.into(),
            refresh_token: refresh.map(str::to_owned),
        }
    }

    #[test]
    fn refresh_keeps_refresh_token_unless_rotated() {
        let store = TokenStore::new(Some(pair("a1", Some("r1"))));
        store.apply_refresh(RefreshResponse {
            access_token: "a2".into(),
            refresh_token: None,
        });
        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));

        store.apply_refresh(RefreshResponse {
            access_token: "a3".into(),
            refresh_token: Some("r2".into()),
        });
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
    }

    #[test]
    fn clear_signs_out() {
        let store = TokenStore::new(Some(pair("a", None)));
        assert!(store.is_signed_in());
        store.clear();
        assert!(!store.is_signed_in());
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn refresh_response_accepts_camel_case() {
        let parsed: RefreshResponse =
            serde_json::from_str(r#"{"accessToken":"a","refreshToken":"r"}"#).unwrap();
        assert_eq!(parsed.access_token, "a");
        assert_eq!(parsed.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn debug_redacts() {
        let rendered = format!("{:?}", pair("secret", Some("also-secret")));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
