//! Authenticated REST calls used to reconcile state after a reconnect gap.
//!
//! Every call carries the stored bearer token. A 401 triggers one
//! `POST /auth/refresh` and one retry; if either fails the token store is
//! cleared and the call returns [`ApiError::SessionExpired`].

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use reqwest::{Method, StatusCode, Url};
use serde_json::{Value, json};
use tableside_core::OrderId;
use tableside_core::dashboard::DashboardSnapshot;
use tableside_core::events::OrderStatus;
use tableside_settings::ApiSettings;
use tracing::{debug, info, warn};

use crate::errors::{ApiError, Result};
use crate::tokens::{RefreshResponse, TokenStore, Tokens};

/// REST client. Clones share the HTTP pool and token store.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenStore>,
}

impl ApiClient {
    /// Client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(http, base_url)
    }

    /// Client built from the `api` settings section.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        Self::new(
            &settings.base_url,
            Duration::from_millis(settings.request_timeout_ms),
        )
    }

    /// Client sharing an existing HTTP pool.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url,
            tokens: Arc::new(TokenStore::default()),
        })
    }

    /// Seed the token store.
    #[must_use]
    pub fn with_tokens(self, access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        self.tokens.set(Tokens {
            access_token: access_token.into(),
            refresh_token,
        });
        self
    }

    /// Token store backing this client.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Shared handle on the token store; sees every later refresh.
    pub fn shared_tokens(&self) -> Arc<TokenStore> {
        Arc::clone(&self.tokens)
    }

    /// `GET /analytics/dashboard`.
    pub async fn dashboard(&self) -> Result<DashboardSnapshot> {
        let body = self
            .send_authed(Method::GET, &["analytics", "dashboard"], None)
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    /// `PATCH /orders/:id/status`.
    pub async fn update_order_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<()> {
        let body = json!({ "status": status });
        let _ = self
            .send_authed(
                Method::PATCH,
                &["orders", order_id.as_str(), "status"],
                Some(&body),
            )
            .await?;
        info!(order_id = %order_id, ?status, "order status updated");
        Ok(())
    }

    /// `POST /auth/refresh`: exchange the refresh token for a new access
    /// token. Does not clear the store on failure.
    #[tracing::instrument(skip_all)]
    pub async fn refresh_token(&self) -> Result<()> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            debug!("no refresh token stored");
            return Err(ApiError::SessionExpired);
        };

        let response = self
            .http
            .post(self.endpoint(&["auth", "refresh"]))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        let body = read_body(response).await;
        let refreshed: RefreshResponse = match body {
            Ok(body) => serde_json::from_value(body)?,
            Err(e) => {
                counter!("api_auth_refresh_total", "status" => "failure").increment(1);
                return Err(e);
            }
        };

        self.tokens.apply_refresh(refreshed);
        counter!("api_auth_refresh_total", "status" => "success").increment(1);
        info!("access token refreshed");
        Ok(())
    }

    async fn send_authed(&self, method: Method, path: &[&str], body: Option<&Value>) -> Result<Value> {
        let response = self.send_once(method.clone(), path, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_body(response).await;
        }

        warn!(path = %path.join("/"), "request unauthorized, refreshing token");
        if let Err(e) = self.refresh_token().await {
            warn!(error = %e, "token refresh failed, signing out");
            self.tokens.clear();
            return Err(ApiError::SessionExpired);
        }

        let response = self.send_once(method, path, body).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("request rejected after refresh, signing out");
            self.tokens.clear();
            return Err(ApiError::SessionExpired);
        }
        read_body(response).await
    }

    async fn send_once(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(path);
        debug!(%method, %url, "api request");
        let mut request = self.http.request(method, url);
        if let Some(token) = self.tokens.access_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // checked in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            let _ = path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Read a response body, mapping non-success statuses to
/// [`ApiError::Status`] and unwrapping a `{"data": ...}` envelope.
async fn read_body(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    Ok(unwrap_envelope(body))
}

fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn error_message(body: &Value) -> String {
    match body {
        Value::String(text) => text.clone(),
        Value::Object(map) => ["message", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map_or_else(|| body.to_string(), str::to_owned),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
