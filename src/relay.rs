//! CORS relay that forwards browser requests to the provider APIs.
//!
//! `POST /anthropic/...` goes to the Anthropic host and `POST /openai/...`
//! to the OpenAI host. Status and body come back unchanged.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Provider, ANTHROPIC_HOST, OPENAI_HOST};
use crate::provider::ANTHROPIC_VERSION;

/// Relay settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Upstream for `/anthropic/...` (default: `https://api.anthropic.com`).
    pub anthropic_upstream: String,
    /// Upstream for `/openai/...` (default: `https://api.openai.com`).
    pub openai_upstream: String,
    /// Upstream request timeout (default: 120s).
    pub timeout: Duration,
    /// Sent when the client omits `anthropic-version`.
    pub anthropic_version: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            anthropic_upstream: ANTHROPIC_HOST.to_string(),
            openai_upstream: OPENAI_HOST.to_string(),
            timeout: Duration::from_secs(120),
            anthropic_version: ANTHROPIC_VERSION.to_string(),
        }
    }
}

impl RelayConfig {
    pub fn with_anthropic_upstream(mut self, url: impl Into<String>) -> Self {
        self.anthropic_upstream = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_openai_upstream(mut self, url: impl Into<String>) -> Self {
        self.openai_upstream = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upstream URL for a relay path, or `None` for an unknown prefix.
    pub fn upstream_url(&self, path: &str) -> Option<(Provider, String)> {
        let routes = [
            (Provider::Anthropic, &self.anthropic_upstream),
            (Provider::OpenAi, &self.openai_upstream),
        ];
        routes.into_iter().find_map(|(provider, upstream)| {
            let rest = path.strip_prefix('/')?.strip_prefix(provider.as_str())?;
            (rest.is_empty() || rest.starts_with('/'))
                .then(|| (provider, format!("{}{}", upstream, rest)))
        })
    }
}

struct RelayState {
    config: RelayConfig,
    client: reqwest::Client,
}

/// Build the relay router.
pub fn router(config: RelayConfig) -> Router {
    let state = Arc::new(RelayState {
        config,
        client: reqwest::Client::new(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("anthropic-version"),
            header::AUTHORIZATION,
        ])
        .max_age(Duration::from_secs(86400));

    Router::new()
        .fallback(forward)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn forward(
    State(state): State<Arc<RelayState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    if method != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    let Some((provider, mut url)) = state.config.upstream_url(uri.path()) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown API endpoint");
    };
    if let Some(query) = uri.query() {
        url = format!("{}?{}", url, query);
    }

    let mut request = state
        .client
        .post(&url)
        .timeout(state.config.timeout)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body);

    match provider {
        Provider::Anthropic => {
            if let Some(key) = headers.get("x-api-key") {
                request = request.header("x-api-key", key.as_bytes());
            }
            let version = headers
                .get("anthropic-version")
                .map(|v| v.as_bytes().to_vec())
                .unwrap_or_else(|| state.config.anthropic_version.as_bytes().to_vec());
            request = request.header("anthropic-version", version);
        }
        _ => {
            if let Some(auth) = headers.get(header::AUTHORIZATION) {
                request = request.header(header::AUTHORIZATION, auth.as_bytes());
            }
        }
    }

    info!(provider = %provider, url = %url, "RELAY: forwarding");

    let upstream = match request.send().await {
        Ok(resp) => resp,
        Err(e) if e.is_timeout() => {
            warn!(url = %url, "RELAY: upstream timed out");
            return error_response(StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out");
        }
        Err(e) => {
            warn!(url = %url, error = %e, "RELAY: upstream request failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => {
            warn!(url = %url, error = %e, "RELAY: failed to read upstream body");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}
