use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::provider::WireRequest;

/// Raw outcome of one HTTP round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends a built provider request and returns the raw response.
///
/// Non-2xx statuses are returned, not raised; interpreting them is the
/// provider adapter's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &WireRequest) -> Result<TransportResponse>;
}

/// [`Transport`] over a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &WireRequest) -> Result<TransportResponse> {
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().await.map_err(|e| AnalysisError::Network {
            context: format!("Failed to reach {}", request.url),
            source: e,
        })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| AnalysisError::Network {
            context: format!("Failed to read response from {}", request.url),
            source: e,
        })?;

        debug!(url = %request.url, status, bytes = body.len(), "Provider responded");
        Ok(TransportResponse { status, body })
    }
}
