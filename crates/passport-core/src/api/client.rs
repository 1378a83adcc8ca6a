//! HTTP transport for the GWIN account service.
//!
//! Every endpoint is a JSON `POST` answered with a `{status, body}` envelope.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::config::PassportConfig;

/// Request-context header carrying the tenant the caller acts for
const ENTITY_ID_HEADER: &str = "X-Entity-Id";

/// Request-context header naming the calling channel
const CHANNEL_HEADER: &str = "X-Channel";

/// HTTP transport backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    context_headers: header::HeaderMap,
}

impl HttpTransport {
    /// Create a transport from configuration
    pub fn new(config: &PassportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let mut context_headers = header::HeaderMap::new();
        if let Some(ref entity_id) = config.entity_id {
            context_headers.insert(
                ENTITY_ID_HEADER,
                header::HeaderValue::from_str(entity_id).context("Invalid entity id")?,
            );
        }
        if let Some(ref channel) = config.channel {
            context_headers.insert(
                CHANNEL_HEADER,
                header::HeaderValue::from_str(channel).context("Invalid channel")?,
            );
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            context_headers,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse<Value>, ApiError> {
        let url = self.url(request.path);
        if request.options.loading {
            debug!(path = request.path, "Request in flight");
        }

        let mut builder = self
            .client
            .post(&url)
            .headers(self.context_headers.clone())
            .header(header::ACCEPT, "application/json")
            .json(&request.params);
        if let Some(token) = request.access_token.as_deref().filter(|t| !t.is_empty()) {
            builder = builder.bearer_auth(token);
        }

        let response = Self::check_response(builder.send().await?).await?;
        let text = response.text().await?;
        let envelope: ApiResponse<Value> = serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", request.path, e))
        })?;

        let status = &envelope.status;
        if !status.success && (request.options.message || request.options.error) {
            warn!(path = request.path, code = %status.code, message = %status.message, "Request rejected");
        } else if status.success && request.options.message && !status.message.is_empty() {
            info!(path = request.path, message = %status.message, "Request succeeded");
        }

        Ok(envelope)
    }
}
