//! The request/response contract between the session manager and the
//! account service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;

/// Presentation hints attached to a request.
///
/// A browser transport shows a spinner or a toast for these; `HttpTransport`
/// turns them into log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Show a loading indicator while the request is in flight
    pub loading: bool,
    /// Show the server's message to the user
    pub message: bool,
    /// Show only error messages to the user
    pub error: bool,
}

impl RequestOptions {
    pub const NONE: Self = Self {
        loading: false,
        message: false,
        error: false,
    };

    pub const LOADING_MESSAGE: Self = Self {
        loading: true,
        message: true,
        error: false,
    };

    pub const LOADING_ERROR: Self = Self {
        loading: true,
        message: false,
        error: true,
    };
}

/// One exchange with the account service.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub path: &'static str,
    pub params: Value,
    pub options: RequestOptions,
    /// Bearer token of the current session, if any
    pub access_token: Option<String>,
}

/// Outcome reported by the service alongside every body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub success: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }
}

/// Response envelope: `{ "status": {...}, "body": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub status: Status,
    #[serde(default)]
    pub body: T,
}

impl ApiResponse<Value> {
    /// Verification token issued by the phone verification flow.
    ///
    /// Accepts either a bare string body or an object carrying
    /// `pinCodeToken` (or `token`).
    pub fn pin_code_token(&self) -> Option<&str> {
        match &self.body {
            Value::String(token) if !token.is_empty() => Some(token),
            Value::Object(map) => map
                .get("pinCodeToken")
                .or_else(|| map.get("token"))
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty()),
            _ => None,
        }
    }
}

/// Sends requests to the account service.
///
/// Implementations own timeouts and any user-facing loading/message UI. They
/// must not retry: a failed exchange is reported once, as-is.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse<Value>, ApiError>;
}
