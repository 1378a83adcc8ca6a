use serde_json::Value;
use thiserror::Error;

use crate::api::{ApiError, Status};

/// Failure of a single session operation.
///
/// Every variant leaves the in-memory session untouched; the caller decides
/// whether to retry.
#[derive(Error, Debug)]
pub enum PassportError {
    #[error(transparent)]
    Transport(#[from] ApiError),

    #[error("Request rejected ({}): {}", .status.code, .status.message)]
    Rejected { status: Status, body: Value },

    #[error("Failed to encode request parameters: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl PassportError {
    /// Server-side status for business rejections.
    pub fn status(&self) -> Option<&Status> {
        match self {
            PassportError::Rejected { status, .. } => Some(status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PassportError>;
