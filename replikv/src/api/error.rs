//! API error types and StoreError → HTTP status mapping.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use replikv_cluster::StoreError;

/// API error with HTTP status code and error code.
#[derive(Debug)]
pub struct ApiError {
    /// Error code (e.g., "not_leader").
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// HTTP status code.
    pub status: StatusCode,
    /// Leader address, for leadership rejections.
    pub leader: Option<String>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: &'static str, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code,
            message: message.into(),
            status,
            leader: None,
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, StatusCode::BAD_REQUEST)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Convert to HTTP response.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut error = serde_json::json!({
            "code": self.code,
            "message": self.message,
            "status": self.status.as_u16()
        });
        if let Some(leader) = self.leader {
            error["leader"] = serde_json::Value::String(leader);
        }

        super::response::json_response(self.status, &serde_json::json!({ "error": error }))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();

        match err {
            StoreError::MalformedRequest(_) => Self::bad_request("malformed_request", message),
            // Leadership rejections keep the 500 status; the code tells them apart.
            StoreError::NotLeader { leader } => Self {
                leader,
                ..Self::internal("not_leader", message)
            },
            StoreError::ApplyTimeout(_) => Self::internal("apply_timeout", message),
            StoreError::ApplyFailed(_) | StoreError::Decode(_) => {
                Self::internal("apply_failed", message)
            }
            StoreError::Membership(_) => Self::internal("membership", message),
            _ => Self::internal("internal", message),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
