//! Service error taxonomy and its HTTP rendering
//!
//! Every error body has the shape
//! `{"error":{"type":"...","message":"...","request_id":"req_..."}}`.
//! Upstream rejections additionally carry `error.upstream_status`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures of the Zapier-facing operations.
///
/// Messages are shown to callers verbatim and never carry tokens or secrets.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Threads refused the call or answered with something unusable
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("stored credential has no refresh token; authorize the account again")]
    RefreshNotSupported,
}

/// Result alias using ServiceError
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) | Self::RefreshNotSupported => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Value of `error.type` in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::Upstream { .. } => "upstream_error",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::RefreshNotSupported => "refresh_not_supported",
        }
    }
}

impl From<threads_api::Error> for ServiceError {
    fn from(err: threads_api::Error) -> Self {
        match err {
            threads_api::Error::Rejected {
                status_hint,
                message,
            } => Self::Upstream {
                status: status_hint,
                message,
            },
            threads_api::Error::Unavailable(message) => {
                Self::UpstreamUnavailable(format!("Threads API unavailable: {message}"))
            }
            threads_api::Error::RefreshNotSupported => Self::RefreshNotSupported,
        }
    }
}

/// Per-request correlation id, `req_` followed by a simple-format UUIDv4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(format!("req_{}", uuid::Uuid::new_v4().as_simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Error response bound to the request it answers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    upstream_status: Option<u16>,
    request_id: RequestId,
}

impl ApiError {
    pub fn new(err: ServiceError, request_id: &RequestId) -> Self {
        let upstream_status = match &err {
            ServiceError::Upstream { status, .. } => Some(*status),
            _ => None,
        };
        Self {
            status: err.status(),
            kind: err.kind(),
            message: err.to_string(),
            upstream_status,
            request_id: request_id.clone(),
        }
    }

    pub fn method_not_allowed(request_id: &RequestId) -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            kind: "method_not_allowed",
            message: "method not allowed for this endpoint".into(),
            upstream_status: None,
            request_id: request_id.clone(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = serde_json::json!({
            "type": self.kind,
            "message": self.message,
            "request_id": self.request_id.as_str(),
        });
        if let Some(status) = self.upstream_status {
            error["upstream_status"] = status.into();
        }
        (
            self.status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            serde_json::json!({ "error": error }).to_string(),
        )
            .into_response()
    }
}
