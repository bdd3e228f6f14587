//! Error types for Threads OAuth operations

/// Errors from token endpoint calls and credential construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Timeout, connection failure or 5xx from the token endpoint
    #[error("token endpoint unavailable: {0}")]
    Unavailable(String),

    /// 4xx from the token endpoint
    #[error("token endpoint rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("invalid authorize URL: {0}")]
    InvalidUrl(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pull a human-readable message out of an upstream error body.
///
/// Understands the Graph API shape (`{"error":{"message":...}}`) as well as
/// flat `error`, `error_description`, `message` and `detail` fields. Falls
/// back to a generic message naming the status so raw bodies never reach
/// callers.
pub fn upstream_message(status: u16, body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let found = parsed.as_ref().and_then(|json| {
        json.pointer("/error/message")
            .or_else(|| json.get("error_description"))
            .or_else(|| json.get("error").filter(|v| v.is_string()))
            .or_else(|| json.get("message"))
            .or_else(|| json.get("detail"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    });
    found.unwrap_or_else(|| format!("Threads API request failed with status {status}"))
}
