//! Upstream error taxonomy

/// Errors from Threads API operations.
///
/// Every message is safe to show to the caller: no tokens, no client secret,
/// no raw response bodies.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Upstream refused the call (4xx) or answered with an unusable body
    #[error("{message}")]
    Rejected { status_hint: u16, message: String },

    /// Upstream unreachable, timed out or failed with 5xx
    #[error("Threads API unavailable: {0}")]
    Unavailable(String),

    #[error("credential has no refresh token")]
    RefreshNotSupported,
}

/// Result alias for upstream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Status reported for upstream bodies that could not be understood.
pub const BAD_UPSTREAM_RESPONSE: u16 = 502;

impl Error {
    pub fn bad_response(message: impl Into<String>) -> Self {
        Self::Rejected {
            status_hint: BAD_UPSTREAM_RESPONSE,
            message: format!("invalid response from Threads API: {}", message.into()),
        }
    }
}

impl From<threads_auth::Error> for Error {
    fn from(err: threads_auth::Error) -> Self {
        match err {
            threads_auth::Error::Unavailable(message) => Self::Unavailable(message),
            threads_auth::Error::Rejected { status, message } => Self::Rejected {
                status_hint: status,
                message,
            },
            threads_auth::Error::InvalidResponse(message) => Self::bad_response(message),
            threads_auth::Error::InvalidUrl(message) => Self::Unavailable(message),
        }
    }
}
