//! Registered OAuth application settings

use common::Secret;

/// Client registration used for authorize redirects and token calls.
///
/// Built once at startup from configuration and shared read-only.
#[derive(Debug, Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub authorize_url: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
}
