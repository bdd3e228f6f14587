//! OAuth token exchange and refresh
//!
//! Both operations POST a form to `{api_base}/oauth/token` with different
//! grant types and the client credentials. Every call carries the configured
//! timeout; nothing here retries.

use std::time::Duration;

use common::Secret;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::app::OAuthApp;
use crate::constants::TOKEN_PATH;
use crate::error::{Error, Result, upstream_message};
use crate::ids::opt_string_or_number;

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Threads account the grant belongs to
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Client for the Threads token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
    timeout: Duration,
}

impl TokenClient {
    pub fn new(
        http: reqwest::Client,
        api_base_url: &str,
        app: &OAuthApp,
        timeout: Duration,
    ) -> Result<Self> {
        let token_url = join_url(api_base_url, TOKEN_PATH)?;
        Ok(Self {
            http,
            token_url,
            client_id: app.client_id.clone(),
            client_secret: app.client_secret.clone(),
            redirect_uri: app.redirect_uri.clone(),
            timeout,
        })
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `redirect_uri` must match the one used on the authorize redirect; the
    /// configured redirect URI is sent when the caller has none.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<TokenResponse> {
        let redirect_uri = redirect_uri.unwrap_or(&self.redirect_uri);
        self.post_form(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", self.client_secret.expose()),
                ("redirect_uri", redirect_uri),
            ],
            "code exchange",
        )
        .await
    }

    /// Trade a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh: &str) -> Result<TokenResponse> {
        self.post_form(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh),
                ("client_id", &self.client_id),
                ("client_secret", self.client_secret.expose()),
            ],
            "token refresh",
        )
        .await
    }

    async fn post_form(&self, form: &[(&str, &str)], operation: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(operation, timeout = e.is_timeout(), "token endpoint unreachable");
                Error::Unavailable(describe_send_error(&e, self.timeout))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Unavailable(describe_send_error(&e, self.timeout)))?;

        if status.is_server_error() {
            warn!(operation, status = status.as_u16(), "token endpoint failed");
            return Err(Error::Unavailable(format!(
                "token endpoint returned {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            warn!(operation, status = status.as_u16(), "token endpoint rejected request");
            return Err(Error::Rejected {
                status: status.as_u16(),
                message: upstream_message(status.as_u16(), &body),
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::InvalidResponse(format!("{operation}: {e}")))?;
        debug!(operation, user_id = ?token.user_id, "token endpoint succeeded");
        Ok(token)
    }
}

/// Append an absolute path to a base URL, tolerating a trailing slash on the base.
pub fn join_url(base: &str, path: &str) -> Result<Url> {
    let joined = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| Error::InvalidUrl(format!("{joined}: {e}")))
}

/// Describe a transport failure without echoing request contents.
pub fn describe_send_error(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("request timed out after {:.1}s", timeout.as_secs_f64())
    } else if err.is_connect() {
        "could not connect to the Threads API".to_string()
    } else {
        "request to the Threads API failed".to_string()
    }
}
