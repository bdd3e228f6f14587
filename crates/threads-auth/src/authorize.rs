//! Authorization redirect construction
//!
//! The first OAuth step: Zapier sends the user's browser to the adapter,
//! which answers with a redirect to the Threads authorization page carrying
//! the client id, redirect URI, scope and Zapier's opaque `state`.

use url::Url;

use crate::app::OAuthApp;
use crate::error::{Error, Result};

/// Per-request overrides supplied by the caller of `/oauth/authorize`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthorizeParams<'a> {
    /// Opaque value passed through unchanged; omitted from the URL when absent
    pub state: Option<&'a str>,
    /// Replaces the configured redirect URI for this redirect only
    pub redirect_uri: Option<&'a str>,
    /// Replaces the configured scope for this redirect only
    pub scope: Option<&'a str>,
}

/// Build the full authorization URL with percent-encoded query parameters.
///
/// Any query already present on the configured authorize URL is kept.
pub fn build_authorization_url(app: &OAuthApp, params: &AuthorizeParams<'_>) -> Result<String> {
    let mut url = Url::parse(&app.authorize_url)
        .map_err(|e| Error::InvalidUrl(format!("{}: {e}", app.authorize_url)))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", &app.client_id);
        query.append_pair(
            "redirect_uri",
            params.redirect_uri.unwrap_or(&app.redirect_uri),
        );
        query.append_pair("response_type", "code");
        if let Some(scope) = params.scope.or(app.scope.as_deref()) {
            query.append_pair("scope", scope);
        }
        if let Some(state) = params.state {
            query.append_pair("state", state);
        }
    }

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Secret;

    fn app() -> OAuthApp {
        OAuthApp {
            client_id: "client-123".into(),
            client_secret: Secret::from("shh"),
            authorize_url: "https://auth.threads.test/oauth".into(),
            redirect_uri: "https://example.com/oauth/callback".into(),
            scope: Some("threads_basic".into()),
        }
    }

    #[test]
    fn url_contains_required_params() {
        let url = build_authorization_url(&app(), &AuthorizeParams::default()).unwrap();
        assert!(url.starts_with("https://auth.threads.test/oauth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=threads_basic"));
        assert!(
            url.contains("redirect_uri=https%3A%2F%2Fexample.com%2Foauth%2Fcallback"),
            "got: {url}"
        );
        assert!(!url.contains("state="), "state must be omitted when absent: {url}");
    }

    #[test]
    fn caller_overrides_win() {
        let params = AuthorizeParams {
            state: Some("state-123"),
            redirect_uri: Some("https://zapier.com/dashboard/auth/oauth/App123/oauth/callback"),
            scope: Some("threads_basic,threads_content_publish"),
        };
        let url = build_authorization_url(&app(), &params).unwrap();
        assert!(url.contains("state=state-123"));
        assert!(url.contains(
            "redirect_uri=https%3A%2F%2Fzapier.com%2Fdashboard%2Fauth%2Foauth%2FApp123%2Foauth%2Fcallback"
        ));
        assert!(url.contains("scope=threads_basic%2Cthreads_content_publish"), "got: {url}");
    }

    #[test]
    fn scope_is_optional() {
        let mut app = app();
        app.scope = None;
        let url = build_authorization_url(&app, &AuthorizeParams::default()).unwrap();
        assert!(!url.contains("scope="));
    }

    #[test]
    fn invalid_authorize_url_is_an_error() {
        let mut app = app();
        app.authorize_url = "not a url".into();
        let err = build_authorization_url(&app, &AuthorizeParams::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
