//! Zapier-facing operations
//!
//! `ZapierService` drives the OAuth flow and proxies post operations for the
//! HTTP handlers. It holds no per-request state: credentials live in the
//! `TokenStore`, Threads is reached through `UpstreamApi`.
//!
//! Per user the flow is Unauthorized -> Authorized (code exchange) ->
//! Authorized (refresh replaces the credential). The store is written only
//! after Threads confirmed success, so a failed call leaves the stored
//! credential untouched.

use std::sync::Arc;

use common::Secret;
use threads_api::{CodeExchange, CreatePostRequest, Post, UpstreamApi};
use threads_auth::{AuthorizeParams, Credential, OAuthApp, TokenStore, build_authorization_url};
use tracing::{info, warn};

use crate::error::{Result, ServiceError};
use crate::metrics;
use crate::schemas::{AuthTestResponse, CredentialSummary, NewPostsParams};

/// Immutable settings injected at construction.
#[derive(Debug, Clone)]
pub struct Settings {
    pub app: OAuthApp,
    /// Expected Zapier verification header; `None` disables the check
    pub verification_token: Option<Secret<String>>,
}

pub struct ZapierService {
    settings: Settings,
    upstream: Arc<dyn UpstreamApi>,
    store: Arc<dyn TokenStore>,
}

impl ZapierService {
    pub fn new(
        settings: Settings,
        upstream: Arc<dyn UpstreamApi>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            settings,
            upstream,
            store,
        }
    }

    /// Threads authorization URL for the browser redirect. Touches no state.
    pub fn begin_authorize(&self, params: &AuthorizeParams<'_>) -> Result<String> {
        build_authorization_url(&self.settings.app, params)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))
    }

    /// Trade an authorization code for a credential and store it.
    ///
    /// The credential is keyed by the user id Threads reports, falling back to
    /// the caller-supplied one.
    pub async fn complete_exchange(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<CredentialSummary> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::InvalidRequest("code is required".into()));
        }

        let credential = self
            .upstream
            .exchange_code(CodeExchange {
                code,
                redirect_uri,
                user_id,
            })
            .await
            .map_err(upstream_failed)?;

        let summary = CredentialSummary::from(&credential);
        info!(user_id = %credential.user_id, "authorization code exchanged");
        self.store.put(credential).await;
        Ok(summary)
    }

    /// Replace the stored credential with a refreshed one.
    ///
    /// A caller-supplied refresh token must match the stored one.
    pub async fn refresh(
        &self,
        user_id: &str,
        refresh_token: Option<&str>,
    ) -> Result<CredentialSummary> {
        let current = self.credential_for(user_id).await?;
        if !current.can_refresh() {
            return Err(ServiceError::RefreshNotSupported);
        }

        if let Some(supplied) = refresh_token.filter(|t| !t.is_empty()) {
            let matches = current
                .refresh_token
                .as_ref()
                .is_some_and(|stored| stored.matches(supplied));
            if !matches {
                return Err(ServiceError::InvalidRequest(
                    "refresh_token does not match the stored credential".into(),
                ));
            }
        }

        let refreshed = self
            .upstream
            .refresh(&current)
            .await
            .map_err(upstream_failed)?;

        let summary = CredentialSummary::from(&refreshed);
        info!(user_id = %refreshed.user_id, "credential refreshed");
        self.store.put(refreshed).await;
        Ok(summary)
    }

    /// Zapier's connection test: confirm a credential exists for the user.
    pub async fn test_auth(
        &self,
        user_id: Option<&str>,
        verification: Option<&str>,
    ) -> Result<AuthTestResponse> {
        self.verify(verification)?;
        let user_id = require_user_id(user_id)?;
        let credential = self.credential_for(user_id).await?;
        Ok(AuthTestResponse::from(&credential))
    }

    /// Publish a post for `request.user_id`.
    ///
    /// Checks run in order: verification, validation, credential lookup. Only
    /// then is Threads called, exactly once.
    pub async fn create_thread(
        &self,
        request: &CreatePostRequest,
        verification: Option<&str>,
    ) -> Result<Post> {
        self.verify(verification)?;
        request.validate().map_err(ServiceError::InvalidRequest)?;
        let user_id = require_user_id(request.user_id())?;
        let credential = self.credential_for(user_id).await?;

        let post = self
            .upstream
            .create_post(&credential, request)
            .await
            .map_err(upstream_failed)?;
        info!(user_id = %credential.user_id, post_id = %post.id, "thread created");
        Ok(post)
    }

    /// Recent posts for the new-thread trigger, in the order Threads returned them.
    pub async fn list_new_posts(
        &self,
        params: &NewPostsParams,
        verification: Option<&str>,
    ) -> Result<Vec<Post>> {
        self.verify(verification)?;
        let user_id = require_user_id(params.user_id())?;
        let query = params.to_query().map_err(ServiceError::InvalidRequest)?;
        let credential = self.credential_for(user_id).await?;

        self.upstream
            .list_posts(&credential, &query)
            .await
            .map_err(upstream_failed)
    }

    /// Shared-secret check on the Zapier verification header.
    ///
    /// Exact string equality; no configured token means every caller passes.
    pub fn verify(&self, header: Option<&str>) -> Result<()> {
        let Some(expected) = self.settings.verification_token.as_ref() else {
            return Ok(());
        };
        match header {
            Some(value) if expected.matches(value) => Ok(()),
            _ => {
                warn!("rejected request with invalid Zapier verification token");
                Err(ServiceError::Unauthorized(
                    "invalid Zapier verification token".into(),
                ))
            }
        }
    }

    async fn credential_for(&self, user_id: &str) -> Result<Credential> {
        self.store.get(user_id).await.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "user {user_id} is not authorized; complete the OAuth flow first"
            ))
        })
    }
}

fn require_user_id(user_id: Option<&str>) -> Result<&str> {
    user_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::InvalidRequest("user_id is required".into()))
}

fn upstream_failed(err: threads_api::Error) -> ServiceError {
    match &err {
        threads_api::Error::Rejected {
            status_hint,
            message,
        } => {
            warn!(status = status_hint, error = %message, "Threads API rejected call");
            metrics::record_upstream_error("rejected");
        }
        threads_api::Error::Unavailable(message) => {
            warn!(error = %message, "Threads API unavailable");
            metrics::record_upstream_error("unavailable");
        }
        threads_api::Error::RefreshNotSupported => {}
    }
    err.into()
}
