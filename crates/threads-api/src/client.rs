//! reqwest-backed `UpstreamApi`
//!
//! Token calls go through `threads_auth::TokenClient`; post calls hit the
//! Graph API `v1.0` endpoints with the user's bearer token. Each request
//! carries the configured timeout and is attempted exactly once.

use std::time::Duration;

use chrono::Utc;
use threads_auth::token::{describe_send_error, join_url};
use threads_auth::{Credential, OAuthApp, TokenClient, upstream_message};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::posts::{CreatePostRequest, ListPostsQuery, Post, PostPage, UpstreamPost};
use crate::{BoxFuture, CodeExchange, UpstreamApi};

const CREATE_PATH: &str = "/v1.0/threads";
const USERS_PATH: &str = "/v1.0/users";

/// Threads Graph API client.
#[derive(Debug, Clone)]
pub struct ThreadsClient {
    http: reqwest::Client,
    api_base_url: String,
    tokens: TokenClient,
    timeout: Duration,
}

impl ThreadsClient {
    pub fn new(
        http: reqwest::Client,
        api_base_url: &str,
        app: &OAuthApp,
        timeout: Duration,
    ) -> Result<Self> {
        let tokens = TokenClient::new(http.clone(), api_base_url, app, timeout)?;
        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            tokens,
            timeout,
        })
    }

    fn posts_url(&self, user_id: &str, query: &ListPostsQuery) -> Result<Url> {
        let mut url = join_url(&self.api_base_url, USERS_PATH)?;
        url.path_segments_mut()
            .map_err(|_| Error::Unavailable("API base URL cannot carry a path".into()))?
            .push(user_id)
            .push("threads");
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &query.limit.to_string());
            if let Some(since) = query.since.as_deref() {
                pairs.append_pair("since", since);
            }
        }
        Ok(url)
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(&self, request: reqwest::RequestBuilder, operation: &str) -> Result<String> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(operation, timeout = e.is_timeout(), "Threads API unreachable");
                Error::Unavailable(describe_send_error(&e, self.timeout))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Unavailable(describe_send_error(&e, self.timeout)))?;

        if status.is_server_error() {
            warn!(operation, status = status.as_u16(), "Threads API failed");
            return Err(Error::Unavailable(format!(
                "Threads API returned {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            warn!(operation, status = status.as_u16(), "Threads API rejected request");
            return Err(Error::Rejected {
                status_hint: status.as_u16(),
                message: upstream_message(status.as_u16(), &body),
            });
        }

        debug!(operation, status = status.as_u16(), "Threads API succeeded");
        Ok(body)
    }
}

impl UpstreamApi for ThreadsClient {
    fn exchange_code<'a>(&'a self, exchange: CodeExchange<'a>) -> BoxFuture<'a, Result<Credential>> {
        Box::pin(async move {
            let token = self
                .tokens
                .exchange_code(exchange.code, exchange.redirect_uri)
                .await?;
            // A blank upstream id counts as omitted.
            let user_id = token
                .user_id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .or_else(|| exchange.user_id.map(str::to_owned))
                .ok_or_else(|| Error::bad_response("token response did not identify the user"))?;
            Ok(Credential::issue(user_id, token, Utc::now())?)
        })
    }

    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<Credential>> {
        Box::pin(async move {
            let Some(refresh) = credential.refresh_token.as_ref() else {
                return Err(Error::RefreshNotSupported);
            };
            let token = self.tokens.refresh_token(refresh.expose()).await?;
            Ok(credential.refreshed(token, Utc::now())?)
        })
    }

    fn create_post<'a>(
        &'a self,
        credential: &'a Credential,
        request: &'a CreatePostRequest,
    ) -> BoxFuture<'a, Result<Post>> {
        Box::pin(async move {
            let url = join_url(&self.api_base_url, CREATE_PATH)?;
            let http_request = self
                .http
                .post(url)
                .bearer_auth(credential.access_token.expose())
                .json(&request.upstream_body());
            let body = self.send(http_request, "create_post").await?;

            let raw: UpstreamPost =
                serde_json::from_str(&body).map_err(|e| Error::bad_response(e.to_string()))?;
            raw.into_post(&credential.user_id, request.text.as_deref(), Utc::now())
                .map_err(Error::bad_response)
        })
    }

    fn list_posts<'a>(
        &'a self,
        credential: &'a Credential,
        query: &'a ListPostsQuery,
    ) -> BoxFuture<'a, Result<Vec<Post>>> {
        Box::pin(async move {
            let url = self.posts_url(&credential.user_id, query)?;
            let http_request = self
                .http
                .get(url)
                .bearer_auth(credential.access_token.expose());
            let body = self.send(http_request, "list_posts").await?;

            let page: PostPage =
                serde_json::from_str(&body).map_err(|e| Error::bad_response(e.to_string()))?;
            let now = Utc::now();
            page.data
                .into_iter()
                .map(|raw| raw.into_post(&credential.user_id, None, now))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(Error::bad_response)
        })
    }
}
