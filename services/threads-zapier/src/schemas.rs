//! Inbound payloads, outbound summaries and the extractors that decode them
//!
//! Zapier's OAuth v2 client posts form bodies while its actions and triggers
//! post JSON, so body payloads accept both (`Payload`). Query strings are
//! decoded the same way (`Params`) so every rejection renders as our JSON
//! error envelope.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use threads_api::posts::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use threads_api::ListPostsQuery;
use threads_auth::Credential;
use threads_auth::ids::opt_string_or_number;

use crate::error::{ApiError, RequestId, ServiceError};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// `/oauth/authorize` query.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeQuery {
    pub state: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
}

/// `/oauth/exchange` query or body.
#[derive(Debug, Default, Deserialize)]
pub struct ExchangeParams {
    pub code: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub state: Option<String>,
    pub redirect_uri: Option<String>,
}

impl ExchangeParams {
    pub fn user_id(&self) -> Option<&str> {
        first_present(&[&self.user_id, &self.state])
    }
}

/// `/oauth/refresh` body.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub state: Option<String>,
    pub refresh_token: Option<String>,
}

impl RefreshParams {
    pub fn user_id(&self) -> Option<&str> {
        first_present(&[&self.user_id, &self.state])
    }
}

/// `/oauth/token` body, dispatched on `grant_type`.
#[derive(Debug, Default, Deserialize)]
pub struct TokenParams {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub refresh_token: Option<String>,
    pub redirect_uri: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub state: Option<String>,
}

impl TokenParams {
    /// `state` first: Zapier carries the account key there on token calls.
    pub fn user_id(&self) -> Option<&str> {
        first_present(&[&self.state, &self.user_id])
    }
}

/// `/zapier/auth/test` body.
#[derive(Debug, Default, Deserialize)]
pub struct AuthTestParams {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
}

/// New-thread trigger query or body.
#[derive(Debug, Default, Deserialize)]
pub struct NewPostsParams {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    pub since: Option<String>,
    /// Kept raw; query strings deliver numbers as text
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub limit: Option<String>,
}

impl NewPostsParams {
    pub fn user_id(&self) -> Option<&str> {
        first_present(&[&self.user_id])
    }

    /// Upstream listing query; `limit` defaults to 20 and must be 1..=100.
    pub fn to_query(&self) -> Result<ListPostsQuery, String> {
        let limit = match self.limit.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            None => DEFAULT_LIST_LIMIT,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|l| (1..=MAX_LIST_LIMIT).contains(l))
                .ok_or_else(|| format!("limit must be an integer between 1 and {MAX_LIST_LIMIT}"))?,
        };
        let since = self
            .since
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        Ok(ListPostsQuery { since, limit })
    }
}

fn first_present<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .filter_map(Option::as_deref)
        .map(str::trim)
        .find(|v| !v.is_empty())
}

/// Stored grant as handed back to Zapier's OAuth client.
///
/// Tokens are included because Zapier stores and replays them.
#[derive(Debug, Serialize)]
pub struct CredentialSummary {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub obtained_at: DateTime<Utc>,
}

impl From<&Credential> for CredentialSummary {
    fn from(credential: &Credential) -> Self {
        Self {
            user_id: credential.user_id.clone(),
            access_token: credential.access_token.expose().clone(),
            refresh_token: credential
                .refresh_token
                .as_ref()
                .map(|t| t.expose().clone()),
            token_type: credential.token_type.clone(),
            scope: credential.scope.clone(),
            expires_in: credential.expires_in,
            expires_at: credential.expires_at,
            obtained_at: credential.obtained_at,
        }
    }
}

/// Connection test result; never carries a token.
#[derive(Debug, Serialize, PartialEq)]
pub struct AuthTestResponse {
    pub user_id: String,
    pub token_type: String,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Credential> for AuthTestResponse {
    fn from(credential: &Credential) -> Self {
        Self {
            user_id: credential.user_id.clone(),
            token_type: credential.token_type.clone(),
            scope: credential.scope.clone(),
            expires_at: credential.expires_at,
        }
    }
}

/// Body decoded from JSON, or from a urlencoded form when the content type says so.
///
/// An empty body decodes as `{}`. Form values arrive as strings; the last
/// occurrence of a repeated key wins.
#[derive(Debug)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = request_id_of(req.extensions());
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .is_some_and(|media| {
                media
                    .trim()
                    .eq_ignore_ascii_case("application/x-www-form-urlencoded")
            });

        let body = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|e| invalid(format!("could not read request body: {e}"), &request_id))?;
        if body.len() > MAX_BODY_BYTES {
            return Err(invalid("request body too large".into(), &request_id));
        }

        let value = if is_form {
            pairs_to_json(&body)
        } else if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_slice(&body)
                .map_err(|e| invalid(format!("invalid JSON payload: {e}"), &request_id))?
        };

        serde_json::from_value(value)
            .map(Payload)
            .map_err(|e| invalid(format!("invalid request payload: {e}"), &request_id))
    }
}

/// Query string decoded into `T`.
#[derive(Debug)]
pub struct Params<T>(pub T);

impl<S, T> FromRequestParts<S> for Params<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = request_id_of(&parts.extensions);
        let query = parts.uri.query().unwrap_or_default();
        serde_json::from_value(pairs_to_json(query.as_bytes()))
            .map(Params)
            .map_err(|e| invalid(format!("invalid query parameters: {e}"), &request_id))
    }
}

/// Urlencoded pairs as a JSON object of strings.
fn pairs_to_json(raw: &[u8]) -> serde_json::Value {
    let map = url::form_urlencoded::parse(raw)
        .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map)
}

fn request_id_of(extensions: &axum::http::Extensions) -> RequestId {
    extensions.get::<RequestId>().cloned().unwrap_or_default()
}

fn invalid(message: String, request_id: &RequestId) -> ApiError {
    ApiError::new(ServiceError::InvalidRequest(message), request_id)
}
