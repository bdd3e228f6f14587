//! HTTP surface
//!
//! Endpoints:
//! - GET  /oauth/authorize                 302 to the Threads authorize page
//! - GET|POST /oauth/exchange              code exchange, returns the credential
//! - POST /oauth/refresh                   refresh, returns the new credential
//! - POST /oauth/token                     OAuth token endpoint for Zapier (`grant_type`)
//! - POST /zapier/auth/test                connection test
//! - POST /zapier/actions/create-thread    publish a post
//! - GET|POST /zapier/triggers/new-thread  recent posts, upstream order
//! - GET  /healthz, GET /metrics
//!
//! Trailing slashes are trimmed before routing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use threads_api::{CreatePostRequest, Post};
use threads_auth::AuthorizeParams;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tracing::{Instrument, info_span};

use crate::error::{ApiError, RequestId, ServiceError};
use crate::metrics;
use crate::schemas::{
    AuthTestParams, AuthTestResponse, AuthorizeQuery, CredentialSummary, ExchangeParams,
    NewPostsParams, Params, Payload, RefreshParams, TokenParams,
};
use crate::service::ZapierService;

/// Verification header names, checked in this order.
const SIGNATURE_HEADER: &str = "x-zapier-signature";
const TOKEN_HEADER: &str = "x-zapier-token";

/// Request counters reported by `/healthz`
#[derive(Debug, Clone)]
pub struct ServiceStats {
    pub requests_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ZapierService>,
    pub stats: ServiceStats,
    pub prometheus: PrometheusHandle,
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the service with all routes, the concurrency limit and
/// trailing-slash normalization.
///
/// Normalization wraps the router rather than being added with
/// `Router::layer` so it runs before route matching.
pub fn build_app(state: AppState, max_connections: usize) -> NormalizePath<Router> {
    let router = Router::new()
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/oauth/authorize", get(authorize_handler))
        .route(
            "/oauth/exchange",
            get(exchange_query_handler).post(exchange_body_handler),
        )
        .route("/oauth/refresh", post(refresh_handler))
        .route("/oauth/token", post(token_handler))
        .route("/zapier/auth/test", post(auth_test_handler))
        .route("/zapier/actions/create-thread", post(create_thread_handler))
        .route(
            "/zapier/triggers/new-thread",
            get(new_posts_query_handler).post(new_posts_body_handler),
        )
        .fallback(not_found_handler)
        .method_not_allowed_fallback(method_not_allowed_handler)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            track_request,
        ))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state);

    NormalizePathLayer::trim_trailing_slash().layer(router)
}

/// Assign a request id, run the handler inside a span carrying it, and
/// record request metrics.
async fn track_request(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".into());
    let span = info_span!(
        "request",
        request_id = %request_id.as_str(),
        method = %request.method(),
        route = %route,
    );
    request.extensions_mut().insert(request_id);
    state.stats.requests_total.fetch_add(1, Ordering::Relaxed);

    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let status = response.status().as_u16();
    metrics::record_request(&route, status, started.elapsed().as_secs_f64());
    span.in_scope(|| tracing::debug!(status, "request completed"));
    response
}

fn verification_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SIGNATURE_HEADER)
        .filter(|v| !v.is_empty())
        .or_else(|| headers.get(TOKEN_HEADER))
        .and_then(|v| v.to_str().ok())
}

/// Health endpoint: status, uptime and requests served.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptime_seconds": state.stats.started_at.elapsed().as_secs(),
        "requests_served": state.stats.requests_total.load(Ordering::Relaxed),
    }))
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

async fn authorize_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Params(query): Params<AuthorizeQuery>,
) -> ApiResult<Response> {
    let location = state
        .service
        .begin_authorize(&AuthorizeParams {
            state: query.state.as_deref(),
            redirect_uri: query.redirect_uri.as_deref().filter(|v| !v.is_empty()),
            scope: query.scope.as_deref().filter(|v| !v.is_empty()),
        })
        .map_err(|e| ApiError::new(e, &request_id))?;
    Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
}

async fn exchange_query_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Params(params): Params<ExchangeParams>,
) -> ApiResult<Json<CredentialSummary>> {
    exchange(&state, &request_id, &params).await
}

async fn exchange_body_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Payload(params): Payload<ExchangeParams>,
) -> ApiResult<Json<CredentialSummary>> {
    exchange(&state, &request_id, &params).await
}

async fn exchange(
    state: &AppState,
    request_id: &RequestId,
    params: &ExchangeParams,
) -> ApiResult<Json<CredentialSummary>> {
    state
        .service
        .complete_exchange(
            params.code.as_deref().unwrap_or_default(),
            params.redirect_uri.as_deref().filter(|v| !v.is_empty()),
            params.user_id(),
        )
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, request_id))
}

async fn refresh_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Payload(params): Payload<RefreshParams>,
) -> ApiResult<Json<CredentialSummary>> {
    let user_id = params.user_id().ok_or_else(|| {
        ApiError::new(
            ServiceError::InvalidRequest("user_id is required".into()),
            &request_id,
        )
    })?;
    state
        .service
        .refresh(user_id, params.refresh_token.as_deref())
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, &request_id))
}

/// OAuth token endpoint as Zapier's OAuth v2 client calls it.
async fn token_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Payload(params): Payload<TokenParams>,
) -> ApiResult<Json<CredentialSummary>> {
    let invalid = |message: &str| {
        ApiError::new(ServiceError::InvalidRequest(message.into()), &request_id)
    };

    let result = match params.grant_type.as_deref().map(str::trim) {
        Some("authorization_code") => {
            let code = params
                .code
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| invalid("missing authorization code"))?;
            state
                .service
                .complete_exchange(
                    code,
                    params.redirect_uri.as_deref().filter(|v| !v.is_empty()),
                    params.user_id(),
                )
                .await
        }
        Some("refresh_token") => {
            let refresh_token = params
                .refresh_token
                .as_deref()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| invalid("missing refresh token"))?;
            let user_id = params
                .user_id()
                .ok_or_else(|| invalid("missing state parameter for user identification"))?;
            state.service.refresh(user_id, Some(refresh_token)).await
        }
        Some(other) if !other.is_empty() => {
            return Err(invalid(&format!("unsupported grant_type: {other}")));
        }
        _ => return Err(invalid("grant_type is required")),
    };

    result.map(Json).map_err(|e| ApiError::new(e, &request_id))
}

/// Body errors on Zapier endpoints are reported only after the caller passed
/// verification, so an unverified caller always sees 401.
fn verified_payload<T>(
    state: &AppState,
    request_id: &RequestId,
    headers: &HeaderMap,
    payload: Result<Payload<T>, ApiError>,
) -> ApiResult<T> {
    match payload {
        Ok(Payload(value)) => Ok(value),
        Err(rejection) => {
            state
                .service
                .verify(verification_header(headers))
                .map_err(|e| ApiError::new(e, request_id))?;
            Err(rejection)
        }
    }
}

async fn auth_test_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    payload: Result<Payload<AuthTestParams>, ApiError>,
) -> ApiResult<Json<AuthTestResponse>> {
    let params = verified_payload(&state, &request_id, &headers, payload)?;
    state
        .service
        .test_auth(params.user_id.as_deref(), verification_header(&headers))
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, &request_id))
}

async fn create_thread_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    payload: Result<Payload<CreatePostRequest>, ApiError>,
) -> ApiResult<Json<Post>> {
    let request = verified_payload(&state, &request_id, &headers, payload)?;
    state
        .service
        .create_thread(&request, verification_header(&headers))
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, &request_id))
}

async fn new_posts_query_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    params: Result<Params<NewPostsParams>, ApiError>,
) -> ApiResult<Json<Vec<Post>>> {
    let params = verified_payload(
        &state,
        &request_id,
        &headers,
        params.map(|Params(p)| Payload(p)),
    )?;
    list_new_posts(&state, &request_id, &headers, &params).await
}

async fn new_posts_body_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    payload: Result<Payload<NewPostsParams>, ApiError>,
) -> ApiResult<Json<Vec<Post>>> {
    let params = verified_payload(&state, &request_id, &headers, payload)?;
    list_new_posts(&state, &request_id, &headers, &params).await
}

async fn list_new_posts(
    state: &AppState,
    request_id: &RequestId,
    headers: &HeaderMap,
    params: &NewPostsParams,
) -> ApiResult<Json<Vec<Post>>> {
    state
        .service
        .list_new_posts(params, verification_header(headers))
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, request_id))
}

async fn not_found_handler(Extension(request_id): Extension<RequestId>) -> ApiError {
    ApiError::new(ServiceError::NotFound("not found".into()), &request_id)
}

async fn method_not_allowed_handler(Extension(request_id): Extension<RequestId>) -> ApiError {
    ApiError::method_not_allowed(&request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{StubUpstream, settings};
    use axum::body::Body;
    use chrono::Utc;
    use threads_auth::{Credential, InMemoryTokenStore, TokenResponse, TokenStore};
    use tower::ServiceExt;

    /// PrometheusHandle without installing a global recorder.
    fn test_prometheus_handle() -> PrometheusHandle {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle()
    }

    struct Harness {
        app: NormalizePath<Router>,
        upstream: Arc<StubUpstream>,
        store: Arc<InMemoryTokenStore>,
    }

    fn harness(upstream: StubUpstream, verification: Option<&str>) -> Harness {
        let upstream = Arc::new(upstream);
        let store = Arc::new(InMemoryTokenStore::new());
        let service = ZapierService::new(settings(verification), upstream.clone(), store.clone());
        let state = AppState {
            service: Arc::new(service),
            stats: ServiceStats::new(),
            prometheus: test_prometheus_handle(),
        };
        Harness {
            app: build_app(state, 16),
            upstream,
            store,
        }
    }

    async fn authorize_user(store: &InMemoryTokenStore) {
        let credential = Credential::issue(
            "u1".into(),
            TokenResponse {
                access_token: "at_1".into(),
                refresh_token: Some("rt_1".into()),
                expires_in: Some(3600),
                token_type: None,
                scope: None,
                user_id: None,
            },
            Utc::now(),
        )
        .unwrap();
        store.put(credential).await;
    }

    async fn send(app: &NormalizePath<Router>, request: axum::http::Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let h = harness(StubUpstream::default(), None);
        let response = send(&h.app, get("/healthz")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["uptime_seconds"].is_u64());
        assert_eq!(body["requests_served"], 1);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_text() {
        let h = harness(StubUpstream::default(), None);
        let response = send(&h.app, get("/metrics")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn authorize_redirects_with_found() {
        let h = harness(StubUpstream::default(), None);
        let response = send(
            &h.app,
            get("/oauth/authorize?state=zap%20state&redirect_uri=https%3A%2F%2Fzapier.com%2Fcb"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://threads.net/oauth/authorize?"));
        assert!(location.contains("state=zap+state"), "got {location}");
        assert!(
            location.contains("redirect_uri=https%3A%2F%2Fzapier.com%2Fcb"),
            "got {location}"
        );
    }

    #[tokio::test]
    async fn trailing_slash_is_trimmed_before_routing() {
        let h = harness(StubUpstream::default(), None);
        let response = send(&h.app, get("/healthz/")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_is_json_404() {
        let h = harness(StubUpstream::default(), None);
        let response = send(&h.app, get("/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "not_found");
        assert!(
            body["error"]["request_id"]
                .as_str()
                .unwrap()
                .starts_with("req_")
        );
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let h = harness(StubUpstream::default(), None);
        let response = send(&h.app, get("/zapier/actions/create-thread")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "method_not_allowed");
    }

    #[tokio::test]
    async fn exchange_via_query_stores_credential() {
        let h = harness(StubUpstream::default(), None);
        let response = send(&h.app, get("/oauth/exchange?code=abc&state=zap-user")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["user_id"], "u1");
        assert_eq!(body["access_token"], "at_abc");
        assert_eq!(body["token_type"], "Bearer");
        assert!(h.store.get("u1").await.is_some());
    }

    #[tokio::test]
    async fn token_endpoint_accepts_form_bodies() {
        let h = harness(StubUpstream::default(), None);
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/oauth/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(
                "grant_type=authorization_code&code=xyz&state=zap-user",
            ))
            .unwrap();
        let response = send(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["access_token"], "at_xyz");
    }

    #[tokio::test]
    async fn token_endpoint_refresh_grant() {
        let h = harness(StubUpstream::default(), None);
        authorize_user(&h.store).await;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/oauth/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("grant_type=refresh_token&refresh_token=rt_1&state=u1"))
            .unwrap();
        let response = send(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["access_token"], "at_refreshed");
        assert_eq!(body["refresh_token"], "rt_2");
    }

    #[tokio::test]
    async fn token_endpoint_rejects_unsupported_grant() {
        let h = harness(StubUpstream::default(), None);
        let response = send(
            &h.app,
            post_json("/oauth/token", serde_json::json!({"grant_type": "password"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "invalid_request");
        assert!(
            body["error"]["message"]
                .as_str()
                .unwrap()
                .contains("unsupported grant_type")
        );
        assert_eq!(h.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_maps_to_400() {
        let h = harness(StubUpstream::default(), None);
        let credential = Credential::issue(
            "u1".into(),
            TokenResponse {
                access_token: "at_1".into(),
                refresh_token: None,
                expires_in: None,
                token_type: None,
                scope: None,
                user_id: None,
            },
            Utc::now(),
        )
        .unwrap();
        h.store.put(credential).await;

        let response = send(
            &h.app,
            post_json("/oauth/refresh", serde_json::json!({"user_id": "u1"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"]["type"],
            "refresh_not_supported"
        );
    }

    #[tokio::test]
    async fn create_thread_requires_verification_header() {
        let h = harness(StubUpstream::default(), Some("zap-secret"));
        authorize_user(&h.store).await;

        let response = send(
            &h.app,
            post_json(
                "/zapier/actions/create-thread",
                serde_json::json!({"user_id": "u1", "text": "hello"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["type"], "unauthorized");
        assert_eq!(h.upstream.calls(), 0);

        let mut request = post_json(
            "/zapier/actions/create-thread",
            serde_json::json!({"user_id": "u1", "text": "hello"}),
        );
        request
            .headers_mut()
            .insert("x-zapier-token", "zap-secret".parse().unwrap());
        let response = send(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], "post-1");
        assert_eq!(body["text"], "hello");
        assert_eq!(h.upstream.calls(), 1);
    }

    #[tokio::test]
    async fn signature_header_takes_precedence() {
        let h = harness(StubUpstream::default(), Some("zap-secret"));
        authorize_user(&h.store).await;

        let mut request = post_json(
            "/zapier/actions/create-thread",
            serde_json::json!({"user_id": "u1", "text": "hello"}),
        );
        request
            .headers_mut()
            .insert("x-zapier-signature", "wrong".parse().unwrap());
        request
            .headers_mut()
            .insert("x-zapier-token", "zap-secret".parse().unwrap());
        let response = send(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_signature_header_falls_through_to_token_header() {
        let h = harness(StubUpstream::default(), Some("zap-secret"));
        authorize_user(&h.store).await;

        let mut request = post_json(
            "/zapier/actions/create-thread",
            serde_json::json!({"user_id": "u1", "text": "hello"}),
        );
        request
            .headers_mut()
            .insert("x-zapier-signature", "".parse().unwrap());
        request
            .headers_mut()
            .insert("x-zapier-token", "zap-secret".parse().unwrap());
        let response = send(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.upstream.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_400_for_verified_callers_and_401_otherwise() {
        let h = harness(StubUpstream::default(), Some("zap-secret"));
        let malformed = || {
            axum::http::Request::builder()
                .method("POST")
                .uri("/zapier/actions/create-thread")
                .header("content-type", "application/json")
        };

        let response = send(&h.app, malformed().body(Body::from("{oops")).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &h.app,
            malformed()
                .header("x-zapier-signature", "zap-secret")
                .body(Body::from("{oops"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["type"], "invalid_request");
    }

    #[tokio::test]
    async fn upstream_rejection_maps_to_502_with_upstream_status() {
        let stub = StubUpstream {
            reply: std::sync::Mutex::new(crate::service::tests::Reply::Rejected(
                400,
                "Param text is too long",
            )),
            ..Default::default()
        };
        let h = harness(stub, None);
        authorize_user(&h.store).await;

        let response = send(
            &h.app,
            post_json(
                "/zapier/actions/create-thread",
                serde_json::json!({"user_id": "u1", "text": "hello"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "upstream_error");
        assert_eq!(body["error"]["upstream_status"], 400);
        assert_eq!(body["error"]["message"], "Param text is too long");
    }

    #[tokio::test]
    async fn upstream_unavailable_maps_to_503() {
        let stub = StubUpstream {
            reply: std::sync::Mutex::new(crate::service::tests::Reply::Unavailable(
                "request timed out after 10.0s",
            )),
            ..Default::default()
        };
        let h = harness(stub, None);
        authorize_user(&h.store).await;

        let response = send(
            &h.app,
            get("/zapier/triggers/new-thread?user_id=u1"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(response).await["error"]["type"],
            "upstream_unavailable"
        );
    }

    #[tokio::test]
    async fn new_thread_trigger_returns_bare_array() {
        let h = harness(StubUpstream::default(), None);
        authorize_user(&h.store).await;

        let response = send(
            &h.app,
            post_json(
                "/zapier/triggers/new-thread",
                serde_json::json!({"user_id": "u1", "limit": 10}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await.is_array());
        let query = h.upstream.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.limit, 10);
    }

    #[tokio::test]
    async fn new_thread_trigger_rejects_out_of_range_limit() {
        let h = harness(StubUpstream::default(), None);
        authorize_user(&h.store).await;
        let response = send(&h.app, get("/zapier/triggers/new-thread?user_id=u1&limit=0")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn auth_test_for_unknown_user_is_404() {
        let h = harness(StubUpstream::default(), None);
        let response = send(
            &h.app,
            post_json("/zapier/auth/test", serde_json::json!({"user_id": "ghost"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
