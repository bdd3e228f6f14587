//! Threads Graph API client
//!
//! Defines the `UpstreamApi` trait that decouples the Zapier-facing service
//! from the HTTP calls it makes. `ThreadsClient` is the reqwest-backed
//! implementation; tests substitute stubs.

pub mod client;
pub mod error;
pub mod posts;

pub use client::ThreadsClient;
pub use error::{Error, Result};
pub use posts::{CreatePostRequest, ListPostsQuery, Post};

use std::future::Future;
use std::pin::Pin;

use threads_auth::Credential;

/// Boxed future returned by `UpstreamApi` methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Inputs for the authorization-code exchange.
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    pub code: &'a str,
    /// Must match the redirect used on the authorize step; configured value when absent
    pub redirect_uri: Option<&'a str>,
    /// Used as the credential key only when the token response carries no user id
    pub user_id: Option<&'a str>,
}

/// Outbound operations against the Threads API.
///
/// Implementations never retry; a timeout or 5xx surfaces as
/// `Error::Unavailable` and a 4xx as `Error::Rejected`.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn UpstreamApi>`).
pub trait UpstreamApi: Send + Sync {
    /// Trade an authorization code for a new credential.
    fn exchange_code<'a>(&'a self, exchange: CodeExchange<'a>) -> BoxFuture<'a, Result<Credential>>;

    /// Produce the replacement for `credential` using its refresh token.
    ///
    /// Fails with `Error::RefreshNotSupported`, without any network call, when
    /// the credential has no refresh token.
    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<Credential>>;

    /// Publish a post on behalf of the credential's user.
    fn create_post<'a>(
        &'a self,
        credential: &'a Credential,
        request: &'a CreatePostRequest,
    ) -> BoxFuture<'a, Result<Post>>;

    /// Recent posts for the credential's user, in upstream order.
    fn list_posts<'a>(
        &'a self,
        credential: &'a Credential,
        query: &'a ListPostsQuery,
    ) -> BoxFuture<'a, Result<Vec<Post>>>;
}
