//! Threads OAuth library
//!
//! Token endpoint calls, authorization URL construction and the per-user
//! credential store for the Threads/Zapier adapter. No dependency on the
//! HTTP service; it can be tested and used on its own.
//!
//! Credential flow:
//! 1. Zapier is redirected to `authorize::build_authorization_url()`
//! 2. The adapter calls `TokenClient::exchange_code()` with the returned code
//! 3. `Credential::issue()` turns the response into a stored grant
//! 4. `TokenClient::refresh_token()` + `Credential::refreshed()` replace it later

pub mod app;
pub mod authorize;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod ids;
pub mod token;

pub use app::OAuthApp;
pub use authorize::{AuthorizeParams, build_authorization_url};
pub use constants::*;
pub use credentials::{Credential, InMemoryTokenStore, TokenStore};
pub use error::{Error, Result, upstream_message};
pub use token::{TokenClient, TokenResponse};
