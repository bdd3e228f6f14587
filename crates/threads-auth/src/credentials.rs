//! Per-user OAuth credentials and their store
//!
//! A `Credential` is created from a successful code exchange and replaced
//! wholesale after a successful refresh; it is never edited in place.
//!
//! `InMemoryTokenStore` keeps credentials for the life of the process only.
//! One tokio Mutex guards the whole map. Callers read a cloned snapshot,
//! perform any upstream I/O without holding the lock, and write back only
//! after the upstream call succeeded. The `TokenStore` trait is the seam for
//! a durable backend.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, TimeDelta, Utc};
use common::Secret;
use tokio::sync::Mutex;
use tracing::debug;

use crate::constants::DEFAULT_TOKEN_TYPE;
use crate::error::{Error, Result};
use crate::token::TokenResponse;

/// One user's OAuth grant.
#[derive(Debug, Clone)]
pub struct Credential {
    pub user_id: String,
    /// Bearer token for Graph API calls, never empty
    pub access_token: Secret<String>,
    /// Absent when the grant cannot be refreshed
    pub refresh_token: Option<Secret<String>>,
    pub token_type: String,
    pub scope: Option<String>,
    /// Lifetime in seconds as reported by the token endpoint
    pub expires_in: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub obtained_at: DateTime<Utc>,
}

impl Credential {
    /// Build the credential for a freshly exchanged authorization code.
    pub fn issue(user_id: String, token: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidResponse(
                "token response did not identify the user".into(),
            ));
        }
        if token.access_token.trim().is_empty() {
            return Err(Error::InvalidResponse("empty access_token".into()));
        }

        Ok(Self {
            user_id,
            access_token: Secret::new(token.access_token),
            refresh_token: token
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(Secret::new),
            token_type: token
                .token_type
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            scope: token.scope,
            expires_in: token.expires_in,
            expires_at: token.expires_in.and_then(|secs| expiry(now, secs)),
            obtained_at: now,
        })
    }

    /// Build the replacement credential after a successful refresh.
    ///
    /// The user id never changes. When the token endpoint omits a new refresh
    /// token the current one is kept, so the grant stays refreshable.
    pub fn refreshed(&self, token: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        let mut next = Self::issue(self.user_id.clone(), token, now)?;
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        if next.scope.is_none() {
            next.scope = self.scope.clone();
        }
        Ok(next)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

fn expiry(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    now.checked_add_signed(TimeDelta::try_seconds(secs)?)
}

/// Keyed credential storage.
///
/// Uses `Pin<Box<dyn Future>>` return types so the store can be shared as
/// `Arc<dyn TokenStore>`.
pub trait TokenStore: Send + Sync {
    /// Snapshot of the stored credential, if any.
    fn get<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + 'a>>;

    /// Insert or wholesale replace the credential for `credential.user_id`.
    fn put(&self, credential: Credential) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Remove a credential. Removing an absent user is not an error.
    fn delete<'a>(&'a self, user_id: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Process-lifetime credential map.
#[derive(Default)]
pub struct InMemoryTokenStore {
    state: Mutex<HashMap<String, Credential>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credentials.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state.get(user_id).cloned()
        })
    }

    fn put(&self, credential: Credential) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            debug!(user_id = %credential.user_id, "stored credential");
            state.insert(credential.user_id.clone(), credential);
        })
    }

    fn delete<'a>(&'a self, user_id: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.remove(user_id).is_some() {
                debug!(user_id, "removed credential");
            }
        })
    }
}
