//! Threads OAuth and Graph API defaults
//!
//! Used when the deployment does not override them. None of these are secrets.

/// Graph API host serving both the token endpoint and the threads endpoints
pub const DEFAULT_API_BASE_URL: &str = "https://graph.threads.net";

/// Browser-facing authorization page
pub const DEFAULT_AUTHORIZE_URL: &str = "https://threads.net/oauth/authorize";

/// Token endpoint path, relative to the API base URL
pub const TOKEN_PATH: &str = "/oauth/token";

/// Scopes needed to read and publish threads
pub const DEFAULT_SCOPE: &str = "threads_basic,threads_content_publish";

/// Token type assumed when the token endpoint does not name one
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";
