//! Configuration types and loading
//!
//! Precedence: env vars > config file > defaults. The config file is optional;
//! without one the service runs on defaults plus environment.
//!
//! Every variable is read as `THREADS_ZAPIER_<NAME>` and also accepts
//! `THREADS_ZAPIER_<NAME>_FILE`, naming a file whose trimmed contents are the
//! value. The `_FILE` form wins. Secrets never live in the TOML directly; the
//! file may only point at them via `client_secret_file` and
//! `verification_token_file`.

use std::fmt::Display;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use common::Secret;
use serde::Deserialize;
use threads_auth::{DEFAULT_API_BASE_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_SCOPE, OAuthApp};

const ENV_PREFIX: &str = "THREADS_ZAPIER_";

const DEFAULT_CLIENT_ID: &str = "demo-client-id";
const DEFAULT_CLIENT_SECRET: &str = "demo-client-secret";
const DEFAULT_REDIRECT_URI: &str = "https://example.com/oauth/callback";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub threads: ThreadsConfig,
    pub zapier: ZapierConfig,
    pub server: ServerConfig,
}

/// Threads application registration and API location
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThreadsConfig {
    pub api_base_url: String,
    pub authorize_url: String,
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Secret<String>,
    /// Path to a file holding the client secret
    pub client_secret_file: Option<PathBuf>,
    pub redirect_uri: String,
    /// Empty means "do not send a scope"
    pub scope: Option<String>,
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            authorize_url: DEFAULT_AUTHORIZE_URL.into(),
            client_id: DEFAULT_CLIENT_ID.into(),
            client_secret: Secret::from(DEFAULT_CLIENT_SECRET),
            client_secret_file: None,
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            scope: Some(DEFAULT_SCOPE.into()),
        }
    }
}

/// Inbound Zapier request verification
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZapierConfig {
    /// Shared secret expected in `X-Zapier-Signature` / `X-Zapier-Token`.
    /// `None` disables the check.
    #[serde(skip)]
    pub verification_token: Option<Secret<String>>,
    pub verification_token_file: Option<PathBuf>,
}

/// HTTP listener and outbound call limits
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Applied to every Threads API call; fractional seconds allowed
    pub request_timeout_seconds: f64,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            request_timeout_seconds: 10.0,
            max_connections: 1000,
        }
    }
}

impl Config {
    /// Load configuration from the optional TOML file, then overlay the
    /// process environment.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Same as [`Config::load`] with an explicit variable lookup.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> common::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => Config::default(),
        };

        // File-referenced secrets first so the env overlay can replace them
        if let Some(file) = &config.threads.client_secret_file {
            config.threads.client_secret = Secret::new(read_value_file("client_secret_file", file)?);
        }
        if let Some(file) = &config.zapier.verification_token_file {
            config.zapier.verification_token =
                Secret::non_empty(read_value_file("verification_token_file", file)?);
        }

        config.apply_env(&Env { lookup })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, env: &Env<F>) -> common::Result<()> {
        let threads = &mut self.threads;
        if let Some(v) = env.get("THREADS_API_BASE_URL")? {
            threads.api_base_url = v;
        }
        if let Some(v) = env.get("THREADS_AUTHORIZE_URL")? {
            threads.authorize_url = v;
        }
        if let Some(v) = env.get("THREADS_CLIENT_ID")? {
            threads.client_id = v;
        }
        if let Some(v) = env.get("THREADS_CLIENT_SECRET")? {
            threads.client_secret = Secret::new(v);
        }
        if let Some(v) = env.get("THREADS_REDIRECT_URI")? {
            threads.redirect_uri = v;
        }
        if let Some(v) = env.get("THREADS_SCOPE")? {
            threads.scope = Some(v);
        }

        if let Some(v) = env.get("ZAPIER_VERIFICATION_TOKEN")? {
            self.zapier.verification_token = Secret::non_empty(v);
        }

        let server = &mut self.server;
        if let Some(v) = env.parse("REQUEST_TIMEOUT_SECONDS")? {
            server.request_timeout_seconds = v;
        }
        if let Some(v) = env.parse("MAX_CONNECTIONS")? {
            server.max_connections = v;
        }
        if let Some(addr) = env.parse("LISTEN_ADDR")? {
            server.listen_addr = addr;
        } else if let Some(port) = env.port()? {
            server.listen_addr.set_port(port);
        }
        Ok(())
    }

    fn normalize(&mut self) {
        let threads = &mut self.threads;
        threads.api_base_url = threads.api_base_url.trim().trim_end_matches('/').to_string();
        threads.scope = threads
            .scope
            .take()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }

    fn validate(&self) -> common::Result<()> {
        require_http_url("api_base_url", &self.threads.api_base_url)?;
        require_http_url("authorize_url", &self.threads.authorize_url)?;
        require_http_url("redirect_uri", &self.threads.redirect_uri)?;

        let timeout = self.server.request_timeout_seconds;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(common::Error::Config(format!(
                "request_timeout_seconds must be greater than 0, got: {timeout}"
            )));
        }
        if Duration::try_from_secs_f64(timeout).is_err() {
            return Err(common::Error::Config(format!(
                "request_timeout_seconds is out of range, got: {timeout}"
            )));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.threads.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.server.request_timeout_seconds)
    }

    /// Client registration shared by the authorize redirect and token calls.
    pub fn oauth_app(&self) -> OAuthApp {
        OAuthApp {
            client_id: self.threads.client_id.clone(),
            client_secret: self.threads.client_secret.clone(),
            authorize_url: self.threads.authorize_url.clone(),
            redirect_uri: self.threads.redirect_uri.clone(),
            scope: self.threads.scope.clone(),
        }
    }

    /// Resolve the config file path from the CLI arg or CONFIG_PATH env var.
    /// `None` means run on defaults and environment only.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        std::env::var("CONFIG_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }
}

/// Prefixed environment lookup with `_FILE` indirection.
struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> common::Result<Option<String>> {
        let name = format!("{ENV_PREFIX}{key}");
        let file_var = format!("{name}_FILE");
        if let Some(path) = (self.lookup)(&file_var).filter(|p| !p.trim().is_empty()) {
            return read_value_file(&file_var, Path::new(path.trim())).map(Some);
        }
        Ok((self.lookup)(&name))
    }

    fn parse<T>(&self, key: &str) -> common::Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(raw) = self.get(key)? else {
            return Ok(None);
        };
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| common::Error::InvalidVar {
                name: format!("{ENV_PREFIX}{key}"),
                message: e.to_string(),
            })
    }

    /// Bare `PORT`, as set by most container platforms.
    fn port(&self) -> common::Result<Option<u16>> {
        let Some(raw) = (self.lookup)("PORT").filter(|p| !p.trim().is_empty()) else {
            return Ok(None);
        };
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|e: std::num::ParseIntError| common::Error::InvalidVar {
                name: "PORT".into(),
                message: e.to_string(),
            })
    }
}

fn read_value_file(name: &str, path: &Path) -> common::Result<String> {
    std::fs::read_to_string(path)
        .map(|contents| contents.trim().to_owned())
        .map_err(|source| common::Error::SecretFile {
            name: name.into(),
            path: path.to_path_buf(),
            source,
        })
}

fn require_http_url(field: &str, value: &str) -> common::Result<()> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(common::Error::Config(format!(
            "{field} must be an http:// or https:// URL, got: {value}"
        ))),
    }
}
