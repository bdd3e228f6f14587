//! Threads ⇄ Zapier adapter
//!
//! Single-binary Rust service that:
//! 1. Sends Zapier users through the Threads OAuth authorization flow
//! 2. Exchanges and refreshes tokens, keeping one credential per user in memory
//! 3. Publishes posts and lists recent posts on behalf of Zapier actions and triggers

mod config;
mod error;
mod metrics;
mod routes;
mod schemas;
mod service;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use threads_api::ThreadsClient;
use threads_auth::InMemoryTokenStore;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::routes::{AppState, ServiceStats, build_app};
use crate::service::{Settings, ZapierService};

/// How long in-flight requests may take to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, filtered by LOG_LEVEL then RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting threads-zapier");

    // Recorder must exist before any metric is emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using defaults and environment"),
    }
    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    info!(
        listen_addr = %config.server.listen_addr,
        api_base_url = %config.threads.api_base_url,
        client_id = %config.threads.client_id,
        timeout_secs = config.server.request_timeout_seconds,
        verification = config.zapier.verification_token.is_some(),
        "configuration loaded"
    );

    let app = config.oauth_app();
    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let upstream = ThreadsClient::new(
        http,
        &config.threads.api_base_url,
        &app,
        config.request_timeout(),
    )
    .context("failed to build Threads API client")?;

    let service = ZapierService::new(
        Settings {
            app,
            verification_token: config.zapier.verification_token.clone(),
        },
        Arc::new(upstream),
        Arc::new(InMemoryTokenStore::new()),
    );

    let stats = ServiceStats::new();
    let requests_total = stats.requests_total.clone();
    let state = AppState {
        service: Arc::new(service),
        stats,
        prometheus: prometheus_handle,
    };
    let app = build_app(state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start: the
    // server is told to drain, then the drain races DRAIN_TIMEOUT.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!(
        requests_served = requests_total.load(Ordering::Relaxed),
        "shutdown complete"
    );
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
