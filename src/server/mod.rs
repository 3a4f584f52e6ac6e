//! HTTP surface of the proxy.

pub mod handler;
pub mod pipeline;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Router, serve};
use tokio::net::TcpListener;

use crate::cli::ProxyConfig;
use crate::io::ArchiveSource;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub source: Arc<dyn ArchiveSource>,
}

impl AppState {
    pub fn new(config: ProxyConfig, source: Arc<dyn ArchiveSource>) -> Self {
        Self {
            config: Arc::new(config),
            source,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handler::healthz))
        .route("/{owner}/{repo}", get(handler::missing_subpath))
        .route("/{owner}/{repo}/{*subpath}", get(handler::package))
        .with_state(state)
}

pub struct ProxyServer {
    addr: SocketAddr,
    router: Router,
}

impl ProxyServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            router: router(state),
        }
    }

    /// Bind and serve until Ctrl-C or SIGTERM.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        tracing::info!(addr = %listener.local_addr()?, "gitpkg listening");
        serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown requested");
}
