//! Main entry point for the gitpkg proxy server.
//!
//! Reads configuration from flags and environment, then serves package
//! tarballs until interrupted.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use gitpkg::{AppState, Cli, GitHubTarballSource, ProxyServer, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.default_log_filter());

    let config = cli.proxy_config();
    tracing::debug!(
        upstream = %config.upstream_url,
        work_dir = %config.work_dir.display(),
        "configuration loaded"
    );

    let source = Arc::new(GitHubTarballSource::new(&config)?);
    ProxyServer::new(cli.bind_addr(), AppState::new(config, source))
        .serve()
        .await
}
