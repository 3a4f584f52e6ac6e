//! # gitpkg
//!
//! An HTTP proxy that serves a subdirectory of a GitHub repository as an
//! installable npm package tarball.
//!
//! Monorepos often keep several packages under one repository, e.g.
//! `packages/utils`. npm can install a tarball URL but not a subdirectory of a
//! git repository, so this service bridges the gap: a request for
//! `/{owner}/{repo}/{subpath...}?ref={revision}&token={token}` downloads the
//! repository tarball at that revision, extracts only the requested
//! subdirectory, checks that it contains a `package.json`, and streams it back
//! as a fresh `.tgz`.
//!
//! ## Features
//!
//! - Any branch, tag or commit via `ref` (default `main`)
//! - Private repositories via a forwarded bearer `token`
//! - Provider errors (bad credentials, unknown repository, rate limits)
//!   forwarded with their original status and body
//! - Reproducible output: identical trees produce byte-identical archives
//! - Bounded disk usage and guaranteed per-request cleanup
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gitpkg::{AppState, GitHubTarballSource, ProxyConfig, ProxyServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ProxyConfig::default();
//!     let source = Arc::new(GitHubTarballSource::new(&config)?);
//!
//!     ProxyServer::new(([127, 0, 0, 1], 3000).into(), AppState::new(config, source))
//!         .serve()
//!         .await
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod logging;
pub mod package;
pub mod server;
pub mod tarball;
pub mod workspace;

pub use cli::{Cli, ProxyConfig};
pub use error::{ProxyError, ProxyResult};
pub use io::{ArchiveSource, ArchiveStream, GitHubTarballSource};
pub use package::{PackageRequest, PackageRoot};
pub use server::{AppState, ProxyServer, router};
pub use tarball::{Subpath, TarExtractor, TarPacker};
pub use workspace::Workspace;
