mod channel;
mod http;
mod local;

pub use channel::ChannelWriter;
pub use http::GitHubTarballSource;
pub use local::spool_to_file;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::BoxStream;

use crate::error::ProxyResult;

/// Body of a repository archive as it arrives from the provider.
pub type ArchiveStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Trait for sources of repository tarballs
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Start downloading the `.tar.gz` of `owner/repo` at `revision`.
    ///
    /// `revision` is passed through untouched; an empty `credential` sends an
    /// anonymous request. A refusal from the provider is returned as
    /// [`ProxyError::Upstream`](crate::error::ProxyError::Upstream) carrying the
    /// provider's own status and body.
    async fn fetch(
        &self,
        owner: &str,
        repo: &str,
        revision: &str,
        credential: &str,
    ) -> ProxyResult<ArchiveStream>;
}
