use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};

use super::{ArchiveSource, ArchiveStream};
use crate::cli::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};
use anyhow::{Context, Result, bail};

/// Tarball source backed by the GitHub REST API
pub struct GitHubTarballSource {
    client: Client,
    base_url: Url,
}

impl GitHubTarballSource {
    /// Create a new source from the proxy configuration
    ///
    /// Only the connect phase is bounded; archive downloads may take as long
    /// as the provider keeps sending data.
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .build()
            .context("failed to create HTTP client")?;

        let base_url = Url::parse(&config.upstream_url)
            .with_context(|| format!("invalid upstream url '{}'", config.upstream_url))?;
        if base_url.cannot_be_a_base() {
            bail!("upstream url '{}' cannot carry a path", config.upstream_url);
        }

        Ok(Self { client, base_url })
    }

    /// `GET {base}/repos/{owner}/{repo}/tarball/{revision}`
    ///
    /// Each value is percent-encoded into a single path segment, so a revision
    /// such as `feature/x` or `../user` never changes the endpoint.
    pub fn tarball_url(&self, owner: &str, repo: &str, revision: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", owner, repo, "tarball", revision]);
        }
        url
    }
}

#[async_trait]
impl ArchiveSource for GitHubTarballSource {
    async fn fetch(
        &self,
        owner: &str,
        repo: &str,
        revision: &str,
        credential: &str,
    ) -> ProxyResult<ArchiveStream> {
        let url = self.tarball_url(owner, repo, revision);
        tracing::debug!(%url, "fetching tarball");

        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/vnd.github+json");
        if !credential.is_empty() {
            request = request.bearer_auth(credential);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("tarball request to {url} failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let content_type = resp.headers().get(CONTENT_TYPE).cloned();
            let body = resp
                .bytes()
                .await
                .context("failed to read upstream error body")?;
            tracing::warn!(%status, %url, "upstream refused tarball request");
            return Err(ProxyError::Upstream {
                status,
                content_type,
                body,
            });
        }

        Ok(resp.bytes_stream().map_err(std::io::Error::other).boxed())
    }
}
