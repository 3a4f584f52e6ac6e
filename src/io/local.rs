use std::path::Path;

use anyhow::Context;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::ArchiveStream;
use crate::error::{ProxyError, ProxyResult};

/// Drain `stream` into a new file at `path`, failing once more than
/// `max_bytes` have arrived. Returns the number of bytes written.
pub async fn spool_to_file(
    mut stream: ArchiveStream,
    path: &Path,
    max_bytes: u64,
) -> ProxyResult<u64> {
    let mut file = File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("failed to read upstream archive")?;
        written = written.saturating_add(chunk.len() as u64);
        if written > max_bytes {
            return Err(ProxyError::TooLarge {
                what: "repository archive",
                limit: max_bytes,
            });
        }
        file.write_all(&chunk)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    file.flush().await.context("failed to flush archive")?;
    Ok(written)
}
