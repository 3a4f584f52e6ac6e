use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use super::subpath::Subpath;
use crate::error::{ProxyError, ProxyResult};

/// Counters reported after an extraction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Single-pass extractor for provider tarballs.
///
/// Only entries below the requested subpath are written; everything else is
/// read past and dropped. Written paths are re-rooted so the subdirectory's
/// contents land directly in the destination directory.
pub struct TarExtractor<'a> {
    subpath: &'a Subpath,
    max_bytes: u64,
}

impl<'a> TarExtractor<'a> {
    pub fn new(subpath: &'a Subpath, max_bytes: u64) -> Self {
        Self { subpath, max_bytes }
    }

    /// Extract a gzip-compressed tar stream into `dest`.
    ///
    /// An archive without any matching entry is not an error here; `dest` is
    /// simply left empty.
    pub fn extract_to_dir<R: Read>(&self, reader: R, dest: &Path) -> ProxyResult<ExtractSummary> {
        fs::create_dir_all(dest)
            .with_context(|| format!("failed to create {}", dest.display()))?;

        let mut archive = Archive::new(GzDecoder::new(reader));
        archive.set_preserve_permissions(false);
        archive.set_preserve_mtime(false);
        archive.set_unpack_xattrs(false);

        let mut summary = ExtractSummary::default();

        for entry in archive.entries().context("failed to read archive entries")? {
            let mut entry = entry.context("failed to read archive entry")?;
            let entry_path = entry.path().context("invalid entry path")?.into_owned();

            let Some(relative) = self.subpath.relative_path(&entry_path) else {
                summary.skipped += 1;
                continue;
            };
            let target = dest.join(&relative);

            match entry.header().entry_type() {
                EntryType::Directory => {
                    fs::create_dir_all(&target)
                        .with_context(|| format!("failed to create {}", target.display()))?;
                    summary.directories += 1;
                }
                EntryType::Regular | EntryType::Continuous => {
                    let size = entry.header().size().context("invalid entry size")?;
                    summary.bytes = summary.bytes.saturating_add(size);
                    if summary.bytes > self.max_bytes {
                        return Err(ProxyError::TooLarge {
                            what: "extracted package",
                            limit: self.max_bytes,
                        });
                    }

                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)
                            .with_context(|| format!("failed to create {}", parent.display()))?;
                    }
                    entry
                        .unpack(&target)
                        .with_context(|| format!("failed to unpack {}", entry_path.display()))?;
                    summary.files += 1;
                }
                other => {
                    tracing::debug!(
                        path = %entry_path.display(),
                        entry_type = ?other,
                        "skipping unsupported archive entry"
                    );
                    summary.skipped += 1;
                }
            }
        }

        Ok(summary)
    }
}
