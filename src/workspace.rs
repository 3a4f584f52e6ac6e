//! Per-request scratch directories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

const PREFIX: &str = "gitpkg-";
const ARCHIVE_FILE: &str = "repo.tar.gz";
const EXTRACT_DIR: &str = "extracted";

/// An isolated directory tree owned by exactly one request.
///
/// Layout: `<work_dir>/gitpkg-XXXXXX/{repo.tar.gz, extracted/}`. The tree is
/// removed by [`Workspace::release`], or on drop if release was never
/// reached. Removal failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
    archive_path: PathBuf,
    extract_dir: PathBuf,
}

impl Workspace {
    /// Create a fresh, uniquely named workspace below `parent`.
    pub fn acquire(parent: &Path) -> Result<Self> {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create work dir {}", parent.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(parent)
            .with_context(|| format!("failed to create workspace in {}", parent.display()))?;

        let root = dir.path().to_path_buf();
        let extract_dir = root.join(EXTRACT_DIR);
        fs::create_dir(&extract_dir)
            .with_context(|| format!("failed to create {}", extract_dir.display()))?;

        tracing::debug!(workspace = %root.display(), "workspace acquired");
        Ok(Self {
            dir: Some(dir),
            archive_path: root.join(ARCHIVE_FILE),
            extract_dir,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the downloaded repository tarball is spooled.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Directory the package contents are extracted into.
    pub fn extract_dir(&self) -> &Path {
        &self.extract_dir
    }

    /// Remove the whole tree.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => tracing::debug!(workspace = %self.root.display(), "workspace removed"),
            Err(err) => tracing::warn!(
                workspace = %self.root.display(),
                error = %err,
                "failed to remove workspace"
            ),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}
