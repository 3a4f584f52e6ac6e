//! Package requests and package-root validation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{ProxyError, ProxyResult};
use crate::tarball::Subpath;

/// File that marks a directory as an installable package.
pub const MANIFEST_FILE: &str = "package.json";

/// Revision used when the caller does not name one.
pub const DEFAULT_REVISION: &str = "main";

/// Everything needed to build one package tarball.
#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub owner: String,
    pub repo: String,
    pub subpath: Subpath,
    pub revision: String,
    /// Bearer token for the provider. Empty means anonymous.
    pub credential: String,
}

impl PackageRequest {
    /// Build a request from raw route and query values.
    ///
    /// A missing or empty `revision` falls back to [`DEFAULT_REVISION`].
    pub fn new(
        owner: &str,
        repo: &str,
        subpath: &str,
        revision: Option<String>,
        credential: Option<String>,
    ) -> ProxyResult<Self> {
        for (what, value) in [("owner", owner), ("repository", repo)] {
            if value.is_empty() || value == "." || value == ".." || value.contains('/') {
                return Err(ProxyError::InvalidRequest(format!(
                    "invalid {what} name '{value}'"
                )));
            }
        }

        let revision = revision
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REVISION.to_string());
        if revision == "." || revision == ".." {
            return Err(ProxyError::InvalidRequest(format!(
                "invalid revision '{revision}'"
            )));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            subpath: Subpath::parse(subpath)?,
            revision,
            credential: credential.unwrap_or_default(),
        })
    }

    /// Download name of the tarball, e.g. `utils.tgz`.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .subpath
            .name()
            .chars()
            .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
            .collect();
        format!("{stem}.tgz")
    }
}

/// An extracted directory known to contain a package manifest.
#[derive(Debug, Clone)]
pub struct PackageRoot {
    path: PathBuf,
}

impl PackageRoot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Check that `extract_dir` holds a regular `package.json` at its top level.
pub async fn validate(extract_dir: &Path, subpath: &Subpath) -> ProxyResult<PackageRoot> {
    let manifest = extract_dir.join(MANIFEST_FILE);
    match tokio::fs::symlink_metadata(&manifest).await {
        Ok(metadata) if metadata.is_file() => Ok(PackageRoot {
            path: extract_dir.to_path_buf(),
        }),
        Ok(_) => Err(ProxyError::MissingManifest {
            subdir: subpath.to_string(),
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(ProxyError::MissingManifest {
            subdir: subpath.to_string(),
        }),
        Err(err) => Err(ProxyError::Internal(
            anyhow::Error::new(err)
                .context(format!("failed to inspect {}", manifest.display())),
        )),
    }
}
