use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{ProxyError, ProxyResult};

/// The requested subdirectory of a repository, as a list of path segments.
///
/// Always holds at least one segment, and no segment is empty, `.` or `..`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subpath {
    segments: Vec<String>,
}

impl Subpath {
    /// Parse a `/`-separated subdirectory path. Leading and trailing
    /// separators are ignored.
    pub fn parse(raw: &str) -> ProxyResult<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(ProxyError::InvalidRequest(
                "a subdirectory path is required, e.g. /{owner}/{repo}/packages/foo".to_string(),
            ));
        }

        let segments = trimmed
            .split('/')
            .map(|segment| match segment {
                "" | "." | ".." => Err(ProxyError::InvalidRequest(format!(
                    "invalid subdirectory path '{trimmed}'"
                ))),
                s => Ok(s.to_string()),
            })
            .collect::<ProxyResult<Vec<_>>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of leading components removed from every archive entry: the
    /// provider's top-level folder plus one per subpath segment.
    pub fn strip_depth(&self) -> usize {
        1 + self.segments.len()
    }

    /// Last segment, used to name the served tarball.
    pub fn name(&self) -> &str {
        // Never empty, see `parse`.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Map an entry path of the upstream archive to its location inside the
    /// package root.
    ///
    /// Returns `None` unless the entry is a strict descendant of the subpath,
    /// compared segment by segment right below the top-level folder. A sibling
    /// such as `packages/foo-backup` or a nested `other/packages/foo` never
    /// matches `packages/foo`. Entries carrying `..` or absolute components are
    /// rejected as well.
    pub fn relative_path(&self, entry_path: &Path) -> Option<PathBuf> {
        let mut names = Vec::new();
        for component in entry_path.components() {
            match component {
                Component::Normal(name) => names.push(name),
                Component::CurDir => {}
                _ => return None,
            }
        }

        let depth = self.strip_depth();
        if names.len() <= depth {
            return None;
        }

        let anchored = names[1..depth]
            .iter()
            .zip(&self.segments)
            .all(|(name, segment)| *name == OsStr::new(segment));
        if !anchored {
            return None;
        }

        Some(names[depth..].iter().collect())
    }
}

impl fmt::Display for Subpath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
