//! Mapping request paths onto the document root.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::http::request::RequestPath;

/// How a request path is turned into a filesystem path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolvePolicy {
    /// Append the path to the document root verbatim.
    #[default]
    Concatenate,
    /// Like `Concatenate`, but paths with a `..` segment resolve to nothing.
    RejectTraversal,
}

/// An opened regular file ready to be streamed.
#[derive(Debug)]
pub struct FileBody {
    pub file: File,
    pub len: u64,
}

#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
    policy: ResolvePolicy,
}

impl DocumentRoot {
    pub fn new(root: impl Into<PathBuf>, policy: ResolvePolicy) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> ResolvePolicy {
        self.policy
    }

    /// Joins the document root and the request path by plain concatenation,
    /// so `./static` + `/a.txt` gives `./static/a.txt`.
    pub fn resolve(&self, path: &RequestPath) -> Option<PathBuf> {
        if self.policy == ResolvePolicy::RejectTraversal && path.has_parent_segment() {
            return None;
        }

        let mut joined = OsString::from(self.root.as_os_str());
        joined.push(OsStr::from_bytes(path.as_bytes()));
        Some(PathBuf::from(joined))
    }

    /// Opens the resource behind `path`.
    ///
    /// Anything other than a readable regular file (missing entries,
    /// directories, permission failures, rejected paths) yields `None`.
    pub fn open(&self, path: &RequestPath) -> Option<FileBody> {
        let resolved = self.resolve(path)?;

        let file = match File::open(&resolved) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %resolved.display(), error = %e, "Resource not available");
                return None;
            }
        };

        match file.metadata() {
            Ok(meta) if meta.is_file() => Some(FileBody {
                file,
                len: meta.len(),
            }),
            Ok(_) => {
                tracing::debug!(path = %resolved.display(), "Resource is not a regular file");
                None
            }
            Err(e) => {
                tracing::debug!(path = %resolved.display(), error = %e, "Failed to stat resource");
                None
            }
        }
    }
}
