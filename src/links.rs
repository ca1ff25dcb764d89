//! Resolution of external style and template text.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("cannot read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no text registered for `{uri}`")]
    NotFound { uri: String },
}

pub trait LinkResolver: Send + Sync {
    /// Text behind `uri`, where relative URIs are taken from the directory of
    /// `relative_to` (the declaring source file).
    fn resolve(&self, uri: &str, relative_to: &str) -> Result<String, LinkError>;
}

/// Reads links from disk next to the source file.
#[derive(Debug, Clone, Default)]
pub struct FsLinkResolver {
    root: Option<PathBuf>,
}

impl FsLinkResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative source paths against `root` instead of the working directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        FsLinkResolver {
            root: Some(root.into()),
        }
    }

    pub fn path_for(&self, uri: &str, relative_to: &str) -> PathBuf {
        let uri = Path::new(uri);
        if uri.is_absolute() {
            return uri.to_path_buf();
        }
        let dir = Path::new(relative_to).parent().unwrap_or_else(|| Path::new(""));
        match &self.root {
            Some(root) => root.join(dir).join(uri),
            None => dir.join(uri),
        }
    }
}

impl LinkResolver for FsLinkResolver {
    fn resolve(&self, uri: &str, relative_to: &str) -> Result<String, LinkError> {
        let path = self.path_for(uri, relative_to);
        tracing::trace!(path = %path.display(), "reading link");
        fs::read_to_string(&path).map_err(|source| LinkError::Io { path, source })
    }
}

/// In-memory link table keyed by URI.
#[derive(Debug, Clone, Default)]
pub struct MemoryLinkResolver {
    files: HashMap<String, String>,
}

impl MemoryLinkResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, uri: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(uri, text);
        self
    }

    pub fn insert(&mut self, uri: impl Into<String>, text: impl Into<String>) {
        self.files.insert(uri.into(), text.into());
    }
}

impl LinkResolver for MemoryLinkResolver {
    fn resolve(&self, uri: &str, _relative_to: &str) -> Result<String, LinkError> {
        self.files
            .get(uri)
            .cloned()
            .ok_or_else(|| LinkError::NotFound {
                uri: uri.to_string(),
            })
    }
}
