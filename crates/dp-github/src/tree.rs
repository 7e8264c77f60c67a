use dp_core::types::RepositoryRef;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::host::{RemoteContent, RepositoryHost};

/// A file observed at a ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub exists: bool,
    pub content: Vec<u8>,
    /// Blob sha; required to update the file, absent when creating it.
    pub sha: Option<String>,
}

impl TreeEntry {
    /// An entry for a path with nothing at it yet.
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exists: false,
            content: Vec::new(),
            sha: None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Outcome of reading one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeRead {
    File(TreeEntry),
    Directory,
    NotFound,
}

impl TreeRead {
    pub fn exists(&self) -> bool {
        !matches!(self, TreeRead::NotFound)
    }
}

/// Reads file and directory state from a remote host.
pub struct RemoteTreeReader<'a> {
    host: &'a dyn RepositoryHost,
}

impl<'a> RemoteTreeReader<'a> {
    pub fn new(host: &'a dyn RepositoryHost) -> Self {
        Self { host }
    }

    /// What is at `path` on `reference`. A 404 is [`TreeRead::NotFound`];
    /// every other failure propagates.
    pub async fn read(&self, repo: &RepositoryRef, path: &str, reference: &str) -> Result<TreeRead> {
        match self.host.get_content(repo, path, reference).await {
            Ok(RemoteContent::File { sha, content }) => Ok(TreeRead::File(TreeEntry {
                path: path.to_string(),
                exists: true,
                content,
                sha: Some(sha),
            })),
            Ok(RemoteContent::Directory) => Ok(TreeRead::Directory),
            Err(SyncError::NotFound(_)) => {
                debug!(%repo, path, reference, "path not found");
                Ok(TreeRead::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}
