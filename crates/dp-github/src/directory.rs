use std::collections::BTreeSet;

use dp_core::types::RepositoryRef;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::host::{FileWrite, RepositoryHost};
use crate::tree::{RemoteTreeReader, TreeRead};

/// Directory prefixes known to exist on one branch.
///
/// Lives for a single synchronisation; a fresh set is built every call.
#[derive(Debug, Default, Clone)]
pub struct PrefixSet {
    known: BTreeSet<String>,
}

impl PrefixSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.known.contains(prefix)
    }

    pub fn insert(&mut self, prefix: impl Into<String>) {
        self.known.insert(prefix.into());
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// `a`, `a/b`, `a/b/c` for `a/b/c`. Empty components are skipped.
pub fn prefixes(dir: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut running = String::new();
    for component in dir.split('/').filter(|c| !c.is_empty()) {
        if !running.is_empty() {
            running.push('/');
        }
        running.push_str(component);
        out.push(running.clone());
    }
    out
}

/// Directory holding `path`, or `None` at the repository root.
pub fn parent_directory(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .filter(|dir| !dir.is_empty())
}

/// Makes directories exist by committing placeholder files into them.
pub struct DirectoryMaterializer<'a> {
    host: &'a dyn RepositoryHost,
    placeholder: &'a str,
}

impl<'a> DirectoryMaterializer<'a> {
    pub fn new(host: &'a dyn RepositoryHost, placeholder: &'a str) -> Self {
        Self { host, placeholder }
    }

    /// Ensure `dir` exists on `branch`, returning the placeholders created.
    ///
    /// Each prefix is read on its own, so a tree left half-built by an
    /// earlier run only gets its missing levels.
    pub async fn ensure(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        dir: &str,
        known: &mut PrefixSet,
    ) -> Result<Vec<String>> {
        let reader = RemoteTreeReader::new(self.host);
        let mut created = Vec::new();

        for prefix in prefixes(dir) {
            if known.contains(&prefix) {
                continue;
            }
            match reader.read(repo, &prefix, branch).await? {
                TreeRead::Directory => {}
                TreeRead::File(_) => {
                    return Err(SyncError::invalid_target(
                        &prefix,
                        "a file exists where a directory is needed",
                    ))
                }
                TreeRead::NotFound => {
                    let path = format!("{prefix}/{}", self.placeholder);
                    let write = FileWrite {
                        path: path.clone(),
                        message: format!("📁 Create directory {prefix}"),
                        content: Vec::new(),
                        branch: branch.to_string(),
                    };
                    match self.host.create_file(repo, &write).await {
                        Ok(()) => {
                            info!(%repo, branch, path = %path, "created directory placeholder");
                            created.push(path);
                        }
                        // Someone else materialised it between read and write.
                        Err(SyncError::Conflict { .. }) => {
                            debug!(%repo, branch, path = %path, "placeholder already present");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            known.insert(prefix);
        }
        Ok(created)
    }
}
