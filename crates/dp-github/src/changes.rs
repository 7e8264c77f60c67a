//! What a merged pull request touched.
//!
//! A [`crate::webhook::SyncTrigger`] for a merge carries the pull request
//! number; the files listed here are the candidates for one
//! [`dp_core::types::UpdateRequest`] each.

use std::sync::Arc;

use dp_core::types::RepositoryRef;
use tracing::{debug, info};

use crate::error::Result;
use crate::host::{ChangedFile, HostConnector};
use crate::webhook::SyncTrigger;

pub struct PullChanges {
    connector: Arc<dyn HostConnector>,
}

impl PullChanges {
    pub fn new(connector: Arc<dyn HostConnector>) -> Self {
        Self { connector }
    }

    /// Every file changed by pull request `number`.
    pub async fn files(&self, repo: &RepositoryRef, number: u64) -> Result<Vec<ChangedFile>> {
        let host = self.connector.connect(repo).await?;
        let files = host.list_pull_files(repo, number).await?;
        info!(%repo, pr_number = number, files = files.len(), "listed pull request changes");
        Ok(files)
    }

    /// Paths changed by pull request `number`, removals excluded.
    pub async fn changed_paths(&self, repo: &RepositoryRef, number: u64) -> Result<Vec<String>> {
        Ok(self
            .files(repo, number)
            .await?
            .into_iter()
            .filter(|f| f.status != "removed")
            .map(|f| f.filename)
            .collect())
    }

    /// The patch for `path` in pull request `number`. `None` when the file
    /// is not part of it or GitHub withheld the diff.
    pub async fn file_diff(
        &self,
        repo: &RepositoryRef,
        number: u64,
        path: &str,
    ) -> Result<Option<String>> {
        let patch = self
            .files(repo, number)
            .await?
            .into_iter()
            .find(|f| f.filename == path)
            .and_then(|f| f.patch);
        if patch.is_none() {
            debug!(%repo, pr_number = number, path, "no diff for file");
        }
        Ok(patch)
    }

    /// Changed paths behind `trigger`; empty for pushes, which carry no
    /// pull request.
    pub async fn for_trigger(&self, trigger: &SyncTrigger) -> Result<Vec<String>> {
        match trigger.pull_number {
            Some(number) => self.changed_paths(&trigger.repo, number).await,
            None => Ok(Vec::new()),
        }
    }
}
