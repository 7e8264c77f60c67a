use std::path::PathBuf;

use anyhow::Context;
use dp_core::config::Config;
use dp_core::types::{RepositoryRef, UpdateRequest};
use dp_github::DocSyncEngine;

use super::{github_connector, print_json, read_text};

pub struct SyncArgs {
    pub repo: String,
    pub base: String,
    pub doc: String,
    pub source: String,
    pub content: PathBuf,
}

impl SyncArgs {
    pub fn into_request(self) -> anyhow::Result<UpdateRequest> {
        let repo: RepositoryRef = self
            .repo
            .parse()
            .with_context(|| format!("--repo {}", self.repo))?;
        let documentation_content = read_text(&self.content)?;
        Ok(UpdateRequest {
            repo,
            base_branch: self.base,
            doc_location: self.doc,
            source_file: self.source,
            documentation_content,
        })
    }
}

/// Run the `sync` subcommand. Exits non-zero when the result is an error.
pub async fn run(cfg: &Config, args: SyncArgs) -> anyhow::Result<()> {
    let request = args.into_request()?;
    let engine = DocSyncEngine::new(github_connector(cfg)?, &cfg.sync);

    let result = engine.synchronize(&request).await;
    print_json(&result)?;
    if !result.is_success() {
        anyhow::bail!("documentation sync failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use dp_core::types::DocMode;

    use super::*;

    fn args(content: PathBuf, doc: &str) -> SyncArgs {
        SyncArgs {
            repo: "o/r".into(),
            base: "main".into(),
            doc: doc.into(),
            source: "src/foo.py".into(),
            content,
        }
    }

    #[test]
    fn builds_request_from_args() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "# Foo\n...").unwrap();

        let request = args(file.path().to_path_buf(), "docs/foo.md")
            .into_request()
            .unwrap();
        assert_eq!(request.repo, RepositoryRef::new("o", "r"));
        assert_eq!(request.documentation_content, "# Foo\n...");
        assert_eq!(request.mode(), DocMode::Standalone);
    }

    #[test]
    fn rejects_bad_repo() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut bad = args(file.path().to_path_buf(), "docs/foo.md");
        bad.repo = "just-a-name".into();
        assert!(bad.into_request().is_err());
    }

    #[test]
    fn missing_content_file_is_an_error() {
        let err = args("/no/such/file.md".into(), "docs/foo.md")
            .into_request()
            .unwrap_err();
        assert!(err.to_string().contains("/no/such/file.md"));
    }
}
