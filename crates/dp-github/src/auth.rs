//! Per-repository credential resolution.
//!
//! Two modes, checked in this order:
//! 1. GitHub App: sign an app JWT, look up the repository's installation,
//!    exchange it for an installation token. Done on every call; the token
//!    is scoped to one repository and expires within the hour.
//! 2. Static personal access token.

use dp_core::config::{AppCredentials, CredentialProvider, GitHubConfig};
use dp_core::types::RepositoryRef;
use jsonwebtoken::EncodingKey;
use octocrab::models::AppId;
use octocrab::Octocrab;
use tracing::{debug, info};

use crate::client::status_of;
use crate::error::{Result, SyncError};

/// Which credential source an [`AuthResolver`] will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Installation,
    StaticToken,
}

/// A credential usable against one repository.
#[derive(Clone)]
pub enum Credential {
    Static {
        token: String,
    },
    /// Client already authenticated with an installation token for `repo`.
    Installation {
        repo: RepositoryRef,
        installation_id: u64,
        client: Octocrab,
    },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Static { .. } => f
                .debug_struct("Static")
                .field("token", &"<redacted>")
                .finish(),
            Credential::Installation {
                repo,
                installation_id,
                ..
            } => f
                .debug_struct("Installation")
                .field("repo", repo)
                .field("installation_id", installation_id)
                .finish(),
        }
    }
}

struct AppKey {
    app_id: u64,
    key: EncodingKey,
}

pub struct AuthResolver {
    app: Option<AppKey>,
    token: Option<String>,
    api_url: Option<String>,
}

impl AuthResolver {
    /// Build a resolver from already-loaded credentials.
    ///
    /// A malformed private key is rejected here rather than on first use.
    pub fn new(
        app: Option<AppCredentials>,
        token: Option<String>,
        api_url: Option<String>,
    ) -> Result<Self> {
        let app = app
            .map(|creds| {
                EncodingKey::from_rsa_pem(creds.private_key_pem.as_bytes())
                    .map(|key| AppKey {
                        app_id: creds.app_id,
                        key,
                    })
                    .map_err(|e| SyncError::AuthUnavailable {
                        repo: "*".into(),
                        reason: format!("invalid GitHub App private key: {e}"),
                    })
            })
            .transpose()?;

        Ok(Self {
            app,
            token,
            api_url,
        })
    }

    /// Build a resolver from the env vars named in `cfg`.
    pub fn from_config(cfg: &GitHubConfig) -> Result<Self> {
        let app = CredentialProvider::app_credentials(cfg).map_err(|e| {
            SyncError::AuthUnavailable {
                repo: "*".into(),
                reason: e.to_string(),
            }
        })?;
        let token = CredentialProvider::github_token(cfg);
        Self::new(app, token, cfg.api_url.clone())
    }

    /// The mode `resolve` will use, or `None` when nothing is configured.
    pub fn mode(&self) -> Option<AuthMode> {
        if self.app.is_some() {
            Some(AuthMode::Installation)
        } else if self.token.is_some() {
            Some(AuthMode::StaticToken)
        } else {
            None
        }
    }

    pub fn api_url(&self) -> Option<&str> {
        self.api_url.as_deref()
    }

    /// Resolve a credential for `repo`.
    pub async fn resolve(&self, repo: &RepositoryRef) -> Result<Credential> {
        if let Some(app) = &self.app {
            return self.resolve_installation(app, repo).await;
        }
        if let Some(token) = &self.token {
            debug!(%repo, "using static GitHub token");
            return Ok(Credential::Static {
                token: token.clone(),
            });
        }
        Err(SyncError::AuthUnavailable {
            repo: repo.to_string(),
            reason: "neither GitHub App credentials nor a static token are configured".into(),
        })
    }

    async fn resolve_installation(&self, app: &AppKey, repo: &RepositoryRef) -> Result<Credential> {
        let unavailable = |reason: String| SyncError::AuthUnavailable {
            repo: repo.to_string(),
            reason,
        };

        // The builder is not `Send`; it must be gone before the first await.
        let app_client = {
            let mut builder = Octocrab::builder();
            if let Some(url) = &self.api_url {
                builder = builder
                    .base_uri(url.as_str())
                    .map_err(|e| unavailable(format!("invalid API url {url}: {e}")))?;
            }
            builder
                .app(AppId(app.app_id), app.key.clone())
                .build()
                .map_err(|e| unavailable(format!("building app client: {e}")))?
        };

        let installation = app_client
            .apps()
            .get_repository_installation(repo.owner(), repo.name())
            .await
            .map_err(|e| match status_of(&e) {
                Some(404) => unavailable("GitHub App is not installed on this repository".into()),
                _ => SyncError::upstream(status_of(&e), format!("installation lookup: {e}")),
            })?;

        let installation_id = installation.id.0;
        let (client, _token) = app_client
            .installation_and_token(installation.id)
            .await
            .map_err(|e| SyncError::upstream(status_of(&e), format!("token exchange: {e}")))?;

        info!(%repo, installation_id, "resolved installation token");
        Ok(Credential::Installation {
            repo: repo.clone(),
            installation_id,
            client,
        })
    }
}
