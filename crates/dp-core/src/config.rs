use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration loaded from `~/.docpilot/config.toml`.
///
/// **Security**: This struct NEVER stores tokens or private keys.
/// It names the environment variables that hold them; see
/// [`CredentialProvider`] for how those are resolved at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load config from `~/.docpilot/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.sync.validate()?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docpilot")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `human` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl GeneralConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.log_format.to_ascii_lowercase().as_str() {
            "human" | "json" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "general.log_format must be `human` or `json`, got {other:?}"
            ))),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "human".into()
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

/// GitHub connection settings. References env var names, NEVER stores
/// actual tokens or keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Base URL of the REST API (override for GitHub Enterprise).
    #[serde(default)]
    pub api_url: Option<String>,
    /// Env var name for a static personal access token (default: `GITHUB_TOKEN`).
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Env var name for the GitHub App id (default: `GITHUB_APP_ID`).
    #[serde(default = "default_app_id_env")]
    pub app_id_env: String,
    /// Env var name for the path to the App's PEM private key
    /// (default: `GITHUB_PRIVATE_KEY_PATH`).
    #[serde(default = "default_private_key_path_env")]
    pub private_key_path_env: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token_env: default_token_env(),
            app_id_env: default_app_id_env(),
            private_key_path_env: default_private_key_path_env(),
        }
    }
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_app_id_env() -> String {
    "GITHUB_APP_ID".into()
}
fn default_private_key_path_env() -> String {
    "GITHUB_PRIVATE_KEY_PATH".into()
}

// ---------------------------------------------------------------------------
// Sync engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// First path segment of every working branch.
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    /// File name used to force a directory into existence.
    #[serde(default = "default_placeholder_name")]
    pub placeholder_name: String,
    /// Upper bound on requests in flight during a batch.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Branches whose pushes and merges trigger documentation updates.
    #[serde(default = "default_protected_branches")]
    pub protected_branches: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            branch_prefix: default_branch_prefix(),
            placeholder_name: default_placeholder_name(),
            max_concurrent: default_max_concurrent(),
            protected_branches: default_protected_branches(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = self.branch_prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(ConfigError::Validation(
                "sync.branch_prefix must not be empty".into(),
            ));
        }
        if self.placeholder_name.is_empty() || self.placeholder_name.contains('/') {
            return Err(ConfigError::Validation(format!(
                "sync.placeholder_name must be a bare file name, got {:?}",
                self.placeholder_name
            )));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Validation(
                "sync.max_concurrent must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_branch_prefix() -> String {
    "docpilot".into()
}
fn default_placeholder_name() -> String {
    ".keep".into()
}
fn default_max_concurrent() -> usize {
    4
}
fn default_protected_branches() -> Vec<String> {
    vec!["main".into(), "master".into()]
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// GitHub App identity read from the environment.
#[derive(Clone)]
pub struct AppCredentials {
    pub app_id: u64,
    pub private_key_pem: String,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

/// Reads credentials from environment variables at runtime.
///
/// Config stores env var *names*; this provider resolves them to values on
/// demand. Empty variables count as unset.
pub struct CredentialProvider;

impl CredentialProvider {
    /// Static token from the env var named in `github.token_env`.
    pub fn github_token(cfg: &GitHubConfig) -> Option<String> {
        non_empty_env(&cfg.token_env)
    }

    /// App id and private key, when both env vars are set and the key file
    /// is readable.
    pub fn app_credentials(cfg: &GitHubConfig) -> Result<Option<AppCredentials>, ConfigError> {
        let (Some(app_id), Some(key_path)) = (
            non_empty_env(&cfg.app_id_env),
            non_empty_env(&cfg.private_key_path_env),
        ) else {
            return Ok(None);
        };

        let app_id = app_id.trim().parse::<u64>().map_err(|_| {
            ConfigError::Validation(format!("{} must be a numeric app id", cfg.app_id_env))
        })?;
        let private_key_pem = std::fs::read_to_string(&key_path)
            .map_err(|e| ConfigError::Io(format!("reading private key {key_path}: {e}")))?;

        Ok(Some(AppCredentials {
            app_id,
            private_key_pem,
        }))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
