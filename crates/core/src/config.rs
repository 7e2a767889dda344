//! TOML-based configuration system for RepoWatch.
//!
//! Sensitive values (remote auth tokens) are stored as `_env` fields that
//! reference environment variable names. The actual secrets are resolved at
//! runtime via [`AppConfig::resolve_env_vars`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::models::RepoHandle;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon / polling settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Synchronization behaviour settings.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Watched repositories, one entry per clone.
    #[serde(default)]
    pub repos: Vec<RepoConfig>,
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Daemon / polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between polling cycles (default 5).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_poll_interval() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync behaviour
// ---------------------------------------------------------------------------

/// Synchronization behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Deadline for the pull stage, in seconds (default 300).
    #[serde(default = "default_pull_timeout")]
    pub pull_timeout_secs: u64,
}

fn default_pull_timeout() -> u64 {
    crate::synchronizer::DEFAULT_PULL_TIMEOUT_SECS
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            pull_timeout_secs: default_pull_timeout(),
        }
    }
}

impl SyncSettings {
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Watched repositories
// ---------------------------------------------------------------------------

/// One watched repository clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Display name for logs. Defaults to the clone's directory name.
    #[serde(default)]
    pub name: Option<String>,

    /// Path to the working clone. Must already be an initialized clone with
    /// the remote configured; RepoWatch never creates it.
    pub path: PathBuf,

    /// Remote to pull from (default `origin`).
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch to pull. Defaults to the branch currently checked out.
    #[serde(default)]
    pub branch: Option<String>,

    /// Marker file announcing detected changes (default `.commit_id`).
    #[serde(default = "default_marker")]
    pub marker: PathBuf,

    /// Environment variable holding an auth token for the remote.
    #[serde(default)]
    pub token_env: Option<String>,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_remote() -> String {
    "origin".into()
}
fn default_marker() -> PathBuf {
    PathBuf::from(".commit_id")
}

impl RepoConfig {
    /// Display name for logs.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string()),
        }
    }

    /// Build the synchronizer handle for this entry.
    pub fn handle(&self) -> RepoHandle {
        RepoHandle {
            path: self.path.clone(),
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            token: self.token.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve all `*_env` fields from environment variables and populate
    /// the corresponding resolved fields.
    ///
    /// A repository that references a missing variable logs a warning but
    /// does **not** fail -- public remotes need no token at all.
    pub fn resolve_env_vars(&mut self) {
        for repo in &mut self.repos {
            if let Some(ref env_name) = repo.token_env {
                repo.token = resolve_optional_env(env_name, "repos.token_env");
            }
        }
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repos.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repos".into(),
                detail: "at least one watched repository is required".into(),
            });
        }
        if self.daemon.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "daemon.poll_interval_secs".into(),
                detail: "poll interval must be > 0".into(),
            });
        }
        if self.sync.pull_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.pull_timeout_secs".into(),
                detail: "pull timeout must be > 0".into(),
            });
        }

        let mut paths = HashSet::new();
        let mut markers = HashSet::new();
        for repo in &self.repos {
            if repo.path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "repos.path".into(),
                    detail: "repository path must not be empty".into(),
                });
            }
            if !paths.insert(repo.path.clone()) {
                return Err(ConfigError::InvalidValue {
                    field: "repos.path".into(),
                    detail: format!("duplicate repository path '{}'", repo.path.display()),
                });
            }
            // Each handle owns its marker; sharing one would let two
            // watchers overwrite each other's announcements.
            if !markers.insert(repo.marker.clone()) {
                return Err(ConfigError::InvalidValue {
                    field: "repos.marker".into(),
                    detail: format!("duplicate marker path '{}'", repo.marker.display()),
                });
            }
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[daemon]
poll_interval_secs = 30
log_level = "debug"

[sync]
pull_timeout_secs = 120

[[repos]]
name = "widget-api"
path = "/var/lib/repowatch/widget-api"
remote = "origin"
branch = "main"
marker = "/var/lib/repowatch/widget-api.commit_id"
token_env = "REPOWATCH_GIT_TOKEN"

[[repos]]
path = "/var/lib/repowatch/frontend"
marker = "/var/lib/repowatch/frontend.commit_id"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.daemon.poll_interval_secs, 30);
        assert_eq!(config.sync.pull_timeout_secs, 120);
        assert_eq!(config.repos.len(), 2);
        assert_eq!(config.repos[0].display_name(), "widget-api");
        assert_eq!(config.repos[0].branch.as_deref(), Some("main"));
        assert_eq!(config.repos[1].display_name(), "frontend");
        assert_eq!(config.repos[1].remote, "origin");
        assert!(config.repos[1].branch.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.daemon.log_level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_no_repos() {
        let config: AppConfig = toml::from_str("[daemon]\n").unwrap();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "repos"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.daemon.poll_interval_secs = 0;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "daemon.poll_interval_secs"
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_markers() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.repos[1].marker = config.repos[0].marker.clone();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "repos.marker"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_REPOWATCH_TOKEN", "tok_abc");

        let mut config: AppConfig = toml::from_str(
            r#"
[[repos]]
path = "/srv/clone"
token_env = "TEST_REPOWATCH_TOKEN"
"#,
        )
        .unwrap();
        config.resolve_env_vars();

        assert_eq!(config.repos[0].token.as_deref(), Some("tok_abc"));

        // Clean up
        std::env::remove_var("TEST_REPOWATCH_TOKEN");
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[[repos]]
path = "/srv/clone"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.daemon.poll_interval_secs, 5);
        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.sync.pull_timeout_secs, 300);
        assert_eq!(config.repos[0].remote, "origin");
        assert_eq!(config.repos[0].marker, PathBuf::from(".commit_id"));
        assert!(config.repos[0].token_env.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_handle_carries_resolved_token() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.repos[0].token = Some("tok".into());
        let handle = config.repos[0].handle();
        assert_eq!(handle.token.as_deref(), Some("tok"));
        assert_eq!(handle.branch.as_deref(), Some("main"));
    }
}
