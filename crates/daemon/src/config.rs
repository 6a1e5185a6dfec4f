// Local configuration for autosnap.
//
// Global config: `~/.autosnap/config.toml`
// Default working directory: `~/your-commit-directory`

use std::path::{Path, PathBuf};
use std::time::Duration;

use autosnap_common::repo::{OwnerRepo, RepoName};
use serde::{Deserialize, Serialize};

/// Directory name of the default working directory under `$HOME`.
pub const DEFAULT_WORKING_DIR_NAME: &str = "your-commit-directory";

/// Root directory for autosnap global state: `~/.autosnap/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".autosnap"))
}

/// Path to the global config file: `~/.autosnap/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Default snapshot working directory: `~/your-commit-directory`.
pub fn default_working_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(DEFAULT_WORKING_DIR_NAME))
}

// ── Global config ──────────────────────────────────────────────────

/// Global configuration at `~/.autosnap/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Target repository as `owner/repo`. Prompted for when absent.
    pub repository: Option<OwnerRepo>,
    /// Working directory override (defaults to `~/your-commit-directory`).
    pub working_dir: Option<PathBuf>,
    /// Git settings.
    pub git: GitConfig,
    /// The document whose text is snapshotted.
    pub document: DocumentConfig,
}

impl GlobalConfig {
    /// Load from `~/.autosnap/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to `~/.autosnap/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or(ConfigError::NoHomeDir)?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Working directory, falling back to `~/your-commit-directory`.
    pub fn resolve_working_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_working_dir().ok_or(ConfigError::NoHomeDir),
        }
    }

    /// Resolve everything the auto-commit loop needs.
    pub fn settings(&self) -> Result<AutoCommitSettings, ConfigError> {
        let local_path = self.resolve_working_dir()?;
        Ok(AutoCommitSettings {
            repository: RepositoryConfig {
                local_path,
                remote_name: self.git.remote.clone(),
                owner_repo: RepoName::from(self.repository.clone()),
                branch: self.git.branch.clone(),
                host: self.git.host.clone(),
            },
            interval: self.git.interval(),
            pull_timeout: self.git.pull_timeout(),
            push_timeout: self.git.push_timeout(),
        })
    }
}

/// Git settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    /// Git remote name (defaults to `"origin"`).
    pub remote: String,
    /// Branch to pull and push (defaults to `"main"`).
    pub branch: String,
    /// Host used to build the remote URL (defaults to `"github.com"`).
    pub host: String,
    /// Seconds between snapshots.
    pub interval_sec: u64,
    /// Upper bound on `git pull` in seconds (0 = unbounded).
    pub pull_timeout_sec: u64,
    /// Upper bound on `git push` in seconds (0 = unbounded).
    pub push_timeout_sec: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".into(),
            branch: "main".into(),
            host: "github.com".into(),
            interval_sec: 600,
            pull_timeout_sec: 120,
            push_timeout_sec: 120,
        }
    }
}

impl GitConfig {
    /// Snapshot interval, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_sec.max(1))
    }

    pub fn pull_timeout(&self) -> Option<Duration> {
        bounded(self.pull_timeout_sec)
    }

    pub fn push_timeout(&self) -> Option<Duration> {
        bounded(self.push_timeout_sec)
    }
}

fn bounded(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Which document is snapshotted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DocumentConfig {
    /// Path of the active document. Nothing is captured while it is missing.
    pub path: Option<PathBuf>,
}

// ── Resolved settings ──────────────────────────────────────────────

/// Where snapshots live and where they are pushed.
///
/// Read-only once the auto-commit service is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub local_path: PathBuf,
    pub remote_name: String,
    pub owner_repo: RepoName,
    pub branch: String,
    pub host: String,
}

impl RepositoryConfig {
    /// `https://<host>/<owner>/<repo>.git`, once a repository name is set.
    pub fn remote_url(&self) -> Option<String> {
        self.owner_repo.configured().map(|repo| repo.remote_url(&self.host))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoCommitSettings {
    pub repository: RepositoryConfig,
    pub interval: Duration,
    pub pull_timeout: Option<Duration>,
    pub push_timeout: Option<Duration>,
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    NoHomeDir,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
            Self::NoHomeDir => write!(f, "could not determine home directory"),
        }
    }
}

impl std::error::Error for ConfigError {}
