// Working-directory bootstrap: `git init` and the `origin` remote.
//
// Both operations are idempotent and make no network calls; the first
// network access happens during the sync's pull.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::worker::{CommandExecutor, GitWorker, GitWorkerError, ProcessCommandExecutor};
use crate::config::RepositoryConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStatus {
    Initialized,
    AlreadyInitialized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Added { url: String },
    AlreadyExists,
}

#[derive(Debug)]
pub enum InitError {
    CreateDir { path: PathBuf, source: std::io::Error },
    NotWritable { path: PathBuf, source: std::io::Error },
    Git(GitWorkerError),
}

impl Display for InitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::CreateDir { path, source } => {
                write!(f, "failed to create working directory `{}`: {source}", path.display())
            }
            InitError::NotWritable { path, source } => {
                write!(f, "working directory `{}` is not writable: {source}", path.display())
            }
            InitError::Git(error) => write!(f, "git init failed: {error}"),
        }
    }
}

impl Error for InitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InitError::CreateDir { source, .. } => Some(source),
            InitError::NotWritable { source, .. } => Some(source),
            InitError::Git(error) => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    NotInitialized { path: PathBuf },
    NotConfigured,
    Git(GitWorkerError),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::NotInitialized { path } => {
                write!(f, "no git repository at `{}`", path.display())
            }
            RemoteError::NotConfigured => write!(f, "repository name not set"),
            RemoteError::Git(error) => write!(f, "failed to configure remote: {error}"),
        }
    }
}

impl Error for RemoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RemoteError::Git(error) => Some(error),
            _ => None,
        }
    }
}

/// Owns the working directory and makes sure it is a repository with a remote.
#[derive(Debug, Clone)]
pub struct RepositoryHandle<E = ProcessCommandExecutor> {
    config: RepositoryConfig,
    worker: GitWorker<E>,
}

impl RepositoryHandle<ProcessCommandExecutor> {
    pub fn new(config: RepositoryConfig) -> Self {
        let worker = GitWorker::new(&config.local_path);
        Self { config, worker }
    }
}

impl<E: CommandExecutor> RepositoryHandle<E> {
    pub fn with_executor(config: RepositoryConfig, executor: E) -> Self {
        let worker = GitWorker::with_executor(&config.local_path, executor);
        Self { config, worker }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        has_git_metadata(&self.config.local_path)
    }

    /// Create the directory if needed and run `git init` unless `.git` exists.
    pub async fn ensure_initialized(&self) -> Result<InitStatus, InitError> {
        let path = &self.config.local_path;
        fs::create_dir_all(path)
            .map_err(|source| InitError::CreateDir { path: path.clone(), source })?;

        tempfile::Builder::new()
            .prefix(".autosnap-write-check")
            .tempfile_in(path)
            .map_err(|source| InitError::NotWritable { path: path.clone(), source })?;

        if has_git_metadata(path) {
            debug!(path = %path.display(), "git repository already initialized");
            return Ok(InitStatus::AlreadyInitialized);
        }

        self.worker.init().await.map_err(InitError::Git)?;
        self.worker.set_head_branch(&self.config.branch).await.map_err(InitError::Git)?;
        info!(path = %path.display(), branch = %self.config.branch, "initialized git repository");
        Ok(InitStatus::Initialized)
    }

    /// Add the configured remote unless one with the same name already exists.
    pub async fn ensure_remote(&self) -> Result<RemoteStatus, RemoteError> {
        if !self.is_initialized() {
            return Err(RemoteError::NotInitialized { path: self.config.local_path.clone() });
        }
        let url = self.config.remote_url().ok_or(RemoteError::NotConfigured)?;

        let remotes = self.worker.remote_names().await.map_err(RemoteError::Git)?;
        if remotes.iter().any(|name| name == &self.config.remote_name) {
            debug!(remote = %self.config.remote_name, "remote already exists");
            return Ok(RemoteStatus::AlreadyExists);
        }

        self.worker.remote_add(&self.config.remote_name, &url).await.map_err(RemoteError::Git)?;
        info!(remote = %self.config.remote_name, %url, "added remote");
        Ok(RemoteStatus::Added { url })
    }
}

fn has_git_metadata(path: &Path) -> bool {
    path.join(".git").exists()
}
