// Auto-commit service: repository bootstrap plus the per-tick pipeline.
//
// `AutoCommit` is one capture → persist → sync cycle. `AutoCommitService`
// resolves the repository name, prepares the working directory and owns
// the scheduler that drives `AutoCommit` on every tick.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use autosnap_common::repo::{OwnerRepo, RepoName, RepoNameError};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::AutoCommitSettings;
use crate::git::repository::{InitError, InitStatus, RemoteError, RemoteStatus, RepositoryHandle};
use crate::git::sync::{SyncCommitter, SyncOutcome};
use crate::git::worker::{CommandExecutor, GitWorker, ProcessCommandExecutor};
use crate::notify::{Notice, Notifier};
use crate::scheduler::{Scheduler, SchedulerState, TickHandler};
use crate::snapshot::{
    CaptureError, Clock, ContentSource, SnapshotWriter, SystemClock, WriteError,
};

// ── Tick pipeline ───────────────────────────────────────────────────

/// What one tick did.
#[derive(Debug)]
pub enum TickReport {
    /// Nothing to snapshot; no file written, nothing reported.
    NoActiveContent,
    CaptureFailed(CaptureError),
    WriteFailed(WriteError),
    Synced { file: PathBuf, timestamp: DateTime<Utc>, outcome: SyncOutcome },
}

pub struct AutoCommit<S, E = ProcessCommandExecutor, C = SystemClock> {
    writer: SnapshotWriter<S, C>,
    committer: SyncCommitter<E>,
    directory: PathBuf,
    notifier: Arc<dyn Notifier>,
}

impl<S, E, C> AutoCommit<S, E, C>
where
    S: ContentSource,
    E: CommandExecutor + 'static,
    C: Clock,
{
    pub fn new(
        writer: SnapshotWriter<S, C>,
        committer: SyncCommitter<E>,
        directory: impl Into<PathBuf>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { writer, committer, directory: directory.into(), notifier }
    }

    /// Run one capture → persist → sync cycle and report the result.
    pub async fn run_once(&self) -> TickReport {
        let record = match self.writer.capture() {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("no active document, nothing to snapshot");
                return TickReport::NoActiveContent;
            }
            Err(error) => {
                self.notifier.notify(Notice::CycleFailed {
                    file: None,
                    stage: None,
                    cause: error.to_string(),
                });
                return TickReport::CaptureFailed(error);
            }
        };

        let file = match self.writer.persist(&record, &self.directory).await {
            Ok(file) => file,
            Err(error) => {
                self.notifier.notify(Notice::CycleFailed {
                    file: None,
                    stage: None,
                    cause: error.to_string(),
                });
                return TickReport::WriteFailed(error);
            }
        };

        let outcome = self.committer.run(&file, record.timestamp()).await;
        let notice = match &outcome {
            SyncOutcome::Success { commit } => {
                Notice::CycleSucceeded { file: file.clone(), commit: commit.clone() }
            }
            SyncOutcome::Failure { stage, cause } => Notice::CycleFailed {
                file: Some(file.clone()),
                stage: Some(*stage),
                cause: cause.to_string(),
            },
        };
        self.notifier.notify(notice);

        TickReport::Synced { file, timestamp: record.timestamp(), outcome }
    }
}

impl<S, E, C> TickHandler for AutoCommit<S, E, C>
where
    S: ContentSource,
    E: CommandExecutor + 'static,
    C: Clock,
{
    async fn tick(&self) {
        let _ = self.run_once().await;
    }
}

// ── Service ─────────────────────────────────────────────────────────

/// Supplies an `owner/repo` name when none is configured.
pub trait RepoPrompt: Send + Sync {
    /// `None` when the user cancelled.
    fn ask_repository(&self) -> Option<String>;
}

/// Never asks; used when running without a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl RepoPrompt for NoPrompt {
    fn ask_repository(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    Started,
    AlreadyRunning,
}

#[derive(Debug)]
pub enum StartError {
    MissingRepositoryName,
    InvalidRepositoryName(RepoNameError),
    Init(InitError),
    Remote(RemoteError),
    /// A manual snapshot was requested while the timer owns the repository.
    LoopRunning,
}

impl Display for StartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::MissingRepositoryName => {
                write!(f, "auto-commit cannot start without a repository name")
            }
            StartError::InvalidRepositoryName(error) => write!(f, "{error}"),
            StartError::Init(error) => write!(f, "{error}"),
            StartError::Remote(error) => write!(f, "{error}"),
            StartError::LoopRunning => write!(f, "auto-commit is already running"),
        }
    }
}

impl Error for StartError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StartError::MissingRepositoryName | StartError::LoopRunning => None,
            StartError::InvalidRepositoryName(error) => Some(error),
            StartError::Init(error) => Some(error),
            StartError::Remote(error) => Some(error),
        }
    }
}

pub struct AutoCommitService<S, E = ProcessCommandExecutor>
where
    S: ContentSource + Clone,
    E: CommandExecutor + Clone + 'static,
{
    settings: AutoCommitSettings,
    source: S,
    executor: E,
    notifier: Arc<dyn Notifier>,
    scheduler: Option<Scheduler<AutoCommit<S, E>>>,
}

impl<S: ContentSource + Clone> AutoCommitService<S, ProcessCommandExecutor> {
    pub fn new(settings: AutoCommitSettings, source: S, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_executor(settings, source, ProcessCommandExecutor, notifier)
    }
}

impl<S, E> AutoCommitService<S, E>
where
    S: ContentSource + Clone,
    E: CommandExecutor + Clone + 'static,
{
    pub fn with_executor(
        settings: AutoCommitSettings,
        source: S,
        executor: E,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { settings, source, executor, notifier, scheduler: None }
    }

    pub fn settings(&self) -> &AutoCommitSettings {
        &self.settings
    }

    pub fn repo_name(&self) -> &RepoName {
        &self.settings.repository.owner_repo
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.as_ref().map_or(SchedulerState::Idle, Scheduler::state)
    }

    /// Prepare the repository and arm the timer. Idempotent while running.
    pub async fn start(&mut self, prompt: &dyn RepoPrompt) -> Result<StartStatus, StartError> {
        if self.state() == SchedulerState::Running {
            self.notifier.notify(Notice::AlreadyRunning);
            return Ok(StartStatus::AlreadyRunning);
        }

        let pipeline = self.prepare(prompt).await?;
        let scheduler = Scheduler::new(pipeline);
        scheduler.start(self.settings.interval);
        self.scheduler = Some(scheduler);

        self.notifier.notify(Notice::AutoCommitStarted);
        Ok(StartStatus::Started)
    }

    /// Prepare the repository and run a single cycle right away.
    ///
    /// Refused while the timer is armed so cycles never overlap.
    pub async fn snapshot_now(&mut self, prompt: &dyn RepoPrompt) -> Result<TickReport, StartError> {
        if self.state() == SchedulerState::Running {
            return Err(StartError::LoopRunning);
        }
        let pipeline = self.prepare(prompt).await?;
        Ok(pipeline.run_once().await)
    }

    /// Disarm the timer, letting an in-flight cycle finish.
    pub async fn shutdown(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
    }

    /// Resolve the repository name, then make sure the working directory is
    /// a repository with the remote attached.
    async fn prepare(&mut self, prompt: &dyn RepoPrompt) -> Result<AutoCommit<S, E>, StartError> {
        self.resolve_repo_name(prompt)?;

        let repository =
            RepositoryHandle::with_executor(self.settings.repository.clone(), self.executor.clone());

        match repository.ensure_initialized().await {
            Ok(InitStatus::Initialized) => self.notifier.notify(Notice::Initialized),
            Ok(InitStatus::AlreadyInitialized) => self.notifier.notify(Notice::AlreadyInitialized),
            Err(error) => {
                self.notifier.notify(Notice::InitFailed { cause: error.to_string() });
                return Err(StartError::Init(error));
            }
        }

        match repository.ensure_remote().await {
            Ok(RemoteStatus::Added { url }) => self.notifier.notify(Notice::RemoteAdded { url }),
            Ok(RemoteStatus::AlreadyExists) => self.notifier.notify(Notice::RemoteExists),
            Err(error) => {
                self.notifier.notify(Notice::RemoteFailed { cause: error.to_string() });
                return Err(StartError::Remote(error));
            }
        }

        let local_path = &self.settings.repository.local_path;
        let worker = GitWorker::with_executor(local_path, self.executor.clone());
        Ok(AutoCommit::new(
            SnapshotWriter::new(self.source.clone()),
            SyncCommitter::new(worker, &self.settings),
            local_path,
            self.notifier.clone(),
        ))
    }

    fn resolve_repo_name(&mut self, prompt: &dyn RepoPrompt) -> Result<(), StartError> {
        if self.repo_name().is_configured() {
            return Ok(());
        }

        let answer = prompt.ask_repository().unwrap_or_default();
        if answer.trim().is_empty() {
            self.notifier.notify(Notice::RepositoryNameRequired);
            self.notifier.notify(Notice::CannotStart);
            return Err(StartError::MissingRepositoryName);
        }

        let repo = match OwnerRepo::parse(&answer) {
            Ok(repo) => repo,
            Err(error) => {
                self.notifier.notify(Notice::CannotStart);
                return Err(StartError::InvalidRepositoryName(error));
            }
        };

        info!(repository = %repo, "repository name set");
        self.notifier.notify(Notice::RepositorySet { repo: repo.to_string() });
        self.settings.repository.owner_repo = RepoName::Configured(repo);
        Ok(())
    }
}
