// User-facing status notices.
//
// Notices are fire-and-forget: `Notifier::notify` must not block the tick.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::git::sync::SyncStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    RepositorySet { repo: String },
    RepositoryNameRequired,
    Initialized,
    AlreadyInitialized,
    InitFailed { cause: String },
    RemoteAdded { url: String },
    RemoteExists,
    RemoteFailed { cause: String },
    AutoCommitStarted,
    AlreadyRunning,
    CannotStart,
    CycleSucceeded { file: PathBuf, commit: String },
    CycleFailed { file: Option<PathBuf>, stage: Option<SyncStage>, cause: String },
}

impl Notice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            Notice::RepositoryNameRequired
            | Notice::InitFailed { .. }
            | Notice::RemoteFailed { .. }
            | Notice::CannotStart
            | Notice::CycleFailed { .. } => NoticeLevel::Error,
            _ => NoticeLevel::Info,
        }
    }
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::RepositorySet { repo } => write!(f, "Repository set to: {repo}"),
            Notice::RepositoryNameRequired => write!(f, "Repository name is required!"),
            Notice::Initialized => write!(f, "Git repository initialized."),
            Notice::AlreadyInitialized => write!(f, "Git repository already initialized."),
            Notice::InitFailed { cause } => write!(f, "Error initializing repository: {cause}"),
            Notice::RemoteAdded { url } => write!(f, "Remote added: {url}"),
            Notice::RemoteExists => write!(f, "Remote already exists."),
            Notice::RemoteFailed { cause } => write!(f, "Error adding remote: {cause}"),
            Notice::AutoCommitStarted => write!(f, "Auto-commit started!"),
            Notice::AlreadyRunning => write!(f, "Auto-commit is already running."),
            Notice::CannotStart => {
                write!(f, "Auto-commit cannot start without a repository name!")
            }
            Notice::CycleSucceeded { file, commit } => {
                let short = commit.get(..7).unwrap_or(commit.as_str());
                write!(f, "Committed and pushed {} ({short}).", display_name(file))
            }
            Notice::CycleFailed { file, stage, cause } => {
                write!(f, "Error committing or pushing")?;
                if let Some(file) = file {
                    write!(f, " {}", display_name(file))?;
                }
                if let Some(stage) = stage {
                    write!(f, " at {stage}")?;
                }
                write!(f, ": {cause}")?;
                if *stage == Some(SyncStage::Push) {
                    write!(f, " (commit kept locally)")?;
                }
                Ok(())
            }
        }
    }
}

fn display_name(file: &std::path::Path) -> String {
    file.file_name().unwrap_or(file.as_os_str()).to_string_lossy().into_owned()
}

pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notice: Notice);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, notice: Notice) {
        (**self).notify(notice)
    }
}

/// Routes notices into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level() {
            NoticeLevel::Info => info!(target: "autosnap::notice", "{notice}"),
            NoticeLevel::Error => error!(target: "autosnap::notice", "{notice}"),
        }
    }
}
