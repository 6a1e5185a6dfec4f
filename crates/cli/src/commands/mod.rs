// CLI subcommand dispatch and shared configuration flags.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context;
use autosnap_common::repo::OwnerRepo;
use autosnap_daemon::config::{global_config_path, GlobalConfig};
use autosnap_daemon::runtime::load_config_file;
use clap::{Args, Subcommand};

pub mod snapshot;
pub mod start;
pub mod status;

#[derive(Subcommand)]
pub enum Command {
    /// Start the auto-commit loop in the foreground
    Start(start::StartArgs),
    /// Snapshot, commit and push once, right now
    Snapshot(snapshot::SnapshotArgs),
    /// Show resolved configuration and repository state
    Status(status::StatusArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Start(args) => start::run(args),
        Command::Snapshot(args) => snapshot::run(args),
        Command::Status(args) => status::run(args),
    }
}

/// Flags shared by every subcommand. Values given here override the
/// config file for this invocation only.
#[derive(Debug, Default, Args)]
pub struct ConfigArgs {
    /// Config file (defaults to ~/.autosnap/config.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Target repository as owner/repo.
    #[arg(long, value_name = "OWNER/REPO")]
    repo: Option<String>,

    /// Document to snapshot.
    #[arg(long, value_name = "PATH")]
    document: Option<PathBuf>,

    /// Working directory holding the snapshot repository.
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Seconds between snapshots.
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Force JSON output.
    #[arg(long)]
    pub json: bool,
}

impl ConfigArgs {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => global_config_path().context("could not determine home directory"),
        }
    }

    /// Config file contents (defaults when absent) with flag overrides applied.
    pub fn load(&self) -> anyhow::Result<GlobalConfig> {
        let mut config = load_config_file(&self.config_path()?)?;

        if let Some(repo) = &self.repo {
            config.repository =
                Some(OwnerRepo::parse(repo).with_context(|| format!("invalid --repo `{repo}`"))?);
        }
        if let Some(document) = &self.document {
            config.document.path = Some(document.clone());
        }
        if let Some(dir) = &self.dir {
            config.working_dir = Some(dir.clone());
        }
        if let Some(interval) = self.interval {
            config.git.interval_sec = interval;
        }
        Ok(config)
    }

    /// Write `repo` into the config file, leaving every other value as stored.
    pub fn persist_repository(&self, repo: &OwnerRepo) -> anyhow::Result<PathBuf> {
        let path = self.config_path()?;
        let mut stored = load_config_file(&path)?;
        stored.repository = Some(repo.clone());
        stored
            .save_to(&path)
            .with_context(|| format!("failed to save config `{}`", path.display()))?;
        Ok(path)
    }
}

/// Run `future` to completion on a fresh single-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    Ok(runtime.block_on(future))
}
