// `autosnap snapshot`: one capture → commit → push cycle, right now.

use std::sync::Arc;

use anyhow::Context;
use autosnap_daemon::autocommit::{AutoCommitService, TickReport};
use autosnap_daemon::git::sync::{SyncOutcome, SyncStage};
use autosnap_daemon::notify::TracingNotifier;
use autosnap_daemon::snapshot::FileSource;
use clap::Args;
use serde::Serialize;

use super::{block_on, ConfigArgs};
use crate::output::{self, OutputFormat};
use crate::prompt::StdinPrompt;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SnapshotResult {
    /// The document does not exist; nothing was written.
    NoActiveContent,
    Committed { file: String, timestamp: String, commit: String },
}

pub fn run(args: SnapshotArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.config.json);
    match block_on(snapshot(&args.config)).and_then(|result| result) {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

async fn snapshot(args: &ConfigArgs) -> anyhow::Result<SnapshotResult> {
    let config = args.load()?;
    let document = config
        .document
        .path
        .clone()
        .context("no document configured")?;
    let settings = config.settings().context("failed to resolve auto-commit settings")?;

    let mut service =
        AutoCommitService::new(settings, FileSource::new(document), Arc::new(TracingNotifier));
    let report = service.snapshot_now(&StdinPrompt).await?;

    if config.repository.is_none() {
        if let Some(repo) = service.repo_name().configured() {
            args.persist_repository(repo)?;
        }
    }

    into_result(report)
}

fn into_result(report: TickReport) -> anyhow::Result<SnapshotResult> {
    match report {
        TickReport::NoActiveContent => Ok(SnapshotResult::NoActiveContent),
        TickReport::CaptureFailed(error) => Err(anyhow::Error::new(error)),
        TickReport::WriteFailed(error) => Err(anyhow::Error::new(error)),
        TickReport::Synced { file, timestamp, outcome } => match outcome {
            SyncOutcome::Success { commit } => Ok(SnapshotResult::Committed {
                file: file.display().to_string(),
                timestamp: timestamp.to_rfc3339(),
                commit,
            }),
            SyncOutcome::Failure { stage, cause } => {
                let message = match stage {
                    SyncStage::Push => {
                        format!("push failed for {}; the commit is kept locally", file.display())
                    }
                    _ => format!("{stage} failed for {}", file.display()),
                };
                Err(anyhow::Error::new(cause).context(message))
            }
        },
    }
}

fn format_human(result: &SnapshotResult) -> String {
    match result {
        SnapshotResult::NoActiveContent => "No active document; nothing to snapshot.".to_string(),
        SnapshotResult::Committed { file, commit, .. } => {
            let short = commit.get(..7).unwrap_or(commit.as_str());
            format!("Committed and pushed {file} ({short})")
        }
    }
}
