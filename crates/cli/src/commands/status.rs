// `autosnap status`: resolved configuration and repository state.

use std::path::Path;

use anyhow::Context;
use autosnap_common::naming::parse_snapshot_file_name;
use autosnap_daemon::config::GlobalConfig;
use autosnap_daemon::git::repository::RepositoryHandle;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use super::ConfigArgs;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResult {
    pub repository: Option<String>,
    pub remote_url: Option<String>,
    pub remote: String,
    pub branch: String,
    pub working_dir: String,
    pub document: Option<String>,
    pub interval_sec: u64,
    pub initialized: bool,
    pub snapshot_count: usize,
    pub latest_snapshot: Option<DateTime<Utc>>,
}

pub fn run(args: StatusArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.config.json);
    match args.config.load().and_then(|config| collect_status(&config)) {
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

fn collect_status(config: &GlobalConfig) -> anyhow::Result<StatusResult> {
    let settings = config.settings().context("failed to resolve auto-commit settings")?;
    let repository = settings.repository.clone();
    let (snapshot_count, latest_snapshot) = scan_snapshots(&repository.local_path)?;

    Ok(StatusResult {
        repository: repository.owner_repo.configured().map(ToString::to_string),
        remote_url: repository.remote_url(),
        remote: repository.remote_name.clone(),
        branch: repository.branch.clone(),
        working_dir: repository.local_path.display().to_string(),
        document: config.document.path.as_ref().map(|path| path.display().to_string()),
        interval_sec: settings.interval.as_secs(),
        initialized: RepositoryHandle::new(repository).is_initialized(),
        snapshot_count,
        latest_snapshot,
    })
}

/// Count snapshot files in `dir` and find the newest capture time.
fn scan_snapshots(dir: &Path) -> anyhow::Result<(usize, Option<DateTime<Utc>>)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok((0, None)),
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read `{}`", dir.display()))
        }
    };

    let mut count = 0;
    let mut latest: Option<DateTime<Utc>> = None;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read `{}`", dir.display()))?;
        let name = entry.file_name();
        let Some(timestamp) = name.to_str().and_then(parse_snapshot_file_name) else {
            continue;
        };
        count += 1;
        latest = latest.max(Some(timestamp));
    }
    Ok((count, latest))
}

fn format_human(result: &StatusResult) -> String {
    let mut lines = Vec::new();
    match (&result.repository, &result.remote_url) {
        (Some(repo), Some(url)) => lines.push(format!("Repository: {repo} ({url})")),
        _ => lines.push("Repository: not configured".to_string()),
    }
    lines.push(format!("  Remote:    {} / {}", result.remote, result.branch));
    lines.push(format!(
        "  Directory: {} ({})",
        result.working_dir,
        if result.initialized { "initialized" } else { "not initialized" }
    ));
    lines.push(format!(
        "  Document:  {}",
        result.document.as_deref().unwrap_or("not configured")
    ));
    lines.push(format!("  Interval:  {}s", result.interval_sec));
    match result.latest_snapshot {
        Some(latest) => lines.push(format!(
            "  Snapshots: {} (latest {})",
            result.snapshot_count,
            latest.to_rfc3339()
        )),
        None => lines.push("  Snapshots: none".to_string()),
    }
    lines.join("\n")
}
