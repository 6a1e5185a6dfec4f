// Process-level wiring for the auto-commit loop.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::autocommit::{AutoCommitService, NoPrompt};
use crate::config::{global_config_path, GlobalConfig};
use crate::notify::TracingNotifier;
use crate::snapshot::{ContentSource, FileSource};

/// Run the loop from `~/.autosnap/config.toml` until Ctrl-C.
pub async fn run_standalone() -> Result<()> {
    let config = match global_config_path() {
        Some(path) => load_config_file(&path)?,
        None => GlobalConfig::default(),
    };
    run_with_config(config).await
}

/// Defaults when `path` does not exist; a malformed file is an error.
pub fn load_config_file(path: &Path) -> Result<GlobalConfig> {
    if !path.exists() {
        return Ok(GlobalConfig::default());
    }
    GlobalConfig::load_from(path)
        .with_context(|| format!("failed to load config `{}`", path.display()))
}

pub async fn run_with_config(config: GlobalConfig) -> Result<()> {
    let settings = config.settings().context("failed to resolve auto-commit settings")?;
    let document = config.document.path.clone().ok_or_else(|| {
        let location = global_config_path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "the config file".to_string());
        anyhow!("no document configured; set `[document] path` in {location}")
    })?;

    let mut service =
        AutoCommitService::new(settings, FileSource::new(document), Arc::new(TracingNotifier));
    service.start(&NoPrompt).await.context("auto-commit failed to start")?;
    serve_until_ctrl_c(&mut service).await
}

/// Keep the timer armed until Ctrl-C, then disarm it and wait for an
/// in-flight cycle.
pub async fn serve_until_ctrl_c<S: ContentSource + Clone>(
    service: &mut AutoCommitService<S>,
) -> Result<()> {
    let repo = service.settings().repository.clone();
    info!(
        path = %repo.local_path.display(),
        remote = %repo.remote_name,
        branch = %repo.branch,
        interval_secs = service.settings().interval.as_secs(),
        "auto-commit running"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    service.shutdown().await;
    Ok(())
}
