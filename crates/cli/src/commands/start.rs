// `autosnap start`: run the auto-commit loop in the foreground.

use std::sync::Arc;

use anyhow::Context;
use autosnap_daemon::autocommit::{AutoCommitService, StartStatus};
use autosnap_daemon::runtime::serve_until_ctrl_c;
use autosnap_daemon::snapshot::FileSource;
use clap::Args;
use tracing::info;

use super::{block_on, ConfigArgs};
use crate::output::{self, OutputFormat, TerminalNotifier};
use crate::prompt::StdinPrompt;

#[derive(Debug, Args)]
pub struct StartArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

pub fn run(args: StartArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.config.json);
    match block_on(start(&args.config, format)).and_then(|result| result) {
        Ok(()) => Ok(()),
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

async fn start(args: &ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = args.load()?;
    let document = config
        .document
        .path
        .clone()
        .context("no document configured")?;
    let settings = config.settings().context("failed to resolve auto-commit settings")?;

    let notifier = Arc::new(TerminalNotifier::new(format));
    let mut service = AutoCommitService::new(settings, FileSource::new(document), notifier);

    if service.start(&StdinPrompt).await? == StartStatus::AlreadyRunning {
        return Ok(());
    }

    if config.repository.is_none() {
        if let Some(repo) = service.repo_name().configured() {
            let path = args.persist_repository(repo)?;
            info!(path = %path.display(), repository = %repo, "saved repository name");
        }
    }

    serve_until_ctrl_c(&mut service).await
}
