// Pull → add → commit → push for one snapshot file.
//
// Steps run strictly in that order and the first failure ends the sequence.
// A failed push leaves the commit in local history; the next cycle's pull
// reconciles.

use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

use autosnap_common::naming::commit_message;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::worker::{CommandExecutor, GitWorker, GitWorkerError, ProcessCommandExecutor};
use crate::config::AutoCommitSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    Pull,
    Stage,
    Commit,
    Push,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStage::Pull => "pull",
            SyncStage::Stage => "stage",
            SyncStage::Commit => "commit",
            SyncStage::Push => "push",
        }
    }
}

impl Display for SyncStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Committed and pushed; `commit` is the new `HEAD`.
    Success { commit: String },
    Failure { stage: SyncStage, cause: GitWorkerError },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success { .. })
    }

    pub fn failed_stage(&self) -> Option<SyncStage> {
        match self {
            SyncOutcome::Success { .. } => None,
            SyncOutcome::Failure { stage, .. } => Some(*stage),
        }
    }

    fn failure(stage: SyncStage, cause: GitWorkerError) -> Self {
        SyncOutcome::Failure { stage, cause }
    }
}

#[derive(Debug, Clone)]
pub struct SyncCommitter<E = ProcessCommandExecutor> {
    worker: GitWorker<E>,
    remote: String,
    branch: String,
    pull_timeout: Option<Duration>,
    push_timeout: Option<Duration>,
}

impl<E: CommandExecutor> SyncCommitter<E> {
    pub fn new(worker: GitWorker<E>, settings: &AutoCommitSettings) -> Self {
        Self {
            worker,
            remote: settings.repository.remote_name.clone(),
            branch: settings.repository.branch.clone(),
            pull_timeout: settings.pull_timeout,
            push_timeout: settings.push_timeout,
        }
    }

    pub fn worker(&self) -> &GitWorker<E> {
        &self.worker
    }

    /// Commit `file` (captured at `timestamp`) and publish it to the remote.
    pub async fn run(&self, file: &Path, timestamp: DateTime<Utc>) -> SyncOutcome {
        let pathspec = self.pathspec(file);

        match self.worker.pull(&self.remote, &self.branch, self.pull_timeout).await {
            Ok(_) => debug!(remote = %self.remote, branch = %self.branch, "pulled"),
            Err(error) if error.is_missing_remote_ref() => {
                debug!(remote = %self.remote, branch = %self.branch, "remote branch absent, nothing to pull");
            }
            Err(error) => {
                warn!(error = %error, "pull failed, skipping commit");
                return SyncOutcome::failure(SyncStage::Pull, error);
            }
        }

        if let Err(error) = self.worker.add(&[pathspec.as_str()]).await {
            warn!(file = %pathspec, error = %error, "git add failed");
            return SyncOutcome::failure(SyncStage::Stage, error);
        }

        let message = commit_message(timestamp);
        if let Err(error) = self.worker.commit_paths(&message, &[pathspec.as_str()]).await {
            warn!(file = %pathspec, error = %error, "git commit failed");
            return SyncOutcome::failure(SyncStage::Commit, error);
        }
        let commit = match self.worker.head_commit().await {
            Ok(commit) => commit,
            Err(error) => return SyncOutcome::failure(SyncStage::Commit, error),
        };

        if let Err(error) = self.worker.push(&self.remote, &self.branch, self.push_timeout).await {
            warn!(%commit, error = %error, "push failed, commit kept locally");
            return SyncOutcome::failure(SyncStage::Push, error);
        }

        info!(file = %pathspec, %commit, "snapshot committed and pushed");
        SyncOutcome::Success { commit }
    }

    /// Path of `file` relative to the repository root when it lives inside it.
    fn pathspec(&self, file: &Path) -> String {
        file.strip_prefix(self.worker.repo_path())
            .unwrap_or(file)
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use autosnap_common::repo::RepoName;
    use chrono::TimeZone;

    use super::*;
    use crate::config::RepositoryConfig;
    use crate::git::worker::tests::{fail, ok, MockExecutor};

    const FILE: &str = "/tmp/repo/committed_file_2024-05-01T09-30-05.txt";

    fn settings(push_timeout: Option<Duration>) -> AutoCommitSettings {
        AutoCommitSettings {
            repository: RepositoryConfig {
                local_path: PathBuf::from("/tmp/repo"),
                remote_name: "origin".into(),
                owner_repo: RepoName::NotConfigured,
                branch: "main".into(),
                host: "github.com".into(),
            },
            interval: Duration::from_secs(600),
            pull_timeout: None,
            push_timeout,
        }
    }

    fn committer(mock: &MockExecutor) -> SyncCommitter<MockExecutor> {
        SyncCommitter::new(GitWorker::with_executor("/tmp/repo", mock.clone()), &settings(None))
    }

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap()
    }

    #[tokio::test]
    async fn success_runs_steps_in_order() {
        let mock = MockExecutor::new(vec![ok(""), ok(""), ok(""), ok("abc123\n"), ok("")]);

        let outcome = committer(&mock).run(Path::new(FILE), timestamp()).await;

        assert_eq!(outcome, SyncOutcome::Success { commit: "abc123".into() });
        assert_eq!(mock.subcommands(), vec!["pull", "add", "commit", "rev-parse", "push"]);
        let calls = mock.calls();
        assert_eq!(calls[0].args, vec!["pull", "--no-rebase", "--no-edit", "origin", "main"]);
        assert_eq!(calls[1].args, vec!["add", "--", "committed_file_2024-05-01T09-30-05.txt"]);
        assert_eq!(
            calls[2].args,
            vec![
                "commit",
                "-m",
                "Auto-commit at 2024-05-01T09:30:05Z",
                "--",
                "committed_file_2024-05-01T09-30-05.txt",
            ]
        );
        assert_eq!(calls[4].args, vec!["push", "origin", "main"]);
    }

    #[tokio::test]
    async fn pull_failure_skips_commit_and_push() {
        let mock = MockExecutor::new(vec![fail("fatal: unable to access 'https://github.com/'")]);

        let outcome = committer(&mock).run(Path::new(FILE), timestamp()).await;

        assert_eq!(outcome.failed_stage(), Some(SyncStage::Pull));
        assert_eq!(mock.subcommands(), vec!["pull"]);
    }

    #[tokio::test]
    async fn missing_remote_branch_is_not_a_pull_failure() {
        let mock = MockExecutor::new(vec![
            fail("fatal: couldn't find remote ref main"),
            ok(""),
            ok(""),
            ok("abc123\n"),
            ok(""),
        ]);

        let outcome = committer(&mock).run(Path::new(FILE), timestamp()).await;

        assert!(outcome.is_success());
        assert_eq!(mock.subcommands(), vec!["pull", "add", "commit", "rev-parse", "push"]);
    }

    #[tokio::test]
    async fn add_failure_is_stage_failure_without_commit() {
        let mock = MockExecutor::new(vec![ok(""), fail("fatal: pathspec did not match any files")]);

        let outcome = committer(&mock).run(Path::new(FILE), timestamp()).await;

        assert_eq!(outcome.failed_stage(), Some(SyncStage::Stage));
        assert_eq!(mock.subcommands(), vec!["pull", "add"]);
    }

    #[tokio::test]
    async fn commit_failure_skips_push() {
        let mock = MockExecutor::new(vec![
            ok(""),
            ok(""),
            fail("Author identity unknown\n*** Please tell me who you are."),
        ]);

        let outcome = committer(&mock).run(Path::new(FILE), timestamp()).await;

        match outcome {
            SyncOutcome::Failure { stage: SyncStage::Commit, cause } => {
                assert!(cause.to_string().contains("Author identity unknown"));
            }
            other => panic!("expected commit failure, got {other:?}"),
        }
        assert_eq!(mock.subcommands(), vec!["pull", "add", "commit"]);
    }

    #[tokio::test]
    async fn push_failure_is_reported_after_commit() {
        let mock = MockExecutor::new(vec![
            ok(""),
            ok(""),
            ok(""),
            ok("abc123\n"),
            fail("! [rejected] main -> main (fetch first)"),
        ]);

        let outcome = committer(&mock).run(Path::new(FILE), timestamp()).await;

        assert_eq!(outcome.failed_stage(), Some(SyncStage::Push));
        assert_eq!(mock.subcommands(), vec!["pull", "add", "commit", "rev-parse", "push"]);
    }

    #[tokio::test(start_paused = true)]
    async fn push_timeout_is_push_failure() {
        let mock = MockExecutor::new(vec![ok(""), ok(""), ok(""), ok("abc123\n"), ok("")])
            .with_delays(vec![
                Duration::ZERO,
                Duration::ZERO,
                Duration::ZERO,
                Duration::ZERO,
                Duration::from_secs(3600),
            ]);
        let committer = SyncCommitter::new(
            GitWorker::with_executor("/tmp/repo", mock.clone()),
            &settings(Some(Duration::from_secs(120))),
        );

        let outcome = committer.run(Path::new(FILE), timestamp()).await;

        match outcome {
            SyncOutcome::Failure { stage: SyncStage::Push, cause } => assert!(cause.is_timeout()),
            other => panic!("expected push timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_outside_repository_is_passed_as_is() {
        let mock = MockExecutor::new(vec![ok(""), fail("fatal: outside repository")]);

        let outcome = committer(&mock).run(Path::new("/elsewhere/snap.txt"), timestamp()).await;

        assert_eq!(outcome.failed_stage(), Some(SyncStage::Stage));
        assert_eq!(mock.calls()[1].args, vec!["add", "--", "/elsewhere/snap.txt"]);
    }

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(SyncStage::Pull.to_string(), "pull");
        assert_eq!(SyncStage::Push.to_string(), "push");
    }
}
