// Git command runner scoped to one working directory.
//
// Every invocation goes through `CommandExecutor`. The process executor
// spawns children with `kill_on_drop`, so dropping a timed-out future also
// terminates the git process, and pins git's messages to the C locale so
// stderr matching (`is_missing_remote_ref`) holds under any user language.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitWorkerError {
    EmptyAddPaths,
    SpawnFailed { command: String, message: String },
    CommandFailed { command: String, code: Option<i32>, stderr: String },
    TimedOut { command: String, after: Duration },
}

impl GitWorkerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GitWorkerError::TimedOut { .. })
    }

    /// The remote has no such branch yet (e.g. a freshly created, empty repository).
    pub fn is_missing_remote_ref(&self) -> bool {
        match self {
            GitWorkerError::CommandFailed { stderr, .. } => {
                stderr.contains("couldn't find remote ref")
            }
            _ => false,
        }
    }
}

impl Display for GitWorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GitWorkerError::EmptyAddPaths => write!(f, "git add requires at least one path"),
            GitWorkerError::SpawnFailed { command, message } => {
                write!(f, "failed to run `{command}`: {message}")
            }
            GitWorkerError::CommandFailed { command, code, stderr } => {
                write!(f, "`{command}` failed with code {:?}: {}", code, stderr.trim())
            }
            GitWorkerError::TimedOut { command, after } => {
                write!(f, "`{command}` timed out after {}s", after.as_secs())
            }
        }
    }
}

impl Error for GitWorkerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> impl Future<Output = Result<CommandResult, std::io::Error>> + Send;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error> {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            // Never block on an interactive credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .env("LANGUAGE", "C")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GitWorker<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    executor: E,
}

impl GitWorker<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into(), executor: ProcessCommandExecutor }
    }
}

impl<E: CommandExecutor> GitWorker<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), executor }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub async fn init(&self) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["init".to_string()]).await
    }

    /// Point `HEAD` at `branch`, whatever git's default initial branch is.
    pub async fn set_head_branch(&self, branch: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec![
            "symbolic-ref".to_string(),
            "HEAD".to_string(),
            format!("refs/heads/{branch}"),
        ])
        .await
    }

    pub async fn remote_names(&self) -> Result<Vec<String>, GitWorkerError> {
        let output = self.run(vec!["remote".to_string()]).await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn remote_add(&self, name: &str, url: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["remote".to_string(), "add".to_string(), name.to_string(), url.to_string()])
            .await
    }

    pub async fn remote_url(&self, name: &str) -> Result<String, GitWorkerError> {
        let output =
            self.run(vec!["remote".to_string(), "get-url".to_string(), name.to_string()]).await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn add<S: AsRef<str>>(&self, paths: &[S]) -> Result<GitCommandOutput, GitWorkerError> {
        if paths.is_empty() {
            return Err(GitWorkerError::EmptyAddPaths);
        }

        let mut args = vec!["add".to_string(), "--".to_string()];
        args.extend(paths.iter().map(|path| path.as_ref().to_string()));
        self.run(args).await
    }

    /// Commit only the given paths, leaving anything else in the index untouched.
    pub async fn commit_paths<S: AsRef<str>>(
        &self,
        message: &str,
        paths: &[S],
    ) -> Result<GitCommandOutput, GitWorkerError> {
        if paths.is_empty() {
            return Err(GitWorkerError::EmptyAddPaths);
        }

        let mut args =
            vec!["commit".to_string(), "-m".to_string(), message.to_string(), "--".to_string()];
        args.extend(paths.iter().map(|path| path.as_ref().to_string()));
        self.run(args).await
    }

    pub async fn head_commit(&self) -> Result<String, GitWorkerError> {
        let output = self.run(vec!["rev-parse".to_string(), "HEAD".to_string()]).await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn pull(
        &self,
        remote: &str,
        branch: &str,
        timeout: Option<Duration>,
    ) -> Result<GitCommandOutput, GitWorkerError> {
        let args = vec![
            "pull".to_string(),
            "--no-rebase".to_string(),
            "--no-edit".to_string(),
            remote.to_string(),
            branch.to_string(),
        ];
        self.run_with_timeout(args, timeout).await
    }

    pub async fn push(
        &self,
        remote: &str,
        branch: &str,
        timeout: Option<Duration>,
    ) -> Result<GitCommandOutput, GitWorkerError> {
        let args = vec!["push".to_string(), remote.to_string(), branch.to_string()];
        self.run_with_timeout(args, timeout).await
    }

    async fn run_with_timeout(
        &self,
        args: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<GitCommandOutput, GitWorkerError> {
        let Some(limit) = timeout else {
            return self.run(args).await;
        };

        let command = format!("git {}", args.join(" "));
        match tokio::time::timeout(limit, self.run(args)).await {
            Ok(result) => result,
            Err(_) => Err(GitWorkerError::TimedOut { command, after: limit }),
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<GitCommandOutput, GitWorkerError> {
        let command = format!("git {}", args.join(" "));
        debug!(%command, cwd = %self.repo_path.display(), "running git");
        let result = self.executor.execute("git", &args, &self.repo_path).await.map_err(|error| {
            GitWorkerError::SpawnFailed { command: command.clone(), message: error.to_string() }
        })?;

        if result.success {
            return Ok(GitCommandOutput { stdout: result.stdout, stderr: result.stderr });
        }

        let stderr = if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };

        Err(GitWorkerError::CommandFailed { command, code: result.code, stderr })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct Invocation {
        pub program: String,
        pub args: Vec<String>,
        pub cwd: PathBuf,
    }

    /// Scripted executor shared by the git module tests.
    #[derive(Clone)]
    pub(crate) struct MockExecutor {
        calls: Arc<Mutex<Vec<Invocation>>>,
        responses: Arc<Mutex<VecDeque<Result<CommandResult, std::io::Error>>>>,
        delays: Arc<Mutex<VecDeque<Duration>>>,
    }

    impl MockExecutor {
        pub(crate) fn new(responses: Vec<Result<CommandResult, std::io::Error>>) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                responses: Arc::new(Mutex::new(VecDeque::from(responses))),
                delays: Arc::new(Mutex::new(VecDeque::new())),
            }
        }

        /// Delay the next responses by the given durations, in order.
        pub(crate) fn with_delays(self, delays: Vec<Duration>) -> Self {
            *self.delays.lock().expect("mock delays lock poisoned") = VecDeque::from(delays);
            self
        }

        pub(crate) fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().expect("mock calls lock poisoned").clone()
        }

        /// First argument of each recorded call (`pull`, `add`, ...).
        pub(crate) fn subcommands(&self) -> Vec<String> {
            self.calls().into_iter().map(|call| call.args[0].clone()).collect()
        }
    }

    impl CommandExecutor for MockExecutor {
        async fn execute(
            &self,
            program: &str,
            args: &[String],
            cwd: &Path,
        ) -> Result<CommandResult, std::io::Error> {
            self.calls.lock().expect("mock calls lock poisoned").push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
                cwd: cwd.to_path_buf(),
            });

            let delay = self.delays.lock().expect("mock delays lock poisoned").pop_front();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.responses
                .lock()
                .expect("mock responses lock poisoned")
                .pop_front()
                .expect("missing mock response")
        }
    }

    pub(crate) fn ok(stdout: &str) -> Result<CommandResult, std::io::Error> {
        Ok(CommandResult { success: true, code: Some(0), stdout: stdout.to_string(), stderr: String::new() })
    }

    pub(crate) fn fail(stderr: &str) -> Result<CommandResult, std::io::Error> {
        Ok(CommandResult {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    #[tokio::test]
    async fn init_runs_in_repo_path() {
        let mock = MockExecutor::new(vec![ok("Initialized empty Git repository\n")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());

        worker.init().await.expect("init should succeed");

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "git");
        assert_eq!(calls[0].args, vec!["init"]);
        assert_eq!(calls[0].cwd, PathBuf::from("/tmp/repo"));
    }

    #[tokio::test]
    async fn set_head_branch_uses_symbolic_ref() {
        let mock = MockExecutor::new(vec![ok("")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());

        worker.set_head_branch("main").await.expect("symbolic-ref should succeed");

        assert_eq!(mock.calls()[0].args, vec!["symbolic-ref", "HEAD", "refs/heads/main"]);
    }

    #[tokio::test]
    async fn remote_names_parses_one_name_per_line() {
        let mock = MockExecutor::new(vec![ok("origin\nupstream\n\n")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock);

        let names = worker.remote_names().await.expect("remote should succeed");
        assert_eq!(names, vec!["origin", "upstream"]);
    }

    #[tokio::test]
    async fn add_requires_at_least_one_path() {
        let mock = MockExecutor::new(Vec::new());
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());

        let error = worker.add::<&str>(&[]).await.expect_err("add should fail");
        assert_eq!(error, GitWorkerError::EmptyAddPaths);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn commit_paths_limits_commit_to_pathspec() {
        let mock = MockExecutor::new(vec![ok("[main abc123] Auto-commit\n")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());

        worker
            .commit_paths("Auto-commit at 2024-05-01T09:30:05Z", &["snap.txt"])
            .await
            .expect("commit should succeed");

        assert_eq!(
            mock.calls()[0].args,
            vec!["commit", "-m", "Auto-commit at 2024-05-01T09:30:05Z", "--", "snap.txt"]
        );
    }

    #[tokio::test]
    async fn pull_returns_command_failure_with_stderr() {
        let mock = MockExecutor::new(vec![fail("fatal: unable to access remote\n")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());

        let error = worker.pull("origin", "main", None).await.expect_err("pull should fail");
        assert_eq!(
            error,
            GitWorkerError::CommandFailed {
                command: "git pull --no-rebase --no-edit origin main".to_string(),
                code: Some(1),
                stderr: "fatal: unable to access remote\n".to_string(),
            }
        );
        assert!(!error.is_timeout());
        assert!(!error.is_missing_remote_ref());
    }

    #[tokio::test]
    async fn failure_falls_back_to_stdout_when_stderr_empty() {
        let mock = MockExecutor::new(vec![Ok(CommandResult {
            success: false,
            code: Some(1),
            stdout: "nothing to commit, working tree clean\n".to_string(),
            stderr: String::new(),
        })]);
        let worker = GitWorker::with_executor("/tmp/repo", mock);

        let error = worker.commit_paths("msg", &["a.txt"]).await.expect_err("commit should fail");
        assert!(error.to_string().contains("nothing to commit"));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let mock = MockExecutor::new(vec![Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "git not found",
        ))]);
        let worker = GitWorker::with_executor("/tmp/repo", mock);

        let error = worker.head_commit().await.expect_err("rev-parse should fail");
        assert_eq!(
            error,
            GitWorkerError::SpawnFailed {
                command: "git rev-parse HEAD".to_string(),
                message: "git not found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn missing_remote_ref_is_detected() {
        let mock = MockExecutor::new(vec![fail("fatal: couldn't find remote ref main\n")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock);

        let error = worker.pull("origin", "main", None).await.expect_err("pull should fail");
        assert!(error.is_missing_remote_ref());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_executor_pins_c_locale() {
        let script = r#"printf '%s|%s|%s' "$LC_ALL" "$LANGUAGE" "$GIT_TERMINAL_PROMPT""#;
        let result = ProcessCommandExecutor
            .execute("sh", &["-c".to_string(), script.to_string()], Path::new("."))
            .await
            .expect("sh should run");

        assert!(result.success);
        assert_eq!(result.stdout, "C|C|0");
    }

    #[tokio::test(start_paused = true)]
    async fn push_times_out_when_limit_elapses() {
        let mock =
            MockExecutor::new(vec![ok("")]).with_delays(vec![Duration::from_secs(600)]);
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());

        let error = worker
            .push("origin", "main", Some(Duration::from_secs(30)))
            .await
            .expect_err("push should time out");

        assert_eq!(
            error,
            GitWorkerError::TimedOut {
                command: "git push origin main".to_string(),
                after: Duration::from_secs(30),
            }
        );
        assert!(error.is_timeout());
        assert_eq!(error.to_string(), "`git push origin main` timed out after 30s");
    }

    #[tokio::test(start_paused = true)]
    async fn push_within_limit_succeeds() {
        let mock = MockExecutor::new(vec![ok("")]).with_delays(vec![Duration::from_secs(5)]);
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());

        worker
            .push("origin", "main", Some(Duration::from_secs(30)))
            .await
            .expect("push should finish before the limit");
        assert_eq!(mock.calls()[0].args, vec!["push", "origin", "main"]);
    }
}
