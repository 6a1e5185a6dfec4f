// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` flag forces JSON output regardless of terminal.

use std::io::{self, IsTerminal, Write};

use autosnap_daemon::notify::{Notice, NoticeLevel, Notifier};
use serde::Serialize;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per line).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

/// Write a value to a provided writer (useful for testing).
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line =
                render_human_stderr_line("error", message, io::stderr().is_terminal(), ANSI_RED);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");
    let lower = message.to_ascii_lowercase();

    if lower.contains("without a repository name") {
        return (
            "REPOSITORY_REQUIRED",
            "Repository name is required. Pass --repo owner/repo or answer the prompt.".to_string(),
        );
    }

    if lower.contains("no document configured") {
        return (
            "DOCUMENT_REQUIRED",
            "No document to snapshot. Pass --document <PATH> or set [document] path in the config."
                .to_string(),
        );
    }

    if lower.contains("timed out")
        || lower.contains("could not resolve host")
        || lower.contains("unable to access")
    {
        return ("NETWORK_ERROR", format!("Could not reach the remote. {message}"));
    }

    if lower.contains("authentication failed") || lower.contains("permission denied") {
        return (
            "AUTH_FAILURE",
            format!("Authentication failed. Check your git credentials for the remote. {message}"),
        );
    }

    ("ERROR", message)
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}

// ── Notices ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct NoticeLine<'a> {
    level: &'static str,
    message: &'a str,
}

/// Shows auto-commit notices on the terminal: info on stdout, errors on
/// stderr, or one JSON object per notice.
#[derive(Debug, Clone, Copy)]
pub struct TerminalNotifier {
    format: OutputFormat,
}

impl TerminalNotifier {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        let message = notice.to_string();
        match (self.format, notice.level()) {
            (OutputFormat::Json, level) => {
                let line = NoticeLine { level: level_name(level), message: &message };
                let _ = write_output(&mut io::stdout().lock(), OutputFormat::Json, &line, |_| {
                    String::new()
                });
            }
            (OutputFormat::Human, NoticeLevel::Info) => {
                let is_tty = io::stdout().is_terminal();
                let _ = writeln!(io::stdout().lock(), "{}", render_notice(&message, is_tty));
            }
            (OutputFormat::Human, NoticeLevel::Error) => {
                let is_tty = io::stderr().is_terminal();
                let line = render_human_stderr_line("error", &message, is_tty, ANSI_RED);
                let _ = writeln!(io::stderr().lock(), "{line}");
            }
        }
    }
}

fn level_name(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "info",
        NoticeLevel::Error => "error",
    }
}

fn render_notice(message: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{ANSI_GREEN}autosnap:{ANSI_RESET} {message}")
    } else {
        format!("autosnap: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_tty_returns_human() {
        assert_eq!(OutputFormat::detect_from_terminal(true), OutputFormat::Human);
    }

    #[test]
    fn detect_pipe_returns_json() {
        assert_eq!(OutputFormat::detect_from_terminal(false), OutputFormat::Json);
    }

    #[test]
    fn detect_json_flag_overrides_tty() {
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
    }

    #[test]
    fn write_output_human_format() {
        #[derive(Serialize)]
        struct Info {
            repository: String,
        }
        let info = Info { repository: "octocat/notes".into() };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Human, &info, |i| format!("Repo: {}", i.repository))
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Repo: octocat/notes\n");
    }

    #[test]
    fn write_output_json_does_not_call_human_fn() {
        #[derive(Serialize)]
        struct Info {
            count: u32,
        }
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Json, &Info { count: 3 }, |_| {
            unreachable!("human_fn should not be called in JSON mode")
        })
        .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["count"], 3);
    }

    #[test]
    fn notice_line_serializes_level_and_message() {
        let line = NoticeLine { level: level_name(NoticeLevel::Error), message: "boom" };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Json, &line, |_| String::new()).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(String::from_utf8(buf).unwrap().trim()).unwrap();
        assert_eq!(parsed["level"], "error");
        assert_eq!(parsed["message"], "boom");
    }

    #[test]
    fn render_notice_is_plain_without_tty() {
        assert_eq!(render_notice("Auto-commit started!", false), "autosnap: Auto-commit started!");
        assert!(render_notice("x", true).contains(ANSI_GREEN));
    }

    #[test]
    fn render_human_error_uses_color_for_tty() {
        let line = render_human_stderr_line("error", "boom", true, ANSI_RED);
        assert!(line.contains(ANSI_RED));
        assert!(line.contains(ANSI_RESET));
        assert_eq!(render_human_stderr_line("error", "boom", false, ANSI_RED), "error: boom");
    }

    #[test]
    fn print_error_does_not_panic() {
        print_error(OutputFormat::Human, "TEST_ERR", "something broke");
        print_error(OutputFormat::Json, "TEST_ERR", "something broke");
    }

    #[test]
    fn actionable_error_missing_repository() {
        let err = anyhow::anyhow!("auto-commit cannot start without a repository name");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "REPOSITORY_REQUIRED");
        assert!(message.contains("--repo"));
    }

    #[test]
    fn actionable_error_missing_document() {
        let err = anyhow::anyhow!("no document configured");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "DOCUMENT_REQUIRED");
        assert!(message.contains("--document"));
    }

    #[test]
    fn actionable_error_network() {
        let err = anyhow::anyhow!("`git push origin main` timed out after 120s");
        assert_eq!(actionable_error(&err).0, "NETWORK_ERROR");

        let err = anyhow::anyhow!("fatal: unable to access 'https://github.com/o/r.git/'");
        assert_eq!(actionable_error(&err).0, "NETWORK_ERROR");
    }

    #[test]
    fn actionable_error_auth() {
        let err = anyhow::anyhow!("remote: Permission denied to octocat.");
        assert_eq!(actionable_error(&err).0, "AUTH_FAILURE");
    }

    #[test]
    fn actionable_error_passthrough() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(actionable_error(&err), ("ERROR", "something else".to_string()));
    }
}
