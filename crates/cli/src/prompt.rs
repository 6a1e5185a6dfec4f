// Interactive repository-name prompt.

use std::io::{self, BufRead, Write};

use autosnap_daemon::autocommit::RepoPrompt;

const REPOSITORY_PROMPT: &str =
    "Please enter the GitHub repository name (e.g., your-username/your-repo): ";

/// Asks on stderr and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl RepoPrompt for StdinPrompt {
    fn ask_repository(&self) -> Option<String> {
        ask(&mut io::stdin().lock(), &mut io::stderr())
    }
}

/// `None` on end of input or a read error; otherwise the trimmed line.
fn ask<R: BufRead, W: Write>(input: &mut R, prompt_out: &mut W) -> Option<String> {
    let _ = write!(prompt_out, "{REPOSITORY_PROMPT}");
    let _ = prompt_out.flush();

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}
