// Consistent exit codes for the autosnap CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   13 = network error

use std::process;

use autosnap_common::repo::RepoNameError;
use autosnap_daemon::autocommit::StartError;
use autosnap_daemon::git::worker::GitWorkerError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Network = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if cause.downcast_ref::<RepoNameError>().is_some() {
                return Self::Usage;
            }
            if let Some(start_err) = cause.downcast_ref::<StartError>() {
                if matches!(
                    start_err,
                    StartError::MissingRepositoryName | StartError::InvalidRepositoryName(_)
                ) {
                    return Self::Usage;
                }
            }
            if let Some(git_err) = cause.downcast_ref::<GitWorkerError>() {
                if git_err.is_timeout() {
                    return Self::Network;
                }
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                if io_err.kind() == std::io::ErrorKind::TimedOut {
                    return Self::Network;
                }
            }
        }

        let msg = format!("{err:#}").to_ascii_lowercase();
        if msg.contains("could not resolve host") || msg.contains("unable to access") {
            return Self::Network;
        }

        Self::Error
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
