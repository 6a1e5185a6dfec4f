// autosnap-daemon library entry point (used by the CLI).

pub mod autocommit;
pub mod config;
pub mod git;
pub mod notify;
pub mod runtime;
pub mod scheduler;
pub mod snapshot;
