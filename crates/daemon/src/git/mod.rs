// Git plumbing: command worker, repository bootstrap, per-tick sync.

pub mod repository;
pub mod sync;
pub mod worker;
