// autosnap-common: shared types for the autosnap workspace

pub mod naming;
pub mod repo;
