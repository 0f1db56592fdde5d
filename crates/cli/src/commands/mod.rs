//! Subcommand implementations

pub mod join;
