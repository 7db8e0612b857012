//! Command line interface module
//!
//! Argument parsing with environment fallbacks, the resolved [`SyncConfig`]
//! and the [`Runner`] that executes a subcommand.

pub mod args;
pub mod config;
pub mod runner;

pub use args::{Args, Command, SyncArgs, TagsArgs};
pub use config::SyncConfig;
pub use runner::{Outcome, Runner, run_pass};
