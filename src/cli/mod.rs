//! Command-line interface for forkharness
//!
//! - `args`: clap definitions
//! - `run`: entry point and command dispatch

pub mod args;
mod run;

pub use args::{Cli, Commands, RunArgs};
pub use run::{exit_code_of, forked_entry_points, is_forked_invocation, run};
