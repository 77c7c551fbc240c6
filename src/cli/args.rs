//! CLI argument definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// forkharness - launch a program out of process and wait for it
#[derive(Parser, Debug)]
#[command(name = "forkharness")]
#[command(about = "Launch a child process with readiness sync and a self-destruct timer")]
#[command(long_about = r#"
forkharness starts a child program with a harness command line, forwards its
combined output, and exits with the child's exit code.

EXAMPLES:
  # Run the stub's hello entry and wait for its readiness marker
  forkharness run --executable target/debug/fork-stub --sync-on target/hello.sync --entry hello

  # Kill the child if it is still running after two seconds
  forkharness run --executable target/debug/fork-stub --kill-after 2000 --entry hang

  # Show the effective configuration and where each value came from
  forkharness config

CONFIGURATION:
  Precedence: CLI flags > environment (FORKHARNESS_*) > config file > defaults.
  The config file is FORKHARNESS_CONFIG, or ./forkharness.toml when present.
  Use --config to specify an explicit config file path.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch a child, wait for it and exit with its exit code
    Run(RunArgs),

    /// Print the effective configuration with value sources
    Config,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Classpath entry, made absolute (repeatable)
    #[arg(long = "cp", value_name = "PATH")]
    pub classpath: Vec<PathBuf>,

    /// Add the classpath root this class is found under on CLASSPATH (repeatable)
    #[arg(long = "class", value_name = "NAME")]
    pub classes: Vec<String>,

    /// Working directory of the child
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Ask the child to accept a debugger on this port
    #[arg(long, value_name = "PORT")]
    pub debug: Option<u16>,

    /// Wait until the child creates this marker file
    #[arg(long, value_name = "PATH")]
    pub sync_on: Option<PathBuf>,

    /// Have the child terminate itself after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub kill_after: Option<u64>,

    /// Entry point the child dispatches on
    #[arg(long, value_name = "NAME")]
    pub entry: Option<String>,

    /// Program to launch (defaults to the current executable)
    #[arg(long, value_name = "PATH")]
    pub executable: Option<PathBuf>,

    /// Readiness wait bound in milliseconds; 0 waits forever
    #[arg(long, value_name = "MS")]
    pub readiness_timeout_ms: Option<u64>,

    /// Parameters passed to the entry point
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}
