//! CLI entry point and dispatch logic

use std::ffi::OsStr;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use forkharness_child::{EntryPoints, exit_codes};
use forkharness_classpath::ClassName;
use forkharness_config::{ConfigBuilder, ConfigSource, HarnessConfig};
use forkharness_runner::{ForkLauncher, LaunchError};
use forkharness_utils::logging::init_tracing;
use tracing::{debug, info};

use super::args::{Cli, Commands, RunArgs};

/// Parse the command line, execute it and return the process exit code.
///
/// All output, errors included, is printed here. A harness command line
/// (see [`is_forked_invocation`]) means this binary was launched as a child
/// by a `ForkLauncher` with no other executable, and it dispatches as one.
#[must_use]
pub fn run() -> i32 {
    if is_forked_invocation(std::env::args_os().skip(1)) {
        return run_forked();
    }

    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_codes::FAILURE
        }
    }
}

/// True when `args` (program name excluded) start the way a launcher
/// command line does: with a classpath option.
pub fn is_forked_invocation<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter()
        .next()
        .is_some_and(|first| matches!(first.as_ref().to_str(), Some("-cp" | "-classpath")))
}

/// Entry points this binary serves when re-entered as a child.
#[must_use]
pub fn forked_entry_points() -> EntryPoints {
    EntryPoints::new().register(ForkLauncher::DEFAULT_ENTRY_POINT, |_| Ok(exit_codes::SUCCESS))
}

fn run_forked() -> i32 {
    // Child output is drained by the parent; keep it to warnings unless asked.
    let _ = init_tracing(false);
    forked_entry_points().run_from_env()
}

fn execute(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Config => {
            let config = load_config(cli.config.as_deref(), None)?;
            for (key, value, source) in config.effective_config() {
                println!("{key:<22} {value:<32} ({source})");
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Run(args) => run_child(cli.config.as_deref(), &args),
    }
}

fn load_config(file: Option<&Path>, run: Option<&RunArgs>) -> Result<HarnessConfig> {
    let mut builder = ConfigBuilder::new().override_source(ConfigSource::Cli);
    if let Some(path) = file {
        builder = builder.config_file(path);
    }
    if let Some(run) = run {
        if let Some(executable) = &run.executable {
            builder = builder.executable(executable);
        }
        if let Some(ms) = run.readiness_timeout_ms {
            builder = builder.readiness_timeout((ms > 0).then(|| Duration::from_millis(ms)));
        }
    }
    builder.build().context("failed to load configuration")
}

fn run_child(config_file: Option<&Path>, args: &RunArgs) -> Result<i32> {
    let config = load_config(config_file, Some(args))?;
    let mut launcher = ForkLauncher::with_config(config);

    if let Some(dir) = &args.workdir {
        launcher.set_working_directory(dir);
    }
    for entry in &args.classpath {
        launcher.add_classpath_file(entry);
    }
    for name in &args.classes {
        let class = ClassName::new(name.as_str())?;
        launcher.add_classpath_class_system(&class)?;
    }
    if let Some(port) = args.debug {
        launcher.debug(port);
    }
    if let Some(path) = &args.sync_on {
        launcher.set_sync_on(path);
    }
    if let Some(ms) = args.kill_after {
        launcher.set_kill_after(ms);
    }
    if let Some(entry) = &args.entry {
        launcher.set_entry_point(entry);
    }
    launcher.set_parameters(&args.args);
    debug!(classpath = ?launcher.classpath(), "launcher configured");

    let process = match launcher.run() {
        Ok(process) => process,
        Err(LaunchError::ExitedBeforeReady { status, path, .. }) => {
            eprintln!(
                "error: child exited with {status} before creating {}",
                path.display()
            );
            return Ok(nonzero(exit_code_of(status)));
        }
        Err(e) => return Err(e).context("launch failed"),
    };

    let status = process.wait().context("failed to wait for child")?;
    info!(pid = process.id(), %status, "child exited");
    Ok(exit_code_of(status))
}

/// Exit code to report for a finished child. A signal death maps to
/// `128 + signal`, the shell convention.
#[must_use]
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    exit_codes::FAILURE
}

fn nonzero(code: i32) -> i32 {
    if code == 0 { exit_codes::FAILURE } else { code }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkharness_child::ForkedArgs;
    #[cfg(unix)]
    use std::os::unix::process::ExitStatusExt;

    #[cfg(unix)]
    #[test]
    fn test_exit_code_of_normal_exit() {
        assert_eq!(exit_code_of(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code_of(ExitStatus::from_raw(3 << 8)), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_of_signal_death() {
        assert_eq!(exit_code_of(ExitStatus::from_raw(9)), 137);
    }

    #[test]
    fn test_harness_command_line_is_recognised() {
        assert!(is_forked_invocation(["-cp", "/x", "forkharness::ForkLauncher"]));
        assert!(is_forked_invocation(["-classpath", "/x", "entry"]));
        assert!(!is_forked_invocation(["run", "--cp", "/x"]));
        assert!(!is_forked_invocation(Vec::<&str>::new()));
    }

    #[test]
    fn test_default_entry_point_is_served() {
        let entries = forked_entry_points();
        assert!(entries.names().any(|n| n == ForkLauncher::DEFAULT_ENTRY_POINT));

        let args = ForkedArgs::parse(["-cp", "", ForkLauncher::DEFAULT_ENTRY_POINT]).unwrap();
        assert_eq!(entries.dispatch(args), exit_codes::SUCCESS);

        let unknown = ForkedArgs::parse(["-cp", "", "other"]).unwrap();
        assert_eq!(entries.dispatch(unknown), exit_codes::USAGE);
    }

    #[test]
    fn test_early_clean_exit_still_fails_the_run() {
        assert_eq!(nonzero(0), exit_codes::FAILURE);
        assert_eq!(nonzero(4), 4);
    }
}
