//! Entry-point dispatch for programs that host several forked entries
//!
//! The launcher names the entry point on the command line; [`EntryPoints`]
//! looks it up, runs [`setup`](crate::setup) and hands the parsed arguments
//! to the registered handler. The handler's return value is the exit code.

use std::collections::BTreeMap;

use tracing::{debug, error};

use crate::args::ForkedArgs;
use crate::exit_codes;
use crate::setup::setup;
use crate::watchdog::Watchdog;

/// Handler for one entry point. The returned value becomes the exit code.
pub type EntryFn = fn(&ForkContext) -> anyhow::Result<i32>;

/// What a handler gets to see after setup.
#[derive(Debug)]
pub struct ForkContext {
    args: ForkedArgs,
    watchdog: Option<Watchdog>,
}

impl ForkContext {
    #[must_use]
    pub fn args(&self) -> &ForkedArgs {
        &self.args
    }

    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.args.entry_point
    }

    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.args.parameters
    }

    /// Parameter at `index`, or `None` past the end.
    #[must_use]
    pub fn parameter(&self, index: usize) -> Option<&str> {
        self.args.parameters.get(index).map(String::as_str)
    }

    /// The armed watchdog, when the parent asked for one.
    #[must_use]
    pub fn watchdog(&self) -> Option<&Watchdog> {
        self.watchdog.as_ref()
    }
}

#[derive(Debug, Default, Clone)]
pub struct EntryPoints {
    entries: BTreeMap<String, EntryFn>,
}

impl EntryPoints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any earlier registration.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, handler: EntryFn) -> Self {
        self.entries.insert(name.into(), handler);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Parse this process's arguments and dispatch them.
    #[must_use]
    pub fn run_from_env(&self) -> i32 {
        match ForkedArgs::from_env() {
            Ok(args) => self.dispatch(args),
            Err(e) => {
                error!(error = %e, "invalid command line");
                exit_codes::USAGE
            }
        }
    }

    /// Run the handler registered for `args.entry_point` and return the exit
    /// code. Setup happens only once the entry point is known, so a parent
    /// waiting on the marker sees an unknown entry as an early exit.
    #[must_use]
    pub fn dispatch(&self, args: ForkedArgs) -> i32 {
        let Some(handler) = self.entries.get(&args.entry_point).copied() else {
            error!(
                entry_point = %args.entry_point,
                known = ?self.entries.keys().collect::<Vec<_>>(),
                "unknown entry point"
            );
            return exit_codes::USAGE;
        };

        let watchdog = match setup(&args) {
            Ok(watchdog) => watchdog,
            Err(e) => {
                error!(entry_point = %args.entry_point, error = %e, "child setup failed");
                return exit_codes::FAILURE;
            }
        };

        let context = ForkContext { args, watchdog };
        debug!(
            entry_point = context.entry_point(),
            parameters = context.parameters().len(),
            "dispatching"
        );
        match handler(&context) {
            Ok(code) => code,
            Err(e) => {
                let message = format!("{e:#}");
                error!(entry_point = context.entry_point(), error = %message, "entry point failed");
                exit_codes::FAILURE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, bail};

    fn echo_count(ctx: &ForkContext) -> anyhow::Result<i32> {
        Ok(ctx.parameters().len() as i32)
    }

    fn parse_code(ctx: &ForkContext) -> anyhow::Result<i32> {
        let raw = ctx.parameter(0).context("missing exit code")?;
        raw.parse().context("exit code is not a number")
    }

    fn broken(_: &ForkContext) -> anyhow::Result<i32> {
        bail!("boom")
    }

    fn entries() -> EntryPoints {
        EntryPoints::new()
            .register("count", echo_count)
            .register("code", parse_code)
            .register("broken", broken)
    }

    fn dispatch(argv: &[&str]) -> i32 {
        entries().dispatch(ForkedArgs::parse(argv.iter().copied()).unwrap())
    }

    #[test]
    fn test_handler_return_value_is_exit_code() {
        assert_eq!(dispatch(&["count", "a", "b", "c"]), 3);
        assert_eq!(dispatch(&["code", "17"]), 17);
    }

    #[test]
    fn test_handler_error_is_failure() {
        assert_eq!(dispatch(&["broken"]), exit_codes::FAILURE);
        assert_eq!(dispatch(&["code", "x"]), exit_codes::FAILURE);
    }

    #[test]
    fn test_unknown_entry_point_is_usage_error_without_marker() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("run.sync");
        let define = format!("-Dfork.syncPath={}", marker.display());

        assert_eq!(dispatch(&[define.as_str(), "nope"]), exit_codes::USAGE);
        assert!(!marker.exists());
    }

    #[test]
    fn test_setup_runs_before_handler() {
        fn marker_exists(ctx: &ForkContext) -> anyhow::Result<i32> {
            let path = ctx.args().sync_path().context("no sync path")?;
            Ok(i32::from(path.exists()))
        }

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("run.sync");
        let define = format!("-Dfork.syncPath={}", marker.display());
        let args = ForkedArgs::parse([define.as_str(), "check"]).unwrap();

        let code = EntryPoints::new().register("check", marker_exists).dispatch(args);
        assert_eq!(code, 1);
    }

    #[test]
    fn test_setup_failure_skips_handler() {
        let args = ForkedArgs::parse(["-Dfork.killAfter=soon", "count", "x"]).unwrap();
        assert_eq!(entries().dispatch(args), exit_codes::FAILURE);
    }

    #[test]
    fn test_names_are_sorted() {
        let names: Vec<_> = entries().names().map(str::to_owned).collect();
        assert_eq!(names, ["broken", "code", "count"]);
    }
}
