//! Logging setup for forkharness binaries
//!
//! Both the parent (launcher CLI, test drivers) and forked children log through
//! `tracing`. Output always goes to stderr: in a child, stderr is merged into
//! the drained output pipe, so child logs surface in the parent's diagnostics.

use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Check if colored output should be used.
///
/// Returns true only if stderr is a terminal and `NO_COLOR` is not set.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Build the default filter directive when `RUST_LOG` is not set.
#[must_use]
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "forkharness=debug,fork_stub=debug,info"
    } else {
        "forkharness=info,fork_stub=info,warn"
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over the built-in directive. Calling this twice returns an
/// error from the second call, which callers in tests are free to ignore.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(use_color())
                .with_target(verbose)
                .with_thread_names(verbose)
                .with_line_number(false)
                .with_file(false)
                .compact(),
        )
        .try_init()?;

    Ok(())
}

/// Render a command line the way it is echoed before a launch: every part in
/// single quotes, separated by spaces.
#[must_use]
pub fn quote_command_line<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|part| format!("'{}'", part.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
