//! Names shared between the launcher and the forked child.
//!
//! The launcher passes harness settings as `-D<name>=<value>` properties and
//! the child reads them back once at entry. Both sides must agree on these.

/// Property carrying the readiness-marker path.
pub const SYNC_PATH_PROPERTY: &str = "fork.syncPath";

/// Property carrying the self-destruct delay in milliseconds.
pub const KILL_AFTER_PROPERTY: &str = "fork.killAfter";

/// Flag enabling remote debugging.
pub const DEBUG_FLAG: &str = "-Xdebug";

/// Prefix of the remote-debug agent flag; the port follows `address=`.
pub const JDWP_PREFIX: &str = "-Xrunjdwp:";

/// Format a property as a command-line define.
#[must_use]
pub fn define(name: &str, value: impl std::fmt::Display) -> String {
    format!("-D{name}={value}")
}

/// Build the suspend-on-start remote-debug flag for `port`.
#[must_use]
pub fn jdwp_flag(port: u16) -> String {
    format!("{JDWP_PREFIX}transport=dt_socket,server=y,suspend=y,address={port}")
}

/// Split a `-Dname=value` argument. Returns `None` for anything else.
///
/// A define without `=` yields an empty value.
#[must_use]
pub fn parse_define(arg: &str) -> Option<(&str, &str)> {
    let body = arg.strip_prefix("-D")?;
    if body.is_empty() {
        return None;
    }
    Some(body.split_once('=').unwrap_or((body, "")))
}

/// Extract the port from a `-Xrunjdwp:` flag.
#[must_use]
pub fn parse_jdwp_port(arg: &str) -> Option<u16> {
    arg.strip_prefix(JDWP_PREFIX)?
        .split(',')
        .find_map(|opt| opt.strip_prefix("address="))
        .and_then(|port| port.parse().ok())
}
