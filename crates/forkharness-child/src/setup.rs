use std::fs::OpenOptions;
use std::path::Path;

use tracing::debug;

use crate::args::ForkedArgs;
use crate::error::ChildError;
use crate::watchdog::Watchdog;

/// Child entry hook: signal readiness, then arm the watchdog.
///
/// Call this before the work the parent wants to know has started. Returns the
/// armed watchdog, if any.
pub fn setup(args: &ForkedArgs) -> Result<Option<Watchdog>, ChildError> {
    let sync_path = args.sync_path();
    debug!(sync_path = ?sync_path, "forked: syncing");

    if let Some(path) = sync_path {
        signal_ready(&path)?;
    }

    args.kill_after()?
        .map(|delay| Watchdog::arm(delay).map_err(ChildError::Watchdog))
        .transpose()
}

/// Create the empty readiness marker at `path`, including parent directories.
/// An existing marker is left as is.
pub fn signal_ready(path: &Path) -> Result<(), ChildError> {
    let marker_error = |source| ChildError::Marker {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(marker_error)?;
    }
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(marker_error)?;

    debug!(path = %path.display(), "readiness marker created");
    Ok(())
}
