use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use forkharness_classpath::ClasspathError;
use thiserror::Error;

use crate::process::LaunchedProcess;

/// Errors from building a classpath or launching a child.
///
/// Variants raised after the child started carry it, so the caller can still
/// inspect its output or destroy it.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to start '{program}': {source}")]
    Spawn { program: String, source: io::Error },

    #[error("No executable to launch: {reason}")]
    NoExecutable { reason: String },

    #[error(transparent)]
    Classpath(#[from] ClasspathError),

    #[error("Interrupted while waiting for readiness marker {}", .path.display())]
    Interrupted {
        path: PathBuf,
        process: Box<LaunchedProcess>,
    },

    #[error(
        "Readiness marker {} did not appear within {} ms; child was killed",
        .path.display(),
        .waited.as_millis()
    )]
    ReadinessTimeout { path: PathBuf, waited: Duration },

    #[error("Child exited with {status} before creating readiness marker {}", .path.display())]
    ExitedBeforeReady {
        path: PathBuf,
        status: ExitStatus,
        process: Box<LaunchedProcess>,
    },
}

impl LaunchError {
    /// The started child, for errors raised after launch.
    #[must_use]
    pub fn into_process(self) -> Option<LaunchedProcess> {
        match self {
            Self::Interrupted { process, .. } | Self::ExitedBeforeReady { process, .. } => {
                Some(*process)
            }
            _ => None,
        }
    }
}
