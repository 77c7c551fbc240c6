//! Parent side of the readiness handshake
//!
//! The child creates an empty marker file once it is initialized; the parent
//! polls for it and deletes it. There is no shared primitive across the
//! process boundary, so this is plain polling: a short delay that doubles up
//! to a cap, bounded by an optional timeout.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

const INITIAL_DELAY: Duration = Duration::from_millis(10);
const MAX_DELAY: Duration = Duration::from_millis(100);

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

/// Cancels a pending readiness wait from another thread.
///
/// The flag is consumed by the wait that observes it.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Why a readiness wait ended without the marker.
#[derive(Debug)]
pub(crate) enum NotReady {
    Interrupted,
    TimedOut(Duration),
    Exited(ExitStatus),
}

/// Waits for and consumes one readiness marker.
#[derive(Debug, Clone)]
pub(crate) struct ReadinessGate {
    path: PathBuf,
    timeout: Option<Duration>,
    interrupt: InterruptHandle,
}

impl ReadinessGate {
    /// `timeout = None` waits as long as the child keeps running.
    #[must_use]
    pub(crate) fn new(path: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            path: path.into(),
            timeout,
            interrupt: InterruptHandle::new(),
        }
    }

    #[must_use]
    pub(crate) fn with_interrupt(mut self, interrupt: InterruptHandle) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Poll until the marker exists, then delete it.
    ///
    /// `exited` is asked after every miss; a child that exits without ever
    /// creating the marker ends the wait. The marker is checked first, so a
    /// child that signals and exits immediately still counts as ready.
    pub(crate) fn wait<F>(&self, mut exited: F) -> Result<Duration, NotReady>
    where
        F: FnMut() -> Option<ExitStatus>,
    {
        let started = Instant::now();
        let mut delay = INITIAL_DELAY;
        debug!(path = %self.path.display(), "waiting for readiness marker");

        loop {
            if let Some(waited) = self.try_consume(started) {
                return Ok(waited);
            }
            if self.interrupt.take() {
                return Err(NotReady::Interrupted);
            }
            if let Some(status) = exited() {
                // The child may have signalled between the check above and exiting.
                return self
                    .try_consume(started)
                    .ok_or(NotReady::Exited(status));
            }

            let waited = started.elapsed();
            if let Some(timeout) = self.timeout {
                if waited >= timeout {
                    return Err(NotReady::TimedOut(waited));
                }
                delay = delay.min(timeout - waited);
            }

            trace!(path = %self.path.display(), delay_ms = delay.as_millis() as u64, "marker absent");
            thread::sleep(delay);
            delay = next_delay(delay);
        }
    }

    fn try_consume(&self, started: Instant) -> Option<Duration> {
        if !self.path.exists() {
            return None;
        }
        let waited = started.elapsed();
        self.consume();
        debug!(
            path = %self.path.display(),
            elapsed_ms = waited.as_millis() as u64,
            "child signalled readiness"
        );
        Some(waited)
    }

    // A failed delete leaves a stale marker behind for the next launch using
    // this path; the current launch is still ready.
    fn consume(&self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "failed to delete readiness marker");
        }
    }
}
