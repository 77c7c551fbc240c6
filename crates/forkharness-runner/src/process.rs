use std::fmt;
use std::io;
use std::process::{Child, ExitStatus};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use forkharness_utils::SharedCapture;
use tracing::{debug, warn};

/// How often `wait` re-checks the child.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The OS child shared by the caller and the drainer.
///
/// Exit is only ever observed through `try_wait`. A blocking `Child::wait`
/// under the lock would starve the drainer, and a child blocked on a full
/// pipe would then never exit.
pub(crate) struct ChildSlot {
    child: Mutex<Child>,
    status: OnceLock<ExitStatus>,
}

impl ChildSlot {
    pub(crate) fn new(child: Child) -> Self {
        Self {
            child: Mutex::new(child),
            status: OnceLock::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn try_wait(&self) -> io::Result<Option<ExitStatus>> {
        if let Some(status) = self.status.get() {
            return Ok(Some(*status));
        }
        match self.lock().try_wait()? {
            Some(status) => Ok(Some(*self.status.get_or_init(|| status))),
            None => Ok(None),
        }
    }

    pub(crate) fn kill(&self) -> io::Result<()> {
        if self.status.get().is_some() {
            return Ok(());
        }
        self.lock().kill()
    }
}

/// A running (or finished) forked child.
///
/// The merged output is drained on a background thread for the whole life of
/// the child. [`LaunchedProcess::wait`] returns only once that thread has
/// forwarded everything the child wrote.
pub struct LaunchedProcess {
    pid: u32,
    slot: Arc<ChildSlot>,
    drainer: Mutex<Option<JoinHandle<()>>>,
    output: SharedCapture,
}

impl LaunchedProcess {
    pub(crate) fn new(
        pid: u32,
        slot: Arc<ChildSlot>,
        drainer: JoinHandle<()>,
        output: SharedCapture,
    ) -> Self {
        Self {
            pid,
            slot,
            drainer: Mutex::new(Some(drainer)),
            output,
        }
    }

    /// OS process id of the child.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.pid
    }

    /// Exit status if the child has already exited, without blocking.
    ///
    /// Once observed, the status is cached and returned by every later call.
    pub fn try_wait(&self) -> io::Result<Option<ExitStatus>> {
        self.slot.try_wait()
    }

    /// Block until the child exits and its output has been fully drained.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use forkharness_runner::ForkLauncher;
    ///
    /// let child = ForkLauncher::new().run()?;
    /// let status = child.wait()?;
    /// println!("{status}: {}", child.output_string());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn wait(&self) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = self.slot.try_wait()? {
                self.join_drainer();
                return Ok(status);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.slot.try_wait()? {
                self.join_drainer();
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(WAIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Forcibly terminate the child. A child that already exited is left alone.
    pub fn kill(&self) -> io::Result<()> {
        debug!(pid = self.pid, "killing child");
        self.slot.kill()
    }

    /// Most recent merged output captured so far.
    #[must_use]
    pub fn output(&self) -> &SharedCapture {
        &self.output
    }

    /// Captured output as text, invalid UTF-8 replaced.
    #[must_use]
    pub fn output_string(&self) -> String {
        self.output.to_string_lossy()
    }

    fn join_drainer(&self) {
        let handle = self
            .drainer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!(pid = self.pid, "output drainer panicked");
        }
    }
}

impl fmt::Debug for LaunchedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedProcess")
            .field("pid", &self.pid)
            .field("status", &self.slot.status.get())
            .finish_non_exhaustive()
    }
}
