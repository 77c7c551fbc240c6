//! Output drainer
//!
//! A child whose stdout/stderr nobody reads stalls as soon as the pipe buffer
//! fills. The drainer owns the read end of the merged pipe and keeps it empty
//! until the child has exited, forwarding every byte to the diagnostic sink.
//! Read failures are reported and the loop keeps going: giving up would bring
//! the stall back.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use forkharness_utils::SharedCapture;
use tracing::{debug, error, trace, warn};

use crate::process::ChildSlot;

const READ_CHUNK: usize = 8192;

/// Where drained child output is forwarded. Defaults to the parent's stderr.
#[derive(Clone)]
pub struct DiagnosticSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl DiagnosticSink {
    #[must_use]
    pub fn stderr() -> Self {
        Self::from_writer(io::stderr())
    }

    /// Discard forwarded output. The captured copy is still kept.
    #[must_use]
    pub fn discard() -> Self {
        Self::from_writer(io::sink())
    }

    #[must_use]
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    fn forward(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        writer.write_all(data)?;
        writer.flush()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticSink").finish_non_exhaustive()
    }
}

/// Result of one pass over the pipe.
#[derive(Debug, PartialEq, Eq)]
enum Pass {
    /// Nothing more is available right now.
    Drained(usize),
    /// Every writer has closed the pipe.
    Closed(usize),
}

pub(crate) struct OutputDrainer<R> {
    pid: u32,
    reader: R,
    slot: Arc<ChildSlot>,
    sink: DiagnosticSink,
    capture: SharedCapture,
    interval: Duration,
    closed: bool,
}

impl<R: Read + Send + 'static> OutputDrainer<R> {
    pub(crate) fn new(
        pid: u32,
        reader: R,
        slot: Arc<ChildSlot>,
        sink: DiagnosticSink,
        capture: SharedCapture,
        interval: Duration,
    ) -> Self {
        Self {
            pid,
            reader,
            slot,
            sink,
            capture,
            interval,
            closed: false,
        }
    }

    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("drain-{}", self.pid))
            .spawn(move || self.run())
    }

    fn run(mut self) {
        debug!(pid = self.pid, interval_ms = self.interval.as_millis() as u64, "drainer started");
        loop {
            match self.slot.try_wait() {
                Ok(Some(status)) => {
                    self.drain_remaining();
                    debug!(pid = self.pid, %status, "child exited, drainer stopping");
                    return;
                }
                Ok(None) => {}
                Err(e) => warn!(pid = self.pid, error = %e, "failed to query child status"),
            }

            if !self.closed
                && let Err(e) = self.pass()
            {
                self.report(&e);
            }
            thread::sleep(self.interval);
        }
    }

    // Whatever the child wrote right before exiting is still in the pipe.
    fn drain_remaining(&mut self) {
        while !self.closed {
            match self.pass() {
                Ok(Pass::Drained(_)) => break,
                Ok(Pass::Closed(_)) => {}
                Err(e) => {
                    self.report(&e);
                    break;
                }
            }
        }
    }

    /// Read everything currently available and forward it.
    fn pass(&mut self) -> io::Result<Pass> {
        let mut buf = [0u8; READ_CHUNK];
        let mut total = 0;
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    self.closed = true;
                    return Ok(Pass::Closed(total));
                }
                Ok(n) => {
                    total += n;
                    self.capture.append(&buf[..n]);
                    self.sink.forward(&buf[..n])?;
                    trace!(pid = self.pid, bytes = n, "forwarded child output");
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Pass::Drained(total)),
                Err(e) => return Err(e),
            }
        }
    }

    fn report(&self, e: &io::Error) {
        error!(pid = self.pid, error = %e, "error reading from process streams");
        let _ = self
            .sink
            .forward(format!("Error reading from process streams: {e:?}\n").as_bytes());
    }
}

/// Switch the read end to non-blocking so a pass returns once the pipe is
/// empty instead of waiting for more output.
#[cfg(unix)]
pub(crate) fn set_nonblocking(fd: std::os::fd::BorrowedFd<'_>) -> io::Result<()> {
    use nix::fcntl::{FcntlArg, OFlag, fcntl};

    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(io::Error::from)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;
    Ok(())
}
