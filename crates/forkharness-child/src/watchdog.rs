//! Self-destruct timer
//!
//! Once armed, the watchdog terminates the whole process after its delay,
//! whatever the main logic is doing at that moment. There is no way to cancel
//! it. A child that finishes first simply exits and the timer dies with it.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::exit_codes;

/// An armed, non-cancellable self-destruct timer.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    delay: Duration,
    armed_at: Instant,
}

impl Watchdog {
    /// Exit the process with [`exit_codes::WATCHDOG`] after `delay`.
    pub fn arm(delay: Duration) -> io::Result<Self> {
        Self::arm_with(delay, move || {
            warn!(delay_ms = delay.as_millis() as u64, "watchdog expired, terminating process");
            std::process::exit(exit_codes::WATCHDOG);
        })
    }

    pub(crate) fn arm_with<F>(delay: Duration, on_expiry: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let armed_at = Instant::now();
        thread::Builder::new()
            .name("self-destruct".to_string())
            .spawn(move || {
                thread::sleep(delay);
                on_expiry();
            })?;
        debug!(delay_ms = delay.as_millis() as u64, "watchdog armed");
        Ok(Self { delay, armed_at })
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The instant after which the process will not be running.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.armed_at + self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_expiry_fires_after_delay() {
        let (tx, rx) = mpsc::channel();
        let started = Instant::now();
        let watchdog = Watchdog::arm_with(Duration::from_millis(50), move || {
            let _ = tx.send(Instant::now());
        })
        .unwrap();

        let fired_at = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(fired_at.duration_since(started) >= Duration::from_millis(50));
        assert!(fired_at >= watchdog.deadline());
        assert_eq!(watchdog.delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_dropping_the_handle_does_not_cancel() {
        let (tx, rx) = mpsc::channel();
        drop(
            Watchdog::arm_with(Duration::from_millis(10), move || {
                let _ = tx.send(());
            })
            .unwrap(),
        );
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
