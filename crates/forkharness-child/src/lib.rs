//! Child side of the fork harness
//!
//! A forked program parses the launcher's command line with [`ForkedArgs`],
//! then calls [`setup`] before doing anything the parent waits for. `setup`
//! creates the readiness marker (when one was requested) and arms the
//! self-destruct [`Watchdog`] (when a kill-after delay was given).
//! [`EntryPoints`] wraps both steps for programs hosting several entries.

mod args;
mod dispatch;
mod error;
pub mod exit_codes;
mod setup;
mod watchdog;

pub use args::ForkedArgs;
pub use dispatch::{EntryFn, EntryPoints, ForkContext};
pub use error::ChildError;
pub use setup::{setup, signal_ready};
pub use watchdog::Watchdog;
