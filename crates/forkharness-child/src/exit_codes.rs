//! Exit codes used by forked children.
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Entry point finished successfully |
//! | 1 | Entry point failed, setup failed, or the watchdog fired |
//! | 2 | Bad command line or unknown entry point |
//!
//! The watchdog shares code 1 with ordinary failures. A parent that needs to
//! tell them apart must have its entry points use their own codes.

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const WATCHDOG: i32 = 1;
pub const USAGE: i32 = 2;
