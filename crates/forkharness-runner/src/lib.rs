//! Parent side of the fork harness
//!
//! [`ForkLauncher`] builds the child command line, spawns the child with its
//! stderr merged into stdout, hands the output pipe to a dedicated drainer
//! thread and, when a readiness marker is configured, blocks until the child
//! has signalled it is ready.
//!
//! # Security Model
//!
//! All process execution goes through [`CommandSpec`], which keeps arguments
//! as discrete elements. No shell is ever involved.

mod command_spec;
mod drain;
mod error;
mod launcher;
mod process;
mod readiness;

pub use command_spec::CommandSpec;
pub use drain::DiagnosticSink;
pub use error::LaunchError;
pub use launcher::ForkLauncher;
pub use process::LaunchedProcess;
pub use readiness::InterruptHandle;
