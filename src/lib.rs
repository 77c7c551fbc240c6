//! forkharness: run a program out of process from a test
//!
//! The parent side is [`ForkLauncher`]: it builds the command line (classpath,
//! debug flags, readiness marker, self-destruct delay), starts the child,
//! drains its merged output and optionally waits until the child signals
//! readiness. The child side is in [`child`]: it parses that command line and
//! honours the marker and watchdog requests.
//!
//! ```rust,no_run
//! use forkharness::ForkLauncher;
//!
//! let mut launcher = ForkLauncher::new();
//! launcher.set_entry_point("hello").set_sync_on("target/hello.sync");
//! let child = launcher.run()?;
//! assert!(child.wait()?.success());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;

pub use forkharness_child as child;
pub use forkharness_classpath as classpath;
pub use forkharness_config as config;

pub use forkharness_child::{EntryPoints, ForkContext, ForkedArgs};
pub use forkharness_classpath::{ClassName, ResourceLoader, SearchPathLoader};
pub use forkharness_config::{ConfigBuilder, HarnessConfig};
pub use forkharness_runner::{
    CommandSpec, DiagnosticSink, ForkLauncher, InterruptHandle, LaunchError, LaunchedProcess,
};
