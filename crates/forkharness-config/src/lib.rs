//! Configuration for the forkharness launcher
//!
//! Values are layered with precedence (highest first):
//! programmatic/CLI overrides > environment > config file > built-in defaults.
//! Every resolved key records the [`ConfigSource`] it came from so the CLI can
//! explain where a setting originated.
//!
//! ```toml
//! [launcher]
//! executable = "/usr/lib/jvm/default/bin/java"
//! readiness_timeout_ms = 60000   # 0 waits forever
//! drain_interval_ms = 100
//! capture_bytes = 1048576
//! ```

mod builder;
mod error;
mod model;

pub use builder::ConfigBuilder;
pub use error::ConfigError;
pub use model::{ConfigSource, HarnessConfig, LauncherSection};

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG: &str = "FORKHARNESS_CONFIG";
/// Environment override for the child executable.
pub const ENV_EXECUTABLE: &str = "FORKHARNESS_EXECUTABLE";
/// Environment override for the readiness timeout in ms (`0` = unbounded).
pub const ENV_READINESS_TIMEOUT_MS: &str = "FORKHARNESS_READINESS_TIMEOUT_MS";
/// Environment override for the drain polling interval in ms.
pub const ENV_DRAIN_INTERVAL_MS: &str = "FORKHARNESS_DRAIN_INTERVAL_MS";
/// Environment override for the output capture size in bytes.
pub const ENV_CAPTURE_BYTES: &str = "FORKHARNESS_CAPTURE_BYTES";

/// Config file picked up from the working directory when nothing else is set.
pub const DEFAULT_CONFIG_FILE: &str = "forkharness.toml";
