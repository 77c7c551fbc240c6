use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default wait for a child's readiness marker.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(60);
/// Default pause between drain passes.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_millis(100);
/// Default size of the captured-output ring buffer.
pub const DEFAULT_CAPTURE_BYTES: usize = 1024 * 1024;

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Command-line flag.
    Cli,
    /// Set through [`crate::ConfigBuilder`] in code.
    Programmatic,
    /// `FORKHARNESS_*` environment variable.
    Env,
    /// Config file.
    Config,
    /// Built-in default.
    Default,
}

impl ConfigSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Programmatic => "programmatic",
            Self::Env => "env",
            Self::Config => "config",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk shape of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigFile {
    #[serde(default)]
    pub launcher: LauncherSection,
}

/// `[launcher]` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherSection {
    pub executable: Option<PathBuf>,
    pub readiness_timeout_ms: Option<u64>,
    pub drain_interval_ms: Option<u64>,
    pub capture_bytes: Option<usize>,
}

/// Resolved launcher settings.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Program to launch; `None` means re-enter the current executable.
    pub executable: Option<PathBuf>,
    /// Upper bound on the readiness wait; `None` waits forever.
    pub readiness_timeout: Option<Duration>,
    pub drain_interval: Duration,
    pub capture_bytes: usize,
    pub source_attribution: HashMap<&'static str, ConfigSource>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let source_attribution = [
            "executable",
            "readiness_timeout_ms",
            "drain_interval_ms",
            "capture_bytes",
        ]
        .into_iter()
        .map(|key| (key, ConfigSource::Default))
        .collect();

        Self {
            executable: None,
            readiness_timeout: Some(DEFAULT_READINESS_TIMEOUT),
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            capture_bytes: DEFAULT_CAPTURE_BYTES,
            source_attribution,
        }
    }
}

impl HarnessConfig {
    /// Effective configuration as `(key, value, source)` rows, sorted by key.
    #[must_use]
    pub fn effective_config(&self) -> Vec<(&'static str, String, ConfigSource)> {
        let source = |key: &str| {
            self.source_attribution
                .get(key)
                .copied()
                .unwrap_or(ConfigSource::Default)
        };

        let executable = self
            .executable
            .as_ref()
            .map_or_else(|| "<current executable>".to_string(), |p| p.display().to_string());
        let readiness = self
            .readiness_timeout
            .map_or_else(|| "unbounded".to_string(), |d| d.as_millis().to_string());

        let mut rows = vec![
            ("capture_bytes", self.capture_bytes.to_string(), source("capture_bytes")),
            (
                "drain_interval_ms",
                self.drain_interval.as_millis().to_string(),
                source("drain_interval_ms"),
            ),
            ("executable", executable, source("executable")),
            ("readiness_timeout_ms", readiness, source("readiness_timeout_ms")),
        ];
        rows.sort_by_key(|(key, _, _)| *key);
        rows
    }
}

/// Interpret a readiness timeout in milliseconds; zero means "no bound".
pub(crate) fn readiness_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
