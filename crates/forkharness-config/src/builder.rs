use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::ConfigError;
use crate::model::{ConfigFile, ConfigSource, HarnessConfig, LauncherSection, readiness_from_ms};
use crate::{
    DEFAULT_CONFIG_FILE, ENV_CAPTURE_BYTES, ENV_CONFIG, ENV_DRAIN_INTERVAL_MS, ENV_EXECUTABLE,
    ENV_READINESS_TIMEOUT_MS,
};

/// Builder resolving a [`HarnessConfig`] from all layers.
///
/// Explicit setters win over everything else and are attributed to the
/// builder's override source ([`ConfigSource::Programmatic`] unless changed
/// with [`ConfigBuilder::override_source`]).
///
/// ```rust,no_run
/// use forkharness_config::ConfigBuilder;
/// use std::time::Duration;
///
/// let config = ConfigBuilder::new()
///     .readiness_timeout(Some(Duration::from_secs(5)))
///     .build()
///     .expect("valid config");
/// assert_eq!(config.readiness_timeout, Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config_file: Option<PathBuf>,
    skip_discovery: bool,
    override_source: Option<ConfigSource>,
    executable: Option<PathBuf>,
    readiness_timeout: Option<Option<Duration>>,
    drain_interval: Option<Duration>,
    capture_bytes: Option<usize>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load this file instead of discovering one. A missing file is an error.
    #[must_use]
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Ignore `FORKHARNESS_CONFIG` and `./forkharness.toml`.
    #[must_use]
    pub fn skip_discovery(mut self) -> Self {
        self.skip_discovery = true;
        self
    }

    /// Attribute explicit setters to `source` (e.g. [`ConfigSource::Cli`]).
    #[must_use]
    pub fn override_source(mut self, source: ConfigSource) -> Self {
        self.override_source = Some(source);
        self
    }

    /// Program to launch instead of the current executable.
    #[must_use]
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// `None` disables the bound on the readiness wait.
    #[must_use]
    pub fn readiness_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.readiness_timeout = Some(timeout);
        self
    }

    /// Pause between drain passes. Must be non-zero; sub-millisecond values
    /// are kept as given.
    #[must_use]
    pub fn drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = Some(interval);
        self
    }

    /// Size of the captured output window.
    #[must_use]
    pub fn capture_bytes(mut self, bytes: usize) -> Self {
        self.capture_bytes = Some(bytes);
        self
    }

    /// Resolve against the process environment.
    pub fn build(self) -> Result<HarnessConfig, ConfigError> {
        self.build_with_env(|key| std::env::var_os(key))
    }

    /// Resolve with an injected environment lookup.
    pub fn build_with_env<F>(self, env: F) -> Result<HarnessConfig, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut config = HarnessConfig::default();

        if let Some(section) = self.load_file(&env)? {
            apply_file(&mut config, section)?;
        }
        apply_env(&mut config, &env)?;

        let source = self.override_source.unwrap_or(ConfigSource::Programmatic);
        if let Some(executable) = self.executable {
            config.executable = Some(executable);
            config.source_attribution.insert("executable", source);
        }
        if let Some(timeout) = self.readiness_timeout {
            config.readiness_timeout = timeout;
            config.source_attribution.insert("readiness_timeout_ms", source);
        }
        if let Some(interval) = self.drain_interval {
            if interval.is_zero() {
                return Err(ConfigError::InvalidValue {
                    key: "drain_interval".to_string(),
                    value: "0 (must be non-zero)".to_string(),
                });
            }
            config.drain_interval = interval;
            config.source_attribution.insert("drain_interval_ms", source);
        }
        if let Some(bytes) = self.capture_bytes {
            config.capture_bytes = bytes;
            config.source_attribution.insert("capture_bytes", source);
        }

        Ok(config)
    }

    fn load_file<F>(&self, env: &F) -> Result<Option<LauncherSection>, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let explicit = self
            .config_file
            .clone()
            .or_else(|| {
                (!self.skip_discovery)
                    .then(|| env(ENV_CONFIG).map(PathBuf::from))
                    .flatten()
            });

        let path = match explicit {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::NotFound {
                    path: path.display().to_string(),
                });
            }
            Some(path) => path,
            None => {
                let discovered = PathBuf::from(DEFAULT_CONFIG_FILE);
                if self.skip_discovery || !discovered.is_file() {
                    return Ok(None);
                }
                discovered
            }
        };

        debug!(path = %path.display(), "loading config file");
        read_section(&path).map(Some)
    }
}

fn read_section(path: &Path) -> Result<LauncherSection, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::InvalidFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(file.launcher)
}

fn apply_file(config: &mut HarnessConfig, section: LauncherSection) -> Result<(), ConfigError> {
    let source = ConfigSource::Config;
    if let Some(executable) = section.executable {
        config.executable = Some(executable);
        config.source_attribution.insert("executable", source);
    }
    if let Some(ms) = section.readiness_timeout_ms {
        config.readiness_timeout = readiness_from_ms(ms);
        config.source_attribution.insert("readiness_timeout_ms", source);
    }
    if let Some(ms) = section.drain_interval_ms {
        config.drain_interval = checked_interval(ms)?;
        config.source_attribution.insert("drain_interval_ms", source);
    }
    if let Some(bytes) = section.capture_bytes {
        config.capture_bytes = bytes;
        config.source_attribution.insert("capture_bytes", source);
    }
    Ok(())
}

fn apply_env<F>(config: &mut HarnessConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<OsString>,
{
    let source = ConfigSource::Env;
    if let Some(executable) = env(ENV_EXECUTABLE).filter(|v| !v.is_empty()) {
        config.executable = Some(PathBuf::from(executable));
        config.source_attribution.insert("executable", source);
    }
    if let Some(ms) = env_number::<u64, _>(env, ENV_READINESS_TIMEOUT_MS)? {
        config.readiness_timeout = readiness_from_ms(ms);
        config.source_attribution.insert("readiness_timeout_ms", source);
    }
    if let Some(ms) = env_number::<u64, _>(env, ENV_DRAIN_INTERVAL_MS)? {
        config.drain_interval = checked_interval(ms)?;
        config.source_attribution.insert("drain_interval_ms", source);
    }
    if let Some(bytes) = env_number::<usize, _>(env, ENV_CAPTURE_BYTES)? {
        config.capture_bytes = bytes;
        config.source_attribution.insert("capture_bytes", source);
    }
    Ok(())
}

fn env_number<T, F>(env: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<OsString>,
{
    let Some(raw) = env(key) else {
        return Ok(None);
    };
    let raw = raw.to_string_lossy();
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.into_owned(),
        })
}

// A zero interval would turn the drainer into a spin loop.
fn checked_interval(ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidValue {
            key: "drain_interval_ms".to_string(),
            value: "0 (must be at least 1)".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::fs;

    fn env_map(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), OsString::from(v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ConfigBuilder::new()
            .skip_discovery()
            .build_with_env(env_map(&[]))
            .unwrap();

        assert!(config.executable.is_none());
        assert_eq!(config.readiness_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.drain_interval, Duration::from_millis(100));
        assert_eq!(config.capture_bytes, 1024 * 1024);
        assert!(
            config
                .source_attribution
                .values()
                .all(|s| *s == ConfigSource::Default)
        );
    }

    #[test]
    fn test_file_then_env_then_override_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.toml");
        fs::write(
            &path,
            "[launcher]\nexecutable = \"/opt/java/bin/java\"\nreadiness_timeout_ms = 5000\ndrain_interval_ms = 20\ncapture_bytes = 10\n",
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .config_file(&path)
            .capture_bytes(99)
            .override_source(ConfigSource::Cli)
            .build_with_env(env_map(&[(ENV_DRAIN_INTERVAL_MS, "50")]))
            .unwrap();

        assert_eq!(config.executable, Some(PathBuf::from("/opt/java/bin/java")));
        assert_eq!(config.readiness_timeout, Some(Duration::from_millis(5000)));
        assert_eq!(config.drain_interval, Duration::from_millis(50));
        assert_eq!(config.capture_bytes, 99);

        assert_eq!(config.source_attribution["executable"], ConfigSource::Config);
        assert_eq!(config.source_attribution["drain_interval_ms"], ConfigSource::Env);
        assert_eq!(config.source_attribution["capture_bytes"], ConfigSource::Cli);
    }

    #[test]
    fn test_zero_readiness_timeout_means_unbounded() {
        let config = ConfigBuilder::new()
            .skip_discovery()
            .build_with_env(env_map(&[(ENV_READINESS_TIMEOUT_MS, "0")]))
            .unwrap();
        assert_eq!(config.readiness_timeout, None);
    }

    #[test]
    fn test_invalid_env_number_is_rejected() {
        let err = ConfigBuilder::new()
            .skip_discovery()
            .build_with_env(env_map(&[(ENV_CAPTURE_BYTES, "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == ENV_CAPTURE_BYTES));
    }

    #[test]
    fn test_zero_drain_interval_is_rejected() {
        let err = ConfigBuilder::new()
            .skip_discovery()
            .drain_interval(Duration::ZERO)
            .build_with_env(env_map(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_sub_millisecond_drain_interval_is_kept() {
        let config = ConfigBuilder::new()
            .skip_discovery()
            .drain_interval(Duration::from_micros(500))
            .build_with_env(env_map(&[]))
            .unwrap();
        assert_eq!(config.drain_interval, Duration::from_micros(500));
        assert_eq!(
            config.source_attribution["drain_interval_ms"],
            ConfigSource::Programmatic
        );
    }

    #[test]
    fn test_missing_explicit_file_is_not_found() {
        let err = ConfigBuilder::new()
            .config_file("/definitely/not/here.toml")
            .build_with_env(env_map(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_unknown_keys_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[launcher]\nretries = 3\n").unwrap();

        let err = ConfigBuilder::new()
            .config_file(&path)
            .build_with_env(env_map(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile { .. }));
    }

    #[test]
    fn test_config_file_from_env_variable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("from-env.toml");
        fs::write(&path, "[launcher]\ncapture_bytes = 7\n").unwrap();

        let config = ConfigBuilder::new()
            .build_with_env(env_map(&[(ENV_CONFIG, path.to_str().unwrap())]))
            .unwrap();
        assert_eq!(config.capture_bytes, 7);
    }

    #[test]
    fn test_effective_config_rows_are_sorted() {
        let config = HarnessConfig::default();
        let keys: Vec<_> = config.effective_config().iter().map(|r| r.0).collect();
        assert_eq!(
            keys,
            ["capture_bytes", "drain_interval_ms", "executable", "readiness_timeout_ms"]
        );
    }

    #[test]
    #[serial(forkharness_env)]
    fn test_build_reads_process_environment() {
        // SAFETY: serialized with other tests touching this variable.
        unsafe { std::env::set_var(ENV_EXECUTABLE, "/usr/bin/true") };
        let config = ConfigBuilder::new().skip_discovery().build();
        unsafe { std::env::remove_var(ENV_EXECUTABLE) };

        let config = config.unwrap();
        assert_eq!(config.executable, Some(PathBuf::from("/usr/bin/true")));
        assert_eq!(config.source_attribution["executable"], ConfigSource::Env);
    }
}
