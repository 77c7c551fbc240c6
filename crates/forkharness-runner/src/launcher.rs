use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use forkharness_classpath::{ClassName, ResourceLoader, class_source, own_location};
use forkharness_config::HarnessConfig;
use forkharness_utils::props::{self, DEBUG_FLAG, KILL_AFTER_PROPERTY, SYNC_PATH_PROPERTY};
use forkharness_utils::SharedCapture;
use tracing::{debug, info, warn};

use crate::command_spec::CommandSpec;
use crate::drain::{DiagnosticSink, OutputDrainer};
use crate::error::LaunchError;
use crate::process::{ChildSlot, LaunchedProcess};
use crate::readiness::{InterruptHandle, NotReady, ReadinessGate};

#[cfg(windows)]
const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_SEPARATOR: &str = ":";

/// How long to wait for a child killed after a readiness timeout.
const REAP_GRACE: Duration = Duration::from_secs(5);

/// Configures and starts one forked child.
///
/// The command line has the shape
///
/// ```text
/// <executable> -cp <classpath> [-Xdebug -Xrunjdwp:...address=<port>]
///     [-Dfork.syncPath=<marker>] [-Dfork.killAfter=<ms>] <entry-point> <parameters...>
/// ```
///
/// Settings only take effect at the next [`run`](Self::run).
///
/// ```rust,no_run
/// use forkharness_runner::ForkLauncher;
///
/// let mut launcher = ForkLauncher::new();
/// launcher
///     .set_entry_point("resume-download")
///     .set_kill_after(3500)
///     .set_sync_on("target/resume.sync")
///     .set_parameters(["http://localhost:8080/resume/file", "target/out.bin"]);
///
/// let child = launcher.run()?;
/// let status = child.wait()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ForkLauncher {
    executable: Option<PathBuf>,
    classpath: Vec<PathBuf>,
    working_directory: PathBuf,
    parameters: Vec<String>,
    debug_port: Option<u16>,
    sync_path: Option<PathBuf>,
    kill_after_ms: Option<u64>,
    entry_point: String,
    config: HarnessConfig,
    sink: DiagnosticSink,
    interrupt: InterruptHandle,
}

impl Default for ForkLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ForkLauncher {
    /// Entry point used when none is set: the launcher's own identity. The
    /// child program is expected to dispatch on it.
    pub const DEFAULT_ENTRY_POINT: &'static str = "forkharness::ForkLauncher";

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HarnessConfig) -> Self {
        Self {
            executable: None,
            classpath: Vec::new(),
            working_directory: PathBuf::from("."),
            parameters: Vec::new(),
            debug_port: None,
            sync_path: None,
            kill_after_ms: None,
            entry_point: Self::DEFAULT_ENTRY_POINT.to_string(),
            config,
            sink: DiagnosticSink::stderr(),
            interrupt: InterruptHandle::new(),
        }
    }

    /// A launcher for a JVM child: `$JAVA_HOME/bin/java`, or `java` from
    /// `PATH` when `JAVA_HOME` is unset.
    #[must_use]
    pub fn java() -> Self {
        let mut launcher = Self::new();
        launcher.executable = Some(java_executable());
        launcher
    }

    /// Settings this launcher was built with.
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Add the classpath root `class` is loaded from, searched through
    /// `loader`. A class that cannot be found adds nothing.
    ///
    /// # Arguments
    ///
    /// * `class` - Fully qualified class name.
    /// * `loader` - Where to look the class up.
    ///
    /// # Errors
    ///
    /// [`LaunchError::Classpath`] when the location the class was found at
    /// cannot be decoded into a path.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use forkharness_classpath::{ClassName, SearchPathLoader};
    /// use forkharness_runner::ForkLauncher;
    ///
    /// let loader = SearchPathLoader::new(["target/classes", "lib/netty.jar"]);
    /// let mut launcher = ForkLauncher::new();
    /// launcher.add_classpath_class(&ClassName::new("io.netty.Channel")?, &loader)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn add_classpath_class(
        &mut self,
        class: &ClassName,
        loader: &dyn ResourceLoader,
    ) -> Result<&mut Self, LaunchError> {
        self.add_resolved(class, Some(loader))
    }

    /// Like [`add_classpath_class`](Self::add_classpath_class) using the
    /// system loader (`CLASSPATH`).
    pub fn add_classpath_class_system(&mut self, class: &ClassName) -> Result<&mut Self, LaunchError> {
        self.add_resolved(class, None)
    }

    fn add_resolved(
        &mut self,
        class: &ClassName,
        loader: Option<&dyn ResourceLoader>,
    ) -> Result<&mut Self, LaunchError> {
        match class_source(class, loader)? {
            Some(root) => {
                debug!(class = %class, root = %root.display(), "resolved classpath entry");
                self.classpath.push(root);
            }
            None => debug!(class = %class, "class not found, no classpath entry added"),
        }
        Ok(self)
    }

    /// Add a raw path to the classpath as given.
    pub fn add_classpath_entry(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.classpath.push(path.into());
        self
    }

    /// Add a file or directory to the classpath, made absolute against the
    /// current directory.
    pub fn add_classpath_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        self.classpath.push(absolute);
        self
    }

    /// Classpath entries added so far, in order. The implicit own-location
    /// entry used for an empty classpath is not listed.
    #[must_use]
    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    /// Append one parameter passed to the entry point after its name.
    pub fn add_parameter(&mut self, parameter: impl Into<String>) -> &mut Self {
        self.parameters.push(parameter.into());
        self
    }

    /// Replace the parameter list. Parameters reach the child verbatim, even
    /// ones starting with `-`.
    ///
    /// # Arguments
    ///
    /// * `parameters` - The new parameters, in order.
    pub fn set_parameters<I, S>(&mut self, parameters: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// Directory the child starts in (default `.`). A relative sync path is
    /// resolved against it.
    pub fn set_working_directory(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.working_directory = dir.into();
        self
    }

    /// Start the child suspended, waiting for a remote debugger on `port`.
    pub fn debug(&mut self, port: u16) -> &mut Self {
        self.debug_port = Some(port);
        self
    }

    /// Wait in [`run`](Self::run) until the child creates `path`.
    ///
    /// Use a fresh path per launch: a marker left behind by an earlier launch
    /// would be taken as this child's signal.
    pub fn set_sync_on(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.sync_path = Some(path.into());
        self
    }

    /// Have the child kill itself `ms` milliseconds after entry.
    pub fn set_kill_after(&mut self, ms: u64) -> &mut Self {
        self.kill_after_ms = Some(ms);
        self
    }

    /// Name the child dispatches on. Defaults to
    /// [`DEFAULT_ENTRY_POINT`](Self::DEFAULT_ENTRY_POINT).
    pub fn set_entry_point(&mut self, entry_point: impl Into<String>) -> &mut Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Program to launch. Takes precedence over the configured executable;
    /// with neither, the current executable is re-entered.
    pub fn set_executable(&mut self, executable: impl Into<PathBuf>) -> &mut Self {
        self.executable = Some(executable.into());
        self
    }

    /// Where drained child output is forwarded. Defaults to stderr.
    pub fn set_diagnostic_sink(&mut self, sink: DiagnosticSink) -> &mut Self {
        self.sink = sink;
        self
    }

    /// Handle that cancels a pending readiness wait in [`run`](Self::run).
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    fn resolve_executable(&self) -> Result<PathBuf, LaunchError> {
        if let Some(exe) = self.executable.as_ref().or(self.config.executable.as_ref()) {
            return Ok(exe.clone());
        }
        std::env::current_exe().map_err(|e| LaunchError::NoExecutable {
            reason: format!("current executable unavailable: {e}"),
        })
    }

    /// The marker path as both sides see it. A relative path is taken
    /// relative to the child's working directory.
    fn sync_marker_path(&self) -> Option<PathBuf> {
        let path = self.sync_path.as_ref()?;
        let joined = self.working_directory.join(path);
        Some(std::path::absolute(&joined).unwrap_or(joined))
    }

    fn joined_classpath(&self) -> OsString {
        let own;
        let entries: &[PathBuf] = if self.classpath.is_empty() {
            own = own_location().into_iter().collect::<Vec<_>>();
            &own
        } else {
            &self.classpath
        };

        let mut joined = OsString::new();
        for (i, entry) in entries.iter().enumerate() {
            if i != 0 {
                joined.push(PATH_SEPARATOR);
            }
            joined.push(entry);
        }
        joined
    }

    /// Build the command line `run` would execute.
    pub fn command_spec(&self) -> Result<CommandSpec, LaunchError> {
        let mut cmd = CommandSpec::new(self.resolve_executable()?)
            .cwd(&self.working_directory)
            .arg("-cp")
            .arg(self.joined_classpath());

        if let Some(port) = self.debug_port {
            cmd = cmd.arg(DEBUG_FLAG).arg(props::jdwp_flag(port));
        }
        if let Some(marker) = self.sync_marker_path() {
            let mut define = OsString::from(format!("-D{SYNC_PATH_PROPERTY}="));
            define.push(&marker);
            cmd = cmd.arg(define);
        }
        if let Some(ms) = self.kill_after_ms {
            cmd = cmd.arg(props::define(KILL_AFTER_PROPERTY, ms));
        }

        Ok(cmd.arg(&self.entry_point).args(&self.parameters))
    }

    /// Start the child.
    ///
    /// Returns once the child is running and its output is being drained, or,
    /// with a readiness marker configured, once the child has created it.
    /// The marker is deleted before returning.
    ///
    /// # Errors
    ///
    /// * [`LaunchError::Spawn`] / [`LaunchError::NoExecutable`] - the child
    ///   could not be started.
    /// * [`LaunchError::Interrupted`] - the [`interrupt_handle`](Self::interrupt_handle)
    ///   fired during the readiness wait. The running child is inside.
    /// * [`LaunchError::ExitedBeforeReady`] - the child exited without
    ///   creating the marker.
    /// * [`LaunchError::ReadinessTimeout`] - the marker did not appear in
    ///   time. The child has been killed.
    pub fn run(&self) -> Result<LaunchedProcess, LaunchError> {
        let spec = self.command_spec()?;
        let program = spec.program.to_string_lossy().into_owned();
        let spawn_error = |source: io::Error| LaunchError::Spawn {
            program: program.clone(),
            source,
        };

        info!(entry_point = %self.entry_point, command = %spec.quoted(), "launching child");

        // One pipe for both streams keeps stdout/stderr interleaving intact
        // and lets a single drainer cover them.
        let (reader, writer) = io::pipe().map_err(spawn_error)?;
        let child = {
            let mut command = spec.to_command();
            let stderr = writer.try_clone().map_err(spawn_error)?;
            command
                .stdin(Stdio::null())
                .stdout(Stdio::from(writer))
                .stderr(Stdio::from(stderr));
            command.spawn().map_err(spawn_error)?
            // `command` drops here, closing the parent's write ends.
        };
        let pid = child.id();

        #[cfg(unix)]
        {
            use std::os::fd::AsFd;
            if let Err(e) = crate::drain::set_nonblocking(reader.as_fd()) {
                warn!(pid, error = %e, "could not make output pipe non-blocking");
            }
        }

        let slot = Arc::new(ChildSlot::new(child));
        let capture = SharedCapture::new(self.config.capture_bytes);
        let drainer = OutputDrainer::new(
            pid,
            reader,
            Arc::clone(&slot),
            self.sink.clone(),
            capture.clone(),
            self.config.drain_interval,
        );
        let handle = match drainer.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                let _ = slot.kill();
                return Err(spawn_error(e));
            }
        };
        let process = LaunchedProcess::new(pid, slot, handle, capture);
        debug!(pid, "child started");

        let Some(marker) = self.sync_marker_path() else {
            return Ok(process);
        };

        let gate = ReadinessGate::new(&marker, self.config.readiness_timeout)
            .with_interrupt(self.interrupt.clone());
        match gate.wait(|| process.try_wait().ok().flatten()) {
            Ok(_) => Ok(process),
            Err(NotReady::Interrupted) => Err(LaunchError::Interrupted {
                path: marker,
                process: Box::new(process),
            }),
            Err(NotReady::Exited(status)) => Err(LaunchError::ExitedBeforeReady {
                path: marker,
                status,
                process: Box::new(process),
            }),
            Err(NotReady::TimedOut(waited)) => {
                warn!(pid, path = %marker.display(), "readiness timeout, killing child");
                if let Err(e) = process.kill() {
                    warn!(pid, error = %e, "failed to kill child after readiness timeout");
                }
                let _ = process.wait_timeout(REAP_GRACE);
                Err(LaunchError::ReadinessTimeout {
                    path: marker,
                    waited,
                })
            }
        }
    }
}

fn java_executable() -> PathBuf {
    let binary = format!("java{}", std::env::consts::EXE_SUFFIX);
    match std::env::var_os("JAVA_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join("bin").join(binary),
        _ => PathBuf::from(binary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkharness_classpath::SearchPathLoader;
    use proptest::prelude::*;

    fn args_of(launcher: &ForkLauncher) -> Vec<String> {
        launcher
            .command_spec()
            .unwrap()
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn launcher() -> ForkLauncher {
        let mut launcher = ForkLauncher::new();
        launcher.set_executable("/opt/jdk/bin/java");
        launcher
    }

    #[test]
    fn test_minimal_command_line() {
        let launcher = launcher();
        let spec = launcher.command_spec().unwrap();
        let args = args_of(&launcher);

        assert_eq!(spec.program, OsString::from("/opt/jdk/bin/java"));
        assert_eq!(spec.cwd, Some(PathBuf::from(".")));
        assert_eq!(args[0], "-cp");
        assert_eq!(args[2], ForkLauncher::DEFAULT_ENTRY_POINT);
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_empty_classpath_uses_own_location() {
        let args = args_of(&launcher());
        let own = own_location().unwrap();
        assert_eq!(args[1], own.to_string_lossy());
    }

    #[test]
    fn test_full_command_line_order() {
        let mut launcher = launcher();
        launcher
            .add_classpath_entry("/cp/one")
            .add_classpath_entry("/cp/two")
            .add_classpath_entry("/cp/one")
            .set_working_directory("/work")
            .debug(5005)
            .set_sync_on("/markers/run.sync")
            .set_kill_after(3500)
            .set_entry_point("org.example.ResumingDownload")
            .set_parameters(["http://localhost/resume/a", "out.bin"]);

        let args = args_of(&launcher);
        let expected_cp = ["/cp/one", "/cp/two", "/cp/one"].join(PATH_SEPARATOR);
        assert_eq!(
            args,
            [
                "-cp",
                expected_cp.as_str(),
                "-Xdebug",
                "-Xrunjdwp:transport=dt_socket,server=y,suspend=y,address=5005",
                "-Dfork.syncPath=/markers/run.sync",
                "-Dfork.killAfter=3500",
                "org.example.ResumingDownload",
                "http://localhost/resume/a",
                "out.bin",
            ]
        );
    }

    #[test]
    fn test_relative_sync_path_follows_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut launcher = launcher();
        launcher
            .set_working_directory(dir.path())
            .set_sync_on("target/run.sync");

        let expected = format!(
            "-Dfork.syncPath={}",
            dir.path().join("target/run.sync").display()
        );
        assert!(args_of(&launcher).contains(&expected));
    }

    #[test]
    fn test_set_parameters_replaces_and_add_appends() {
        let mut launcher = launcher();
        launcher.add_parameter("old").set_parameters(["a", "b"]).add_parameter("c");
        let args = args_of(&launcher);
        assert_eq!(&args[args.len() - 3..], ["a", "b", "c"]);
        assert!(!args.contains(&"old".to_string()));
    }

    #[test]
    fn test_classpath_file_is_made_absolute() {
        let mut launcher = launcher();
        launcher.add_classpath_file("lib/dep.jar");
        assert!(launcher.classpath()[0].is_absolute());
        assert!(launcher.classpath()[0].ends_with("lib/dep.jar"));
    }

    #[test]
    fn test_unresolvable_class_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SearchPathLoader::new([dir.path()]);
        let class = ClassName::new("org.example.Missing").unwrap();

        let mut launcher = launcher();
        launcher.add_classpath_class(&class, &loader).unwrap();
        assert!(launcher.classpath().is_empty());
    }

    #[test]
    fn test_resolvable_class_adds_its_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("org/example")).unwrap();
        std::fs::write(dir.path().join("org/example/Main.class"), b"").unwrap();
        let loader = SearchPathLoader::new([dir.path()]);
        let class = ClassName::new("org.example.Main").unwrap();

        let mut launcher = launcher();
        launcher.add_classpath_class(&class, &loader).unwrap();
        launcher.add_classpath_class(&class, &loader).unwrap();

        assert_eq!(launcher.classpath().len(), 2);
        assert!(launcher.classpath()[0].is_dir());
    }

    #[test]
    fn test_config_executable_is_used_when_not_set() {
        let config = forkharness_config::ConfigBuilder::new()
            .skip_discovery()
            .executable("/from/config/java")
            .build_with_env(|_| None)
            .unwrap();
        let launcher = ForkLauncher::with_config(config);
        let spec = launcher.command_spec().unwrap();
        assert_eq!(spec.program, OsString::from("/from/config/java"));
    }

    #[test]
    fn test_default_executable_is_current_exe() {
        let config = forkharness_config::ConfigBuilder::new()
            .skip_discovery()
            .build_with_env(|_| None)
            .unwrap();
        let spec = ForkLauncher::with_config(config).command_spec().unwrap();
        assert_eq!(
            PathBuf::from(spec.program),
            std::env::current_exe().unwrap()
        );
    }

    #[test]
    fn test_java_launcher_points_at_a_java_binary() {
        let spec = ForkLauncher::java().command_spec().unwrap();
        let program = PathBuf::from(spec.program);
        let name = program.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("java"));
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut launcher = launcher();
        launcher
            .set_executable(dir.path().join("no-such-binary"))
            .set_diagnostic_sink(DiagnosticSink::discard());

        match launcher.run() {
            Err(LaunchError::Spawn { program, .. }) => assert!(program.ends_with("no-such-binary")),
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_parameters_are_passed_verbatim_last(
            params in proptest::collection::vec("[^\\x00]*", 0..8)
        ) {
            let mut launcher = launcher();
            launcher.set_kill_after(10).set_parameters(params.clone());
            let args = args_of(&launcher);

            prop_assert_eq!(&args[args.len() - params.len()..], params.as_slice());
            prop_assert_eq!(&args[args.len() - params.len() - 1], ForkLauncher::DEFAULT_ENTRY_POINT);
        }
    }
}
