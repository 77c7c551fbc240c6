use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use forkharness_utils::logging::quote_command_line;

/// A fully built child command line.
///
/// Arguments are kept as discrete `OsString` elements and handed to
/// `Command::args`, so nothing in them is ever interpreted by a shell.
///
/// # Example
///
/// ```rust
/// use forkharness_runner::CommandSpec;
/// use std::ffi::OsString;
///
/// let cmd = CommandSpec::new("java")
///     .arg("-cp")
///     .arg("/opt/app/lib/app.jar")
///     .arg("org.example.Main")
///     .cwd("/opt/app");
///
/// assert_eq!(cmd.program, OsString::from("java"));
/// assert_eq!(cmd.args.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to execute
    pub program: OsString,
    /// Arguments as discrete elements
    pub args: Vec<OsString>,
    /// Working directory of the child; `None` inherits the parent's
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a `CommandSpec` for `program` with no arguments.
    ///
    /// # Arguments
    ///
    /// * `program` - The program to execute. Anything that converts to `OsString`.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Append a single argument.
    ///
    /// # Arguments
    ///
    /// * `arg` - The argument to add, passed to the child unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use forkharness_runner::CommandSpec;
    ///
    /// let cmd = CommandSpec::new("fork-stub").arg("-cp").arg("");
    /// assert_eq!(cmd.args, ["-cp", ""]);
    /// ```
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order.
    ///
    /// # Arguments
    ///
    /// * `args` - An iterator of arguments to add.
    ///
    /// # Example
    ///
    /// ```rust
    /// use forkharness_runner::CommandSpec;
    ///
    /// let cmd = CommandSpec::new("fork-stub").args(["hello", "250"]);
    /// assert_eq!(cmd.args.len(), 2);
    /// ```
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory the child starts in.
    ///
    /// # Arguments
    ///
    /// * `cwd` - Directory path; relative paths are taken from the parent's
    ///   current directory at spawn time.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Program followed by its arguments, lossily converted for display.
    #[must_use]
    pub fn parts(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| part.to_string_lossy().into_owned())
            .collect()
    }

    /// The command line as echoed before launch: `'java' '-cp' '...'`.
    #[must_use]
    pub fn quoted(&self) -> String {
        quote_command_line(self.parts())
    }

    /// Convert into a `std::process::Command` (stdio left at defaults).
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let cmd = CommandSpec::new("java")
            .arg("-cp")
            .args(["a:b", "org.example.Main"])
            .cwd("/work");

        assert_eq!(cmd.program, OsString::from("java"));
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/work")));
    }

    #[test]
    fn test_quoted_rendering() {
        let cmd = CommandSpec::new("java").args(["-cp", "x y", "Main"]);
        assert_eq!(cmd.quoted(), "'java' '-cp' 'x y' 'Main'");
    }

    #[test]
    fn test_shell_metacharacters_preserved() {
        let cmd = CommandSpec::new("echo").args(["$(whoami)", "`id`", "a;b", "a|b"]);
        assert_eq!(cmd.args[0], OsString::from("$(whoami)"));
        assert_eq!(cmd.args[1], OsString::from("`id`"));
        assert_eq!(cmd.args[2], OsString::from("a;b"));
        assert_eq!(cmd.args[3], OsString::from("a|b"));
    }

    #[test]
    fn test_to_command_carries_program_and_args() {
        let cmd = CommandSpec::new("echo").arg("hello").cwd("/tmp");
        let std_cmd = cmd.to_command();
        assert_eq!(std_cmd.get_program(), "echo");
        assert_eq!(std_cmd.get_args().collect::<Vec<_>>(), ["hello"]);
        assert_eq!(std_cmd.get_current_dir(), Some(std::path::Path::new("/tmp")));
    }
}
