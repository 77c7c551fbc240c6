use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use forkharness_utils::props::{self, DEBUG_FLAG, KILL_AFTER_PROPERTY, SYNC_PATH_PROPERTY};

use crate::error::ChildError;

/// The launcher's command line as seen by the child.
///
/// Options come first (`-cp`, debug flags, `-D` properties), then the entry
/// point, then the parameters. Everything after the entry point is passed
/// through untouched, even if it starts with `-`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForkedArgs {
    pub classpath: Vec<PathBuf>,
    pub debug: bool,
    pub debug_port: Option<u16>,
    pub properties: HashMap<String, String>,
    /// Options this parser does not know, kept in order.
    pub other_options: Vec<String>,
    pub entry_point: String,
    pub parameters: Vec<String>,
}

impl ForkedArgs {
    /// Parse the current process's arguments (program name skipped).
    pub fn from_env() -> Result<Self, ChildError> {
        Self::parse(std::env::args_os().skip(1))
    }

    pub fn parse<I, S>(args: I) -> Result<Self, ChildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut args = args.into_iter().map(|arg| {
            arg.into().into_string().map_err(|raw| ChildError::NonUtf8Argument {
                arg: raw.to_string_lossy().into_owned(),
            })
        });
        let mut parsed = Self::default();

        while let Some(arg) = args.next() {
            let arg = arg?;
            match arg.as_str() {
                "-cp" | "-classpath" => {
                    let value = args.next().ok_or_else(|| ChildError::MissingValue {
                        option: arg.clone(),
                    })??;
                    parsed.classpath = std::env::split_paths(&value)
                        .filter(|p| !p.as_os_str().is_empty())
                        .collect();
                }
                flag if flag == DEBUG_FLAG => parsed.debug = true,
                flag if flag.starts_with(props::JDWP_PREFIX) => {
                    parsed.debug_port = props::parse_jdwp_port(flag);
                }
                define if define.starts_with("-D") => {
                    if let Some((name, value)) = props::parse_define(define) {
                        parsed.properties.insert(name.to_string(), value.to_string());
                    }
                }
                option if option.starts_with('-') => parsed.other_options.push(arg),
                _ => {
                    parsed.entry_point = arg;
                    parsed.parameters = args.collect::<Result<_, _>>()?;
                    return Ok(parsed);
                }
            }
        }

        Err(ChildError::MissingEntryPoint)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Readiness-marker path requested by the parent.
    #[must_use]
    pub fn sync_path(&self) -> Option<PathBuf> {
        self.property(SYNC_PATH_PROPERTY)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Self-destruct delay requested by the parent.
    pub fn kill_after(&self) -> Result<Option<Duration>, ChildError> {
        let Some(raw) = self.property(KILL_AFTER_PROPERTY) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ChildError::InvalidProperty {
                name: KILL_AFTER_PROPERTY.to_string(),
                value: raw.to_string(),
            })
    }
}
