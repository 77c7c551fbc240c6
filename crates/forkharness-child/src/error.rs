use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChildError {
    #[error("Option {option} requires a value")]
    MissingValue { option: String },

    #[error("No entry point on the command line")]
    MissingEntryPoint,

    #[error("Argument is not valid UTF-8: {arg}")]
    NonUtf8Argument { arg: String },

    #[error("Invalid value for property {name}: {value}")]
    InvalidProperty { name: String, value: String },

    #[error("Failed to create readiness marker {}: {source}", .path.display())]
    Marker {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to arm watchdog: {0}")]
    Watchdog(#[source] std::io::Error),
}
