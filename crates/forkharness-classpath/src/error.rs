use thiserror::Error;

/// Failures that make a classpath impossible to build.
///
/// An unresolvable class is not an error; it simply contributes no entry.
#[derive(Error, Debug)]
pub enum ClasspathError {
    /// Percent-decoding a resolved location failed. This means the environment
    /// produced a location that is not valid UTF-8 and nothing sensible can be
    /// put on the classpath.
    #[error("Resource location {location} could not be decoded: {reason}")]
    Decode { location: String, reason: String },

    #[error("Archive location {uri} is not a valid file URI")]
    InvalidUri { uri: String },

    #[error("Invalid class name '{name}'")]
    InvalidClassName { name: String },
}
