use std::fmt;
use std::path::PathBuf;

use tracing::debug;
use url::Url;

use crate::error::ClasspathError;
use crate::loader::{ResourceLoader, SearchPathLoader};

const ARCHIVE_MARKER: &str = ".jar!";

/// A fully-qualified, dot-separated class name such as `org.example.Main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassName(String);

impl ClassName {
    /// Validate and wrap a class name. Empty names and empty segments
    /// (`a..b`, `.a`, `a.`) are rejected.
    pub fn new(name: impl Into<String>) -> Result<Self, ClasspathError> {
        let name = name.into();
        if name.is_empty() || name.split('.').any(str::is_empty) || name.contains('/') {
            return Err(ClasspathError::InvalidClassName { name });
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource name of the class file: `org.example.Main` → `org/example/Main.class`.
    #[must_use]
    pub fn resource_name(&self) -> String {
        format!("{}.class", self.0.replace('.', "/"))
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Find the archive or directory `class` is loaded from.
///
/// Without a loader the system loader (`CLASSPATH`) is searched.
/// `Ok(None)` means the class is not on any searched root.
pub fn class_source(
    class: &ClassName,
    loader: Option<&dyn ResourceLoader>,
) -> Result<Option<PathBuf>, ClasspathError> {
    resource_source(&class.resource_name(), loader)
}

/// Find the archive or directory containing `resource`.
pub fn resource_source(
    resource: &str,
    loader: Option<&dyn ResourceLoader>,
) -> Result<Option<PathBuf>, ClasspathError> {
    let url = match loader {
        Some(loader) => loader.resource_url(resource),
        None => SearchPathLoader::system().resource_url(resource),
    };

    match url {
        Some(url) => resource_root(&url, resource).map(Some),
        None => {
            debug!(resource, "resource not found on classpath");
            Ok(None)
        }
    }
}

/// Derive the classpath root from the URL a resource was found at.
///
/// Archive URLs are cut back to the `.jar` file. Anything else has its path
/// percent-decoded and the resource name stripped from the end.
pub fn resource_root(url: &Url, resource: &str) -> Result<PathBuf, ClasspathError> {
    let path = url.path();

    if let Some(idx) = path.find(ARCHIVE_MARKER) {
        let archive = &path[..idx + ".jar".len()];
        return Url::parse(archive)
            .ok()
            .and_then(|archive_url| archive_url.to_file_path().ok())
            .ok_or_else(|| ClasspathError::InvalidUri {
                uri: archive.to_string(),
            });
    }

    // The URL path is percent-encoded and the resource name is not, so they
    // only compare after decoding.
    let decoded = urlencoding::decode(path).map_err(|e| ClasspathError::Decode {
        location: path.to_string(),
        reason: e.to_string(),
    })?;
    let root = decoded
        .strip_suffix(resource)
        .map_or_else(|| decoded.replacen(resource, "", 1), str::to_string);

    Ok(PathBuf::from(platform_path(&root)))
}

// File URL paths on Windows look like `/C:/dir/`.
#[cfg(windows)]
fn platform_path(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' {
        &path[1..]
    } else {
        path
    }
}

#[cfg(not(windows))]
fn platform_path(path: &str) -> &str {
    path
}

/// The classpath root of the running program: the directory holding the
/// current executable. Used when a launch names no classpath at all.
#[must_use]
pub fn own_location() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
}
