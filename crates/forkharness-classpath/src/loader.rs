use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use url::Url;

/// Resolves resource names (`a/b/C.class`) to the URL they are served from.
///
/// Directory hits are `file:` URLs; archive hits are
/// `jar:file:<archive>!/<resource>` URLs.
pub trait ResourceLoader {
    fn resource_url(&self, resource: &str) -> Option<Url>;
}

/// A loader that searches an ordered list of directories and archives.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLoader {
    roots: Vec<PathBuf>,
}

impl SearchPathLoader {
    #[must_use]
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// The platform loader, searching the `CLASSPATH` environment variable.
    #[must_use]
    pub fn system() -> Self {
        let roots = std::env::var_os("CLASSPATH")
            .map(|value| std::env::split_paths(&value).collect())
            .unwrap_or_default();
        Self { roots }
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn find_in_directory(root: &Path, resource: &str) -> Option<Url> {
        let candidate = root.join(resource);
        if !candidate.is_file() {
            return None;
        }
        let absolute = std::path::absolute(&candidate).ok()?;
        Url::from_file_path(absolute).ok()
    }

    fn find_in_archive(root: &Path, resource: &str) -> Option<Url> {
        let file = File::open(root).ok()?;
        let mut archive = match zip::ZipArchive::new(file) {
            Ok(archive) => archive,
            Err(e) => {
                debug!(path = %root.display(), error = %e, "skipping unreadable archive");
                return None;
            }
        };
        if archive.by_name(resource).is_err() {
            return None;
        }

        let absolute = std::path::absolute(root).ok()?;
        let archive_url = Url::from_file_path(absolute).ok()?;
        Url::parse(&format!("jar:{archive_url}!/{resource}")).ok()
    }
}

impl ResourceLoader for SearchPathLoader {
    fn resource_url(&self, resource: &str) -> Option<Url> {
        self.roots.iter().find_map(|root| {
            trace!(root = %root.display(), resource, "searching classpath root");
            if root.is_dir() {
                Self::find_in_directory(root, resource)
            } else if root.is_file() {
                Self::find_in_archive(root, resource)
            } else {
                None
            }
        })
    }
}
