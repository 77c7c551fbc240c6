//! Classpath discovery
//!
//! Maps a class to the classpath root it is loaded from: the archive file for
//! classes packed in a `.jar`, or the directory a `.class` file sits under.
//! Lookups go through a [`ResourceLoader`] that turns resource names into
//! URLs, mirroring how a class loader reports where it found something.

mod error;
mod loader;
mod resolve;

pub use error::ClasspathError;
pub use loader::{ResourceLoader, SearchPathLoader};
pub use resolve::{ClassName, class_source, own_location, resource_root, resource_source};
