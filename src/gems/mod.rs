//! Gem repository model
//!
//! Everything the resolver needs to know about the shape of a gem-style
//! repository: which relative paths exist, how gem versions order, and how
//! the compact-index dependency metadata is laid out.
//!
//! # Upstream layout
//!
//! | Path | Classification |
//! |------|----------------|
//! | `/gems/<name>-<version>[-<platform>].gem` | gem archive |
//! | `/quick/Marshal.4.8/<stem>.gemspec.rz` | compressed gemspec |
//! | `/info/<name>` | compact-index dependency metadata |
//!
//! The release layout exposed to dependency-manager clients nests gems
//! under `/rubygems/<name>/<version>/`, and any classifiable file can be
//! suffixed with `.sha1` to request its checksum.

pub mod info;
pub mod path;
pub mod version;

pub use info::{CompactInfo, GemDependency, InfoEntry};
pub use path::{
    classify, GemCoordinates, PathClassification, PathKind, MAVEN_METADATA, PING_PATH,
    RELEASE_ROOT,
};
pub use version::GemVersion;
