//! On-disk cache of upstream content
//!
//! One cache directory per upstream location, laid out like the upstream
//! itself so a cache directory can be browsed, copied, or deleted by hand.
//! Entries are written once and never updated in place: published gems are
//! immutable. Deleting a directory is the only eviction.
//!
//! # Layout
//!
//! ```text
//! <cache root>/
//!   facades/https_rubygems_org/       one per registry handle
//!     gems/rake-13.0.6.gem
//!     gems/rake-13.0.6.gem.sha1      checksum sidecar, written with the entry
//!     info/rake
//!     ivy/rubygems/rake/13.0.6/ivy.xml
//!   repositories/https_rubygems_org/  one per multiplexer mapping
//! ```

pub mod lock;
pub mod source;
pub mod store;

pub use lock::KeyLocks;
pub use source::ByteSource;
pub use store::{sha1_hex, CacheEntry, CacheStore, CacheUsage, CachedPayload};

use crate::error::{GemBridgeError, GemBridgeResult};
use std::path::Path;
use tokio::fs;

/// Subdirectory holding registry handles
pub const FACADES_DIR: &str = "facades";

/// Subdirectory holding multiplexer mappings
pub const REPOSITORIES_DIR: &str = "repositories";

/// Deterministic directory name for an upstream URL.
///
/// Every character that is not ASCII alphanumeric becomes `_`, so
/// `https://rubygems.org` maps to `https___rubygems_org`.
pub fn dir_name_for(url: &str) -> String {
    url.trim_end_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Sum up entries and bytes below `dir`, ignoring sidecars and temp files
pub async fn directory_usage(dir: &Path) -> GemBridgeResult<CacheUsage> {
    let mut usage = CacheUsage::default();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(GemBridgeError::io(
                    format!("reading cache directory {}", current.display()),
                    e,
                ))
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| GemBridgeError::io("reading cache entry", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| GemBridgeError::io("reading cache entry type", e))?;
            if file_type.is_dir() {
                pending.push(entry.path());
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if store::is_bookkeeping_file(&name) {
                continue;
            }

            let metadata = entry
                .metadata()
                .await
                .map_err(|e| GemBridgeError::io("reading cache entry metadata", e))?;
            usage.entries += 1;
            usage.bytes += metadata.len();
        }
    }

    Ok(usage)
}
