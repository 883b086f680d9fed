//! Write-once cache store for one upstream location

use crate::cache::lock::KeyLocks;
use crate::cache::source::ByteSource;
use crate::error::{GemBridgeError, GemBridgeResult};
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};
use uuid::Uuid;

/// Extension of checksum sidecar files
pub const CHECKSUM_EXT: &str = "sha1";

/// Metadata of one cached entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub size: u64,
    pub fetched_at: DateTime<Utc>,
    /// SHA-1 of the bytes, hex encoded
    pub checksum: String,
}

/// Aggregate size of a cache directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub entries: u64,
    pub bytes: u64,
}

/// Cached entry opened for streaming
#[derive(Debug)]
pub struct CachedPayload {
    pub source: ByteSource,
    pub size: u64,
    pub checksum: Option<String>,
}

/// Content store rooted at one directory, keyed by relative path
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    write_locks: KeyLocks,
    fetch_locks: KeyLocks,
}

impl CacheStore {
    /// Open (and create) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> GemBridgeResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            GemBridgeError::io(format!("creating cache directory {}", root.display()), e)
        })?;
        debug!("Opened cache store at {}", root.display());

        Ok(Self {
            root,
            write_locks: KeyLocks::new(),
            fetch_locks: KeyLocks::new(),
        })
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an entry exists for `key`
    pub async fn contains(&self, key: &str) -> GemBridgeResult<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Read the bytes stored for `key`
    pub async fn get(&self, key: &str) -> GemBridgeResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GemBridgeError::io(
                format!("reading cache entry {}", path.display()),
                e,
            )),
        }
    }

    /// Open the entry for `key` as a stream.
    ///
    /// The file and its sidecar are read under the key's write lock, so the
    /// checksum always belongs to the bytes behind the returned handle.
    pub async fn open_for_read(&self, key: &str) -> GemBridgeResult<Option<CachedPayload>> {
        let path = self.path_for(key)?;
        let _guard = self.write_locks.lock(key).await;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(GemBridgeError::io(
                    format!("opening cache entry {}", path.display()),
                    e,
                ))
            }
        };
        let size = file
            .metadata()
            .await
            .map_err(|e| GemBridgeError::io("reading cache entry metadata", e))?
            .len();
        let checksum = read_sidecar(&path).await?;

        Ok(Some(CachedPayload {
            source: ByteSource::File(file),
            size,
            checksum,
        }))
    }

    /// Stored checksum for `key`, without reading the entry itself
    pub async fn checksum(&self, key: &str) -> GemBridgeResult<Option<String>> {
        let path = self.path_for(key)?;
        let _guard = self.write_locks.lock(key).await;
        self.checksum_locked(key, &path).await
    }

    /// Metadata for `key`
    pub async fn entry(&self, key: &str) -> GemBridgeResult<Option<CacheEntry>> {
        let path = self.path_for(key)?;
        let _guard = self.write_locks.lock(key).await;
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GemBridgeError::io("reading cache entry metadata", e)),
        };
        let fetched_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let checksum = match self.checksum_locked(key, &path).await? {
            Some(sum) => sum,
            None => return Ok(None),
        };

        Ok(Some(CacheEntry {
            key: key.to_string(),
            size: metadata.len(),
            fetched_at,
            checksum,
        }))
    }

    /// Store `bytes` under `key` and return their checksum.
    ///
    /// The first write wins: if the key already exists the stored bytes are
    /// left untouched and their checksum is returned.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> GemBridgeResult<String> {
        let path = self.path_for(key)?;
        let _guard = self.write_locks.lock(key).await;

        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!(key, "Cache entry already present, keeping first write");
            return match read_sidecar(&path).await? {
                Some(sum) => Ok(sum),
                None => self.repair_sidecar(key, &path).await,
            };
        }

        let checksum = write_entry(&path, bytes).await?;
        debug!(key, size = bytes.len(), %checksum, "Cached entry");
        Ok(checksum)
    }

    /// Atomically swap the entry for `key` with new bytes.
    ///
    /// Only for upstream documents that grow over time (dependency
    /// metadata); gem archives go through `put`.
    pub async fn replace(&self, key: &str, bytes: &[u8]) -> GemBridgeResult<String> {
        let path = self.path_for(key)?;
        let _guard = self.write_locks.lock(key).await;
        let checksum = write_entry(&path, bytes).await?;
        debug!(key, size = bytes.len(), %checksum, "Replaced cache entry");
        Ok(checksum)
    }

    /// Hold this guard while fetching `key` from upstream so concurrent
    /// misses for the same key wait for the first fetch instead of racing.
    pub async fn fetch_lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.fetch_locks.lock(key).await
    }

    /// Caller holds the write lock for `key`
    async fn checksum_locked(&self, key: &str, path: &Path) -> GemBridgeResult<Option<String>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }
        match read_sidecar(path).await? {
            Some(sum) => Ok(Some(sum)),
            None => self.repair_sidecar(key, path).await.map(Some),
        }
    }

    async fn repair_sidecar(&self, key: &str, path: &Path) -> GemBridgeResult<String> {
        warn!(key, "Checksum sidecar missing, recomputing");
        let bytes = fs::read(path)
            .await
            .map_err(|e| GemBridgeError::io(format!("reading {}", path.display()), e))?;
        let checksum = sha1_hex(&bytes);
        write_atomic(&sidecar_path(path), checksum.as_bytes()).await?;
        Ok(checksum)
    }

    /// Map a relative key onto a file below the root
    fn path_for(&self, key: &str) -> GemBridgeResult<PathBuf> {
        let relative = key.strip_prefix('/').unwrap_or(key);
        if relative.is_empty() || relative.ends_with(&format!(".{}", CHECKSUM_EXT)) {
            return Err(GemBridgeError::InvalidCacheKey(key.to_string()));
        }

        let mut path = self.root.clone();
        for segment in relative.split('/') {
            if segment.is_empty()
                || segment.starts_with('.')
                || segment.contains('\\')
                || segment.contains('\0')
            {
                return Err(GemBridgeError::InvalidCacheKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

/// SHA-1 of `bytes` as lowercase hex
pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Temp files and checksum sidecars are not entries
pub(crate) fn is_bookkeeping_file(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(&format!(".{}", CHECKSUM_EXT))
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(CHECKSUM_EXT);
    PathBuf::from(name)
}

async fn read_sidecar(path: &Path) -> GemBridgeResult<Option<String>> {
    let sidecar = sidecar_path(path);
    match fs::read_to_string(&sidecar).await {
        Ok(sum) => Ok(Some(sum.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GemBridgeError::io(
            format!("reading checksum {}", sidecar.display()),
            e,
        )),
    }
}

/// Write sidecar first, then the entry. Callers hold the key's write lock
/// across both renames, which is what readers synchronize on.
async fn write_entry(path: &Path, bytes: &[u8]) -> GemBridgeResult<String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            GemBridgeError::io(format!("creating directory {}", parent.display()), e)
        })?;
    }

    let checksum = sha1_hex(bytes);
    write_atomic(&sidecar_path(path), checksum.as_bytes()).await?;
    write_atomic(path, bytes).await?;
    Ok(checksum)
}

/// Write to a temp file in the same directory and rename into place
async fn write_atomic(dest: &Path, bytes: &[u8]) -> GemBridgeResult<()> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| GemBridgeError::InvalidCacheKey(dest.display().to_string()))?;
    let tmp = dest.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, dest).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp).await;
        return Err(GemBridgeError::io(
            format!("writing cache file {}", dest.display()),
            e,
        ));
    }
    Ok(())
}
