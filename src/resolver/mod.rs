//! Resolution of relative paths against one upstream, with a write-through
//! cache in front of it.
//!
//! Every call yields exactly one `ResolutionOutcome`. Faults never escape as
//! panics or `Err`; they become `ResolutionOutcome::Error`.

pub mod outcome;

pub use outcome::{OutcomeTag, Payload, ResolutionOutcome};

use crate::cache::{sha1_hex, CacheStore};
use crate::descriptor::{render_maven_metadata, render_pom};
use crate::error::GemBridgeError;
use crate::gems::{
    classify, CompactInfo, GemCoordinates, PathClassification, PathKind, PING_PATH, RELEASE_ROOT,
};
use crate::upstream::{Upstream, UpstreamLocation, UpstreamResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

/// Deepest chain of derived lookups a single request may trigger.
///
/// A release-layout gem needs its dependency metadata (depth 1) and then the
/// canonical archive (depth 1); a checksum of such a gem adds one more level.
pub const MAX_DEPTH: u8 = 2;

const PONG: &[u8] = b"pong";

/// Anything that can turn a relative path into an outcome
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Resolve `path`, serving from cache where possible
    async fn resolve(&self, path: &str) -> ResolutionOutcome;

    /// Resolve `path` bypassing cached copies of mutable documents
    async fn refresh(&self, path: &str) -> ResolutionOutcome {
        self.resolve(path).await
    }
}

/// Resolver for one upstream location
pub struct Resolver {
    location: UpstreamLocation,
    store: Arc<CacheStore>,
    upstream: Arc<dyn Upstream>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("location", &self.location)
            .field("store", &self.store.root())
            .field("upstream", &self.upstream.name())
            .finish()
    }
}

impl Resolver {
    pub fn new(
        location: UpstreamLocation,
        store: Arc<CacheStore>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            location,
            store,
            upstream,
        }
    }

    pub fn location(&self) -> &UpstreamLocation {
        &self.location
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    fn resolve_at<'a>(&'a self, path: &'a str, depth: u8) -> BoxFuture<'a, ResolutionOutcome> {
        Box::pin(async move {
            let classification = classify(path);
            if depth > MAX_DEPTH {
                debug!(path, depth, "Derivation depth exhausted");
                return ResolutionOutcome::NoPayload(classification.kind());
            }

            let outcome = match classification {
                PathClassification::Ping => self.resolve_ping().await,
                PathClassification::GemFile { .. }
                | PathClassification::GemSpec { .. }
                | PathClassification::DependencyInfo { .. } => {
                    self.fetch_through(path, None).await
                }
                PathClassification::GemArtifact(coords) => {
                    self.resolve_artifact(&coords, depth).await
                }
                PathClassification::Pom(coords) => self.resolve_pom(&coords, depth).await,
                PathClassification::MavenMetadata { name } => {
                    self.resolve_metadata(&name, depth).await
                }
                PathClassification::Checksum { target } => {
                    self.resolve_checksum(&target, depth).await
                }
                PathClassification::DirectoryListing { .. } => {
                    ResolutionOutcome::NoPayload(PathKind::DirectoryListing)
                }
                PathClassification::Unclassified => ResolutionOutcome::Forbidden,
            };

            debug!(
                upstream = %self.location,
                path,
                depth,
                outcome = %outcome.tag(),
                "Resolved"
            );
            outcome
        })
    }

    /// `/ping` is answered from cache, or synthesized and cached
    async fn resolve_ping(&self) -> ResolutionOutcome {
        match self.store.open_for_read(PING_PATH).await {
            Ok(Some(cached)) => return ResolutionOutcome::Payload(cached.into()),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not read cached ping"),
        }

        let checksum = match self.store.put(PING_PATH, PONG).await {
            Ok(sum) => sum,
            Err(e) => {
                warn!(error = %e, "Could not cache ping");
                sha1_hex(PONG)
            }
        };
        ResolutionOutcome::bytes(PONG.to_vec(), Some(checksum))
    }

    async fn cached(&self, key: &str) -> Result<Option<Payload>, GemBridgeError> {
        Ok(self.store.open_for_read(key).await?.map(Payload::from))
    }

    /// Serve `key` from cache, or fetch it once and write it through.
    ///
    /// `expected_sha256` is verified before anything is stored.
    async fn fetch_through(&self, key: &str, expected_sha256: Option<&str>) -> ResolutionOutcome {
        match self.cached(key).await {
            Ok(Some(payload)) => return ResolutionOutcome::Payload(payload),
            Ok(None) => {}
            Err(e) => return ResolutionOutcome::Error(e),
        }

        let _guard = self.store.fetch_lock(key).await;

        // Filled by a concurrent request while we waited
        match self.cached(key).await {
            Ok(Some(payload)) => return ResolutionOutcome::Payload(payload),
            Ok(None) => {}
            Err(e) => return ResolutionOutcome::Error(e),
        }

        let bytes = match self.upstream.fetch(&self.location, key).await {
            Ok(UpstreamResponse::Found(bytes)) => bytes,
            Ok(response) => return map_miss(response),
            Err(e) => return ResolutionOutcome::Error(e),
        };

        if let Some(expected) = expected_sha256 {
            let actual = hex::encode(Sha256::digest(&bytes));
            if !actual.eq_ignore_ascii_case(expected) {
                warn!(key, expected, %actual, "Upstream bytes failed verification");
                return ResolutionOutcome::Error(GemBridgeError::ChecksumMismatch {
                    path: key.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        match self.store.put(key, &bytes).await {
            Ok(checksum) => ResolutionOutcome::bytes(bytes, Some(checksum)),
            Err(e) => ResolutionOutcome::Error(e),
        }
    }

    /// Re-fetch `key` and swap the cached copy; the old copy survives misses
    async fn refetch(&self, key: &str) -> ResolutionOutcome {
        let _guard = self.store.fetch_lock(key).await;

        let bytes = match self.upstream.fetch(&self.location, key).await {
            Ok(UpstreamResponse::Found(bytes)) => bytes,
            Ok(response) => return map_miss(response),
            Err(e) => return ResolutionOutcome::Error(e),
        };

        match self.store.replace(key, &bytes).await {
            Ok(checksum) => ResolutionOutcome::bytes(bytes, Some(checksum)),
            Err(e) => ResolutionOutcome::Error(e),
        }
    }

    async fn load_info(
        &self,
        name: &str,
        kind: PathKind,
        outcome: ResolutionOutcome,
    ) -> Result<CompactInfo, ResolutionOutcome> {
        match outcome {
            ResolutionOutcome::Payload(payload) => {
                let bytes = payload.into_bytes().await.map_err(|e| {
                    ResolutionOutcome::Error(GemBridgeError::io(
                        format!("reading dependency info of {}", name),
                        e,
                    ))
                })?;
                CompactInfo::parse(name, &String::from_utf8_lossy(&bytes))
                    .map_err(ResolutionOutcome::Error)
            }
            ResolutionOutcome::NoPayload(_) => Err(ResolutionOutcome::NoPayload(kind)),
            other => Err(other),
        }
    }

    /// Dependency metadata that knows `coords`, refreshed once from upstream
    /// when the cached copy predates the release
    async fn release_info(
        &self,
        coords: &GemCoordinates,
        kind: PathKind,
        depth: u8,
    ) -> Result<CompactInfo, ResolutionOutcome> {
        let info_path = format!("/info/{}", coords.name);
        let cached = self.resolve_at(&info_path, depth + 1).await;
        let info = self.load_info(&coords.name, kind, cached).await?;
        if info.select(&coords.version, coords.platform.as_deref()).is_some() {
            return Ok(info);
        }

        debug!(gem = %coords, "Release missing from cached info, refreshing");
        let fresh = self.refetch(&info_path).await;
        self.load_info(&coords.name, kind, fresh).await
    }

    /// Fetch time of the cached metadata of `name`, used as `lastUpdated`
    async fn info_timestamp(&self, name: &str) -> DateTime<Utc> {
        match self.store.entry(&format!("/info/{}", name)).await {
            Ok(Some(entry)) => entry.fetched_at,
            _ => Utc::now(),
        }
    }

    /// Derive the canonical archive of a release-layout gem and fetch it
    async fn resolve_artifact(&self, coords: &GemCoordinates, depth: u8) -> ResolutionOutcome {
        if depth + 1 > MAX_DEPTH {
            return ResolutionOutcome::NoPayload(PathKind::GemArtifact);
        }

        let info = match self.release_info(coords, PathKind::GemArtifact, depth).await {
            Ok(info) => info,
            Err(outcome) => return outcome,
        };
        let Some(entry) = info.select(&coords.version, coords.platform.as_deref()) else {
            return ResolutionOutcome::NotExists;
        };
        let canonical = GemCoordinates::new(&coords.name, &entry.version)
            .with_platform(entry.platform.clone());

        self.fetch_through(&canonical.gem_path(), entry.checksum.as_deref())
            .await
    }

    /// POM of a release-layout gem, rendered from its dependency metadata
    async fn resolve_pom(&self, coords: &GemCoordinates, depth: u8) -> ResolutionOutcome {
        if depth + 1 > MAX_DEPTH {
            return ResolutionOutcome::NoPayload(PathKind::Pom);
        }

        let info = match self.release_info(coords, PathKind::Pom, depth).await {
            Ok(info) => info,
            Err(outcome) => return outcome,
        };
        let Some(entry) = info.select(&coords.version, None) else {
            return ResolutionOutcome::NotExists;
        };

        let xml = render_pom(RELEASE_ROOT, &coords.name, &coords.version, &entry.dependencies);
        let checksum = sha1_hex(&xml);
        ResolutionOutcome::bytes(xml, Some(checksum))
    }

    /// `maven-metadata.xml` listing every known version of `name`
    async fn resolve_metadata(&self, name: &str, depth: u8) -> ResolutionOutcome {
        if depth + 1 > MAX_DEPTH {
            return ResolutionOutcome::NoPayload(PathKind::MavenMetadata);
        }

        let info_path = format!("/info/{}", name);
        let cached = self.resolve_at(&info_path, depth + 1).await;
        let info = match self.load_info(name, PathKind::MavenMetadata, cached).await {
            Ok(info) => info,
            Err(outcome) => return outcome,
        };
        let versions = info.versions();
        if versions.is_empty() {
            return ResolutionOutcome::NotExists;
        }

        let updated = self.info_timestamp(name).await;
        let xml = render_maven_metadata(RELEASE_ROOT, name, &versions, updated);
        let checksum = sha1_hex(&xml);
        ResolutionOutcome::bytes(xml, Some(checksum))
    }

    /// SHA-1 sidecar of another path, as lowercase hex text
    async fn resolve_checksum(&self, target: &str, depth: u8) -> ResolutionOutcome {
        match self.resolve_at(target, depth + 1).await {
            ResolutionOutcome::Payload(payload) => {
                let sum = match payload.checksum {
                    Some(sum) => sum,
                    None => match payload.source.read_all().await {
                        Ok(bytes) => sha1_hex(&bytes),
                        Err(e) => {
                            return ResolutionOutcome::Error(GemBridgeError::io(
                                format!("reading {}", target),
                                e,
                            ))
                        }
                    },
                };
                ResolutionOutcome::bytes(sum.into_bytes(), None)
            }
            ResolutionOutcome::NoPayload(_) => ResolutionOutcome::NoPayload(PathKind::Checksum),
            other => other,
        }
    }
}

fn map_miss(response: UpstreamResponse) -> ResolutionOutcome {
    match response {
        UpstreamResponse::NotFound => ResolutionOutcome::NotExists,
        UpstreamResponse::Forbidden => ResolutionOutcome::Forbidden,
        UpstreamResponse::Unavailable => ResolutionOutcome::TransientUnavailable,
        UpstreamResponse::Found(_) => {
            ResolutionOutcome::Error(GemBridgeError::Internal("unexpected payload".to_string()))
        }
    }
}

#[async_trait]
impl Resolve for Resolver {
    async fn resolve(&self, path: &str) -> ResolutionOutcome {
        self.resolve_at(path, 0).await
    }

    async fn refresh(&self, path: &str) -> ResolutionOutcome {
        match classify(path) {
            PathClassification::DependencyInfo { .. } => self.refetch(path).await,
            _ => self.resolve_at(path, 0).await,
        }
    }
}
