//! Process-wide map from upstream location to its resolver
//!
//! At most one resolver (and one cache directory) exists per upstream, no
//! matter how many locators or requests name it.

use crate::cache::{dir_name_for, CacheStore, FACADES_DIR};
use crate::config::schema::UpstreamConfig;
use crate::error::{GemBridgeError, GemBridgeResult};
use crate::resolver::{ResolutionOutcome, Resolve, Resolver};
use crate::upstream::{HttpUpstream, OfflineUpstream, Upstream, UpstreamLocation};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Resolver plus the cache it writes to
#[derive(Debug)]
pub struct ResolverHandle {
    resolver: Resolver,
}

impl ResolverHandle {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn store(&self) -> &CacheStore {
        self.resolver.store()
    }

    pub fn location(&self) -> &UpstreamLocation {
        self.resolver.location()
    }
}

#[async_trait]
impl Resolve for ResolverHandle {
    async fn resolve(&self, path: &str) -> ResolutionOutcome {
        self.resolver.resolve(path).await
    }

    async fn refresh(&self, path: &str) -> ResolutionOutcome {
        self.resolver.refresh(path).await
    }
}

/// Finds the resolver responsible for an upstream
pub trait ResolverLookup: Send + Sync {
    fn lookup(&self, location: &UpstreamLocation) -> GemBridgeResult<Arc<dyn Resolve>>;
}

/// Handles plus the cache directory names already handed out
#[derive(Default)]
struct Handles {
    by_location: HashMap<UpstreamLocation, Arc<ResolverHandle>>,
    by_dir: HashMap<String, UpstreamLocation>,
}

/// Lazily populated registry of resolvers, one per upstream location
pub struct FacadeRegistry {
    cache_root: PathBuf,
    upstream: Arc<dyn Upstream>,
    handles: Mutex<Handles>,
}

impl FacadeRegistry {
    /// Registry whose resolvers share `upstream` and cache below `cache_root`
    pub fn new(cache_root: impl Into<PathBuf>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            cache_root: cache_root.into(),
            upstream,
            handles: Mutex::new(Handles::default()),
        }
    }

    /// Registry using the configured transport
    pub fn from_config(cache_root: impl Into<PathBuf>, config: &UpstreamConfig) -> Self {
        let upstream: Arc<dyn Upstream> = if config.offline {
            Arc::new(OfflineUpstream)
        } else {
            Arc::new(HttpUpstream::new(config))
        };
        Self::new(cache_root, upstream)
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Cache directory used for `location`
    pub fn cache_dir_for(&self, location: &UpstreamLocation) -> PathBuf {
        self.cache_root
            .join(FACADES_DIR)
            .join(dir_name_for(location.as_str()))
    }

    /// Resolver for `location`, created on first use.
    ///
    /// Creation happens under the registry lock, so concurrent first requests
    /// for one location all receive the same handle. A location whose cache
    /// directory name is already taken by another location is rejected.
    pub fn get_or_create(
        &self,
        location: &UpstreamLocation,
    ) -> GemBridgeResult<Arc<ResolverHandle>> {
        let mut handles = self.handles();
        if let Some(handle) = handles.by_location.get(location) {
            return Ok(handle.clone());
        }

        let dir_name = dir_name_for(location.as_str());
        if let Some(owner) = handles.by_dir.get(&dir_name) {
            return Err(GemBridgeError::User(format!(
                "upstream {} collides with {} on cache directory {}",
                location, owner, dir_name
            )));
        }

        let dir = self.cache_dir_for(location);
        let store = CacheStore::open(&dir)?;
        let resolver = Resolver::new(location.clone(), Arc::new(store), self.upstream.clone());
        let handle = Arc::new(ResolverHandle::new(resolver));
        handles.by_location.insert(location.clone(), handle.clone());
        handles.by_dir.insert(dir_name, location.clone());

        info!(upstream = %location, cache = %dir.display(), "Created resolver");
        Ok(handle)
    }

    /// Locations with a resolver
    pub fn locations(&self) -> Vec<UpstreamLocation> {
        let mut locations: Vec<_> = self.handles().by_location.keys().cloned().collect();
        locations.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        locations
    }

    pub fn len(&self) -> usize {
        self.handles().by_location.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles().by_location.is_empty()
    }

    fn handles(&self) -> MutexGuard<'_, Handles> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResolverLookup for FacadeRegistry {
    fn lookup(&self, location: &UpstreamLocation) -> GemBridgeResult<Arc<dyn Resolve>> {
        let handle: Arc<dyn Resolve> = self.get_or_create(location)?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(temp: &TempDir) -> Arc<FacadeRegistry> {
        Arc::new(FacadeRegistry::new(temp.path(), Arc::new(OfflineUpstream)))
    }

    #[test]
    fn same_location_same_handle() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let location = UpstreamLocation::parse("https://rubygems.org").unwrap();

        let a = registry.get_or_create(&location).unwrap();
        let b = registry.get_or_create(&location).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(registry
            .cache_dir_for(&location)
            .ends_with("facades/https___rubygems_org"));
        assert!(a.store().root().is_dir());
    }

    #[test]
    fn trailing_slash_names_the_same_upstream() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let a = registry
            .get_or_create(&UpstreamLocation::parse("https://rubygems.org/").unwrap())
            .unwrap();
        let b = registry
            .get_or_create(&UpstreamLocation::parse("https://rubygems.org").unwrap())
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_locations_get_distinct_caches() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let a = registry
            .get_or_create(&UpstreamLocation::parse("https://rubygems.org").unwrap())
            .unwrap();
        let b = registry
            .get_or_create(&UpstreamLocation::parse("https://gems.example.com").unwrap())
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.store().root(), b.store().root());
        assert_eq!(registry.locations().len(), 2);
    }

    #[tokio::test]
    async fn colliding_cache_names_are_rejected() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let dashed = UpstreamLocation::parse("https://a-b.example.org").unwrap();
        let dotted = UpstreamLocation::parse("https://a.b.example.org").unwrap();

        let a = registry.get_or_create(&dashed).unwrap();
        let err = registry.get_or_create(&dotted).unwrap_err();
        assert!(matches!(err, GemBridgeError::User(_)));
        assert!(err.to_string().contains("https___a_b_example_org"));
        assert_eq!(registry.len(), 1);

        // The first owner keeps its cache to itself
        a.store().put("/gems/evil-1.0.gem", b"from a-b").await.unwrap();
        assert!(registry.get_or_create(&dotted).is_err());
        let again = registry.get_or_create(&dashed).unwrap();
        assert!(Arc::ptr_eq(&a, &again));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_creates_one_handle() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let location = UpstreamLocation::parse("https://rubygems.org").unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let location = location.clone();
            tasks.push(tokio::spawn(async move {
                registry.get_or_create(&location).unwrap()
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
