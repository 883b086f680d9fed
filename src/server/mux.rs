//! Repository multiplexer: many upstream gem repositories behind one
//! listener, each exposed as a Maven release feed.
//!
//! ```text
//! https://rubygems.org  ->  /https___rubygems_org/caching/maven/releases/...
//!                            <cache>/repositories/https___rubygems_org/
//! ```
//!
//! Mappings are isolated from each other: own resolver, own cache
//! directory, own settings. Requests are dispatched on the first path
//! segment, so mappings can be added while the listener runs.

use crate::cache::{dir_name_for, CacheStore, REPOSITORIES_DIR};
use crate::config::schema::{RepositoryConfig, UpstreamConfig};
use crate::error::{GemBridgeError, GemBridgeResult};
use crate::registry::ResolverHandle;
use crate::resolver::{Resolve, Resolver};
use crate::server::{outcome_response, RunningServer};
use crate::upstream::{HttpUpstream, OfflineUpstream, Upstream, UpstreamLocation};
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Suffix of every public base path
pub const RELEASES_SUFFIX: &str = "/caching/maven/releases";

/// One registered repository
#[derive(Debug)]
pub struct Mapping {
    /// First path segment, derived from the upstream URL
    pub name: String,
    pub config: RepositoryConfig,
    handle: ResolverHandle,
}

impl Mapping {
    /// Public base path, e.g. `/https___rubygems_org/caching/maven/releases`
    pub fn base_path(&self) -> String {
        format!("/{}{}", self.name, RELEASES_SUFFIX)
    }

    pub fn handle(&self) -> &ResolverHandle {
        &self.handle
    }
}

#[derive(Debug, Default)]
struct Mappings {
    by_name: HashMap<String, Arc<Mapping>>,
    urls: HashSet<String>,
}

type SharedMappings = Arc<RwLock<Mappings>>;

/// Serves several gem repositories under one embedded listener
pub struct RepositoryMultiplexer {
    cache_root: PathBuf,
    upstream: UpstreamConfig,
    bind: String,
    mappings: SharedMappings,
    running: Option<RunningServer>,
}

impl RepositoryMultiplexer {
    /// Multiplexer caching below `<cache_root>/repositories`
    pub fn new(cache_root: impl Into<PathBuf>, upstream: UpstreamConfig) -> Self {
        Self {
            cache_root: cache_root.into(),
            upstream,
            bind: "127.0.0.1:0".to_string(),
            mappings: Arc::new(RwLock::new(Mappings::default())),
            running: None,
        }
    }

    /// Listen on `bind` instead of an ephemeral loopback port
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Register a repository and return its public base path.
    ///
    /// Returns `None` if the URL is already registered.
    pub fn register(&self, config: RepositoryConfig) -> GemBridgeResult<Option<String>> {
        let upstream = self.transport_for(&config);
        self.register_with(config, upstream)
    }

    /// Register a repository served through a specific transport
    pub fn register_with(
        &self,
        config: RepositoryConfig,
        upstream: Arc<dyn Upstream>,
    ) -> GemBridgeResult<Option<String>> {
        let location = UpstreamLocation::parse(&config.url)?;
        let mut mappings = write(&self.mappings);

        if mappings.urls.contains(location.as_str()) {
            debug!(url = %location, "Repository already registered");
            return Ok(None);
        }

        let name = dir_name_for(location.as_str());
        if mappings.by_name.contains_key(&name) {
            return Err(GemBridgeError::User(format!(
                "repository {} collides with an existing mapping named {}",
                location, name
            )));
        }

        let dir = self.cache_root.join(REPOSITORIES_DIR).join(&name);
        let store = CacheStore::open(&dir)?;
        let resolver = Resolver::new(location.clone(), Arc::new(store), upstream);
        let mapping = Arc::new(Mapping {
            name: name.clone(),
            config,
            handle: ResolverHandle::new(resolver),
        });
        let base_path = mapping.base_path();

        mappings.urls.insert(location.as_str().to_string());
        mappings.by_name.insert(name, mapping);

        info!(
            url = %location,
            path = %base_path,
            cache = %dir.display(),
            "Registered repository"
        );
        Ok(Some(base_path))
    }

    fn transport_for(&self, config: &RepositoryConfig) -> Arc<dyn Upstream> {
        if config.offline || self.upstream.offline {
            Arc::new(OfflineUpstream)
        } else {
            Arc::new(HttpUpstream::new(&self.upstream))
        }
    }

    /// Registered mappings ordered by name
    pub fn mappings(&self) -> Vec<Arc<Mapping>> {
        let mut all: Vec<_> = read(&self.mappings).by_name.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn router(&self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(self.mappings.clone())
    }

    /// Bind and start serving; returns the bound address
    pub async fn start(&mut self) -> GemBridgeResult<SocketAddr> {
        if let Some(running) = &self.running {
            return Ok(running.addr());
        }
        let running = RunningServer::spawn(&self.bind, self.router(), "multiplexer").await?;
        let addr = running.addr();
        self.running = Some(running);
        Ok(addr)
    }

    pub fn local_addr(&self) -> GemBridgeResult<SocketAddr> {
        self.running
            .as_ref()
            .map(RunningServer::addr)
            .ok_or(GemBridgeError::ServerNotRunning)
    }

    /// Full URL of `path` on the running listener
    pub fn url(&self, path: &str) -> GemBridgeResult<String> {
        Ok(format!("http://{}{}", self.local_addr()?, path))
    }

    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown().await;
        }
    }
}

fn read(mappings: &SharedMappings) -> RwLockReadGuard<'_, Mappings> {
    mappings.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(mappings: &SharedMappings) -> RwLockWriteGuard<'_, Mappings> {
    mappings.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Split `/<name>/caching/maven/releases/<relative>` into its parts
fn split_request(path: &str) -> Option<(&str, &str)> {
    let (name, rest) = path.strip_prefix('/')?.split_once('/')?;
    let relative = rest.strip_prefix(RELEASES_SUFFIX.trim_start_matches('/'))?;
    (relative.starts_with('/') && relative.len() > 1).then_some((name, relative))
}

async fn dispatch(State(mappings): State<SharedMappings>, uri: Uri) -> Response {
    let Some((name, relative)) = split_request(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mapping = {
        let mappings = read(&mappings);
        mappings.by_name.get(name).cloned()
    };
    let Some(mapping) = mapping else {
        return StatusCode::NOT_FOUND.into_response();
    };

    debug!(repository = %mapping.name, path = relative, "Repository request");
    let outcome = mapping.handle.resolve(relative).await;
    outcome_response(outcome, content_type_for(relative))
}

fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".sha1") || path == crate::gems::PING_PATH {
        "text/plain"
    } else if path.ends_with(".pom") || path.ends_with(".xml") {
        "application/xml"
    } else {
        "application/octet-stream"
    }
}
