//! Ivy descriptors synthesized from gem dependency metadata. The release
//! layout's POMs and `maven-metadata.xml` are rendered from the same data
//! (see `maven`).
//!
//! Descriptors are rendered from `/info/<module>` and cached in the
//! resolver's store next to the upstream files:
//!
//! ```text
//! <store>/info/rake
//! <store>/ivy/rubygems/rake/13.0.6/ivy.xml
//! <store>/ivy/rubygems/rake/13.0.6/ivy.xml.sha1
//! ```

pub mod ivy;
pub mod maven;
pub mod range;

pub use ivy::{escape_xml, render_ivy, render_listing};
pub use maven::{render_maven_metadata, render_pom};
pub use range::ivy_range;

use crate::error::GemBridgeError;
use crate::gems::CompactInfo;
use crate::registry::ResolverHandle;
use crate::resolver::{Resolve, ResolutionOutcome};
use std::sync::Arc;
use tracing::debug;

/// Serves descriptors, their checksums and revision listings for one group
pub struct DescriptorService {
    handle: Arc<ResolverHandle>,
    group: String,
    refresh_dependencies: bool,
}

impl DescriptorService {
    pub fn new(
        handle: Arc<ResolverHandle>,
        group: impl Into<String>,
        refresh_dependencies: bool,
    ) -> Self {
        Self {
            handle,
            group: group.into(),
            refresh_dependencies,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn handle(&self) -> &Arc<ResolverHandle> {
        &self.handle
    }

    /// Rendered `ivy.xml` for `group:module:revision`
    pub async fn descriptor(&self, group: &str, module: &str, revision: &str) -> ResolutionOutcome {
        if group != self.group {
            return ResolutionOutcome::NotExists;
        }

        let key = descriptor_key(group, module, revision);
        let store = self.handle.store();

        if !self.refresh_dependencies {
            match store.open_for_read(&key).await {
                Ok(Some(cached)) => return ResolutionOutcome::Payload(cached.into()),
                Ok(None) => {}
                // An unsafe module or revision name surfaces here
                Err(GemBridgeError::InvalidCacheKey(_)) => return ResolutionOutcome::NotExists,
                Err(e) => return ResolutionOutcome::Error(e),
            }
        }

        let info = match self.info(module, self.refresh_dependencies).await {
            Ok(info) => info,
            Err(outcome) => return outcome,
        };
        let info = if info.has_version(revision) || self.refresh_dependencies {
            info
        } else {
            debug!(module, revision, "Revision missing from cached metadata, refreshing");
            match self.info(module, true).await {
                Ok(info) => info,
                Err(outcome) => return outcome,
            }
        };

        let Some(entry) = info.select(revision, None) else {
            return ResolutionOutcome::NotExists;
        };
        let xml = render_ivy(group, module, revision, &entry.dependencies);

        let stored = if self.refresh_dependencies {
            store.replace(&key, &xml).await
        } else {
            store.put(&key, &xml).await
        };
        match stored {
            Ok(checksum) => {
                debug!(module, revision, %checksum, "Rendered descriptor");
                ResolutionOutcome::bytes(xml, Some(checksum))
            }
            Err(GemBridgeError::InvalidCacheKey(_)) => ResolutionOutcome::NotExists,
            Err(e) => ResolutionOutcome::Error(e),
        }
    }

    /// SHA-1 of the rendered descriptor, as text
    pub async fn checksum(&self, group: &str, module: &str, revision: &str) -> ResolutionOutcome {
        match self.descriptor(group, module, revision).await {
            ResolutionOutcome::Payload(payload) => {
                let sum = match payload.checksum {
                    Some(sum) => sum,
                    None => match payload.source.read_all().await {
                        Ok(bytes) => crate::cache::sha1_hex(&bytes),
                        Err(e) => {
                            return ResolutionOutcome::Error(GemBridgeError::io(
                                "reading rendered descriptor",
                                e,
                            ))
                        }
                    },
                };
                ResolutionOutcome::bytes(sum.into_bytes(), None)
            }
            other => other,
        }
    }

    /// HTML listing of the known revisions of `module`
    pub async fn listing(&self, group: &str, module: &str) -> ResolutionOutcome {
        if group != self.group {
            return ResolutionOutcome::NotExists;
        }

        let info = match self.info(module, self.refresh_dependencies).await {
            Ok(info) => info,
            Err(outcome) => return outcome,
        };
        let versions = info.versions();
        if versions.is_empty() {
            return ResolutionOutcome::NotExists;
        }

        ResolutionOutcome::bytes(render_listing(group, module, &versions).into_bytes(), None)
    }

    async fn info(&self, module: &str, refresh: bool) -> Result<CompactInfo, ResolutionOutcome> {
        let path = format!("/info/{}", module);
        let outcome = if refresh {
            self.handle.refresh(&path).await
        } else {
            self.handle.resolve(&path).await
        };

        match outcome {
            ResolutionOutcome::Payload(payload) => {
                let bytes = payload.into_bytes().await.map_err(|e| {
                    ResolutionOutcome::Error(GemBridgeError::io(
                        format!("reading dependency info of {}", module),
                        e,
                    ))
                })?;
                CompactInfo::parse(module, &String::from_utf8_lossy(&bytes))
                    .map_err(ResolutionOutcome::Error)
            }
            // A module name that is not a plain gem name
            ResolutionOutcome::Forbidden => Err(ResolutionOutcome::NotExists),
            other => Err(other),
        }
    }
}

fn descriptor_key(group: &str, module: &str, revision: &str) -> String {
    format!("/ivy/{}/{}/{}/ivy.xml", group, module, revision)
}
