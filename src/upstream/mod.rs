//! Upstream gem repository access
//!
//! The resolver is the only component that talks to a real upstream, and it
//! does so through the `Upstream` trait so tests and offline runs can swap
//! the transport out.

pub mod client;
pub mod location;

pub use client::HttpUpstream;
pub use location::UpstreamLocation;

use crate::error::GemBridgeResult;
use async_trait::async_trait;

/// What the upstream said about one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamResponse {
    /// Body of a successful response
    Found(Vec<u8>),
    /// 404 / 410
    NotFound,
    /// 401 / 403
    Forbidden,
    /// Rate limited or temporarily failing; worth retrying later
    Unavailable,
}

/// Transport to gem repositories
#[async_trait]
pub trait Upstream: Send + Sync {
    /// GET `path` below `location`
    async fn fetch(
        &self,
        location: &UpstreamLocation,
        path: &str,
    ) -> GemBridgeResult<UpstreamResponse>;

    /// Human-readable transport name for logs
    fn name(&self) -> &'static str;
}

/// Transport used in offline mode: nothing exists beyond the cache
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineUpstream;

#[async_trait]
impl Upstream for OfflineUpstream {
    async fn fetch(
        &self,
        _location: &UpstreamLocation,
        _path: &str,
    ) -> GemBridgeResult<UpstreamResponse> {
        Ok(UpstreamResponse::NotFound)
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_never_finds_anything() {
        let location = UpstreamLocation::parse("https://rubygems.org").unwrap();
        let response = OfflineUpstream.fetch(&location, "/info/rake").await.unwrap();
        assert_eq!(response, UpstreamResponse::NotFound);
    }
}
