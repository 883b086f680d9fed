//! Descriptor proxy: a gem repository seen as an Ivy repository
//!
//! | route                                      | content type |
//! |--------------------------------------------|--------------|
//! | `/{group}/{module}/{revision}/ivy.xml`      | `text/xml`   |
//! | `/{group}/{module}/{revision}/ivy.xml.sha1` | `text/plain` |
//! | `/{group}/{module}[/]`                      | `text/html`  |
//! | anything else                              | 403          |
//!
//! `descriptor.xml` is accepted as an alias of `ivy.xml`.

use crate::descriptor::DescriptorService;
use crate::error::{GemBridgeError, GemBridgeResult};
use crate::server::{forbidden, outcome_response, RunningServer};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

const DESCRIPTOR_FILES: [&str; 2] = ["ivy.xml", "descriptor.xml"];

/// Embedded Ivy-shaped HTTP server over one descriptor service
pub struct DescriptorProxyServer {
    service: Arc<DescriptorService>,
    bind: String,
    running: Option<RunningServer>,
}

impl DescriptorProxyServer {
    pub fn new(service: DescriptorService, bind: impl Into<String>) -> Self {
        Self {
            service: Arc::new(service),
            bind: bind.into(),
            running: None,
        }
    }

    /// Routes of the proxy, without a listener
    pub fn router(&self) -> Router {
        Router::new()
            .route("/{group}/{module}/{revision}/{file}", get(release_file))
            .route("/{group}/{module}", get(listing))
            .route("/{group}/{module}/", get(listing))
            .fallback(forbidden)
            .with_state(self.service.clone())
    }

    /// Bind and start serving; returns the bound address
    pub async fn start(&mut self) -> GemBridgeResult<SocketAddr> {
        if let Some(running) = &self.running {
            return Ok(running.addr());
        }
        let running = RunningServer::spawn(&self.bind, self.router(), "descriptor-proxy").await?;
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

    /// Base URL for Ivy resolvers, e.g. `http://127.0.0.1:41234`
    pub fn base_url(&self) -> GemBridgeResult<String> {
        Ok(format!("http://{}", self.local_addr()?))
    }

    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown().await;
        }
    }
}

async fn release_file(
    State(service): State<Arc<DescriptorService>>,
    Path((group, module, revision, file)): Path<(String, String, String, String)>,
) -> Response {
    debug!(%group, %module, %revision, %file, "Descriptor request");

    if DESCRIPTOR_FILES.contains(&file.as_str()) {
        let outcome = service.descriptor(&group, &module, &revision).await;
        return outcome_response(outcome, "text/xml");
    }

    let is_checksum = file
        .strip_suffix(".sha1")
        .is_some_and(|name| DESCRIPTOR_FILES.contains(&name));
    if is_checksum {
        let outcome = service.checksum(&group, &module, &revision).await;
        return outcome_response(outcome, "text/plain");
    }

    StatusCode::FORBIDDEN.into_response()
}

async fn listing(
    State(service): State<Arc<DescriptorService>>,
    Path((group, module)): Path<(String, String)>,
) -> Response {
    let outcome = service.listing(&group, &module).await;
    outcome_response(outcome, "text/html")
}
