//! Embedded HTTP front ends
//!
//! Both routers translate resolution outcomes into HTTP the same way:
//!
//! | outcome                    | status                      |
//! |----------------------------|-----------------------------|
//! | `Payload`                  | 200                         |
//! | `NotExists` / `NoPayload`  | 404                         |
//! | `Forbidden`                | 403                         |
//! | `TransientUnavailable`     | 503 with `Retry-After: 1`   |
//! | `Error`                    | 500                         |

pub mod mux;
pub mod proxy;

pub use mux::RepositoryMultiplexer;
pub use proxy::DescriptorProxyServer;

use crate::error::{GemBridgeError, GemBridgeResult};
use crate::resolver::ResolutionOutcome;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Turn an outcome into a response, streaming payloads with `content_type`
pub(crate) fn outcome_response(
    outcome: ResolutionOutcome,
    content_type: &'static str,
) -> Response {
    match outcome {
        ResolutionOutcome::Payload(payload) => {
            let body = Body::from_stream(ReaderStream::new(payload.source));
            let mut response = body.into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(payload.size));
            response
        }
        ResolutionOutcome::NotExists | ResolutionOutcome::NoPayload(_) => {
            StatusCode::NOT_FOUND.into_response()
        }
        ResolutionOutcome::Forbidden => StatusCode::FORBIDDEN.into_response(),
        ResolutionOutcome::TransientUnavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
        )
            .into_response(),
        ResolutionOutcome::Error(e) => {
            warn!(error = %e, "Resolution failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Catch-all for request shapes no route recognizes
pub(crate) async fn forbidden() -> StatusCode {
    StatusCode::FORBIDDEN
}

/// A router being served on a bound listener
pub(crate) struct RunningServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RunningServer {
    /// Bind `bind` and serve `router` until shut down
    pub(crate) async fn spawn(
        bind: &str,
        router: Router,
        name: &'static str,
    ) -> GemBridgeResult<Self> {
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|e| GemBridgeError::Bind {
                addr: bind.to_string(),
                source: e,
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| GemBridgeError::io("reading listener address", e))?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                warn!(server = name, error = %e, "Server stopped with error");
            }
        });

        info!(server = name, %addr, "Listening");
        Ok(Self { addr, cancel, task })
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub(crate) async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Server task failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gems::PathKind;

    /// Blocking GET through ureq on the blocking pool: (status, content type, body)
    pub(crate) async fn get(url: String) -> (u16, Option<String>, Vec<u8>) {
        tokio::task::spawn_blocking(move || {
            use std::io::Read;

            let agent: ureq::Agent = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .into();
            let response = agent.get(&url).call().unwrap();
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let mut body = Vec::new();
            response
                .into_body()
                .into_reader()
                .read_to_end(&mut body)
                .unwrap();
            (status, content_type, body)
        })
        .await
        .unwrap()
    }

    #[test]
    fn status_mapping() {
        let status = |outcome| outcome_response(outcome, "text/plain").status();

        assert_eq!(status(ResolutionOutcome::bytes(b"x".to_vec(), None)), StatusCode::OK);
        assert_eq!(status(ResolutionOutcome::NotExists), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ResolutionOutcome::NoPayload(PathKind::DirectoryListing)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(ResolutionOutcome::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            status(ResolutionOutcome::Error(GemBridgeError::Internal("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unavailable_asks_to_retry() {
        let response = outcome_response(ResolutionOutcome::TransientUnavailable, "text/plain");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn payload_headers() {
        let outcome = ResolutionOutcome::bytes(b"pong".to_vec(), None);
        let response = outcome_response(outcome, "text/plain");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
    }
}
