//! Blocking HTTP transport, run on the blocking thread pool

use crate::config::schema::UpstreamConfig;
use crate::error::{GemBridgeError, GemBridgeResult};
use crate::upstream::{Upstream, UpstreamLocation, UpstreamResponse};
use async_trait::async_trait;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Upstream reached over HTTP(S) with `ureq`
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpUpstream {
    /// Build a transport from config
    pub fn new(config: &UpstreamConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs.max(1))))
            .http_status_as_error(false)
            .build();

        Self {
            agent: agent_config.into(),
            user_agent: config.user_agent.clone(),
        }
    }

    fn get_blocking(
        agent: &ureq::Agent,
        user_agent: &str,
        url: &str,
    ) -> GemBridgeResult<UpstreamResponse> {
        let response = match agent.get(url).header("User-Agent", user_agent).call() {
            Ok(response) => response,
            Err(e) if is_transient(&e) => {
                debug!(url, error = %e, "Upstream unreachable");
                return Ok(UpstreamResponse::Unavailable);
            }
            Err(e) => return Err(GemBridgeError::upstream(url, e.to_string())),
        };

        let status = response.status().as_u16();
        debug!(url, status, "Upstream responded");

        match classify_status(status) {
            StatusClass::Success => {
                let mut body = Vec::new();
                response
                    .into_body()
                    .into_reader()
                    .read_to_end(&mut body)
                    .map_err(|e| GemBridgeError::io(format!("reading body of {}", url), e))?;
                Ok(UpstreamResponse::Found(body))
            }
            StatusClass::NotFound => Ok(UpstreamResponse::NotFound),
            StatusClass::Forbidden => Ok(UpstreamResponse::Forbidden),
            StatusClass::Transient => Ok(UpstreamResponse::Unavailable),
            StatusClass::Unexpected => Err(GemBridgeError::UpstreamStatus {
                url: url.to_string(),
                status,
            }),
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(
        &self,
        location: &UpstreamLocation,
        path: &str,
    ) -> GemBridgeResult<UpstreamResponse> {
        let url = location.join(path);
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();

        tokio::task::spawn_blocking(move || Self::get_blocking(&agent, &user_agent, &url))
            .await
            .map_err(|e| GemBridgeError::Internal(format!("upstream fetch task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Connection-level failures that a later attempt may not hit
fn is_transient(error: &ureq::Error) -> bool {
    use std::io::ErrorKind;

    match error {
        ureq::Error::Timeout(_) | ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            true
        }
        ureq::Error::Io(e) => matches!(
            e.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
                | ErrorKind::BrokenPipe
                | ErrorKind::TimedOut
                | ErrorKind::UnexpectedEof
                | ErrorKind::Interrupted
        ),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Success,
    NotFound,
    Forbidden,
    Transient,
    Unexpected,
}

fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        404 | 410 => StatusClass::NotFound,
        401 | 403 => StatusClass::Forbidden,
        408 | 429 | 502 | 503 | 504 => StatusClass::Transient,
        _ => StatusClass::Unexpected,
    }
}
