//! Protocol translator: opens synthetic locators as byte streams
//!
//! ```text
//! mavengem:https://rubygems.org/maven/releases/rubygems/rake/13.0.6/rake-13.0.6.gem
//! \______/ \__________________/\_____________/\__________________________________/
//!  scheme     upstream base        marker              relative path
//! ```
//!
//! Opening a locator is lazy; nothing is resolved until `input_stream()`.
//! Transient upstream failures are retried with a fixed delay. The wait is
//! the only suspension point the translator adds, and it can be cut short
//! with a cancellation token or a deadline.

pub mod global;
pub mod locator;

pub use locator::{Locator, MARKER, SCHEME};

use crate::config::schema::RetryConfig;
use crate::error::{GemBridgeError, GemBridgeResult};
use crate::gems::{classify, PathKind, PING_PATH};
use crate::registry::ResolverLookup;
use crate::resolver::{Payload, Resolve, ResolutionOutcome};
use crate::upstream::UpstreamLocation;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fixed-delay retry budget for `TransientUnavailable`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 12,
            delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

/// Opens locators against resolvers found through a lookup
#[derive(Clone)]
pub struct ProtocolTranslator {
    lookup: Arc<dyn ResolverLookup>,
    retry: RetryPolicy,
}

impl ProtocolTranslator {
    pub fn new(lookup: Arc<dyn ResolverLookup>, retry: RetryPolicy) -> Self {
        Self { lookup, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Parse `locator` and return an unopened connection
    pub fn open(&self, locator: &str) -> GemBridgeResult<GemConnection> {
        let locator = Locator::parse(locator)?;
        Ok(self.connect(locator))
    }

    /// Connection for an already parsed locator
    pub fn connect(&self, locator: Locator) -> GemConnection {
        GemConnection {
            locator,
            lookup: self.lookup.clone(),
            retry: self.retry,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Open `/ping` below `base` and check the answer
    pub async fn self_test(&self, base: &UpstreamLocation) -> GemBridgeResult<()> {
        let connection = self.connect(Locator::new(base, PING_PATH));
        let payload = connection.input_stream().await?;
        let bytes = payload
            .into_bytes()
            .await
            .map_err(|e| GemBridgeError::io("reading ping response", e))?;

        if bytes != b"pong" {
            return Err(GemBridgeError::Internal(format!(
                "unexpected ping response from {}: {:?}",
                base,
                String::from_utf8_lossy(&bytes)
            )));
        }
        info!(upstream = %base, "Self-test passed");
        Ok(())
    }
}

/// A lazily opened locator
pub struct GemConnection {
    locator: Locator,
    lookup: Arc<dyn ResolverLookup>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl GemConnection {
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Abort retry waits when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Give up retrying once `deadline` would be passed
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Resolve the locator and hand out its bytes.
    ///
    /// | outcome                | result                                 |
    /// |------------------------|----------------------------------------|
    /// | `Payload`              | the byte source                        |
    /// | `Forbidden`            | `Forbidden`                            |
    /// | `NotExists`            | `NotFound`, except `/ping`             |
    /// | `NoPayload`            | one fallback to the plain remote path  |
    /// | `TransientUnavailable` | retried, then `Unavailable`            |
    /// | `Error`                | `Io` wrapping the cause                |
    pub async fn input_stream(&self) -> GemBridgeResult<Payload> {
        let location = self.locator.location()?;
        let resolver = self.lookup.lookup(&location)?;

        let requested = self.locator.relative();
        let mut path = requested.to_string();
        let mut fell_back = false;
        let mut attempt: u32 = 1;

        loop {
            if self.cancel.is_cancelled() {
                return Err(GemBridgeError::Cancelled(path));
            }

            match resolver.resolve(&path).await {
                ResolutionOutcome::Payload(payload) => return Ok(payload),
                ResolutionOutcome::Forbidden => return Err(GemBridgeError::Forbidden(path)),
                ResolutionOutcome::NotExists if path == PING_PATH => {
                    return Ok(Payload::from_bytes(b"pong".to_vec(), None));
                }
                ResolutionOutcome::NotExists => return Err(GemBridgeError::NotFound(path)),
                ResolutionOutcome::NoPayload(kind) => {
                    match fallback_path(&path, kind).filter(|_| !fell_back) {
                        Some(remote) => {
                            debug!(from = %path, to = %remote, "Falling back to remote path");
                            path = remote;
                            fell_back = true;
                        }
                        None => return Err(GemBridgeError::NotFound(requested.to_string())),
                    }
                }
                ResolutionOutcome::TransientUnavailable => {
                    if attempt >= self.retry.attempts {
                        warn!(path = %path, attempts = attempt, "Giving up on upstream");
                        return Err(GemBridgeError::Unavailable {
                            path,
                            attempts: attempt,
                        });
                    }
                    debug!(path = %path, attempt, "Upstream unavailable, retrying");
                    self.wait(&path, attempt).await?;
                    attempt += 1;
                }
                ResolutionOutcome::Error(cause) => {
                    return Err(GemBridgeError::io(
                        format!("resolving {}", self.locator),
                        std::io::Error::other(cause),
                    ));
                }
            }
        }
    }

    /// Sleep for the retry delay unless cancelled or past the deadline
    async fn wait(&self, path: &str, attempts: u32) -> GemBridgeResult<()> {
        let wake = Instant::now() + self.retry.delay;
        if let Some(deadline) = self.deadline {
            if wake > deadline {
                return Err(GemBridgeError::Unavailable {
                    path: path.to_string(),
                    attempts,
                });
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(GemBridgeError::Cancelled(path.to_string())),
            _ = tokio::time::sleep_until(wake) => Ok(()),
        }
    }
}

/// Path to try once when `path` has no payload of its own
fn fallback_path(path: &str, kind: PathKind) -> Option<String> {
    if kind == PathKind::DirectoryListing {
        return None;
    }
    classify(path).remote_path().filter(|remote| remote != path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Resolver answering from a script, recording every path asked for
    struct ScriptedResolver {
        script: Box<dyn Fn(&str) -> ResolutionOutcome + Send + Sync>,
        calls: AtomicU32,
        paths: Mutex<Vec<String>>,
    }

    impl ScriptedResolver {
        fn new(script: impl Fn(&str) -> ResolutionOutcome + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                script: Box::new(script),
                calls: AtomicU32::new(0),
                paths: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Resolve for ScriptedResolver {
        async fn resolve(&self, path: &str) -> ResolutionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.paths.lock().unwrap().push(path.to_string());
            (self.script)(path)
        }
    }

    struct FixedLookup(Arc<ScriptedResolver>);

    impl ResolverLookup for FixedLookup {
        fn lookup(&self, _location: &UpstreamLocation) -> GemBridgeResult<Arc<dyn Resolve>> {
            Ok(self.0.clone())
        }
    }

    fn translator(resolver: &Arc<ScriptedResolver>) -> ProtocolTranslator {
        ProtocolTranslator::new(
            Arc::new(FixedLookup(resolver.clone())),
            RetryPolicy::default(),
        )
    }

    const GEM: &str =
        "mavengem:https://rubygems.org/maven/releases/rubygems/rake/13.0.6/rake-13.0.6.gem";

    #[tokio::test(start_paused = true)]
    async fn transient_is_retried_exactly_twelve_times() {
        let resolver = ScriptedResolver::new(|_| ResolutionOutcome::TransientUnavailable);
        let connection = translator(&resolver).open(GEM).unwrap();

        let started = Instant::now();
        let err = connection.input_stream().await.unwrap_err();

        assert!(matches!(err, GemBridgeError::Unavailable { attempts: 12, .. }));
        assert_eq!(resolver.calls(), 12);
        // eleven waits between twelve attempts
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(11) && elapsed < Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_payload_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let resolver = ScriptedResolver::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                ResolutionOutcome::TransientUnavailable
            } else {
                ResolutionOutcome::bytes(b"gem".to_vec(), None)
            }
        });

        let payload = translator(&resolver)
            .open(GEM)
            .unwrap()
            .input_stream()
            .await
            .unwrap();
        assert_eq!(payload.into_bytes().await.unwrap(), b"gem");
        assert_eq!(resolver.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_wait() {
        let resolver = ScriptedResolver::new(|_| ResolutionOutcome::TransientUnavailable);
        let token = CancellationToken::new();
        let connection = translator(&resolver)
            .open(GEM)
            .unwrap()
            .with_cancellation(token.clone());

        let task = tokio::spawn(async move { connection.input_stream().await });
        tokio::time::sleep(Duration::from_millis(2500)).await;
        token.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, GemBridgeError::Cancelled(_)));
        assert!(resolver.calls() < 12);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_caps_the_retries() {
        let resolver = ScriptedResolver::new(|_| ResolutionOutcome::TransientUnavailable);
        let connection = translator(&resolver)
            .open(GEM)
            .unwrap()
            .with_deadline(Instant::now() + Duration::from_millis(3500));

        let err = connection.input_stream().await.unwrap_err();
        assert!(matches!(err, GemBridgeError::Unavailable { attempts: 4, .. }));
        assert_eq!(resolver.calls(), 4);
    }

    #[tokio::test]
    async fn outcomes_map_to_errors() {
        let resolver = ScriptedResolver::new(|path| match path {
            "/gems/secret-1.gem" => ResolutionOutcome::Forbidden,
            "/gems/broken-1.gem" => ResolutionOutcome::Error(GemBridgeError::ChecksumMismatch {
                path: path.to_string(),
                expected: "a".to_string(),
                actual: "b".to_string(),
            }),
            _ => ResolutionOutcome::NotExists,
        });
        let translator = translator(&resolver);
        let open = |path: &str| {
            translator
                .open(&format!("mavengem:https://rubygems.org/maven/releases{}", path))
                .unwrap()
        };

        let err = open("/gems/secret-1.gem").input_stream().await.unwrap_err();
        assert!(matches!(err, GemBridgeError::Forbidden(_)));

        let err = open("/gems/missing-1.gem").input_stream().await.unwrap_err();
        assert!(err.is_not_found());

        let err = open("/gems/broken-1.gem").input_stream().await.unwrap_err();
        match err {
            GemBridgeError::Io { source, .. } => {
                assert!(source.to_string().contains("Checksum mismatch"))
            }
            other => panic!("expected io error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn ping_never_fails_on_not_exists() {
        let resolver = ScriptedResolver::new(|_| ResolutionOutcome::NotExists);
        let base = UpstreamLocation::parse("https://rubygems.org").unwrap();

        translator(&resolver).self_test(&base).await.unwrap();
    }

    #[tokio::test]
    async fn no_payload_falls_back_once() {
        let resolver = ScriptedResolver::new(|path| match path {
            "/gems/rake-13.0.6.gem" => ResolutionOutcome::bytes(b"plain".to_vec(), None),
            _ => ResolutionOutcome::NoPayload(PathKind::GemArtifact),
        });

        let payload = translator(&resolver)
            .open(GEM)
            .unwrap()
            .input_stream()
            .await
            .unwrap();
        assert_eq!(payload.into_bytes().await.unwrap(), b"plain");
        assert_eq!(
            *resolver.paths.lock().unwrap(),
            vec![
                "/rubygems/rake/13.0.6/rake-13.0.6.gem".to_string(),
                "/gems/rake-13.0.6.gem".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn no_payload_without_fallback_is_not_found() {
        let resolver =
            ScriptedResolver::new(|_| ResolutionOutcome::NoPayload(PathKind::DirectoryListing));
        let err = translator(&resolver)
            .open("mavengem:https://rubygems.org/maven/releases/rubygems/rake/")
            .unwrap()
            .input_stream()
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(resolver.calls(), 1);
    }

    #[test]
    fn malformed_locator_is_rejected_on_open() {
        let resolver = ScriptedResolver::new(|_| ResolutionOutcome::NotExists);
        let result = translator(&resolver).open("mavengem:https://rubygems.org/gems/a.gem");
        assert!(matches!(result, Err(GemBridgeError::InvalidLocator { .. })));
    }

    #[test]
    fn retry_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            attempts: 0,
            delay_ms: 250,
        });
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.delay, Duration::from_millis(250));
    }
}
