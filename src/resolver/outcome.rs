//! Result of resolving one relative path

use crate::cache::{ByteSource, CachedPayload};
use crate::error::GemBridgeError;
use crate::gems::PathKind;
use std::fmt;

/// Bytes of a resolved path
#[derive(Debug)]
pub struct Payload {
    pub source: ByteSource,
    pub size: u64,
    /// SHA-1 hex of the bytes when known
    pub checksum: Option<String>,
}

impl Payload {
    /// In-memory payload
    pub fn from_bytes(bytes: Vec<u8>, checksum: Option<String>) -> Self {
        Self {
            size: bytes.len() as u64,
            source: ByteSource::from_bytes(bytes),
            checksum,
        }
    }

    /// Read the whole payload
    pub async fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        self.source.read_all().await
    }
}

impl From<CachedPayload> for Payload {
    fn from(cached: CachedPayload) -> Self {
        Self {
            source: cached.source,
            size: cached.size,
            checksum: cached.checksum,
        }
    }
}

/// Exactly one of the possible resolution states
#[derive(Debug)]
pub enum ResolutionOutcome {
    /// Upstream denies access, or the path is not something we serve
    Forbidden,
    /// No such resource
    NotExists,
    /// The path is known but has no byte-stream form
    NoPayload(PathKind),
    /// Servable bytes
    Payload(Payload),
    /// Upstream is rate limiting or temporarily failing
    TransientUnavailable,
    /// Unexpected fault, with its cause
    Error(GemBridgeError),
}

/// Payload-free tag of an outcome, for logs and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeTag {
    Forbidden,
    NotExists,
    NoPayload(PathKind),
    Payload,
    TransientUnavailable,
    Error,
}

impl fmt::Display for OutcomeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forbidden => write!(f, "forbidden"),
            Self::NotExists => write!(f, "not-exists"),
            Self::NoPayload(kind) => write!(f, "no-payload({})", kind),
            Self::Payload => write!(f, "payload"),
            Self::TransientUnavailable => write!(f, "transient-unavailable"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl ResolutionOutcome {
    /// Payload outcome from in-memory bytes
    pub fn bytes(bytes: Vec<u8>, checksum: Option<String>) -> Self {
        Self::Payload(Payload::from_bytes(bytes, checksum))
    }

    pub fn tag(&self) -> OutcomeTag {
        match self {
            Self::Forbidden => OutcomeTag::Forbidden,
            Self::NotExists => OutcomeTag::NotExists,
            Self::NoPayload(kind) => OutcomeTag::NoPayload(*kind),
            Self::Payload(_) => OutcomeTag::Payload,
            Self::TransientUnavailable => OutcomeTag::TransientUnavailable,
            Self::Error(_) => OutcomeTag::Error,
        }
    }

    pub fn is_payload(&self) -> bool {
        matches!(self, Self::Payload(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_outcome_carries_size() {
        let outcome = ResolutionOutcome::bytes(b"pong".to_vec(), None);
        assert_eq!(outcome.tag(), OutcomeTag::Payload);
        match outcome {
            ResolutionOutcome::Payload(payload) => {
                assert_eq!(payload.size, 4);
                assert_eq!(payload.into_bytes().await.unwrap(), b"pong");
            }
            other => panic!("expected payload, got {:?}", other.tag()),
        }
    }

    #[test]
    fn tag_display() {
        assert_eq!(
            OutcomeTag::NoPayload(PathKind::DirectoryListing).to_string(),
            "no-payload(directory)"
        );
        assert_eq!(ResolutionOutcome::NotExists.tag().to_string(), "not-exists");
    }
}
