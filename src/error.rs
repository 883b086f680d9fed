//! Error types for gembridge
//!
//! All modules use `GemBridgeResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gembridge operations
pub type GemBridgeResult<T> = Result<T, GemBridgeError>;

/// All errors that can occur in gembridge
#[derive(Error, Debug)]
pub enum GemBridgeError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Locator and location errors
    #[error("Malformed locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Invalid upstream URL '{url}': {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("Invalid cache key '{0}'")]
    InvalidCacheKey(String),

    // Upstream errors
    #[error("Upstream request to {url} failed: {reason}")]
    Upstream { url: String, reason: String },

    #[error("Upstream {url} answered with unexpected status {status}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Malformed dependency metadata for {name}: {reason}")]
    Metadata { name: String, reason: String },

    // Resolution surfaces
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream unavailable for {path} after {attempts} attempts")]
    Unavailable { path: String, attempts: u32 },

    #[error("Resolution of {0} was cancelled")]
    Cancelled(String),

    // Server errors
    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server is not running")]
    ServerNotRunning,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl GemBridgeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an upstream transport error
    pub fn upstream(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Upstream {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a locator parse error
    pub fn invalid_locator(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Check if error means the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidLocator { .. } => {
                Some("Locators look like: mavengem:https://rubygems.org/maven/releases/<path>")
            }
            Self::Unavailable { .. } => Some("The upstream is rate limiting; try again later"),
            Self::ChecksumMismatch { .. } => {
                Some("Remove the cache directory for this upstream: gembridge cache clear")
            }
            _ => None,
        }
    }
}
