//! Identity of an upstream gem repository

use crate::error::{GemBridgeError, GemBridgeResult};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Absolute URL of one gem repository.
///
/// Trailing slashes are dropped so `https://rubygems.org/` and
/// `https://rubygems.org` are the same location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamLocation {
    url: String,
}

impl UpstreamLocation {
    /// Parse and normalize an upstream URL
    pub fn parse(raw: &str) -> GemBridgeResult<Self> {
        let parsed = Url::parse(raw.trim()).map_err(|e| GemBridgeError::InvalidUpstream {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(GemBridgeError::InvalidUpstream {
                url: raw.to_string(),
                reason: "expected an http(s) URL".to_string(),
            });
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(GemBridgeError::InvalidUpstream {
                url: raw.to_string(),
                reason: "query strings and fragments are not allowed".to_string(),
            });
        }

        Ok(Self {
            url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Normalized URL without trailing slash
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Full URL of a relative path under this location
    pub fn join(&self, relative: &str) -> String {
        if relative.starts_with('/') {
            format!("{}{}", self.url, relative)
        } else {
            format!("{}/{}", self.url, relative)
        }
    }
}

impl fmt::Display for UpstreamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

impl FromStr for UpstreamLocation {
    type Err = GemBridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
