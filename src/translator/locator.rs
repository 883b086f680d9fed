//! Synthetic locators: `<scheme>:<upstream base>/maven/releases/<relative path>`

use crate::error::{GemBridgeError, GemBridgeResult};
use crate::upstream::UpstreamLocation;
use std::fmt;
use std::str::FromStr;

/// Scheme under which gem repositories are exposed as Maven repositories
pub const SCHEME: &str = "mavengem";

/// Segment separating the upstream base from the relative path
pub const MARKER: &str = "/maven/releases";

/// A parsed locator.
///
/// The base and relative parts are kept exactly as written so that
/// formatting a parsed locator reproduces the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    scheme: String,
    base: String,
    relative: String,
}

impl Locator {
    /// Locator for `relative` below `base` using the default scheme
    pub fn new(base: &UpstreamLocation, relative: &str) -> Self {
        let relative = if relative.starts_with('/') {
            relative.to_string()
        } else {
            format!("/{}", relative)
        };
        Self {
            scheme: SCHEME.to_string(),
            base: base.as_str().to_string(),
            relative,
        }
    }

    /// Split a locator at the first marker segment
    pub fn parse(raw: &str) -> GemBridgeResult<Self> {
        let (scheme, rest) = raw
            .split_once(':')
            .ok_or_else(|| GemBridgeError::invalid_locator(raw, "missing scheme"))?;

        let valid_scheme = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(GemBridgeError::invalid_locator(raw, "invalid scheme"));
        }

        let idx = rest
            .find(MARKER)
            .ok_or_else(|| GemBridgeError::invalid_locator(raw, "missing /maven/releases"))?;
        let base = &rest[..idx];
        let relative = &rest[idx + MARKER.len()..];

        if base.is_empty() {
            return Err(GemBridgeError::invalid_locator(raw, "empty upstream base"));
        }
        if !relative.starts_with('/') || relative.len() < 2 {
            return Err(GemBridgeError::invalid_locator(raw, "empty relative path"));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            base: base.to_string(),
            relative: relative.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Upstream base as written
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path handed to the resolver, always starting with `/`
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Validated upstream location of the base
    pub fn location(&self) -> GemBridgeResult<UpstreamLocation> {
        UpstreamLocation::parse(&self.base)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}{}", self.scheme, self.base, MARKER, self.relative)
    }
}

impl FromStr for Locator {
    type Err = GemBridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
