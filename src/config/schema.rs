//! Configuration schema for gembridge
//!
//! Configuration is stored at `~/.config/gembridge/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Upstream transport settings
    pub upstream: UpstreamConfig,

    /// Retry policy of the protocol translator
    pub retry: RetryConfig,

    /// Descriptor proxy settings
    pub proxy: ProxyConfig,

    /// Repositories served by the multiplexer
    pub repositories: Vec<RepositoryConfig>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (defaults to the user cache directory)
    pub root: Option<PathBuf>,
}

/// Upstream transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Default gem repository
    pub url: String,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// User-Agent header sent upstream
    pub user_agent: String,

    /// Serve from cache only
    pub offline: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://rubygems.org".to_string(),
            timeout_secs: 30,
            user_agent: format!("gembridge/{}", env!("CARGO_PKG_VERSION")),
            offline: false,
        }
    }
}

/// Retry policy for transient upstream failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub attempts: u32,

    /// Fixed delay between attempts
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 12,
            delay_ms: 1000,
        }
    }
}

/// Descriptor proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listen address; port 0 picks a free port
    pub bind: String,

    /// Group (Ivy organisation) under which gems are exposed
    pub group: String,

    /// Re-render descriptors instead of serving cached ones
    pub refresh_dependencies: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:0".to_string(),
            group: "rubygems".to_string(),
            refresh_dependencies: false,
        }
    }
}

/// One repository mapping of the multiplexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Upstream gem repository
    pub url: String,

    /// Serve this mapping from cache only
    #[serde(default)]
    pub offline: bool,
}

impl RepositoryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            offline: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.upstream.url, "https://rubygems.org");
        assert_eq!(config.retry.attempts, 12);
        assert_eq!(config.retry.delay_ms, 1000);
        assert_eq!(config.proxy.group, "rubygems");
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [upstream]
            offline = true

            [[repositories]]
            url = "https://example.org/gems"
            "#,
        )
        .unwrap();

        assert!(config.upstream.offline);
        assert_eq!(config.upstream.timeout_secs, 30);
        assert_eq!(
            config.repositories,
            vec![RepositoryConfig::new("https://example.org/gems")]
        );
    }
}
