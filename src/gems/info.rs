//! Compact-index dependency metadata (`/info/<name>`)
//!
//! ```text
//! ---
//! 0.1.0 |checksum:0f3c...
//! 1.0.0 rack:>= 2.0&< 4,json:~> 2.6|checksum:9a1b...,ruby:>= 2.7
//! 1.0.0-java rack:>= 2.0&< 4|checksum:77de...
//! ```

use crate::error::{GemBridgeError, GemBridgeResult};
use crate::gems::version::GemVersion;

/// Platform preferred when a release ships several platform variants
pub const PREFERRED_PLATFORM: &str = "java";

/// A runtime dependency of one gem release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemDependency {
    pub name: String,
    /// Individual requirement clauses, e.g. `[">= 2.0", "< 4"]`
    pub requirements: Vec<String>,
}

/// One line of the compact index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoEntry {
    pub version: String,
    pub platform: Option<String>,
    pub dependencies: Vec<GemDependency>,
    /// SHA-256 of the gem archive, hex encoded
    pub checksum: Option<String>,
    pub required_ruby: Option<String>,
}

impl InfoEntry {
    /// Whether this entry is the platform-independent release
    pub fn is_ruby_platform(&self) -> bool {
        self.platform.is_none()
    }
}

/// Parsed `/info/<name>` document
#[derive(Debug, Clone)]
pub struct CompactInfo {
    pub name: String,
    pub entries: Vec<InfoEntry>,
}

impl CompactInfo {
    /// Parse the compact index body for `name`
    pub fn parse(name: &str, body: &str) -> GemBridgeResult<Self> {
        let mut entries = Vec::new();

        for (lineno, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line == "---" {
                continue;
            }
            let entry = parse_line(line).map_err(|reason| GemBridgeError::Metadata {
                name: name.to_string(),
                reason: format!("line {}: {}", lineno + 1, reason),
            })?;
            entries.push(entry);
        }

        Ok(Self {
            name: name.to_string(),
            entries,
        })
    }

    /// Distinct versions, ascending
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<GemVersion> = Vec::new();
        for entry in &self.entries {
            let parsed = GemVersion::parse(&entry.version);
            if !versions.iter().any(|v| v.as_str() == parsed.as_str()) {
                versions.push(parsed);
            }
        }
        versions.sort();
        versions.into_iter().map(|v| v.as_str().to_string()).collect()
    }

    /// Whether any entry exists for `version`
    pub fn has_version(&self, version: &str) -> bool {
        self.entries.iter().any(|e| e.version == version)
    }

    /// Pick the entry for `version`.
    ///
    /// An explicit platform must match exactly. Without one, the preferred
    /// platform wins, then the plain ruby release, then whatever comes first.
    pub fn select(&self, version: &str, platform: Option<&str>) -> Option<&InfoEntry> {
        let mut candidates = self.entries.iter().filter(|e| e.version == version);

        if let Some(platform) = platform {
            return candidates.find(|e| e.platform.as_deref() == Some(platform));
        }

        let candidates: Vec<&InfoEntry> = candidates.collect();
        candidates
            .iter()
            .find(|e| e.platform.as_deref() == Some(PREFERRED_PLATFORM))
            .or_else(|| candidates.iter().find(|e| e.is_ruby_platform()))
            .or_else(|| candidates.first())
            .copied()
    }
}

fn parse_line(line: &str) -> Result<InfoEntry, String> {
    let (head, meta) = line.split_once('|').unwrap_or((line, ""));
    let head = head.trim();
    let (version_field, deps_field) = head.split_once(' ').unwrap_or((head, ""));

    if version_field.is_empty() {
        return Err("missing version".to_string());
    }
    let (version, platform) = match version_field.split_once('-') {
        Some((v, p)) => (v.to_string(), Some(p.to_string())),
        None => (version_field.to_string(), None),
    };

    let mut dependencies = Vec::new();
    for dep in deps_field.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let (name, reqs) = dep
            .split_once(':')
            .ok_or_else(|| format!("dependency '{}' has no requirement", dep))?;
        dependencies.push(GemDependency {
            name: name.trim().to_string(),
            requirements: reqs
                .split('&')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect(),
        });
    }

    let mut checksum = None;
    let mut required_ruby = None;
    for field in meta.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        match field.split_once(':') {
            Some(("checksum", value)) => checksum = Some(value.trim().to_string()),
            Some(("ruby", value)) => required_ruby = Some(value.trim().to_string()),
            // rubygems requirement and future keys
            _ => {}
        }
    }

    Ok(InfoEntry {
        version,
        platform,
        dependencies,
        checksum,
        required_ruby,
    })
}
