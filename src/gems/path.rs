//! Relative path classification
//!
//! Pure functions only: classifying a path never touches the network or
//! the disk.

use std::fmt;

/// Liveness check path
pub const PING_PATH: &str = "/ping";

/// Top-level directory of the release layout, also its Maven group
pub const RELEASE_ROOT: &str = "rubygems";

/// Per-artifact version index of the release layout
pub const MAVEN_METADATA: &str = "maven-metadata.xml";

/// Directory holding compressed gemspecs upstream
const QUICK_DIR: &str = "quick";
const MARSHAL_DIR: &str = "Marshal.4.8";

const GEM_EXT: &str = ".gem";
const GEMSPEC_EXT: &str = ".gemspec.rz";
const POM_EXT: &str = ".pom";
const SHA1_EXT: &str = ".sha1";

/// Name, version and optional platform of one gem release
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GemCoordinates {
    pub name: String,
    pub version: String,
    pub platform: Option<String>,
}

impl GemCoordinates {
    /// Create coordinates for the plain ruby platform
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            platform: None,
        }
    }

    /// Set the platform suffix
    pub fn with_platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform.filter(|p| !p.is_empty() && p != "ruby");
        self
    }

    /// Split a file stem like `nokogiri-1.15.0-java` into coordinates.
    ///
    /// Gem names may contain dashes, versions never do, and a version always
    /// starts with a digit. Everything after the version is the platform.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let parts: Vec<&str> = stem.split('-').collect();
        let version_idx = parts
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, p)| p.starts_with(|c: char| c.is_ascii_digit()))
            .map(|(i, _)| i)?;

        let name = parts[..version_idx].join("-");
        if name.is_empty() {
            return None;
        }
        let platform = if version_idx + 1 < parts.len() {
            Some(parts[version_idx + 1..].join("-"))
        } else {
            None
        };

        Some(Self::new(name, parts[version_idx]).with_platform(platform))
    }

    /// File stem without extension, e.g. `rake-13.0.6` or `jruby-openssl-0.14.0-java`
    pub fn file_stem(&self) -> String {
        match &self.platform {
            Some(platform) => format!("{}-{}-{}", self.name, self.version, platform),
            None => format!("{}-{}", self.name, self.version),
        }
    }

    /// Upstream path of the gem archive
    pub fn gem_path(&self) -> String {
        format!("/gems/{}{}", self.file_stem(), GEM_EXT)
    }
}

impl fmt::Display for GemCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// What a relative path refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathClassification {
    /// Liveness check, always answered locally
    Ping,
    /// Gem in the release layout; the canonical upstream filename has to be
    /// derived from dependency metadata
    GemArtifact(GemCoordinates),
    /// POM of a release-layout gem, rendered from dependency metadata
    Pom(GemCoordinates),
    /// Version index of one release-layout gem
    MavenMetadata { name: String },
    /// Gem archive at its canonical upstream location
    GemFile { file_name: String },
    /// Compressed gemspec
    GemSpec { file_name: String },
    /// Compact-index dependency metadata for one gem name
    DependencyInfo { name: String },
    /// A directory; listings have no byte-stream form
    DirectoryListing { name: Option<String> },
    /// SHA-1 sidecar of another classifiable path
    Checksum { target: String },
    /// Anything else
    Unclassified,
}

/// Payload-free tag of a classification, carried by `NoPayload`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    Ping,
    GemArtifact,
    Pom,
    MavenMetadata,
    GemFile,
    GemSpec,
    DependencyInfo,
    DirectoryListing,
    Checksum,
    Unclassified,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ping => "ping",
            Self::GemArtifact => "gem-artifact",
            Self::Pom => "pom",
            Self::MavenMetadata => "maven-metadata",
            Self::GemFile => "gem-file",
            Self::GemSpec => "gemspec",
            Self::DependencyInfo => "dependency-info",
            Self::DirectoryListing => "directory",
            Self::Checksum => "checksum",
            Self::Unclassified => "unclassified",
        };
        write!(f, "{}", name)
    }
}

impl PathClassification {
    /// Tag without data
    pub fn kind(&self) -> PathKind {
        match self {
            Self::Ping => PathKind::Ping,
            Self::GemArtifact(_) => PathKind::GemArtifact,
            Self::Pom(_) => PathKind::Pom,
            Self::MavenMetadata { .. } => PathKind::MavenMetadata,
            Self::GemFile { .. } => PathKind::GemFile,
            Self::GemSpec { .. } => PathKind::GemSpec,
            Self::DependencyInfo { .. } => PathKind::DependencyInfo,
            Self::DirectoryListing { .. } => PathKind::DirectoryListing,
            Self::Checksum { .. } => PathKind::Checksum,
            Self::Unclassified => PathKind::Unclassified,
        }
    }

    /// Whether the path maps one-to-one onto an upstream file
    pub fn is_fetchable(&self) -> bool {
        matches!(
            self,
            Self::GemFile { .. } | Self::GemSpec { .. } | Self::DependencyInfo { .. }
        )
    }

    /// Upstream path that serves this classification directly, if any.
    ///
    /// For a release-layout gem this is the plain `/gems/<name>-<version>.gem`
    /// location, which is what a client falls back to when the canonical
    /// filename cannot be derived.
    pub fn remote_path(&self) -> Option<String> {
        match self {
            Self::GemArtifact(coords) => Some(coords.gem_path()),
            Self::GemFile { file_name } => Some(format!("/gems/{}", file_name)),
            Self::GemSpec { file_name } => {
                Some(format!("/{}/{}/{}", QUICK_DIR, MARSHAL_DIR, file_name))
            }
            Self::DependencyInfo { name } => Some(format!("/info/{}", name)),
            Self::Pom(_) | Self::MavenMetadata { .. } => None,
            Self::Ping | Self::DirectoryListing { .. } | Self::Checksum { .. } => None,
            Self::Unclassified => None,
        }
    }
}

/// Classify a relative path by its shape alone
pub fn classify(path: &str) -> PathClassification {
    if path == PING_PATH {
        return PathClassification::Ping;
    }

    if let Some(target) = path.strip_suffix(SHA1_EXT) {
        return match classify(target) {
            PathClassification::Ping
            | PathClassification::Unclassified
            | PathClassification::Checksum { .. }
            | PathClassification::DirectoryListing { .. } => PathClassification::Unclassified,
            _ => PathClassification::Checksum {
                target: target.to_string(),
            },
        };
    }

    let Some(rest) = path.strip_prefix('/') else {
        return PathClassification::Unclassified;
    };

    let mut segments: Vec<&str> = rest.split('/').collect();
    // A trailing slash marks a directory; drop the empty tail segment
    let trailing_slash = segments.len() > 1 && segments.last() == Some(&"");
    if trailing_slash {
        segments.pop();
    }

    if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        return PathClassification::Unclassified;
    }

    match segments.as_slice() {
        ["gems"] => PathClassification::DirectoryListing { name: None },
        ["gems", file] if !trailing_slash => classify_gem_file(file),
        [QUICK_DIR, MARSHAL_DIR, file] if !trailing_slash => classify_gemspec(file),
        ["info", name] if !trailing_slash => PathClassification::DependencyInfo {
            name: (*name).to_string(),
        },
        [RELEASE_ROOT] => PathClassification::DirectoryListing { name: None },
        [RELEASE_ROOT, name, MAVEN_METADATA] if !trailing_slash => {
            PathClassification::MavenMetadata {
                name: (*name).to_string(),
            }
        }
        [RELEASE_ROOT, name] | [RELEASE_ROOT, name, _] => {
            PathClassification::DirectoryListing {
                name: Some((*name).to_string()),
            }
        }
        [RELEASE_ROOT, name, version, file] if !trailing_slash => {
            classify_release_gem(name, version, file)
        }
        _ => PathClassification::Unclassified,
    }
}

fn classify_gem_file(file: &str) -> PathClassification {
    match file.strip_suffix(GEM_EXT) {
        Some(stem) if GemCoordinates::from_file_stem(stem).is_some() => {
            PathClassification::GemFile {
                file_name: file.to_string(),
            }
        }
        _ => PathClassification::Unclassified,
    }
}

fn classify_gemspec(file: &str) -> PathClassification {
    match file.strip_suffix(GEMSPEC_EXT) {
        Some(stem) if GemCoordinates::from_file_stem(stem).is_some() => {
            PathClassification::GemSpec {
                file_name: file.to_string(),
            }
        }
        _ => PathClassification::Unclassified,
    }
}

fn classify_release_gem(name: &str, version: &str, file: &str) -> PathClassification {
    if let Some(stem) = file.strip_suffix(POM_EXT) {
        // POMs carry no platform classifier
        return if stem == format!("{}-{}", name, version) {
            PathClassification::Pom(GemCoordinates::new(name, version))
        } else {
            PathClassification::Unclassified
        };
    }
    let Some(stem) = file.strip_suffix(GEM_EXT) else {
        return PathClassification::Unclassified;
    };
    let prefix = format!("{}-{}", name, version);
    if stem == prefix {
        return PathClassification::GemArtifact(GemCoordinates::new(name, version));
    }
    match stem.strip_prefix(&prefix).and_then(|s| s.strip_prefix('-')) {
        Some(platform) if !platform.is_empty() => PathClassification::GemArtifact(
            GemCoordinates::new(name, version).with_platform(Some(platform.to_string())),
        ),
        _ => PathClassification::Unclassified,
    }
}
