//! Maven POM and `maven-metadata.xml` rendering for the release layout

use crate::descriptor::ivy::escape_xml;
use crate::descriptor::range::ivy_range;
use crate::gems::{GemDependency, GemVersion};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Packaging of every gem artifact
pub const GEM_PACKAGING: &str = "gem";

/// Render the POM of one gem release.
///
/// Runtime dependencies become `gem`-typed dependencies in the same group.
/// Gem requirements map to Maven ranges, which share Ivy's bracket syntax.
pub fn render_pom(group: &str, artifact: &str, version: &str, deps: &[GemDependency]) -> Vec<u8> {
    let group = escape_xml(group);
    let mut xml = String::new();

    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str(r#"<project xmlns="http://maven.apache.org/POM/4.0.0""#);
    xml.push_str(r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#);
    xml.push_str(r#" xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd">"#);
    xml.push('\n');
    xml.push_str("  <modelVersion>4.0.0</modelVersion>\n");
    let _ = writeln!(xml, "  <groupId>{}</groupId>", group);
    let _ = writeln!(xml, "  <artifactId>{}</artifactId>", escape_xml(artifact));
    let _ = writeln!(xml, "  <version>{}</version>", escape_xml(version));
    let _ = writeln!(xml, "  <packaging>{}</packaging>", GEM_PACKAGING);

    if !deps.is_empty() {
        xml.push_str("  <dependencies>\n");
        for dep in deps {
            xml.push_str("    <dependency>\n");
            let _ = writeln!(xml, "      <groupId>{}</groupId>", group);
            let _ = writeln!(xml, "      <artifactId>{}</artifactId>", escape_xml(&dep.name));
            let _ = writeln!(
                xml,
                "      <version>{}</version>",
                escape_xml(&ivy_range(&dep.requirements))
            );
            let _ = writeln!(xml, "      <type>{}</type>", GEM_PACKAGING);
            xml.push_str("    </dependency>\n");
        }
        xml.push_str("  </dependencies>\n");
    }
    xml.push_str("</project>\n");

    xml.into_bytes()
}

/// Render `maven-metadata.xml` listing every version of one gem.
///
/// `versions` must be sorted ascending. `release` is the newest version
/// that is not a prerelease.
pub fn render_maven_metadata<S: AsRef<str>>(
    group: &str,
    artifact: &str,
    versions: &[S],
    last_updated: DateTime<Utc>,
) -> Vec<u8> {
    let mut xml = String::new();
    let latest = versions.last().map(|v| v.as_ref());
    let release = versions
        .iter()
        .map(|v| v.as_ref())
        .rev()
        .find(|v| !GemVersion::parse(v).is_prerelease());

    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str("<metadata>\n");
    let _ = writeln!(xml, "  <groupId>{}</groupId>", escape_xml(group));
    let _ = writeln!(xml, "  <artifactId>{}</artifactId>", escape_xml(artifact));
    xml.push_str("  <versioning>\n");
    if let Some(latest) = latest {
        let _ = writeln!(xml, "    <latest>{}</latest>", escape_xml(latest));
    }
    if let Some(release) = release {
        let _ = writeln!(xml, "    <release>{}</release>", escape_xml(release));
    }
    xml.push_str("    <versions>\n");
    for version in versions {
        let _ = writeln!(xml, "      <version>{}</version>", escape_xml(version.as_ref()));
    }
    xml.push_str("    </versions>\n");
    let _ = writeln!(
        xml,
        "    <lastUpdated>{}</lastUpdated>",
        last_updated.format("%Y%m%d%H%M%S")
    );
    xml.push_str("  </versioning>\n");
    xml.push_str("</metadata>\n");

    xml.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn pom_with_dependencies() {
        let deps = vec![GemDependency {
            name: "rack".to_string(),
            requirements: vec!["~> 2.2".to_string()],
        }];
        let xml = String::from_utf8(render_pom("rubygems", "sinatra", "3.1.0", &deps)).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<groupId>rubygems</groupId>"));
        assert!(xml.contains("<artifactId>sinatra</artifactId>"));
        assert!(xml.contains("<version>3.1.0</version>"));
        assert!(xml.contains("<packaging>gem</packaging>"));
        assert!(xml.contains("<artifactId>rack</artifactId>"));
        assert!(xml.contains("<version>[2.2,3)</version>"));
        assert!(xml.contains("<type>gem</type>"));
        assert!(xml.trim_end().ends_with("</project>"));
    }

    #[test]
    fn pom_without_dependencies() {
        let xml = String::from_utf8(render_pom("rubygems", "rake", "13.0.6", &[])).unwrap();
        assert!(!xml.contains("<dependencies>"));
    }

    #[test]
    fn metadata_lists_versions() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let xml = String::from_utf8(render_maven_metadata(
            "rubygems",
            "rake",
            &["12.3.3", "13.0.6", "14.0.0.rc1"],
            at,
        ))
        .unwrap();

        assert!(xml.contains("<artifactId>rake</artifactId>"));
        assert!(xml.contains("<latest>14.0.0.rc1</latest>"));
        assert!(xml.contains("<release>13.0.6</release>"));
        assert!(xml.contains("<version>12.3.3</version>"));
        assert!(xml.contains("<lastUpdated>20240301123005</lastUpdated>"));
    }
}
