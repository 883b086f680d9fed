//! Ivy descriptor and directory listing rendering. Pure, no I/O.

use crate::descriptor::range::ivy_range;
use crate::gems::GemDependency;
use std::fmt::Write;

/// Escape text for use in XML/HTML content and attribute values
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Render `ivy.xml` for one gem release.
///
/// Every runtime dependency becomes a dependency on another module of the
/// same group, with the gem requirement expressed as an Ivy range.
pub fn render_ivy(group: &str, module: &str, revision: &str, deps: &[GemDependency]) -> Vec<u8> {
    let group = escape_xml(group);
    let module = escape_xml(module);
    let mut xml = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(xml, r#"<ivy-module version="2.0">"#);
    let _ = writeln!(
        xml,
        r#"  <info organisation="{}" module="{}" revision="{}" status="release"/>"#,
        group,
        module,
        escape_xml(revision)
    );
    xml.push_str("  <configurations>\n");
    xml.push_str(r#"    <conf name="default" visibility="public" extends="runtime"/>"#);
    xml.push('\n');
    xml.push_str(r#"    <conf name="runtime" visibility="public"/>"#);
    xml.push_str("\n  </configurations>\n");
    xml.push_str("  <publications>\n");
    let _ = writeln!(
        xml,
        r#"    <artifact name="{}" type="gem" ext="gem" conf="default"/>"#,
        module
    );
    xml.push_str("  </publications>\n");

    if deps.is_empty() {
        xml.push_str("  <dependencies/>\n");
    } else {
        xml.push_str("  <dependencies>\n");
        for dep in deps {
            let _ = writeln!(
                xml,
                r#"    <dependency org="{}" name="{}" rev="{}" conf="runtime->default"/>"#,
                group,
                escape_xml(&dep.name),
                escape_xml(&ivy_range(&dep.requirements))
            );
        }
        xml.push_str("  </dependencies>\n");
    }
    xml.push_str("</ivy-module>\n");

    xml.into_bytes()
}

/// HTML listing of the revisions of one module, one anchor per revision
pub fn render_listing<S: AsRef<str>>(group: &str, module: &str, revisions: &[S]) -> String {
    let title = format!("{}/{}", escape_xml(group), escape_xml(module));
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n");
    let _ = writeln!(html, "<head><title>{}</title></head>", title);
    html.push_str("<body>\n");
    let _ = writeln!(html, "<h1>{}</h1>", title);
    html.push_str("<pre>\n");
    for revision in revisions {
        let revision = escape_xml(revision.as_ref());
        let _ = writeln!(html, r#"<a href="{0}/">{0}/</a>"#, revision);
    }
    html.push_str("</pre>\n</body>\n</html>\n");

    html
}
