//! Gem requirement clauses to Ivy version ranges

use crate::gems::GemVersion;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
struct Bound {
    version: GemVersion,
    inclusive: bool,
}

/// Convert requirement clauses (`[">= 2.0", "< 4"]`) into one Ivy range.
///
/// Bounds are intersected. `= x` pins the revision, `!= x` is dropped since
/// Ivy ranges cannot express holes, and no bounds at all means any version.
pub fn ivy_range<S: AsRef<str>>(requirements: &[S]) -> String {
    let mut lower: Option<Bound> = None;
    let mut upper: Option<Bound> = None;

    for requirement in requirements {
        let (op, version) = split_requirement(requirement.as_ref());
        if version.is_empty() {
            continue;
        }
        let parsed = GemVersion::parse(version);

        match op {
            "=" => return version.to_string(),
            ">=" => raise(&mut lower, parsed, true),
            ">" => raise(&mut lower, parsed, false),
            "<=" => cap(&mut upper, parsed, true),
            "<" => cap(&mut upper, parsed, false),
            "~>" => {
                let next = GemVersion::parse(&parsed.bump());
                raise(&mut lower, parsed, true);
                cap(&mut upper, next, false);
            }
            _ => {}
        }
    }

    let (open, low) = match &lower {
        Some(bound) => (if bound.inclusive { '[' } else { '(' }, bound.version.as_str()),
        None => ('[', "0"),
    };
    match &upper {
        Some(bound) => format!(
            "{}{},{}{}",
            open,
            low,
            bound.version.as_str(),
            if bound.inclusive { ']' } else { ')' }
        ),
        None => format!("{}{},)", open, low),
    }
}

fn split_requirement(requirement: &str) -> (&str, &str) {
    let requirement = requirement.trim();
    for op in ["~>", ">=", "<=", "!=", "=", ">", "<"] {
        if let Some(rest) = requirement.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    ("=", requirement)
}

fn raise(lower: &mut Option<Bound>, version: GemVersion, inclusive: bool) {
    let replace = match lower {
        None => true,
        Some(current) => match version.cmp(&current.version) {
            Ordering::Greater => true,
            Ordering::Equal => current.inclusive && !inclusive,
            Ordering::Less => false,
        },
    };
    if replace {
        *lower = Some(Bound { version, inclusive });
    }
}

fn cap(upper: &mut Option<Bound>, version: GemVersion, inclusive: bool) {
    let replace = match upper {
        None => true,
        Some(current) => match version.cmp(&current.version) {
            Ordering::Less => true,
            Ordering::Equal => current.inclusive && !inclusive,
            Ordering::Greater => false,
        },
    };
    if replace {
        *upper = Some(Bound { version, inclusive });
    }
}
