//! Gem version ordering
//!
//! Gem versions are dot-separated and may mix numbers with letters
//! (`1.0.0.pre2`, `2.0.0.rc1`). A version is split into alternating numeric
//! and alphabetic segments; any alphabetic segment marks a prerelease and
//! sorts below every number at the same position.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Text(String),
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Greater,
            (Self::Text(_), Self::Number(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed gem version
#[derive(Debug, Clone)]
pub struct GemVersion {
    raw: String,
    segments: Vec<Segment>,
}

impl GemVersion {
    /// Parse a version string. Never fails; unknown characters split segments.
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut numeric = false;

        for c in raw.trim().chars() {
            if c.is_ascii_alphanumeric() {
                let digit = c.is_ascii_digit();
                if !current.is_empty() && digit != numeric {
                    segments.push(Self::segment(&current, numeric));
                    current.clear();
                }
                numeric = digit;
                current.push(c);
            } else if !current.is_empty() {
                segments.push(Self::segment(&current, numeric));
                current.clear();
            }
        }
        if !current.is_empty() {
            segments.push(Self::segment(&current, numeric));
        }

        Self {
            raw: raw.trim().to_string(),
            segments,
        }
    }

    fn segment(s: &str, numeric: bool) -> Segment {
        if numeric {
            // Absurdly long digit runs saturate instead of failing
            Segment::Number(s.parse().unwrap_or(u64::MAX))
        } else {
            Segment::Text(s.to_string())
        }
    }

    /// Original string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether any segment is alphabetic
    pub fn is_prerelease(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Text(_)))
    }

    /// Upper bound of a pessimistic (`~>`) requirement.
    ///
    /// Drops prerelease segments, then the last segment if more than one
    /// remains, and increments the new last one: `1.2.3` -> `1.3`,
    /// `1.2` -> `2`, `3` -> `4`.
    pub fn bump(&self) -> String {
        let mut numbers: Vec<u64> = self
            .segments
            .iter()
            .take_while(|s| matches!(s, Segment::Number(_)))
            .filter_map(|s| match s {
                Segment::Number(n) => Some(*n),
                Segment::Text(_) => None,
            })
            .collect();

        if numbers.len() > 1 {
            numbers.pop();
        }
        match numbers.last_mut() {
            Some(last) => *last = last.saturating_add(1),
            None => numbers.push(1),
        }

        numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Ord for GemVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        let zero = Segment::Number(0);
        for i in 0..len {
            let a = self.segments.get(i).unwrap_or(&zero);
            let b = other.segments.get(i).unwrap_or(&zero);
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for GemVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GemVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GemVersion {}

impl fmt::Display for GemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
