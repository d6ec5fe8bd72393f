//! Dotted/indexed path handling for option matching.
//!
//! Traversal positions are tracked as segment lists (`a[0].b` is
//! `[Key("a"), Index(0), Key("b")]`). Pattern lists (`ignore`, `copy`,
//! `observe`) match segment-wise against the full path from the call root;
//! `include` matches by bare property name at any depth.

use std::collections::BTreeSet;
use std::fmt::Write as _;

/// One step of a traversal path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Parse `"a[0].b"` into segments. A bracket pair that does not hold a
/// number is kept as a key segment verbatim.
pub fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('[') {
            match tail.split_once(']') {
                Some((inside, after)) => {
                    match inside.parse::<usize>() {
                        Ok(index) => segments.push(Segment::Index(index)),
                        Err(_) => segments.push(Segment::Key(inside.to_owned())),
                    }
                    rest = after.strip_prefix('.').unwrap_or(after);
                }
                None => {
                    segments.push(Segment::Key(rest.to_owned()));
                    rest = "";
                }
            }
        } else {
            let end = rest
                .find(['.', '['])
                .unwrap_or(rest.len());
            segments.push(Segment::Key(rest[..end].to_owned()));
            rest = &rest[end..];
            rest = rest.strip_prefix('.').unwrap_or(rest);
        }
    }
    segments
}

/// Render segments back to `"a[0].b"` form.
#[must_use]
pub fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Segment::Index(index) => {
                let _ = write!(out, "[{index}]");
            }
        }
    }
    out
}

/// A resolved list of full-path patterns.
///
/// Patterns that exactly equal an own literal key of the call root match
/// that top-level key only and are withheld from segment-wise matching for
/// the duration of the call. This keeps `{"a": {"b": 1}, "a.b": 2}` with an
/// `"a.b"` pattern targeting the literal key rather than the nested path.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathSet {
    literal: BTreeSet<String>,
    patterns: Vec<Vec<Segment>>,
}

impl PathSet {
    pub fn resolve<S: AsRef<str>>(raw: &[S], root_literal_keys: &BTreeSet<String>) -> Self {
        let mut set = Self::default();
        for pattern in raw {
            let pattern = pattern.as_ref();
            if root_literal_keys.contains(pattern) {
                set.literal.insert(pattern.to_owned());
            } else {
                set.patterns.push(parse(pattern));
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.literal.is_empty() && self.patterns.is_empty()
    }

    pub fn matches(&self, path: &[Segment]) -> bool {
        if let [Segment::Key(key)] = path
            && self.literal.contains(key)
        {
            return true;
        }
        self.patterns.iter().any(|pattern| pattern == path)
    }
}

/// Bare property names, matched against the last key segment at any depth.
#[derive(Clone, Debug, Default)]
pub(crate) struct NameSet {
    names: BTreeSet<String>,
}

impl NameSet {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names.iter().map(|n| n.as_ref().to_owned()).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
