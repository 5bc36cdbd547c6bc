//! Route patterns and path segmentation.
//!
//! A pattern is a `/`-separated list of segments. Each segment is either a
//! literal (`users`) or a named parameter (`:id` or `{id}`). A trailing
//! slash is ignored, so `/users/` and `/users` are the same pattern, and
//! `/` is the empty pattern that only matches the root.

use std::collections::HashMap;

use crate::error::ConfigError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub(crate) fn parse(raw: &str) -> Result<Self, ConfigError> {
        let malformed = |reason| ConfigError::MalformedPattern { pattern: raw.to_owned(), reason };

        let Some(rest) = raw.strip_prefix('/') else {
            return Err(malformed("must start with `/`"));
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let mut segments = Vec::new();
        if rest.is_empty() {
            return Ok(Self { raw: raw.to_owned(), segments });
        }

        for seg in rest.split('/') {
            if seg.is_empty() {
                return Err(malformed("empty segment"));
            }
            let segment = match parse_param(seg) {
                Some(Ok(name)) => {
                    let taken = segments.iter().any(|s| matches!(s, Segment::Param(n) if n == name));
                    if taken {
                        return Err(ConfigError::DuplicateParam {
                            pattern: raw.to_owned(),
                            name: name.to_owned(),
                        });
                    }
                    Segment::Param(name.to_owned())
                }
                Some(Err(reason)) => return Err(malformed(reason)),
                None if seg.contains(['{', '}']) => return Err(malformed("unbalanced `{`")),
                None => Segment::Literal(seg.to_owned()),
            };
            segments.push(segment);
        }

        Ok(Self { raw: raw.to_owned(), segments })
    }

    pub(crate) fn as_str(&self) -> &str { &self.raw }

    pub(crate) fn len(&self) -> usize { self.segments.len() }

    /// Number of literal segments before the first parameter.
    pub(crate) fn static_len(&self) -> usize {
        self.segments.iter().take_while(|s| matches!(s, Segment::Literal(_))).count()
    }

    /// `self` followed by `tail`, as one pattern. Used to compare a mounted
    /// route against the parent's own routes.
    pub(crate) fn join(&self, tail: &Pattern) -> Pattern {
        let segments: Vec<Segment> = self.segments.iter().chain(&tail.segments).cloned().collect();
        let raw = if segments.is_empty() {
            "/".to_owned()
        } else {
            segments.iter()
                .map(|s| match s {
                    Segment::Literal(lit) => format!("/{lit}"),
                    Segment::Param(name) => format!("/:{name}"),
                })
                .collect()
        };
        Pattern { raw, segments }
    }

    pub(crate) fn has_params(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Param(_)))
    }

    /// Two patterns with the same literals and parameters in the same places
    /// match exactly the same paths, whatever the parameters are called.
    pub(crate) fn same_shape(&self, other: &Pattern) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|pair| match pair {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                (Segment::Param(_), Segment::Param(_)) => true,
                _ => false,
            })
    }

    /// Matches the whole of `path`, returning the captured parameters.
    pub(crate) fn matches(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (segment, value) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(lit) if lit == value => {}
                Segment::Param(name) if !value.is_empty() => {
                    params.insert(name.clone(), (*value).to_owned());
                }
                _ => return None,
            }
        }
        Some(params)
    }

    /// For literal-only prefixes: the rest of `path` if it starts with this
    /// pattern's segments.
    pub(crate) fn strip<'p, 'a>(&self, path: &'p [&'a str]) -> Option<&'p [&'a str]> {
        if path.len() < self.segments.len() {
            return None;
        }
        let (head, rest) = path.split_at(self.segments.len());
        let hit = self.segments.iter().zip(head).all(|(segment, value)| {
            matches!(segment, Segment::Literal(lit) if lit == value)
        });
        hit.then_some(rest)
    }
}

/// `Some(Ok(name))` for a well-formed parameter segment, `Some(Err(_))` for
/// a malformed one, `None` for a literal.
fn parse_param(seg: &str) -> Option<Result<&str, &'static str>> {
    let name = if let Some(name) = seg.strip_prefix(':') {
        name
    } else if let Some(inner) = seg.strip_prefix('{') {
        match inner.strip_suffix('}') {
            Some(name) => name,
            None => return Some(Err("unbalanced `{`")),
        }
    } else {
        return None;
    };

    if name.is_empty() {
        return Some(Err("empty parameter name"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Some(Err("parameter names may only contain [A-Za-z0-9_]"));
    }
    Some(Ok(name))
}

/// Splits a request path into segments, ignoring one trailing slash.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() {
        return Vec::new();
    }
    rest.split('/').collect()
}
