//! Glob-style path patterns.
//!
//! A pattern is a `/`-separated list of segments:
//!
//! | Segment | Matches |
//! |---------|---------|
//! | `orders` | exactly `orders` |
//! | `*` | any single segment |
//! | `{id}` | any single segment, captured as `id` |
//! | `**` | zero or more trailing segments, captured as `remaining` |
//!
//! `**` is only allowed as the last segment. Empty path segments are
//! ignored when matching, so `/v1/orders/` and `/v1//orders` behave like
//! `/v1/orders`. A path holding a `.` or `..` segment never matches; see
//! [`has_dot_segment`].

use crate::params::{Params, REMAINING};
use portico_core::{GatewayError, GatewayResult};
use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
    Param(String),
    Rest,
}

impl Segment {
    fn compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            _ => true,
        }
    }
}

/// A parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parses a pattern.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_router::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/v1/orders/**").unwrap();
    /// let params = pattern.matches("/v1/orders/123/items").unwrap();
    /// assert_eq!(params.remaining(), Some("/123/items"));
    /// assert!(pattern.matches("/v1/users/1").is_none());
    /// ```
    pub fn parse(raw: impl Into<String>) -> GatewayResult<Self> {
        let raw = raw.into();
        let invalid = |why: &str| GatewayError::configuration(format!("invalid path pattern '{raw}': {why}"));

        let Some(body) = raw.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let mut segments = Vec::new();
        if !body.is_empty() {
            let parts: Vec<&str> = body.split('/').collect();
            let last = parts.len() - 1;
            for (i, part) in parts.iter().enumerate() {
                let segment = match *part {
                    "" => return Err(invalid("empty segment")),
                    "**" if i == last => Segment::Rest,
                    "**" => return Err(invalid("'**' must be the last segment")),
                    "*" => Segment::Any,
                    p if p.len() > 2 && p.starts_with('{') && p.ends_with('}') => {
                        Segment::Param(p[1..p.len() - 1].to_string())
                    }
                    p if p.contains(['*', '{', '}']) => {
                        return Err(invalid("wildcards must span a whole segment"))
                    }
                    p => Segment::Literal(p.to_string()),
                };
                segments.push(segment);
            }
        }

        Ok(Self { raw, segments })
    }

    /// Returns the pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches a request path, returning the captured values.
    pub fn matches(&self, path: &str) -> Option<Params> {
        if has_dot_segment(path) {
            return None;
        }
        let parts: SmallVec<[&str; 8]> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => {
                    let rest = parts.get(i..).unwrap_or_default();
                    let remaining = if rest.is_empty() {
                        String::new()
                    } else {
                        format!("/{}", rest.join("/"))
                    };
                    params.push(REMAINING, remaining);
                    return Some(params);
                }
                Segment::Literal(lit) => {
                    if parts.get(i).copied() != Some(lit.as_str()) {
                        return None;
                    }
                }
                Segment::Any => {
                    parts.get(i)?;
                }
                Segment::Param(name) => params.push(name.as_str(), *parts.get(i)?),
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }

    /// Returns `true` if some concrete path is matched by both patterns.
    pub fn overlaps(&self, other: &Self) -> bool {
        fn walk(a: &[Segment], b: &[Segment]) -> bool {
            match (a.first(), b.first()) {
                (Some(Segment::Rest), _) | (_, Some(Segment::Rest)) | (None, None) => true,
                (None, Some(_)) | (Some(_), None) => false,
                (Some(x), Some(y)) => x.compatible(y) && walk(&a[1..], &b[1..]),
            }
        }
        walk(&self.segments, &other.segments)
    }
}

/// Returns `true` if `path` holds a `.` or `..` segment, in plain or
/// percent-encoded form (`%2e`, `.%2E`, ...).
///
/// URL normalization collapses these segments after the route has been
/// chosen, so `/v1/orders/../admin/orders/1` would be matched as an orders
/// path and sent as an admin one. `\` counts as a separator for the same
/// reason.
///
/// # Example
///
/// ```
/// use portico_router::has_dot_segment;
///
/// assert!(has_dot_segment("/v1/orders/../admin/orders/1"));
/// assert!(has_dot_segment("/v1/orders/%2E%2e/admin"));
/// assert!(!has_dot_segment("/v1/orders/v1.2/..hidden"));
/// ```
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        matches!(
            segment.to_ascii_lowercase().as_str(),
            "." | ".." | "%2e" | ".%2e" | "%2e." | "%2e%2e"
        )
    })
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for PathPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
