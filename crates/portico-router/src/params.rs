//! Values captured while matching a path pattern.

use smallvec::SmallVec;

/// Name under which a trailing `**` capture is reported.
pub const REMAINING: &str = "remaining";

/// Captures from one successful match.
///
/// Gateway patterns capture at most a role segment and the `**` remainder,
/// so named captures live inline.
///
/// ```rust
/// use portico_router::Params;
///
/// let mut params = Params::new();
/// params.push("remaining", "/orders/123");
/// assert_eq!(params.remaining(), Some("/orders/123"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    named: SmallVec<[(String, String); 2]>,
    remaining: Option<String>,
}

impl Params {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a capture. [`REMAINING`] sets the `**` remainder.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if name == REMAINING {
            self.remaining = Some(value.into());
        } else {
            self.named.push((name, value.into()));
        }
    }

    /// Returns a capture by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        if name == REMAINING {
            return self.remaining();
        }
        self.named
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v.as_str()))
    }

    /// Segments consumed by a trailing `**`, with a leading `/`; empty when
    /// `**` matched nothing and `None` when the pattern has no `**`.
    #[must_use]
    pub fn remaining(&self) -> Option<&str> {
        self.remaining.as_deref()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.remaining.is_none()
    }

    /// Returns the number of captures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.named.len() + usize::from(self.remaining.is_some())
    }

    /// Iterates named captures in pattern order, then the remainder.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .chain(self.remaining().map(|r| (REMAINING, r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_segment_and_remainder() {
        let mut params = Params::new();
        params.push(REMAINING, "/42/items");
        params.push("role", "admin");

        assert_eq!(params.get("role"), Some("admin"));
        assert_eq!(params.get(REMAINING), Some("/42/items"));
        assert_eq!(params.get("service"), None);
        assert_eq!(params.len(), 2);
        assert_eq!(
            params.iter().collect::<Vec<_>>(),
            vec![("role", "admin"), (REMAINING, "/42/items")]
        );
    }

    #[test]
    fn test_empty_remainder_is_not_absent() {
        let mut params = Params::new();
        assert!(params.is_empty());
        assert_eq!(params.remaining(), None);

        params.push(REMAINING, "");
        assert!(!params.is_empty());
        assert_eq!(params.remaining(), Some(""));
    }
}
