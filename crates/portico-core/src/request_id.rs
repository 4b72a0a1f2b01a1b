//! Per-request correlation id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Correlates one request across gateway logs, the forwarded backend call
/// and the error envelope returned to the client.
///
/// Ids are UUID v7, so they sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Keeps the caller's `x-request-id` if it is a UUID; anything else is
    /// replaced so log correlation never depends on client input.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_v7() {
        let a = RequestId::new();
        assert_ne!(a, RequestId::new());
        assert_eq!(a.0.get_version_num(), 7);
    }

    #[test]
    fn test_inbound_uuid_is_kept() {
        let inbound = "0191f0a4-7c1e-7d2b-9a4e-3f1c2b8d9e01";
        let id = RequestId::from_header(Some(&format!(" {inbound} ")));
        assert_eq!(id.to_string(), inbound);
    }

    #[test]
    fn test_garbage_or_missing_header_gets_fresh_id() {
        for value in [Some("not-a-uuid"), Some(""), None] {
            let id = RequestId::from_header(value);
            assert_eq!(id.0.get_version_num(), 7);
            assert_eq!(id.to_string().len(), 36);
        }
    }
}
