//! Verified request identity.

use crate::roles::RoleSet;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity established by a verified bearer token.
///
/// Created by the authentication stage and read by the authorization stage.
/// It lives for a single request and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    subject: String,
    roles: RoleSet,
    expiry: DateTime<Utc>,
    token_id: Option<String>,
}

impl AuthContext {
    /// Creates a new context.
    pub fn new<I, S>(subject: impl Into<String>, roles: I, expiry: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            expiry,
            token_id: None,
        }
    }

    /// Attaches the token identifier (`jti`).
    pub fn with_token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }

    /// Returns the subject.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the granted roles.
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Returns when the token expires.
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Returns the token identifier, if the token carried one.
    pub fn token_id(&self) -> Option<&str> {
        self.token_id.as_deref()
    }

    /// Returns `true` if any granted role is in `required`.
    pub fn has_any_role(&self, required: &RoleSet) -> bool {
        // Iterate the smaller set.
        if self.roles.len() <= required.len() {
            self.roles.iter().any(|r| required.contains(r))
        } else {
            required.iter().any(|r| self.roles.contains(r))
        }
    }

    /// Returns `true` if the token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn roles(items: &[&str]) -> RoleSet {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_has_any_role_intersection() {
        let ctx = AuthContext::new("u1", ["ROLE_MEMBER", "ROLE_SELLER"], Utc::now());
        assert!(ctx.has_any_role(&roles(&["ROLE_SELLER"])));
        assert!(ctx.has_any_role(&roles(&["ROLE_ADMIN", "ROLE_MEMBER", "X", "Y"])));
        assert!(!ctx.has_any_role(&roles(&["ROLE_ADMIN"])));
        assert!(!ctx.has_any_role(&RoleSet::new()));
    }

    #[test]
    fn test_no_roles_never_authorizes() {
        let ctx = AuthContext::new("u1", Vec::<String>::new(), Utc::now());
        assert!(!ctx.has_any_role(&roles(&["ROLE_ADMIN"])));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let ctx = AuthContext::new("u1", ["r"], now + Duration::seconds(30)).with_token_id("jti-1");
        assert!(!ctx.is_expired_at(now));
        assert!(ctx.is_expired_at(now + Duration::seconds(30)));
        assert_eq!(ctx.token_id(), Some("jti-1"));
        assert_eq!(ctx.subject(), "u1");
    }
}
