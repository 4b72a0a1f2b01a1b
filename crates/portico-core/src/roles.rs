//! Role groups used for authorization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A set of role identifiers.
pub type RoleSet = BTreeSet<String>;

/// The three role groups a route can be scoped to.
///
/// Variants are listed in route precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleGroup {
    /// Administrative access.
    Admin,
    /// Seller access.
    Seller,
    /// Member access.
    Member,
}

impl RoleGroup {
    /// All groups in precedence order.
    pub const ALL: [Self; 3] = [Self::Admin, Self::Seller, Self::Member];

    /// Returns the path segment for this group (`/v1/{segment}/...`).
    pub const fn path_segment(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Seller => "seller",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for RoleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Role identifiers for each [`RoleGroup`]. Immutable after construction.
///
/// # Example
///
/// ```
/// use portico_core::{RoleGroup, RoleRegistry};
///
/// let registry = RoleRegistry::new(["ROLE_ADMIN"], ["ROLE_SELLER"], ["ROLE_MEMBER", "ROLE_SELLER"]);
/// assert!(registry.roles(RoleGroup::Member).contains("ROLE_SELLER"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRegistry {
    admin: RoleSet,
    seller: RoleSet,
    member: RoleSet,
}

impl RoleRegistry {
    /// Creates a registry. Role strings are trimmed and blanks dropped.
    pub fn new<A, S, M, T>(admin: A, seller: S, member: M) -> Self
    where
        A: IntoIterator<Item = T>,
        S: IntoIterator<Item = T>,
        M: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            admin: normalize(admin),
            seller: normalize(seller),
            member: normalize(member),
        }
    }

    /// Returns the role set for a group.
    pub fn roles(&self, group: RoleGroup) -> &RoleSet {
        match group {
            RoleGroup::Admin => &self.admin,
            RoleGroup::Seller => &self.seller,
            RoleGroup::Member => &self.member,
        }
    }

    /// Iterates groups with their role sets, in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = (RoleGroup, &RoleSet)> {
        RoleGroup::ALL.into_iter().map(move |g| (g, self.roles(g)))
    }

    /// Returns the groups whose role set is empty.
    pub fn empty_groups(&self) -> Vec<RoleGroup> {
        self.iter()
            .filter(|(_, roles)| roles.is_empty())
            .map(|(g, _)| g)
            .collect()
    }
}

fn normalize<I, T>(roles: I) -> RoleSet
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    roles
        .into_iter()
        .map(|r| r.as_ref().trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}
