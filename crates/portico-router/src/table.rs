//! Immutable, ordered route table.

use crate::params::Params;
use crate::route::RouteRule;

/// A matched route with its captured path values.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The matched rule.
    pub rule: &'a RouteRule,
    /// Values captured by the pattern.
    pub params: Params,
}

/// Ordered sequence of routes. Lookup is first-match-wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Wraps an ordered list of rules.
    ///
    /// Use [`RouteTableBuilder`](crate::RouteTableBuilder) to get a table
    /// that has been checked for ambiguity.
    pub fn from_rules(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Returns the first rule matching `path`. Every route accepts every
    /// method.
    pub fn lookup(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.rules.iter().find_map(|rule| {
            rule.pattern()
                .matches(path)
                .map(|params| RouteMatch { rule, params })
        })
    }

    /// Returns a rule by id.
    pub fn get(&self, id: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// Iterates rules in precedence order.
    pub fn iter(&self) -> std::slice::Iter<'_, RouteRule> {
        self.rules.iter()
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a RouteRule;
    type IntoIter = std::slice::Iter<'a, RouteRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
