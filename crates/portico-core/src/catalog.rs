//! Backend service catalog.
//!
//! The catalog turns the configured list of service names into
//! [`ServiceDescriptor`]s. Each descriptor carries three spellings of the
//! same service:
//!
//! | Field | Example | Used for |
//! |-------|---------|----------|
//! | `name` | `Orders-Service` | load-balanced target (`lb://Orders-Service`) |
//! | `id` | `orders-service` | docs path (`/orders-service/v3/api-docs`) |
//! | `base_name` | `orders` | API paths (`/v1/orders/**`) |

use crate::error::{GatewayError, GatewayResult};
use serde::Serialize;
use std::collections::HashSet;

/// Suffix stripped from a service id to form its base name.
pub const DEFAULT_SERVICE_SUFFIX: &str = "-service";

/// Scheme used for load-balanced targets.
const LOAD_BALANCED_SCHEME: &str = "lb://";

/// A normalized backend service.
///
/// `id` and `base_name` are pure functions of `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServiceDescriptor {
    name: String,
    id: String,
    base_name: String,
}

impl ServiceDescriptor {
    /// Derives a descriptor from a configured service name.
    ///
    /// The name is trimmed, the id is its lowercase form, and the base name
    /// is the id with one trailing `suffix` removed.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_core::ServiceDescriptor;
    ///
    /// let svc = ServiceDescriptor::derive("Orders-Service", "-service").unwrap();
    /// assert_eq!(svc.id(), "orders-service");
    /// assert_eq!(svc.base_name(), "orders");
    /// ```
    pub fn derive(name: &str, suffix: &str) -> GatewayResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::configuration("service name must not be empty"));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '?' | '#' | '%'))
        {
            return Err(GatewayError::configuration(format!(
                "service name '{name}' contains invalid character {bad:?}"
            )));
        }

        let id = name.to_lowercase();
        let suffix = suffix.to_lowercase();
        let base_name = if suffix.is_empty() {
            id.clone()
        } else {
            id.strip_suffix(suffix.as_str()).unwrap_or(&id).to_string()
        };

        if base_name.is_empty() {
            return Err(GatewayError::configuration(format!(
                "service name '{name}' has an empty base name after removing '{suffix}'"
            )));
        }
        if is_dot_segment(&id) || is_dot_segment(&base_name) {
            return Err(GatewayError::configuration(format!(
                "service name '{name}' would become a '.' or '..' path segment"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            id,
            base_name,
        })
    }

    /// Returns the name as configured.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lowercase identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the id without its service suffix.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Returns the logical load-balanced target for this service.
    pub fn target(&self) -> String {
        format!("{LOAD_BALANCED_SCHEME}{}", self.name)
    }
}

/// Ordered, duplicate-free set of backend services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: Vec<ServiceDescriptor>,
}

impl ServiceCatalog {
    /// Builds a catalog using [`DEFAULT_SERVICE_SUFFIX`].
    pub fn new<I, S>(names: I) -> GatewayResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_suffix(names, DEFAULT_SERVICE_SUFFIX)
    }

    /// Builds a catalog with a custom service suffix.
    ///
    /// Configuration order is preserved. Two names that normalize to the
    /// same id are rejected.
    pub fn with_suffix<I, S>(names: I, suffix: &str) -> GatewayResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut services = Vec::new();

        for name in names {
            let descriptor = ServiceDescriptor::derive(name.as_ref(), suffix)?;
            if !seen.insert(descriptor.id.clone()) {
                return Err(GatewayError::configuration(format!(
                    "duplicate service id '{}' (from '{}')",
                    descriptor.id, descriptor.name
                )));
            }
            services.push(descriptor);
        }

        Ok(Self { services })
    }

    /// Iterates services in configuration order.
    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDescriptor> {
        self.services.iter()
    }

    /// Looks a service up by its id.
    pub fn get(&self, id: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Returns the number of services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are configured.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl<'a> IntoIterator for &'a ServiceCatalog {
    type Item = &'a ServiceDescriptor;
    type IntoIter = std::slice::Iter<'a, ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn is_dot_segment(s: &str) -> bool {
    matches!(s, "." | "..")
}
