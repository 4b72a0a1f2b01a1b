//! Route table construction.
//!
//! Routes are registered phase by phase, most specific first:
//!
//! | Order | Id | Pattern | Target |
//! |-------|----|---------|--------|
//! | 1 | `swagger-config` | `/v3/api-docs/swagger-config` | gateway host |
//! | 2 | `{id}-api-docs` | `/{id}/v3/api-docs/**` | `lb://{name}` |
//! | 3 | `{base}-{group}-routes` | `/v1/{group}/{base}/**` | `lb://{name}` |
//! | 4 | `{id}-default-routes` | `/v1/{base}/**` | `lb://{name}` |
//!
//! Phase 2 runs for every service before phase 3 starts, and so on, so every
//! docs and role route precedes every default route. Groups within phase 3
//! are ordered admin, seller, member.
//!
//! The finished table must be unambiguous: no concrete path may match two
//! rules. Any overlap is a configuration error.

use crate::compose::FilterChainComposer;
use crate::pattern::PathPattern;
use crate::route::{RouteKind, RouteRule};
use crate::table::RouteTable;
use portico_core::{GatewayError, GatewayResult, RoleRegistry, ServiceCatalog};
use portico_docs::{API_DOCS_PATH, SWAGGER_CONFIG_PATH};
use std::collections::HashSet;

/// Id of the swagger-config singleton route.
pub const SWAGGER_CONFIG_ROUTE_ID: &str = "swagger-config";

/// Builds a [`RouteTable`] from the service catalog and role registry.
///
/// # Example
///
/// ```
/// use portico_core::{RoleRegistry, ServiceCatalog};
/// use portico_router::RouteTableBuilder;
///
/// let catalog = ServiceCatalog::new(["orders-service"]).unwrap();
/// let roles = RoleRegistry::new(["ROLE_ADMIN"], ["ROLE_SELLER"], ["ROLE_MEMBER"]);
/// let table = RouteTableBuilder::new(&catalog, &roles)
///     .gateway_host("http://gw:8000")
///     .build()
///     .unwrap();
///
/// assert_eq!(table.len(), 6);
/// let m = table.lookup("/v1/admin/orders/1").unwrap();
/// assert_eq!(m.rule.id(), "orders-admin-routes");
/// ```
#[derive(Debug)]
pub struct RouteTableBuilder<'a> {
    catalog: &'a ServiceCatalog,
    roles: &'a RoleRegistry,
    gateway_host: String,
    public_docs: bool,
}

impl<'a> RouteTableBuilder<'a> {
    /// Creates a builder.
    pub fn new(catalog: &'a ServiceCatalog, roles: &'a RoleRegistry) -> Self {
        Self {
            catalog,
            roles,
            gateway_host: String::new(),
            public_docs: false,
        }
    }

    /// Sets the gateway's externally visible base address.
    pub fn gateway_host(mut self, host: impl Into<String>) -> Self {
        self.gateway_host = host.into();
        self
    }

    /// Serves per-service documents without authentication.
    pub fn public_docs(mut self, public: bool) -> Self {
        self.public_docs = public;
        self
    }

    /// Builds and validates the table.
    pub fn build(self) -> GatewayResult<RouteTable> {
        for group in self.roles.empty_groups() {
            tracing::warn!(group = %group, "role group has no roles; its routes will reject every caller");
        }

        let composer =
            FilterChainComposer::new(self.gateway_host.clone()).public_docs(self.public_docs);

        let rules = self
            .rules()?
            .into_iter()
            .map(|rule| {
                let filters = composer.compose(&rule)?;
                Ok(rule.with_filters(filters))
            })
            .collect::<GatewayResult<Vec<_>>>()?;

        validate(&rules)?;

        tracing::debug!(routes = rules.len(), services = self.catalog.len(), "route table built");
        Ok(RouteTable::from_rules(rules))
    }

    fn rules(&self) -> GatewayResult<Vec<RouteRule>> {
        let mut rules = Vec::with_capacity(1 + self.catalog.len() * 5);

        rules.push(RouteRule::new(
            SWAGGER_CONFIG_ROUTE_ID,
            PathPattern::parse(SWAGGER_CONFIG_PATH)?,
            self.gateway_host.clone(),
            RouteKind::SwaggerIndex,
        ));

        for svc in self.catalog {
            rules.push(
                RouteRule::new(
                    format!("{}-api-docs", svc.id()),
                    PathPattern::parse(format!("/{}{API_DOCS_PATH}/**", svc.id()))?,
                    svc.target(),
                    RouteKind::Docs,
                )
                .for_service(svc.id()),
            );
        }

        for svc in self.catalog {
            for (group, roles) in self.roles.iter() {
                let segment = group.path_segment();
                rules.push(
                    RouteRule::new(
                        format!("{}-{segment}-routes", svc.base_name()),
                        PathPattern::parse(format!("/v1/{segment}/{}/**", svc.base_name()))?,
                        svc.target(),
                        RouteKind::RoleScoped,
                    )
                    .for_service(svc.id())
                    .requiring(group, roles.clone()),
                );
            }
        }

        for svc in self.catalog {
            rules.push(
                RouteRule::new(
                    format!("{}-default-routes", svc.id()),
                    PathPattern::parse(format!("/v1/{}/**", svc.base_name()))?,
                    svc.target(),
                    RouteKind::DefaultProtected,
                )
                .for_service(svc.id()),
            );
        }

        Ok(rules)
    }
}

/// Checks route ids are unique and no two patterns overlap.
fn validate(rules: &[RouteRule]) -> GatewayResult<()> {
    let mut ids = HashSet::with_capacity(rules.len());
    for rule in rules {
        if !ids.insert(rule.id()) {
            return Err(GatewayError::configuration(format!(
                "duplicate route id '{}'",
                rule.id()
            )));
        }
    }

    for (i, a) in rules.iter().enumerate() {
        for b in &rules[i + 1..] {
            if a.pattern().overlaps(b.pattern()) {
                return Err(GatewayError::configuration(format!(
                    "ambiguous routes: '{}' ({}) overlaps '{}' ({})",
                    a.id(),
                    a.pattern(),
                    b.id(),
                    b.pattern()
                )));
            }
        }
    }

    Ok(())
}
