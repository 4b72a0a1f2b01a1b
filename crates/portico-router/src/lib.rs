//! Route table construction for the Portico gateway.
//!
//! From a [`ServiceCatalog`](portico_core::ServiceCatalog) and a
//! [`RoleRegistry`](portico_core::RoleRegistry) this crate derives an
//! immutable, ordered [`RouteTable`]. Each [`RouteRule`] carries the filter
//! chain that [`FilterChainComposer`] bound to it; executing that chain is
//! left to `portico-filters`, so everything here can be tested without a
//! network.
//!
//! # Example
//!
//! ```rust
//! use portico_core::{RoleRegistry, ServiceCatalog};
//! use portico_router::{RouteKind, RouteTableBuilder};
//!
//! let catalog = ServiceCatalog::new(["orders-service", "users-service"]).unwrap();
//! let roles = RoleRegistry::new(["ROLE_ADMIN"], ["ROLE_SELLER"], ["ROLE_MEMBER"]);
//! let table = RouteTableBuilder::new(&catalog, &roles)
//!     .gateway_host("https://api.example.com")
//!     .build()
//!     .unwrap();
//!
//! let m = table.lookup("/v1/users/123").unwrap();
//! assert_eq!(m.rule.id(), "users-service-default-routes");
//! assert_eq!(m.rule.kind(), RouteKind::DefaultProtected);
//! assert_eq!(m.params.remaining(), Some("/123"));
//! ```

mod builder;
mod compose;
mod params;
mod pattern;
mod route;
mod table;

pub use builder::{RouteTableBuilder, SWAGGER_CONFIG_ROUTE_ID};
pub use compose::{cors, cors_stages, FilterChainComposer};
pub use params::{Params, REMAINING};
pub use pattern::{has_dot_segment, PathPattern};
pub use route::{strip_prefix, FilterStage, PathRewrite, RouteKind, RouteRule};
pub use table::{RouteMatch, RouteTable};
