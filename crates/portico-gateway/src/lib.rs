//! # Portico Gateway
//!
//! The gateway server: it owns the live route table, runs each request
//! through its route's filter chain and forwards it to the backend.
//!
//! ```text
//!   client ──► GatewayServer ──► RequestDispatcher ──► FilterChain ──► HttpUpstream ──► lb://service
//!                                      │
//!                                RouteTableHandle ◄── ConfigReloader ◄── FileWatcher
//! ```
//!
//! # Internal endpoints
//!
//! | Path | Purpose |
//! |------|---------|
//! | `/_portico/health` | Liveness |
//! | `/_portico/ready` | Readiness, with the live route count |
//! | `/_portico/routes` | The live route table as JSON |
//! | `/_portico/metrics` | Prometheus metrics |
//! | `/swagger-ui.html` | Swagger UI over every service's document |
//!
//! # Example
//!
//! ```ignore
//! let config = ConfigLoader::new().with_file("portico.toml")?.load()?;
//! let store = connect_token_store(&config.token_store).await?;
//! let routes = RouteTableHandle::new(SnapshotBuilder::new(&config, store).build()?);
//! let dispatcher = RequestDispatcher::new(routes, &config.server);
//! GatewayServer::bind(&config.bind_addr(), dispatcher, Duration::from_secs(30))
//!     .await?
//!     .run(ShutdownSignal::with_os_signals())
//!     .await?;
//! ```

#![doc(html_root_url = "https://docs.rs/portico-gateway/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod dispatcher;
pub mod error;
pub mod headers;
pub mod health;
pub mod reload;
pub mod server;
pub mod state;
pub mod upstream;

pub use dispatcher::RequestDispatcher;
pub use error::{ServerError, ServerResult, UpstreamError};
pub use health::{HealthChecker, Liveness, Phase, Readiness};
pub use reload::ConfigReloader;
pub use server::{GatewayServer, ShutdownSignal};
pub use state::{connect_token_store, RouteSnapshot, RouteTableHandle, SnapshotBuilder};
pub use upstream::{HttpUpstream, ServiceResolver, StaticResolver, UpstreamDispatcher};

/// Gateway version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
