//! The live route table and everything compiled from it.
//!
//! A [`RouteSnapshot`] is immutable. Requests take an `Arc` to the current
//! snapshot when they start and keep it until they finish; a reload builds
//! a new snapshot and publishes it through [`RouteTableHandle::swap`].

use crate::error::ServerResult;
use crate::upstream::{HttpUpstream, UpstreamDispatcher};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use portico_config::{AuthConfig, GatewayConfig, TokenStoreConfig, TokenStoreKind};
use portico_core::{GatewayError, RoleRegistry, ServiceCatalog};
use portico_docs::{SwaggerConfig, SwaggerUi};
use portico_filters::auth::{JwtSettings, JwtVerifier, MemoryTokenStore, TokenStateStore};
use portico_filters::{ChainResources, FilterChain};
use portico_router::{RouteMatch, RouteTable, RouteTableBuilder};
use std::collections::HashMap;
use std::sync::Arc;

/// A built route table with its compiled filter chains.
pub struct RouteSnapshot {
    table: RouteTable,
    chains: HashMap<String, FilterChain>,
    swagger_config: Bytes,
    swagger_ui: Bytes,
    upstream: Arc<dyn UpstreamDispatcher>,
    conceal_forbidden: bool,
    loaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for RouteSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSnapshot")
            .field("routes", &self.table.len())
            .field("upstream", &self.upstream)
            .field("conceal_forbidden", &self.conceal_forbidden)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

impl RouteSnapshot {
    /// Finds the first matching route and its chain.
    pub fn lookup(&self, path: &str) -> Option<(RouteMatch<'_>, &FilterChain)> {
        let matched = self.table.lookup(path)?;
        let chain = self.chains.get(matched.rule.id())?;
        Some((matched, chain))
    }

    /// Returns the route table.
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Returns the serialized swagger-config index.
    pub fn swagger_config(&self) -> Bytes {
        self.swagger_config.clone()
    }

    /// Returns the Swagger UI page.
    pub fn swagger_ui(&self) -> Bytes {
        self.swagger_ui.clone()
    }

    /// Returns the backend dispatcher.
    pub fn upstream(&self) -> Arc<dyn UpstreamDispatcher> {
        Arc::clone(&self.upstream)
    }

    /// Returns whether authorization failures are reported as 404.
    pub fn conceal_forbidden(&self) -> bool {
        self.conceal_forbidden
    }

    /// Returns when the snapshot was built.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Builds a [`RouteSnapshot`] from configuration.
///
/// # Example
///
/// ```ignore
/// let store = connect_token_store(&config.token_store).await?;
/// let snapshot = SnapshotBuilder::new(&config, store).build()?;
/// let routes = RouteTableHandle::new(snapshot);
/// ```
pub struct SnapshotBuilder<'a> {
    config: &'a GatewayConfig,
    token_store: Option<Arc<dyn TokenStateStore>>,
    upstream: Option<Arc<dyn UpstreamDispatcher>>,
}

impl<'a> SnapshotBuilder<'a> {
    /// Creates a builder that checks revocation against `token_store`.
    pub fn new(config: &'a GatewayConfig, token_store: Option<Arc<dyn TokenStateStore>>) -> Self {
        Self {
            config,
            token_store,
            upstream: None,
        }
    }

    /// Uses `upstream` instead of an [`HttpUpstream`] built from
    /// `upstream.*`.
    pub fn with_upstream(mut self, upstream: Arc<dyn UpstreamDispatcher>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Builds the route table, compiles every chain and prepares the
    /// documentation index.
    pub fn build(self) -> ServerResult<RouteSnapshot> {
        let config = self.config;
        let catalog =
            ServiceCatalog::with_suffix(&config.services.names, &config.gateway.service_suffix)?;
        let roles = RoleRegistry::new(
            &config.authority.admin,
            &config.authority.seller,
            &config.authority.member,
        );

        let table = RouteTableBuilder::new(&catalog, &roles)
            .gateway_host(config.gateway.host.clone())
            .public_docs(config.docs.public)
            .build()?;

        let mut verifier = JwtVerifier::new(&jwt_settings(&config.auth));
        if let Some(store) = self.token_store {
            verifier = verifier.with_store(store);
        }
        let resources = ChainResources {
            verifier: Arc::new(verifier),
            max_document_bytes: config.docs.max_document_bytes,
        };
        let chains = table
            .iter()
            .map(|rule| (rule.id().to_string(), FilterChain::compile(rule, &resources)))
            .collect();

        let swagger_config = SwaggerConfig::from_catalog(&catalog)
            .to_json()
            .map_err(|e| GatewayError::internal(format!("swagger-config: {e}")))?;

        let upstream: Arc<dyn UpstreamDispatcher> = match self.upstream {
            Some(upstream) => upstream,
            None => Arc::new(HttpUpstream::from_config(&config.upstream)?),
        };

        tracing::info!(
            routes = table.len(),
            services = catalog.len(),
            "route table compiled"
        );

        Ok(RouteSnapshot {
            table,
            chains,
            swagger_config: Bytes::from(swagger_config),
            swagger_ui: Bytes::from(SwaggerUi::default().html()),
            upstream,
            conceal_forbidden: config.gateway.conceal_forbidden,
            loaded_at: Utc::now(),
        })
    }
}

/// Maps `auth.*` to verifier settings.
pub fn jwt_settings(auth: &AuthConfig) -> JwtSettings {
    JwtSettings {
        secret: auth.jwt_secret.clone(),
        issuer: auth.issuer.clone(),
        audience: auth.audience.clone(),
        leeway_secs: auth.leeway_secs,
        roles_claim: auth.roles_claim.clone(),
    }
}

/// Creates the token-state store named by `token_store.kind`.
///
/// Returns `None` for `none`.
pub async fn connect_token_store(
    config: &TokenStoreConfig,
) -> ServerResult<Option<Arc<dyn TokenStateStore>>> {
    match config.kind {
        TokenStoreKind::None => Ok(None),
        TokenStoreKind::Memory => Ok(Some(Arc::new(MemoryTokenStore::new()))),
        TokenStoreKind::Redis => connect_redis(config).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(config: &TokenStoreConfig) -> ServerResult<Option<Arc<dyn TokenStateStore>>> {
    use portico_filters::auth::{RedisSettings, RedisTokenStore};

    let settings = RedisSettings {
        host: config.host.clone(),
        port: config.port,
        key_prefix: config.key_prefix.clone(),
    };
    let store = RedisTokenStore::connect(&settings).await?;
    tracing::info!(host = %config.host, port = config.port, "connected to redis token store");
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(
    _config: &TokenStoreConfig,
) -> ServerResult<Option<Arc<dyn TokenStateStore>>> {
    Err(crate::error::ServerError::Config(portico_config::ConfigError::invalid_value(
        "token_store.kind",
        "built without the `redis` feature",
    )))
}

/// Shared pointer to the live [`RouteSnapshot`].
///
/// Cloning the handle shares the same slot.
#[derive(Debug, Clone)]
pub struct RouteTableHandle {
    current: Arc<RwLock<Arc<RouteSnapshot>>>,
}

impl RouteTableHandle {
    /// Publishes `snapshot` as the initial table.
    pub fn new(snapshot: RouteSnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Returns the live snapshot.
    pub fn load(&self) -> Arc<RouteSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replaces the live snapshot, returning the previous one.
    ///
    /// Requests already holding the previous snapshot finish against it.
    pub fn swap(&self, snapshot: RouteSnapshot) -> Arc<RouteSnapshot> {
        std::mem::replace(&mut *self.current.write(), Arc::new(snapshot))
    }
}
