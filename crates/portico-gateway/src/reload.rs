//! Route table hot reload.
//!
//! Watches the configuration file and, when route inputs change, builds a
//! new [`RouteSnapshot`](crate::state::RouteSnapshot) and swaps it in. A
//! configuration that fails to load or build is logged and the live table
//! stays as it is.

use crate::error::ServerResult;
use crate::state::{connect_token_store, RouteTableHandle, SnapshotBuilder};
use portico_config::{ConfigLoader, FileWatcher, GatewayConfig};
use portico_filters::auth::TokenStateStore;
use portico_telemetry::metrics::record_route_table_reload;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Rebuilds the route table when the configuration file changes.
pub struct ConfigReloader {
    path: PathBuf,
    env_prefix: String,
    routes: RouteTableHandle,
    current: GatewayConfig,
    token_store: Option<Arc<dyn TokenStateStore>>,
}

impl std::fmt::Debug for ConfigReloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigReloader")
            .field("path", &self.path)
            .field("env_prefix", &self.env_prefix)
            .finish_non_exhaustive()
    }
}

impl ConfigReloader {
    /// Creates a reloader for the configuration at `path`, currently live
    /// as `current` with revocation state in `token_store`.
    pub fn new(
        path: impl AsRef<Path>,
        env_prefix: impl Into<String>,
        routes: RouteTableHandle,
        current: GatewayConfig,
        token_store: Option<Arc<dyn TokenStateStore>>,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            env_prefix: env_prefix.into(),
            routes,
            current,
            token_store,
        }
    }

    /// Starts watching. The task runs until the watcher stops.
    pub fn spawn(self) -> ServerResult<JoinHandle<()>> {
        let watcher = FileWatcher::builder(&self.path)
            .with_debounce(DEBOUNCE)
            .build()?;
        tracing::info!(path = %self.path.display(), "watching configuration for changes");
        Ok(tokio::spawn(self.run(watcher)))
    }

    async fn run(mut self, mut watcher: FileWatcher) {
        while let Some(event) = watcher.next().await {
            tracing::debug!(path = %event.path.display(), kind = ?event.kind, "configuration file changed");
            self.reload().await;
        }
        tracing::info!("configuration watcher stopped");
    }

    /// Loads the file again and swaps the route table if its inputs changed.
    ///
    /// Returns `true` if a new table was published.
    pub async fn reload(&mut self) -> bool {
        let next = match ConfigLoader::new()
            .with_file(&self.path)
            .map(|loader| loader.with_env_prefix(&self.env_prefix))
            .and_then(ConfigLoader::load)
        {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "configuration reload failed; keeping the live route table");
                record_route_table_reload(false);
                return false;
            }
        };

        if next.requires_restart(&self.current) {
            tracing::warn!("server, logging or metrics settings changed; restart to apply them");
        }
        if !next.routes_changed(&self.current) {
            tracing::debug!("route inputs unchanged");
            return false;
        }

        if next.token_store != self.current.token_store {
            match connect_token_store(&next.token_store).await {
                Ok(store) => self.token_store = store,
                Err(e) => {
                    tracing::error!(error = %e, "token store reconnect failed; keeping the live route table");
                    record_route_table_reload(false);
                    return false;
                }
            }
        }

        match SnapshotBuilder::new(&next, self.token_store.clone()).build() {
            Ok(snapshot) => {
                let routes = snapshot.table().len();
                self.routes.swap(snapshot);
                self.current = next;
                record_route_table_reload(true);
                tracing::info!(routes, "route table reloaded");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "route table rebuild failed; keeping the live route table");
                record_route_table_reload(false);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BASE: &str = r#"
[gateway]
host = "https://gw.example.com"

[services]
names = ["orders-service"]

[auth]
jwt_secret = "secret"
"#;

    fn write(file: &mut tempfile::NamedTempFile, content: &str) {
        let f = file.as_file_mut();
        f.set_len(0).unwrap();
        std::io::Seek::rewind(f).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
    }

    fn reloader(file: &tempfile::NamedTempFile) -> (ConfigReloader, RouteTableHandle) {
        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .with_env_prefix("PORTICO_RELOAD_TEST")
            .load()
            .unwrap();
        let routes = RouteTableHandle::new(SnapshotBuilder::new(&config, None).build().unwrap());
        let reloader = ConfigReloader::new(
            file.path(),
            "PORTICO_RELOAD_TEST",
            routes.clone(),
            config,
            None,
        );
        (reloader, routes)
    }

    #[tokio::test]
    async fn test_added_service_is_published() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write(&mut file, BASE);
        let (mut reloader, routes) = reloader(&file);
        assert_eq!(routes.load().table().len(), 6);

        write(&mut file, &BASE.replace(r#"["orders-service"]"#, r#"["orders-service", "users-service"]"#));
        assert!(reloader.reload().await);
        assert_eq!(routes.load().table().len(), 11);

        assert!(!reloader.reload().await, "unchanged file must not republish");
    }

    #[tokio::test]
    async fn test_invalid_config_keeps_live_table() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write(&mut file, BASE);
        let (mut reloader, routes) = reloader(&file);
        let before = routes.load();

        write(&mut file, &BASE.replace(r#"["orders-service"]"#, r#"["orders", "orders-service"]"#));
        assert!(!reloader.reload().await);
        assert!(Arc::ptr_eq(&before, &routes.load()));

        write(&mut file, "not toml [");
        assert!(!reloader.reload().await);
        assert!(Arc::ptr_eq(&before, &routes.load()));
    }
}
