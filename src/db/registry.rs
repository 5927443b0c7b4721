//! Connection registry.
//!
//! The registry holds the definitions of all named connections and lazily
//! materializes their driver handles. Each entry moves from `NotLoaded` to
//! either `Loaded` or `Failed` exactly once; the transition is serialized by a
//! per-entry lock so concurrent callers never open the same endpoint twice.
//! A `Failed` entry keeps its error and is only retried after [`ConnectionRegistry::reset`].

use crate::config::RegistryConfig;
use crate::db::driver::{Connector, SharedHandle, share};
use crate::db::dsn::Dsn;
use crate::db::sqlx_driver::SqlxConnector;
use crate::error::{RouterError, RouterResult};
use crate::models::{
    ConnectionDefinition, ConnectionState, ConnectionSummary, DriverKind, EndpointDefinition,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Handles of a loaded connection.
///
/// `read_only` is the same handle as `primary` when no replica is configured.
pub struct LoadedHandles<H> {
    pub primary: SharedHandle<H>,
    pub read_only: SharedHandle<H>,
}

impl<H> LoadedHandles<H> {
    /// Whether reads go to a separate replica handle.
    pub fn has_replica(&self) -> bool {
        !Arc::ptr_eq(&self.primary, &self.read_only)
    }
}

impl<H> Clone for LoadedHandles<H> {
    fn clone(&self) -> Self {
        Self {
            primary: Arc::clone(&self.primary),
            read_only: Arc::clone(&self.read_only),
        }
    }
}

impl<H> std::fmt::Debug for LoadedHandles<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedHandles")
            .field("has_replica", &self.has_replica())
            .finish_non_exhaustive()
    }
}

enum LoadState<H> {
    NotLoaded,
    Loaded(LoadedHandles<H>),
    Failed {
        error: RouterError,
        /// Primary opened before the replica failed. Never lent out; released by `reset`.
        retained_primary: Option<SharedHandle<H>>,
    },
}

impl<H> LoadState<H> {
    fn as_state(&self) -> ConnectionState {
        match self {
            LoadState::NotLoaded => ConnectionState::NotLoaded,
            LoadState::Loaded(_) => ConnectionState::Loaded,
            LoadState::Failed { .. } => ConnectionState::Failed,
        }
    }
}

struct RegistryEntry<H> {
    definition: ConnectionDefinition,
    state: Mutex<LoadState<H>>,
}

/// Registry of named connections, generic over the driver.
pub struct ConnectionRegistry<C: Connector = SqlxConnector> {
    connector: C,
    entries: RwLock<HashMap<String, Arc<RegistryEntry<C::Handle>>>>,
}

impl<C: Connector> std::fmt::Debug for ConnectionRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry").finish_non_exhaustive()
    }
}

impl<C: Connector> ConnectionRegistry<C> {
    /// Create an empty registry that opens connections through `connector`.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding every connection in `config`.
    ///
    /// The `autoload` key is not a connection; it is left to the router.
    pub async fn from_config(connector: C, config: &RegistryConfig) -> Self {
        let registry = Self::new(connector);
        for (name, definition) in &config.connections {
            if let Err(e) = registry.register(name.clone(), definition.clone()).await {
                warn!(connection = %name, error = %e, "Skipping duplicate connection");
            }
        }
        registry
    }

    /// Register a connection definition under `name`.
    pub async fn register(
        &self,
        name: impl Into<String>,
        definition: ConnectionDefinition,
    ) -> RouterResult<()> {
        let name = name.into();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&name) {
            return Err(RouterError::already_exists(name));
        }

        debug!(
            connection = %name,
            driver = ?definition.driver,
            read_only = definition.read_only.is_some(),
            "Registered connection"
        );
        entries.insert(
            name,
            Arc::new(RegistryEntry {
                definition,
                state: Mutex::new(LoadState::NotLoaded),
            }),
        );
        Ok(())
    }

    /// Check if a connection is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    /// Registered connection names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered connections.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Current lifecycle state of a connection.
    pub async fn state(&self, name: &str) -> RouterResult<ConnectionState> {
        let entry = self.entry(name).await?;
        let state = entry.state.lock().await;
        Ok(state.as_state())
    }

    /// List all connections with details, sorted by name.
    pub async fn summaries(&self) -> Vec<ConnectionSummary> {
        let entries: Vec<(String, Arc<RegistryEntry<C::Handle>>)> = {
            let map = self.entries.read().await;
            map.iter()
                .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
                .collect()
        };

        let mut summaries = Vec::with_capacity(entries.len());
        for (name, entry) in entries {
            let state = entry.state.lock().await.as_state();
            summaries.push(ConnectionSummary {
                name,
                driver: entry.definition.driver.clone(),
                has_read_only: entry.definition.read_only.is_some(),
                state,
            });
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Ensure a connection is loaded, opening its handles on first use.
    ///
    /// Returns the shared handles on success. A loaded connection returns
    /// immediately; a failed one returns its stored error without reconnecting.
    pub async fn ensure_loaded(&self, name: &str) -> RouterResult<LoadedHandles<C::Handle>> {
        let entry = self.entry(name).await?;
        let mut state = entry.state.lock().await;

        match &*state {
            LoadState::Loaded(handles) => {
                debug!(connection = %name, "Connection already loaded");
                return Ok(handles.clone());
            }
            LoadState::Failed { error, .. } => {
                debug!(connection = %name, error = %error, "Connection previously failed");
                return Err(error.clone());
            }
            LoadState::NotLoaded => {}
        }

        match self.load(name, &entry.definition).await {
            Ok(handles) => {
                info!(
                    connection = %name,
                    read_only = handles.has_replica(),
                    "Connection loaded"
                );
                *state = LoadState::Loaded(handles.clone());
                Ok(handles)
            }
            Err((error, retained_primary)) => {
                warn!(
                    connection = %name,
                    code = %error.code(),
                    error = %error,
                    primary_retained = retained_primary.is_some(),
                    "Connection failed to load"
                );
                *state = LoadState::Failed {
                    error: error.clone(),
                    retained_primary,
                };
                Err(error)
            }
        }
    }

    /// Return a `Failed` connection to `NotLoaded` so the next activation retries it.
    ///
    /// Any primary handle retained from the failed attempt is released. Loaded
    /// and not-yet-loaded connections are left as they are.
    pub async fn reset(&self, name: &str) -> RouterResult<ConnectionState> {
        let entry = self.entry(name).await?;
        let mut state = entry.state.lock().await;
        if let LoadState::Failed {
            retained_primary, ..
        } = &*state
        {
            info!(
                connection = %name,
                primary_released = retained_primary.is_some(),
                "Resetting failed connection"
            );
            *state = LoadState::NotLoaded;
        }
        Ok(state.as_state())
    }

    async fn entry(&self, name: &str) -> RouterResult<Arc<RegistryEntry<C::Handle>>> {
        let entries = self.entries.read().await;
        entries
            .get(name)
            .cloned()
            .ok_or_else(|| RouterError::missing_connection(name))
    }

    /// Open the primary, then the replica if configured.
    ///
    /// A replica failure hands the already-open primary back with the error.
    async fn load(
        &self,
        name: &str,
        definition: &ConnectionDefinition,
    ) -> Result<LoadedHandles<C::Handle>, (RouterError, Option<SharedHandle<C::Handle>>)> {
        let driver = definition
            .driver_kind()
            .ok_or_else(|| (RouterError::unknown_driver(name, definition.driver.as_deref()), None))?;

        let primary = self
            .open_endpoint(name, driver, &definition.primary, false)
            .await
            .map_err(|e| (e, None))?;

        let read_only = match &definition.read_only {
            Some(endpoint) => match self.open_endpoint(name, driver, endpoint, true).await {
                Ok(handle) => handle,
                Err(e) => return Err((e, Some(primary))),
            },
            None => Arc::clone(&primary),
        };

        Ok(LoadedHandles { primary, read_only })
    }

    async fn open_endpoint(
        &self,
        name: &str,
        driver: DriverKind,
        endpoint: &EndpointDefinition,
        read_only: bool,
    ) -> RouterResult<SharedHandle<C::Handle>> {
        let credentials = endpoint
            .credentials(driver)
            .map_err(|field| RouterError::missing_credentials(name, field, read_only))?;
        let dsn = Dsn::new(driver, &credentials);

        info!(
            connection = %name,
            driver = %driver,
            dsn = %dsn,
            read_only,
            "Connecting to database"
        );

        let handle = self
            .connector
            .connect(&dsn, &credentials.username, &credentials.password)
            .await
            .map_err(|e| RouterError::connection_failed(name, e.message, read_only))?;
        Ok(share(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn sqlite_definition(path: &std::path::Path) -> ConnectionDefinition {
        ConnectionDefinition::new(
            "sqlite",
            EndpointDefinition {
                database: Some(path.to_string_lossy().into_owned()),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_registry_creation() {
        let registry = ConnectionRegistry::new(SqlxConnector::new());
        assert_eq!(registry.len().await, 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_register_duplicate_name() {
        let registry = ConnectionRegistry::new(SqlxConnector::new());
        registry
            .register("main", ConnectionDefinition::default())
            .await
            .unwrap();
        let err = registry
            .register("main", ConnectionDefinition::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_ensure_loaded_unknown_name() {
        let registry = ConnectionRegistry::new(SqlxConnector::new());
        let err = registry.ensure_loaded("nope").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingConnection);
    }

    #[tokio::test]
    async fn test_unknown_driver_marks_failed() {
        let registry = ConnectionRegistry::new(SqlxConnector::new());
        let definition = ConnectionDefinition::new("oracle", EndpointDefinition::default());
        registry.register("legacy", definition).await.unwrap();

        let err = registry.ensure_loaded("legacy").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownDriver);
        assert_eq!(
            registry.state("legacy").await.unwrap(),
            ConnectionState::Failed
        );
    }

    #[tokio::test]
    async fn test_missing_driver_is_unknown_driver() {
        let registry = ConnectionRegistry::new(SqlxConnector::new());
        registry
            .register("bare", ConnectionDefinition::default())
            .await
            .unwrap();
        let err = registry.ensure_loaded("bare").await.unwrap_err();
        assert!(matches!(err, RouterError::UnknownDriver { driver: None, .. }));
    }

    #[tokio::test]
    async fn test_sqlite_loads_and_aliases_read_handle() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ConnectionRegistry::new(SqlxConnector::new());
        registry
            .register("local", sqlite_definition(&dir.path().join("local.db")))
            .await
            .unwrap();

        let handles = registry.ensure_loaded("local").await.unwrap();
        assert!(!handles.has_replica());
        assert_eq!(
            registry.state("local").await.unwrap(),
            ConnectionState::Loaded
        );

        let again = registry.ensure_loaded("local").await.unwrap();
        assert!(Arc::ptr_eq(&handles.primary, &again.primary));
    }

    #[tokio::test]
    async fn test_reset_only_affects_failed() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ConnectionRegistry::new(SqlxConnector::new());
        registry
            .register("local", sqlite_definition(&dir.path().join("local.db")))
            .await
            .unwrap();
        assert_eq!(
            registry.reset("local").await.unwrap(),
            ConnectionState::NotLoaded
        );

        registry.ensure_loaded("local").await.unwrap();
        assert_eq!(
            registry.reset("local").await.unwrap(),
            ConnectionState::Loaded
        );

        let err = registry.reset("ghost").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingConnection);
    }

    #[tokio::test]
    async fn test_summaries_sorted_without_secrets() {
        let registry = ConnectionRegistry::new(SqlxConnector::new());
        let definition = ConnectionDefinition::new(
            "mysql",
            EndpointDefinition {
                password: Some("hunter2".to_string()),
                ..Default::default()
            },
        );
        registry.register("b", definition.clone()).await.unwrap();
        registry.register("a", definition).await.unwrap();

        let summaries = registry.summaries().await;
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(summaries.iter().all(|s| s.state == ConnectionState::NotLoaded));

        let json = serde_json::to_string(&summaries).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
