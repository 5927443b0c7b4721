//! Query router.
//!
//! A [`ConnectionRouter`] tracks which registered connection is active and
//! routes statements against it: reads go to the read-only handle, writes and
//! transaction control go to the primary. The registry keeps ownership of the
//! handles; the router only holds shared references to them.

use crate::db::driver::{Connector, DriverHandle};
use crate::db::registry::{ConnectionRegistry, LoadedHandles};
use crate::db::sqlx_driver::SqlxConnector;
use crate::error::{RouterError, RouterResult};
use crate::models::{QueryParam, Row};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct ActiveConnection<H> {
    name: String,
    handles: LoadedHandles<H>,
}

/// Routes statements to the handles of the active connection.
pub struct ConnectionRouter<C: Connector = SqlxConnector> {
    registry: Arc<ConnectionRegistry<C>>,
    active: Option<ActiveConnection<C::Handle>>,
}

impl<C: Connector> std::fmt::Debug for ConnectionRouter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRouter")
            .field("active", &self.active_name())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ConnectionRouter<C> {
    /// Create a router with no active connection.
    pub fn new(registry: Arc<ConnectionRegistry<C>>) -> Self {
        Self {
            registry,
            active: None,
        }
    }

    /// Create a router and try to activate `autoload`.
    ///
    /// A failed autoload is logged and leaves the router without an active
    /// connection; the error resurfaces when that connection is activated again.
    pub async fn with_autoload(registry: Arc<ConnectionRegistry<C>>, autoload: Option<&str>) -> Self {
        let mut router = Self::new(registry);
        if let Some(name) = autoload {
            match router.activate(name).await {
                Ok(()) => info!(connection = %name, "Autoloaded connection"),
                Err(e) => warn!(
                    connection = %name,
                    code = %e.code(),
                    error = %e,
                    "Autoload failed"
                ),
            }
        }
        router
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry<C>> {
        &self.registry
    }

    /// Name of the active connection, if any.
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }

    /// Make `name` the active connection, loading it on first use.
    ///
    /// On error the previous selection is kept.
    pub async fn activate(&mut self, name: &str) -> RouterResult<()> {
        let handles = self.registry.ensure_loaded(name).await?;
        debug!(
            connection = %name,
            previous = ?self.active_name(),
            "Activated connection"
        );
        self.active = Some(ActiveConnection {
            name: name.to_string(),
            handles,
        });
        Ok(())
    }

    /// Begin a transaction on the active primary.
    ///
    /// `Ok(false)` means the driver refused, e.g. a transaction is already open.
    pub async fn begin_transaction(&self) -> RouterResult<bool> {
        let active = self.active()?;
        let mut primary = active.handles.primary.lock().await;
        Ok(primary.begin_transaction().await)
    }

    /// Commit the open transaction on the active primary.
    pub async fn commit(&self) -> RouterResult<bool> {
        let active = self.active()?;
        let mut primary = active.handles.primary.lock().await;
        Ok(primary.commit().await)
    }

    /// Roll back the open transaction on the active primary.
    pub async fn rollback(&self) -> RouterResult<bool> {
        let active = self.active()?;
        let mut primary = active.handles.primary.lock().await;
        Ok(primary.rollback().await)
    }

    /// Run a read against the active read-only handle and return every row.
    ///
    /// An empty `params` slice binds nothing.
    pub async fn select(&self, query: &str, params: &[QueryParam]) -> RouterResult<Vec<Row>> {
        let active = self.active()?;
        debug!(
            connection = %active.name,
            sql = %query,
            params = params.len(),
            replica = active.handles.has_replica(),
            "Routing select"
        );

        let mut handle = active.handles.read_only.lock().await;
        let statement = handle
            .prepare(query)
            .await
            .map_err(|e| RouterError::prepare_failed(e.message))?;
        let rows = handle
            .fetch_all(&statement, bound(params))
            .await
            .map_err(|e| RouterError::execute_failed(e.message))?;

        debug!(connection = %active.name, rows = rows.len(), "Select completed");
        Ok(rows)
    }

    /// Run a write against the active primary.
    ///
    /// Returns the primary's last insert id after the statement completes.
    pub async fn execute(&self, query: &str, params: &[QueryParam]) -> RouterResult<u64> {
        let active = self.active()?;
        debug!(
            connection = %active.name,
            sql = %query,
            params = params.len(),
            "Routing execute"
        );

        let mut handle = active.handles.primary.lock().await;
        let statement = handle
            .prepare(query)
            .await
            .map_err(|e| RouterError::prepare_failed(e.message))?;
        handle
            .execute(&statement, bound(params))
            .await
            .map_err(|e| RouterError::execute_failed(e.message))?;

        Ok(handle.last_insert_id())
    }

    fn active(&self) -> RouterResult<&ActiveConnection<C::Handle>> {
        self.active.as_ref().ok_or(RouterError::NoActiveConnection)
    }
}

fn bound(params: &[QueryParam]) -> Option<&[QueryParam]> {
    (!params.is_empty()).then_some(params)
}
