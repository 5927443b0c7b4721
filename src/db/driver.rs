//! Driver collaborator contract.
//!
//! The registry and router never talk to a database library directly. They
//! go through a [`Connector`], which opens endpoints, and the [`DriverHandle`]s
//! it returns. [`crate::db::SqlxConnector`] is the production implementation;
//! tests substitute scripted drivers.

use crate::db::dsn::Dsn;
use crate::error::DriverError;
use crate::models::{QueryParam, Row};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A driver handle shared between the registry (owner) and the router (borrower).
pub type SharedHandle<H> = Arc<Mutex<H>>;

/// Opens driver-level connections.
pub trait Connector: Send + Sync + 'static {
    type Handle: DriverHandle;

    /// Open a connection to `dsn`, running its initialization command (if any)
    /// before returning.
    fn connect(
        &self,
        dsn: &Dsn,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Self::Handle, DriverError>> + Send;
}

/// An open driver-level connection.
///
/// Every statement failure is reported as an `Err`; there is no silent mode.
pub trait DriverHandle: Send + 'static {
    type Statement: Send + Sync;

    /// Prepare `sql`. Rejection by the server (e.g. a syntax error) is an `Err`.
    fn prepare(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = Result<Self::Statement, DriverError>> + Send;

    /// Execute a prepared statement and collect every row.
    ///
    /// `params` is `None` when no parameters were supplied; nothing is bound then.
    /// The result cursor is released before this returns.
    fn fetch_all(
        &mut self,
        statement: &Self::Statement,
        params: Option<&[QueryParam]>,
    ) -> impl Future<Output = Result<Vec<Row>, DriverError>> + Send;

    /// Execute a prepared statement, discarding any rows.
    fn execute(
        &mut self,
        statement: &Self::Statement,
        params: Option<&[QueryParam]>,
    ) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Last auto-generated id on this connection's session.
    fn last_insert_id(&self) -> u64;

    fn begin_transaction(&mut self) -> impl Future<Output = bool> + Send;

    fn commit(&mut self) -> impl Future<Output = bool> + Send;

    fn rollback(&mut self) -> impl Future<Output = bool> + Send;
}

/// Wrap a freshly opened handle for sharing.
pub fn share<H: DriverHandle>(handle: H) -> SharedHandle<H> {
    Arc::new(Mutex::new(handle))
}
