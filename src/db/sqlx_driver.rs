//! sqlx-backed driver adapter.
//!
//! Each endpoint is a single dedicated sqlx connection (no pooling). Statements
//! are prepared server-side so that a rejected statement is distinguishable from
//! a failed execution.

use crate::db::driver::{Connector, DriverHandle};
use crate::db::dsn::Dsn;
use crate::db::types::RowToJson;
use crate::error::DriverError;
use crate::models::{DriverKind, QueryParam, Row};
use futures_util::TryStreamExt;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlStatement};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteStatement};
use sqlx::{ConnectOptions, Executor, MySql, MySqlConnection, Sqlite, SqliteConnection, Statement};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Opens sqlx connections for `mysql` and `sqlite` endpoints.
#[derive(Debug, Clone, Default)]
pub struct SqlxConnector {
    connect_timeout: Option<Duration>,
}

impl SqlxConnector {
    /// Create a connector without a connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector that gives up on connect attempts after `connect_timeout`.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(connect_timeout),
        }
    }

    async fn open(dsn: &Dsn, username: &str, password: &str) -> Result<SqlxHandle, DriverError> {
        let conn = match dsn.driver {
            DriverKind::MySql => {
                let mut options = MySqlConnectOptions::new()
                    .host(&dsn.host)
                    .username(username)
                    .password(password)
                    .database(&dsn.database);
                if let Some(port) = dsn.port {
                    options = options.port(port);
                }
                if let Some(charset) = dsn.charset {
                    options = options.charset(charset);
                }

                let mut conn = options.connect().await?;
                // Must run before any other statement on this session
                if let Some(init_command) = dsn.init_command {
                    (&mut conn).execute(init_command).await?;
                    debug!(init_command, "Ran connection init command");
                }
                SqlxConnection::MySql(conn)
            }
            DriverKind::SQLite => {
                let conn = SqliteConnectOptions::new()
                    .filename(&dsn.database)
                    .create_if_missing(true)
                    .connect()
                    .await?;
                SqlxConnection::SQLite(conn)
            }
        };

        Ok(SqlxHandle {
            conn,
            last_insert_id: 0,
            in_transaction: false,
        })
    }
}

impl Connector for SqlxConnector {
    type Handle = SqlxHandle;

    async fn connect(
        &self,
        dsn: &Dsn,
        username: &str,
        password: &str,
    ) -> Result<SqlxHandle, DriverError> {
        debug!(dsn = %dsn, "Opening connection");
        match self.connect_timeout {
            Some(limit) => timeout(limit, Self::open(dsn, username, password))
                .await
                .map_err(|_| {
                    DriverError::new(format!("Connect timed out after {}s", limit.as_secs()))
                })?,
            None => Self::open(dsn, username, password).await,
        }
    }
}

/// Driver-specific sqlx connection.
#[derive(Debug)]
pub enum SqlxConnection {
    MySql(MySqlConnection),
    SQLite(SqliteConnection),
}

/// Driver-specific prepared statement.
#[derive(Debug, Clone)]
pub enum SqlxStatement {
    MySql(MySqlStatement<'static>),
    SQLite(SqliteStatement<'static>),
}

/// An open sqlx connection plus the session state the router reads back.
#[derive(Debug)]
pub struct SqlxHandle {
    conn: SqlxConnection,
    last_insert_id: u64,
    in_transaction: bool,
}

impl SqlxHandle {
    /// Get the driver for this handle.
    pub fn driver(&self) -> DriverKind {
        match self.conn {
            SqlxConnection::MySql(_) => DriverKind::MySql,
            SqlxConnection::SQLite(_) => DriverKind::SQLite,
        }
    }

    /// Whether a transaction started through this handle is still open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn run_raw(&mut self, sql: &'static str) -> Result<(), DriverError> {
        dispatch_connection!(&mut self.conn, {
            MySql(c) => c.execute(sql).await.map(|_| ()),
            SQLite(c) => c.execute(sql).await.map(|_| ()),
        })
        .map_err(DriverError::from)
    }

    /// Run a transaction control statement, reporting failure as `false`.
    async fn transaction_control(&mut self, sql: &'static str) -> bool {
        match self.run_raw(sql).await {
            Ok(()) => true,
            Err(e) => {
                warn!(statement = sql, error = %e, "Transaction control failed");
                false
            }
        }
    }
}

fn statement_mismatch() -> DriverError {
    DriverError::new("Statement was prepared on a different driver")
}

impl DriverHandle for SqlxHandle {
    type Statement = SqlxStatement;

    async fn prepare(&mut self, sql: &str) -> Result<SqlxStatement, DriverError> {
        let statement = dispatch_connection!(&mut self.conn, {
            MySql(c) => SqlxStatement::MySql(Statement::to_owned(&c.prepare(sql).await?)),
            SQLite(c) => SqlxStatement::SQLite(Statement::to_owned(&c.prepare(sql).await?)),
        });
        Ok(statement)
    }

    async fn fetch_all(
        &mut self,
        statement: &SqlxStatement,
        params: Option<&[QueryParam]>,
    ) -> Result<Vec<Row>, DriverError> {
        match (&mut self.conn, statement) {
            (SqlxConnection::MySql(c), SqlxStatement::MySql(s)) => {
                let rows: Vec<_> = bind_mysql(s.query(), params)
                    .fetch(&mut *c)
                    .try_collect()
                    .await?;
                Ok(rows.iter().map(RowToJson::to_json_map).collect())
            }
            (SqlxConnection::SQLite(c), SqlxStatement::SQLite(s)) => {
                let rows: Vec<_> = bind_sqlite(s.query(), params)
                    .fetch(&mut *c)
                    .try_collect()
                    .await?;
                Ok(rows.iter().map(RowToJson::to_json_map).collect())
            }
            _ => Err(statement_mismatch()),
        }
    }

    async fn execute(
        &mut self,
        statement: &SqlxStatement,
        params: Option<&[QueryParam]>,
    ) -> Result<(), DriverError> {
        self.last_insert_id = match (&mut self.conn, statement) {
            (SqlxConnection::MySql(c), SqlxStatement::MySql(s)) => {
                bind_mysql(s.query(), params)
                    .execute(&mut *c)
                    .await?
                    .last_insert_id()
            }
            (SqlxConnection::SQLite(c), SqlxStatement::SQLite(s)) => {
                let rowid = bind_sqlite(s.query(), params)
                    .execute(&mut *c)
                    .await?
                    .last_insert_rowid();
                u64::try_from(rowid).unwrap_or(0)
            }
            _ => return Err(statement_mismatch()),
        };
        Ok(())
    }

    fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    async fn begin_transaction(&mut self) -> bool {
        if self.in_transaction {
            warn!("Transaction already in progress");
            return false;
        }
        let ok = self.transaction_control("BEGIN").await;
        self.in_transaction = ok;
        ok
    }

    async fn commit(&mut self) -> bool {
        if !self.in_transaction {
            warn!("Commit without an active transaction");
            return false;
        }
        let ok = self.transaction_control("COMMIT").await;
        if ok {
            self.in_transaction = false;
        }
        ok
    }

    async fn rollback(&mut self) -> bool {
        if !self.in_transaction {
            warn!("Rollback without an active transaction");
            return false;
        }
        let ok = self.transaction_control("ROLLBACK").await;
        if ok {
            self.in_transaction = false;
        }
        ok
    }
}

// =============================================================================
// Parameter Binding
// =============================================================================

/// Bind positional parameters to a MySQL query. `None` binds nothing.
fn bind_mysql<'q>(
    mut query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    params: Option<&'q [QueryParam]>,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    for param in params.unwrap_or_default() {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
        };
    }
    query
}

/// Bind positional parameters to a SQLite query. `None` binds nothing.
fn bind_sqlite<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    params: Option<&'q [QueryParam]>,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params.unwrap_or_default() {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credentials;

    fn sqlite_dsn(path: &std::path::Path) -> Dsn {
        Dsn::new(
            DriverKind::SQLite,
            &Credentials {
                hostname: String::new(),
                username: String::new(),
                password: String::new(),
                database: path.to_string_lossy().into_owned(),
                port: None,
                utf8: false,
            },
        )
    }

    #[tokio::test]
    async fn test_sqlite_prepare_execute_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = sqlite_dsn(&dir.path().join("driver.db"));
        let mut handle = SqlxConnector::new().connect(&dsn, "", "").await.unwrap();
        assert_eq!(handle.driver(), DriverKind::SQLite);

        let create = handle
            .prepare("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();
        handle.execute(&create, None).await.unwrap();

        let insert = handle
            .prepare("INSERT INTO t (name) VALUES (?)")
            .await
            .unwrap();
        let params = [QueryParam::from("alpha")];
        handle.execute(&insert, Some(&params)).await.unwrap();
        assert_eq!(handle.last_insert_id(), 1);

        // SQLite keeps the connection's last rowid across an UPDATE.
        let update = handle.prepare("UPDATE t SET name = 'beta'").await.unwrap();
        handle.execute(&update, None).await.unwrap();
        assert_eq!(handle.last_insert_id(), 1);

        let select = handle.prepare("SELECT id, name FROM t").await.unwrap();
        let rows = handle.fetch_all(&select, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["name"], "beta");
    }

    #[tokio::test]
    async fn test_sqlite_prepare_rejects_bad_sql() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = sqlite_dsn(&dir.path().join("driver.db"));
        let mut handle = SqlxConnector::new().connect(&dsn, "", "").await.unwrap();

        assert!(handle.prepare("SELEKT nonsense").await.is_err());
    }

    #[tokio::test]
    async fn test_transaction_flags() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = sqlite_dsn(&dir.path().join("driver.db"));
        let mut handle = SqlxConnector::new().connect(&dsn, "", "").await.unwrap();

        assert!(!handle.commit().await);
        assert!(handle.begin_transaction().await);
        assert!(handle.in_transaction());
        assert!(!handle.begin_transaction().await);
        assert!(handle.rollback().await);
        assert!(!handle.in_transaction());
    }

    #[tokio::test]
    async fn test_connect_failure_is_driver_error() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so the file cannot be created
        let dsn = sqlite_dsn(&dir.path().join("missing").join("driver.db"));
        let result = SqlxConnector::new().connect(&dsn, "", "").await;
        assert!(result.is_err());
    }
}
