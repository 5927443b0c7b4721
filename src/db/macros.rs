//! Driver dispatch macros for reducing code duplication.
//!
//! `SqlxConnection` holds one concrete sqlx connection type per driver. Most
//! operations read the same for each driver, so the match arms are generated
//! here while each arm still gets its own concrete type.

/// Macro for generating driver dispatch match arms over `SqlxConnection`.
///
/// # Example
///
/// ```ignore
/// dispatch_connection!(&mut handle.conn, {
///     MySql(c) => c.execute("BEGIN").await.map(|_| ()),
///     SQLite(c) => c.execute("BEGIN").await.map(|_| ()),
/// });
/// ```
#[macro_export]
macro_rules! dispatch_connection {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::sqlx_driver::SqlxConnection::$variant($c) => $body,
            )+
        }
    };
}

pub use dispatch_connection;
