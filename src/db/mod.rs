//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection registry with lazy, load-once connections
//! - Query routing between primary and read-only replica
//! - DSN construction
//! - Driver contract and its sqlx implementation
//! - Type mappings
//! - Driver dispatch macros for reducing code duplication

pub mod driver;
pub mod dsn;
#[macro_use]
pub mod macros;
pub mod registry;
pub mod router;
pub mod sqlx_driver;
pub mod types;

pub use driver::{Connector, DriverHandle, SharedHandle};
pub use dsn::Dsn;
pub use registry::{ConnectionRegistry, LoadedHandles};
pub use router::ConnectionRouter;
pub use sqlx_driver::{SqlxConnection, SqlxConnector, SqlxHandle, SqlxStatement};
