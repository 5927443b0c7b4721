//! DB Router Library
//!
//! This library keeps a registry of named database connections, opens them
//! lazily on first activation, and routes reads to an optional read-only
//! replica while writes and transactions go to the primary (MySQL, SQLite).

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, RegistryConfig};
pub use db::{ConnectionRegistry, ConnectionRouter, SqlxConnector};
pub use error::{ErrorCode, RouterError, RouterResult};
