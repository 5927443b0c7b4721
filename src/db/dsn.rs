//! Data source name construction.
//!
//! A `Dsn` is the driver-specific address of one endpoint. It renders as
//! `driver:host=<hostname>;dbname=<database>` for server drivers and carries the
//! connect-time options (charset directive, initialization command) separately
//! so adapters can apply them to their native connect options.

use crate::models::{Credentials, DriverKind};

/// Charset directive added to the DSN when UTF-8 is requested.
pub const UTF8_CHARSET: &str = "utf8";

/// Statement issued right after connect, before any other statement, when UTF-8 is requested.
pub const UTF8_INIT_COMMAND: &str = "SET NAMES 'utf8'";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    pub driver: DriverKind,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub charset: Option<&'static str>,
    pub init_command: Option<&'static str>,
}

impl Dsn {
    /// Build the DSN for an endpoint.
    pub fn new(driver: DriverKind, credentials: &Credentials) -> Self {
        let utf8 = credentials.utf8 && driver == DriverKind::MySql;
        Self {
            driver,
            host: credentials.hostname.clone(),
            port: credentials.port,
            database: credentials.database.clone(),
            charset: utf8.then_some(UTF8_CHARSET),
            init_command: utf8.then_some(UTF8_INIT_COMMAND),
        }
    }
}

impl std::fmt::Display for Dsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.driver {
            DriverKind::MySql => {
                write!(f, "{}:host={};dbname={}", self.driver.tag(), self.host, self.database)?;
                if let Some(port) = self.port {
                    write!(f, ";port={}", port)?;
                }
                if let Some(charset) = self.charset {
                    write!(f, ";charset={}", charset)?;
                }
                Ok(())
            }
            DriverKind::SQLite => write!(f, "{}:{}", self.driver.tag(), self.database),
        }
    }
}
