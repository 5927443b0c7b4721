//! Configuration handling for the DB router.
//!
//! Process options come from CLI arguments and environment variables. The
//! connection mapping (named definitions plus the `autoload` key) is read from
//! a JSON file.

use crate::error::ConfigError;
use crate::models::{ConnectionDefinition, QueryParam};
use clap::{ArgGroup, Parser};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Key of the configuration mapping that names the connection to auto-activate.
pub const AUTOLOAD_KEY: &str = "autoload";

/// Connection mapping loaded from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Connection to activate when the router is created.
    pub autoload: Option<String>,
    /// Named definitions, in file order.
    pub connections: Vec<(String, ConnectionDefinition)>,
}

impl RegistryConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let value: JsonValue = serde_json::from_str(s)?;
        Self::from_value(value)
    }

    /// Build from a parsed JSON document.
    ///
    /// Entries that are not objects are skipped. A non-string or empty
    /// `autoload` is ignored and never becomes a connection.
    pub fn from_value(value: JsonValue) -> Result<Self, ConfigError> {
        let JsonValue::Object(map) = value else {
            return Err(ConfigError::NotAnObject);
        };

        let mut config = Self::default();
        for (key, value) in map {
            if key == AUTOLOAD_KEY {
                match value {
                    JsonValue::String(name) if !name.is_empty() => config.autoload = Some(name),
                    JsonValue::String(_) => {}
                    other => warn!(value = %other, "Ignoring non-string autoload"),
                }
                continue;
            }

            if !value.is_object() {
                warn!(connection = %key, "Skipping non-object connection entry");
                continue;
            }

            let definition: ConnectionDefinition = serde_json::from_value(value)
                .map_err(|source| ConfigError::Definition {
                    name: key.clone(),
                    source,
                })?;
            debug!(connection = %key, driver = ?definition.driver, "Parsed connection definition");
            config.connections.push((key, definition));
        }

        Ok(config)
    }

    /// Get a definition by name.
    pub fn get(&self, name: &str) -> Option<&ConnectionDefinition> {
        self.connections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }
}

/// Statement requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliStatement {
    Select(String),
    Execute(String),
}

/// Configuration for the DB router CLI.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-router",
    about = "Run a statement through a named connection, routing reads to the read-only replica",
    version,
    author
)]
#[command(group(ArgGroup::new("statement").required(true).args(["select", "execute"])))]
pub struct Config {
    /// Path to the JSON connection mapping
    #[arg(short, long, value_name = "PATH", env = "DB_ROUTER_CONFIG")]
    pub config: PathBuf,

    /// Connection to activate (overrides the configured autoload)
    #[arg(short = 'n', long, value_name = "NAME", env = "DB_ROUTER_CONNECTION")]
    pub connection: Option<String>,

    /// Read statement, routed to the read-only handle
    #[arg(long, value_name = "SQL")]
    pub select: Option<String>,

    /// Write statement, routed to the primary
    #[arg(long, value_name = "SQL")]
    pub execute: Option<String>,

    /// Positional parameter as a JSON value. Can be specified multiple times.
    /// Values that are not valid JSON are bound as strings.
    #[arg(short, long = "param", value_name = "JSON", allow_hyphen_values = true)]
    pub params: Vec<String>,

    /// Connection timeout in seconds (0 disables the timeout)
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "DB_ROUTER_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DB_ROUTER_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_ROUTER_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// The statement to run. Clap guarantees exactly one is present.
    pub fn statement(&self) -> Option<CliStatement> {
        match (&self.select, &self.execute) {
            (Some(sql), _) => Some(CliStatement::Select(sql.clone())),
            (None, Some(sql)) => Some(CliStatement::Execute(sql.clone())),
            (None, None) => None,
        }
    }

    /// Parse `--param` values into bind parameters.
    pub fn query_params(&self) -> Vec<QueryParam> {
        self.params
            .iter()
            .map(|raw| match serde_json::from_str::<JsonValue>(raw) {
                Ok(value) => QueryParam::from_json(value),
                Err(_) => QueryParam::String(raw.clone()),
            })
            .collect()
    }

    /// Get the connection timeout, `None` when disabled.
    pub fn connect_timeout_duration(&self) -> Option<Duration> {
        (self.connect_timeout > 0).then(|| Duration::from_secs(self.connect_timeout))
    }

    /// Load the connection mapping named by `--config`.
    pub fn load_registry_config(&self) -> Result<RegistryConfig, ConfigError> {
        RegistryConfig::load(&self.config)
    }
}
