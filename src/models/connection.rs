//! Connection-related data models.
//!
//! This module defines the declarative definition of a named connection as it
//! appears in configuration, the validated credentials derived from it, and the
//! lifecycle state reported by the registry.

use serde::{Deserialize, Serialize};

/// Supported driver variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    MySql,
    SQLite,
}

impl DriverKind {
    /// Parse a driver tag from configuration. Tags are matched exactly;
    /// anything else yields `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        [Self::MySql, Self::SQLite]
            .into_iter()
            .find(|kind| kind.tag() == tag)
    }

    /// The tag used as the DSN prefix and in configuration.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// Get the display name for this driver.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Whether this driver needs a server endpoint and login.
    pub fn requires_server(&self) -> bool {
        matches!(self, Self::MySql)
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Endpoint fields of a connection or of its read-only replica, as configured.
///
/// Every field is optional here; presence is checked when the connection is
/// loaded so that a missing field surfaces as `MissingCredentials` at that point.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub utf8: bool,
}

impl std::fmt::Debug for EndpointDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointDefinition")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("database", &self.database)
            .field("port", &self.port)
            .field("utf8", &self.utf8)
            .finish()
    }
}

impl EndpointDefinition {
    /// Validate the endpoint for `driver`, returning the first missing field on failure.
    pub fn credentials(&self, driver: DriverKind) -> Result<Credentials, &'static str> {
        fn required(value: &Option<String>, field: &'static str) -> Result<String, &'static str> {
            value.clone().ok_or(field)
        }

        if driver.requires_server() {
            Ok(Credentials {
                hostname: required(&self.hostname, "hostname")?,
                username: required(&self.username, "username")?,
                password: required(&self.password, "password")?,
                database: required(&self.database, "database")?,
                port: self.port,
                utf8: self.utf8,
            })
        } else {
            Ok(Credentials {
                hostname: self.hostname.clone().unwrap_or_default(),
                username: self.username.clone().unwrap_or_default(),
                password: self.password.clone().unwrap_or_default(),
                database: required(&self.database, "database")?,
                port: self.port,
                utf8: self.utf8,
            })
        }
    }
}

/// Declarative definition of a named connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDefinition {
    /// Driver tag; validated when the connection is loaded.
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(flatten)]
    pub primary: EndpointDefinition,
    /// Optional replica used for reads.
    #[serde(default)]
    pub read_only: Option<EndpointDefinition>,
}

impl ConnectionDefinition {
    /// Create a definition for `driver` with the given primary endpoint.
    pub fn new(driver: impl Into<String>, primary: EndpointDefinition) -> Self {
        Self {
            driver: Some(driver.into()),
            primary,
            read_only: None,
        }
    }

    /// Attach a read-only replica endpoint.
    pub fn with_read_only(mut self, read_only: EndpointDefinition) -> Self {
        self.read_only = Some(read_only);
        self
    }

    /// Resolve the configured driver tag.
    pub fn driver_kind(&self) -> Option<DriverKind> {
        self.driver.as_deref().and_then(DriverKind::from_tag)
    }
}

/// Validated endpoint credentials, ready for DSN construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub port: Option<u16>,
    pub utf8: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"****")
            .field("database", &self.database)
            .field("port", &self.port)
            .field("utf8", &self.utf8)
            .finish()
    }
}

/// Lifecycle state of a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    NotLoaded,
    Loaded,
    Failed,
}

impl ConnectionState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "not_loaded"),
            Self::Loaded => write!(f, "loaded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Connection information for listing (no secrets exposed).
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub name: String,
    pub driver: Option<String>,
    pub has_read_only: bool,
    pub state: ConnectionState,
}
