//! Error types for db-router.
//!
//! Every failure surfaced by the registry and router is a `RouterError` value.
//! Each variant maps onto a stable [`ErrorCode`] so callers can branch on the
//! discriminant without matching on message text.

use thiserror::Error;

/// Stable error discriminants with fixed numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AlreadyExists,
    UnknownDriver,
    MissingCredentials,
    ConnectionFailed,
    MissingConnection,
    PrepareFailed,
    ExecuteFailed,
    NoActiveConnection,
}

impl ErrorCode {
    /// Numeric code for this discriminant.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::AlreadyExists => -1,
            Self::UnknownDriver => -2,
            Self::MissingCredentials => -3,
            Self::ConnectionFailed => -4,
            Self::MissingConnection => -5,
            Self::PrepareFailed => -6,
            Self::ExecuteFailed => -7,
            Self::NoActiveConnection => -8,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.as_i32())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Connection '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("Unknown driver for connection '{name}': {}", driver_label(.driver))]
    UnknownDriver {
        name: String,
        driver: Option<String>,
    },

    #[error("Missing credential '{field}' for connection '{name}'{}", replica_suffix(.read_only))]
    MissingCredentials {
        name: String,
        field: &'static str,
        read_only: bool,
    },

    #[error("Connection failed for '{name}'{}: {message}", replica_suffix(.read_only))]
    ConnectionFailed {
        name: String,
        /// Driver message only; driver error types are not carried.
        message: String,
        read_only: bool,
    },

    #[error("Connection not found: {name}")]
    MissingConnection { name: String },

    #[error("Failed to prepare statement: {message}")]
    PrepareFailed { message: String },

    #[error("Failed to execute statement: {message}")]
    ExecuteFailed { message: String },

    #[error("No active connection")]
    NoActiveConnection,
}

impl RouterError {
    /// Create an already-exists error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    /// Create an unknown driver error.
    pub fn unknown_driver(name: impl Into<String>, driver: Option<&str>) -> Self {
        Self::UnknownDriver {
            name: name.into(),
            driver: driver.map(String::from),
        }
    }

    /// Create a missing credentials error.
    pub fn missing_credentials(
        name: impl Into<String>,
        field: &'static str,
        read_only: bool,
    ) -> Self {
        Self::MissingCredentials {
            name: name.into(),
            field,
            read_only,
        }
    }

    /// Create a connection failure error.
    pub fn connection_failed(
        name: impl Into<String>,
        message: impl Into<String>,
        read_only: bool,
    ) -> Self {
        Self::ConnectionFailed {
            name: name.into(),
            message: message.into(),
            read_only,
        }
    }

    /// Create a missing connection error.
    pub fn missing_connection(name: impl Into<String>) -> Self {
        Self::MissingConnection { name: name.into() }
    }

    /// Create a prepare failure error.
    pub fn prepare_failed(message: impl Into<String>) -> Self {
        Self::PrepareFailed {
            message: message.into(),
        }
    }

    /// Create an execute failure error.
    pub fn execute_failed(message: impl Into<String>) -> Self {
        Self::ExecuteFailed {
            message: message.into(),
        }
    }

    /// The stable discriminant for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::UnknownDriver { .. } => ErrorCode::UnknownDriver,
            Self::MissingCredentials { .. } => ErrorCode::MissingCredentials,
            Self::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            Self::MissingConnection { .. } => ErrorCode::MissingConnection,
            Self::PrepareFailed { .. } => ErrorCode::PrepareFailed,
            Self::ExecuteFailed { .. } => ErrorCode::ExecuteFailed,
            Self::NoActiveConnection => ErrorCode::NoActiveConnection,
        }
    }

    /// Get a recovery hint for this error.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => "Use a different connection name",
            Self::UnknownDriver { .. } => "Set 'driver' to \"mysql\" or \"sqlite\"",
            Self::MissingCredentials { .. } => {
                "Provide hostname, username, password and database for the connection"
            }
            Self::ConnectionFailed { .. } => {
                "Check that the server is reachable and the credentials are valid, then reset the connection"
            }
            Self::MissingConnection { .. } => "Check the connection name in the configuration",
            Self::PrepareFailed { .. } => "Check the SQL syntax and referenced objects",
            Self::ExecuteFailed { .. } => {
                "Check the bound parameters and the constraints of referenced tables"
            }
            Self::NoActiveConnection => "Activate a connection before running statements",
        }
    }
}

fn driver_label(driver: &Option<String>) -> &str {
    driver.as_deref().unwrap_or("<none>")
}

fn replica_suffix(read_only: &bool) -> &'static str {
    if *read_only { " (read-only replica)" } else { "" }
}

/// Result type alias for registry and router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Failure reported by a driver adapter.
///
/// Adapters convert their native error types into this message-only form so
/// nothing driver-specific crosses into `RouterError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) => DriverError::new(format!("{} (SQLSTATE: {})", db_err.message(), code)),
                None => DriverError::new(db_err.message()),
            },
            sqlx::Error::Io(io_err) => DriverError::new(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DriverError::new(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DriverError::new(format!("Protocol error: {}", msg)),
            other => DriverError::new(other.to_string()),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration must be a JSON object")]
    NotAnObject,

    #[error("Invalid definition for connection '{name}': {source}")]
    Definition {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}
