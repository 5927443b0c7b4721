//! Data models for db-router.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConnectionDefinition, ConnectionState, ConnectionSummary, Credentials, DriverKind,
    EndpointDefinition,
};
pub use query::{QueryParam, Row};
