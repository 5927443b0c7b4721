//! Scripted driver shared by the integration tests.
//!
//! `FakeConnector` counts connect attempts, can be told to refuse specific
//! hosts, and records every statement its handles run so tests can see which
//! endpoint a call was routed to.

#![allow(dead_code)]

use db_router::db::{Connector, DriverHandle, Dsn};
use db_router::error::DriverError;
use db_router::models::{ConnectionDefinition, EndpointDefinition, QueryParam, Row};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Statement text that the fake rejects at prepare time.
pub const BAD_SYNTAX: &str = "SELEC broken";

/// Marker that makes a prepared statement fail when executed.
pub const FAIL_ON_EXECUTE: &str = "/* fail */";

/// One statement run by a fake handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Host the handle was opened against.
    pub host: String,
    pub sql: String,
    /// `None` when the router bound nothing.
    pub params: Option<Vec<QueryParam>>,
}

#[derive(Default)]
struct FakeState {
    connects: AtomicUsize,
    refused_hosts: Mutex<HashSet<String>>,
    connected: Mutex<Vec<Dsn>>,
    calls: Mutex<Vec<Call>>,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<FakeState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every future connect to `host`.
    pub fn refuse(&self, host: &str) {
        self.state
            .refused_hosts
            .lock()
            .unwrap()
            .insert(host.to_string());
    }

    /// Accept connects to `host` again.
    pub fn accept(&self, host: &str) {
        self.state.refused_hosts.lock().unwrap().remove(host);
    }

    /// Number of connect attempts, successful or not.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// DSNs of successful connects, in order.
    pub fn connected(&self) -> Vec<Dsn> {
        self.state.connected.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Hosts that ran statements, in order.
    pub fn call_hosts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.host).collect()
    }
}

impl Connector for FakeConnector {
    type Handle = FakeHandle;

    async fn connect(
        &self,
        dsn: &Dsn,
        _username: &str,
        _password: &str,
    ) -> Result<FakeHandle, DriverError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.state.refused_hosts.lock().unwrap().contains(&dsn.host) {
            return Err(DriverError::new(format!(
                "Connection refused: {}",
                dsn.host
            )));
        }

        self.state.connected.lock().unwrap().push(dsn.clone());
        Ok(FakeHandle {
            host: dsn.host.clone(),
            state: Arc::clone(&self.state),
            next_id: 0,
            last_insert_id: 0,
            in_transaction: false,
        })
    }
}

pub struct FakeHandle {
    host: String,
    state: Arc<FakeState>,
    next_id: u64,
    last_insert_id: u64,
    in_transaction: bool,
}

impl FakeHandle {
    fn record(&self, sql: &str, params: Option<&[QueryParam]>) {
        self.state.calls.lock().unwrap().push(Call {
            host: self.host.clone(),
            sql: sql.to_string(),
            params: params.map(|p| p.to_vec()),
        });
    }
}

impl DriverHandle for FakeHandle {
    type Statement = String;

    async fn prepare(&mut self, sql: &str) -> Result<String, DriverError> {
        if sql.starts_with(BAD_SYNTAX) {
            return Err(DriverError::new("You have an error in your SQL syntax"));
        }
        Ok(sql.to_string())
    }

    async fn fetch_all(
        &mut self,
        statement: &String,
        params: Option<&[QueryParam]>,
    ) -> Result<Vec<Row>, DriverError> {
        self.record(statement, params);
        if statement.contains(FAIL_ON_EXECUTE) {
            return Err(DriverError::new("Deadlock found when trying to get lock"));
        }

        let mut row = Row::new();
        row.insert("host".to_string(), json!(self.host));
        row.insert("bound".to_string(), json!(params.map_or(0, |p| p.len())));
        Ok(vec![row])
    }

    async fn execute(
        &mut self,
        statement: &String,
        params: Option<&[QueryParam]>,
    ) -> Result<(), DriverError> {
        self.record(statement, params);
        if statement.contains(FAIL_ON_EXECUTE) {
            return Err(DriverError::new("Duplicate entry '1' for key 'PRIMARY'"));
        }
        // Like a MySQL OK packet: only an INSERT carries a generated id.
        self.last_insert_id = if statement.trim_start().to_ascii_uppercase().starts_with("INSERT") {
            self.next_id += 1;
            self.next_id
        } else {
            0
        };
        Ok(())
    }

    fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    async fn begin_transaction(&mut self) -> bool {
        self.record("BEGIN", None);
        if self.in_transaction {
            return false;
        }
        self.in_transaction = true;
        true
    }

    async fn commit(&mut self) -> bool {
        self.record("COMMIT", None);
        std::mem::replace(&mut self.in_transaction, false)
    }

    async fn rollback(&mut self) -> bool {
        self.record("ROLLBACK", None);
        std::mem::replace(&mut self.in_transaction, false)
    }
}

/// A complete MySQL endpoint on `host`.
pub fn endpoint(host: &str) -> EndpointDefinition {
    EndpointDefinition {
        hostname: Some(host.to_string()),
        username: Some("app".to_string()),
        password: Some("s3cret".to_string()),
        database: Some("shop".to_string()),
        port: None,
        utf8: false,
    }
}

/// A MySQL connection on `host` without a replica.
pub fn mysql(host: &str) -> ConnectionDefinition {
    ConnectionDefinition::new("mysql", endpoint(host))
}

/// A MySQL connection on `primary` with reads going to `replica`.
pub fn mysql_with_replica(primary: &str, replica: &str) -> ConnectionDefinition {
    mysql(primary).with_read_only(endpoint(replica))
}
