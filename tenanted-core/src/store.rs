//! Tenant Storage
//!
//! The persistent-store contract used by tenant providers, and an in-memory
//! implementation of it.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A single row, keyed by column name
pub type Row = Map<String, Value>;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Row in '{table}' has no usable '{column}' column")]
    MalformedRow { table: String, column: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Storage error: {0}")]
    Backend(String),
}

/// Tenant store trait (implement with your database)
///
/// Only an equality-filtered single row lookup is required.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Find the first row in `table` where `column` equals `value`
    async fn first_where(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, StoreError>;
}

/// In-memory tenant store
///
/// Rows are kept per table in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl InMemoryTenantStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row, builder style
    ///
    /// Non-object values are ignored.
    pub fn with_row(self, table: impl Into<String>, row: Value) -> Self {
        self.insert(table, row);
        self
    }

    /// Add a row
    pub fn insert(&self, table: impl Into<String>, row: Value) {
        if let Value::Object(row) = row {
            self.tables.write().entry(table.into()).or_default().push(row);
        }
    }

    /// Number of rows in a table
    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn first_where(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, StoreError> {
        let tables = self.tables.read();

        Ok(tables.get(table).and_then(|rows| {
            rows.iter()
                .find(|row| row.get(column) == Some(value))
                .cloned()
        }))
    }
}

/// Named store connections available to tenant providers
#[derive(Clone, Default)]
pub struct StoreConnections {
    default: Option<Arc<dyn TenantStore>>,
    named: HashMap<String, Arc<dyn TenantStore>>,
}

impl StoreConnections {
    /// Create an empty set of connections
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store used when a provider doesn't name a connection
    pub fn with_default(mut self, store: Arc<dyn TenantStore>) -> Self {
        self.default = Some(store);
        self
    }

    /// Add a named connection
    pub fn with_connection(mut self, name: impl Into<String>, store: Arc<dyn TenantStore>) -> Self {
        self.named.insert(name.into(), store);
        self
    }

    /// Look up a connection by name, or the default connection
    pub fn get(&self, name: Option<&str>) -> Option<Arc<dyn TenantStore>> {
        match name {
            Some(name) => self.named.get(name).cloned(),
            None => self.default.clone(),
        }
    }
}

impl std::fmt::Debug for StoreConnections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnections")
            .field("default", &self.default.is_some())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .finish()
    }
}
