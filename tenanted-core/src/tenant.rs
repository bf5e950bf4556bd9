//! Tenant Contract
//!
//! The tenant value produced by tenant providers and held by a tenancy.

use crate::store::{Row, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Internal tenant key
///
/// Usually the primary key of the tenant row, either numeric or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TenantKey {
    Int(i64),
    Str(String),
}

impl TenantKey {
    /// Read a key out of a JSON value, if it has a usable shape
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().map(Self::Int),
            Value::String(string) => Some(Self::Str(string.clone())),
            _ => None,
        }
    }

    /// Convert the key into a JSON value for store lookups
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(int) => Value::from(*int),
            Self::Str(string) => Value::String(string.clone()),
        }
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(int) => write!(f, "{}", int),
            Self::Str(string) => write!(f, "{}", string),
        }
    }
}

impl From<i64> for TenantKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for TenantKey {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for TenantKey {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for TenantKey {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Tenant contract
///
/// Implemented by anything a tenant provider can hand out. Tenants are
/// immutable once loaded.
pub trait Tenant: Send + Sync + fmt::Debug + 'static {
    /// Public, globally unique identifier (e.g. `acme`)
    fn identifier(&self) -> &str;

    /// Name of the field holding the identifier
    fn identifier_name(&self) -> &str;

    /// Internal unique key
    fn key(&self) -> TenantKey;

    /// Name of the field holding the key
    fn key_name(&self) -> &str;

    /// Read any other attribute of the tenant
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a loaded tenant
pub type SharedTenant = Arc<dyn Tenant>;

/// Check whether two optional tenants are the same tenant
///
/// Tenants are the same when they are the same allocation or share a key.
pub fn same_tenant(a: Option<&SharedTenant>, b: Option<&SharedTenant>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)) || a.key() == b.key(),
        _ => false,
    }
}

/// Generic tenant
///
/// Wraps a raw row, with the key and identifier read from configurable
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericTenant {
    attributes: Row,
    key_name: String,
    identifier_name: String,
    #[serde(skip)]
    key: TenantKey,
    #[serde(skip)]
    identifier: String,
}

impl GenericTenant {
    /// Create a tenant with `id` and `identifier` columns
    ///
    /// # Examples
    ///
    /// ```
    /// use tenanted_core::{GenericTenant, Tenant, TenantKey};
    ///
    /// let tenant = GenericTenant::new(7, "acme");
    /// assert_eq!(tenant.identifier(), "acme");
    /// assert_eq!(tenant.key(), TenantKey::Int(7));
    /// ```
    pub fn new(key: impl Into<TenantKey>, identifier: impl Into<String>) -> Self {
        let key = key.into();
        let identifier = identifier.into();
        let mut attributes = Row::new();
        attributes.insert("id".to_string(), key.to_value());
        attributes.insert("identifier".to_string(), Value::String(identifier.clone()));

        Self {
            attributes,
            key_name: "id".to_string(),
            identifier_name: "identifier".to_string(),
            key,
            identifier,
        }
    }

    /// Wrap a row retrieved from `table`
    pub fn from_row(
        table: &str,
        attributes: Row,
        key_name: impl Into<String>,
        identifier_name: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let key_name = key_name.into();
        let identifier_name = identifier_name.into();

        let key = attributes
            .get(&key_name)
            .and_then(TenantKey::from_value)
            .ok_or_else(|| StoreError::MalformedRow {
                table: table.to_string(),
                column: key_name.clone(),
            })?;

        let identifier = attributes
            .get(&identifier_name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::MalformedRow {
                table: table.to_string(),
                column: identifier_name.clone(),
            })?;

        Ok(Self {
            attributes,
            key_name,
            identifier_name,
            key,
            identifier,
        })
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Raw attributes
    pub fn attributes(&self) -> &Row {
        &self.attributes
    }
}

impl Tenant for GenericTenant {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn identifier_name(&self) -> &str {
        &self.identifier_name
    }

    fn key(&self) -> TenantKey {
        self.key.clone()
    }

    fn key_name(&self) -> &str {
        &self.key_name
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
