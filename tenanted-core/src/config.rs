// Configuration for tenant providers, tenancies and identity resolvers

use crate::error::{Result, TenantedError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Configuration block for a single named provider, tenancy or resolver
///
/// Everything other than `driver` is kept as an opaque option map, the
/// factory that builds the instance decides what it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl DriverConfig {
    /// Create a config block for a driver
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: Some(driver.into()),
            options: Map::new(),
        }
    }

    /// Set an option, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// The configured driver
    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    /// Raw option value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// String option, `None` if absent or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Integer option, `None` if absent or not an integer
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Boolean option, `None` if absent or not a boolean
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Object option, `None` if absent or not an object
    pub fn get_map(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }

    /// All options
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }
}

/// Default names used when a caller doesn't ask for a specific one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub tenancy: Option<String>,

    #[serde(default)]
    pub resolver: Option<String>,
}

/// Complete tenanted configuration
///
/// # Examples
///
/// ```
/// use tenanted_core::TenantedConfig;
///
/// let config = TenantedConfig::from_toml_str(r#"
///     [defaults]
///     provider = "tenants"
///     tenancy = "primary"
///     resolver = "header"
///
///     [providers.tenants]
///     driver = "database"
///     table = "tenants"
///
///     [tenancies.primary]
///     driver = "default"
///     provider = "tenants"
///
///     [resolvers.header]
///     driver = "header"
///     header = "Tenant-Identifier"
/// "#).unwrap();
///
/// assert_eq!(config.resolvers["header"].get_str("header"), Some("Tenant-Identifier"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantedConfig {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub providers: HashMap<String, DriverConfig>,

    #[serde(default)]
    pub tenancies: HashMap<String, DriverConfig>,

    #[serde(default)]
    pub resolvers: HashMap<String, DriverConfig>,
}

impl TenantedConfig {
    /// Create an empty configuration
    pub fn empty() -> Self {
        Self {
            defaults: Defaults::default(),
            providers: HashMap::new(),
            tenancies: HashMap::new(),
            resolvers: HashMap::new(),
        }
    }

    /// Load from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| TenantedError::Config(e.to_string()))
    }

    /// Load from a JSON document
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| TenantedError::Config(e.to_string()))
    }

    /// Load from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| TenantedError::Config(e.to_string()))
    }

    /// Set the default provider
    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.defaults.provider = Some(name.into());
        self
    }

    /// Set the default tenancy
    pub fn with_default_tenancy(mut self, name: impl Into<String>) -> Self {
        self.defaults.tenancy = Some(name.into());
        self
    }

    /// Set the default resolver
    pub fn with_default_resolver(mut self, name: impl Into<String>) -> Self {
        self.defaults.resolver = Some(name.into());
        self
    }

    /// Add a provider block
    pub fn with_provider(mut self, name: impl Into<String>, config: DriverConfig) -> Self {
        self.providers.insert(name.into(), config);
        self
    }

    /// Add a tenancy block
    pub fn with_tenancy(mut self, name: impl Into<String>, config: DriverConfig) -> Self {
        self.tenancies.insert(name.into(), config);
        self
    }

    /// Add a resolver block
    pub fn with_resolver(mut self, name: impl Into<String>, config: DriverConfig) -> Self {
        self.resolvers.insert(name.into(), config);
        self
    }
}

impl Default for TenantedConfig {
    /// A `primary` tenancy backed by a `tenants` table, with the three stock
    /// resolvers configured and subdomain identification as the default.
    fn default() -> Self {
        Self::empty()
            .with_default_provider("tenants")
            .with_default_tenancy("primary")
            .with_default_resolver("subdomain")
            .with_provider(
                "tenants",
                DriverConfig::new("database")
                    .with("table", "tenants")
                    .with("key", "id")
                    .with("identifier", "identifier"),
            )
            .with_tenancy(
                "primary",
                DriverConfig::new("default")
                    .with("provider", "tenants")
                    .with("options", Value::Object(Map::new())),
            )
            .with_resolver(
                "subdomain",
                DriverConfig::new("subdomain").with("domain", "localhost"),
            )
            .with_resolver("path", DriverConfig::new("path").with("segment", 0))
            .with_resolver(
                "header",
                DriverConfig::new("header").with("header", "Tenant-Identifier"),
            )
    }
}
