//! Tenant Providers
//!
//! Lookup services that turn a public identifier or an internal key into a
//! tenant. Not finding a tenant is never an error.

use crate::config::DriverConfig;
use crate::error::{Result, TenantedError};
use crate::registry::{Registry, RegistryKind};
use crate::store::{StoreConnections, StoreError, TenantStore};
use crate::tenant::{GenericTenant, SharedTenant, Tenant, TenantKey};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Registry of tenant providers
pub type ProviderRegistry = Registry<dyn TenantProvider>;

/// Tenant provider trait
#[async_trait]
pub trait TenantProvider: fmt::Debug + Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Retrieve a tenant by its public identifier
    async fn retrieve_by_identifier(&self, identifier: &str) -> Result<Option<SharedTenant>>;

    /// Retrieve a tenant by its internal key
    async fn retrieve_by_key(&self, key: &TenantKey) -> Result<Option<SharedTenant>>;
}

/// Provider backed by a plain table in a tenant store
///
/// Matching rows are wrapped in a [`GenericTenant`].
pub struct DatabaseTenantProvider {
    name: String,
    store: Arc<dyn TenantStore>,
    table: String,
    key_column: String,
    identifier_column: String,
}

impl DatabaseTenantProvider {
    /// Create a provider over `table` using `id` and `identifier` columns
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn TenantStore>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            table: table.into(),
            key_column: "id".to_string(),
            identifier_column: "identifier".to_string(),
        }
    }

    /// Use a different key column
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    /// Use a different identifier column
    pub fn with_identifier_column(mut self, column: impl Into<String>) -> Self {
        self.identifier_column = column.into();
        self
    }

    /// Table tenants are read from
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn retrieve_by(&self, column: &str, value: &Value) -> Result<Option<SharedTenant>> {
        let Some(row) = self.store.first_where(&self.table, column, value).await? else {
            return Ok(None);
        };

        let tenant = GenericTenant::from_row(
            &self.table,
            row,
            self.key_column.as_str(),
            self.identifier_column.as_str(),
        )?;

        let tenant: SharedTenant = Arc::new(tenant);
        Ok(Some(tenant))
    }
}

#[async_trait]
impl TenantProvider for DatabaseTenantProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve_by_identifier(&self, identifier: &str) -> Result<Option<SharedTenant>> {
        self.retrieve_by(&self.identifier_column, &Value::String(identifier.to_string()))
            .await
    }

    async fn retrieve_by_key(&self, key: &TenantKey) -> Result<Option<SharedTenant>> {
        self.retrieve_by(&self.key_column, &key.to_value()).await
    }
}

impl fmt::Debug for DatabaseTenantProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTenantProvider")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("key_column", &self.key_column)
            .field("identifier_column", &self.identifier_column)
            .finish()
    }
}

/// A host entity type that is itself a tenant
///
/// Rows are deserialized straight into the entity, which then answers the
/// tenant contract on its own.
pub trait TenantEntity: Tenant + DeserializeOwned {
    /// Table the entity lives in
    fn table() -> &'static str;

    /// Column holding the public identifier
    fn identifier_column() -> &'static str;

    /// Column holding the internal key
    fn key_column() -> &'static str {
        "id"
    }
}

/// Provider backed by a [`TenantEntity`] type
pub struct EntityTenantProvider<E> {
    name: String,
    store: Arc<dyn TenantStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: TenantEntity> EntityTenantProvider<E> {
    /// Create a provider for entity type `E`
    pub fn new(name: impl Into<String>, store: Arc<dyn TenantStore>) -> Self {
        Self {
            name: name.into(),
            store,
            _entity: PhantomData,
        }
    }

    async fn retrieve_by(&self, column: &str, value: &Value) -> Result<Option<SharedTenant>> {
        let Some(row) = self.store.first_where(E::table(), column, value).await? else {
            return Ok(None);
        };

        let entity: E = serde_json::from_value(Value::Object(row))
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;

        let tenant: SharedTenant = Arc::new(entity);
        Ok(Some(tenant))
    }
}

impl<E> fmt::Debug for EntityTenantProvider<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityTenantProvider")
            .field("name", &self.name)
            .field("entity", &std::any::type_name::<E>())
            .finish()
    }
}

#[async_trait]
impl<E: TenantEntity> TenantProvider for EntityTenantProvider<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve_by_identifier(&self, identifier: &str) -> Result<Option<SharedTenant>> {
        self.retrieve_by(E::identifier_column(), &Value::String(identifier.to_string()))
            .await
    }

    async fn retrieve_by_key(&self, key: &TenantKey) -> Result<Option<SharedTenant>> {
        self.retrieve_by(E::key_column(), &key.to_value()).await
    }
}

type EntityConstructor =
    Arc<dyn Fn(&str, Arc<dyn TenantStore>) -> Arc<dyn TenantProvider> + Send + Sync>;

/// Catalog of entity types usable by the `entity` provider driver
///
/// The `model` config key names an entry in this catalog.
#[derive(Clone, Default)]
pub struct ModelCatalog {
    models: HashMap<String, EntityConstructor>,
}

impl ModelCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Make entity type `E` available under `model`
    pub fn bind<E: TenantEntity>(mut self, model: impl Into<String>) -> Self {
        self.models.insert(
            model.into(),
            Arc::new(|name: &str, store: Arc<dyn TenantStore>| {
                let provider: Arc<dyn TenantProvider> =
                    Arc::new(EntityTenantProvider::<E>::new(name, store));
                provider
            }),
        );
        self
    }

    /// Whether a model is registered
    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    fn build(
        &self,
        model: &str,
        name: &str,
        store: Arc<dyn TenantStore>,
    ) -> Option<Arc<dyn TenantProvider>> {
        self.models
            .get(model)
            .map(|constructor| constructor(name, store))
    }
}

impl fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn connection(
    connections: &StoreConnections,
    config: &DriverConfig,
    name: &str,
) -> Result<Arc<dyn TenantStore>> {
    connections
        .get(config.get_str("connection"))
        .ok_or_else(|| TenantedError::MissingConfig {
            kind: RegistryKind::Provider,
            name: name.to_string(),
            key: "connection".to_string(),
        })
}

/// Build the provider registry with the `database` and `entity` drivers
pub fn provider_registry(
    configs: HashMap<String, DriverConfig>,
    default: Option<String>,
    connections: StoreConnections,
    models: ModelCatalog,
) -> ProviderRegistry {
    let database_connections = connections.clone();

    Registry::new(RegistryKind::Provider, configs, default)
        .with_builtin("database", move |config: &DriverConfig, name: &str| {
            let table = config
                .get_str("table")
                .ok_or_else(|| TenantedError::MissingConfig {
                    kind: RegistryKind::Provider,
                    name: name.to_string(),
                    key: "table".to_string(),
                })?;
            let store = connection(&database_connections, config, name)?;

            debug!(provider = name, table, "Creating database tenant provider");

            let provider: Arc<dyn TenantProvider> = Arc::new(
                DatabaseTenantProvider::new(name, store, table)
                    .with_key_column(config.get_str("key").unwrap_or("id"))
                    .with_identifier_column(config.get_str("identifier").unwrap_or("identifier")),
            );
            Ok(provider)
        })
        .with_builtin("entity", move |config: &DriverConfig, name: &str| {
            let model = config
                .get_str("model")
                .ok_or_else(|| TenantedError::MissingConfig {
                    kind: RegistryKind::Provider,
                    name: name.to_string(),
                    key: "model".to_string(),
                })?;

            if !models.contains(model) {
                return Err(TenantedError::InvalidConfiguredClass {
                    kind: RegistryKind::Provider,
                    name: name.to_string(),
                    key: "model".to_string(),
                    expected: vec!["Tenant".to_string(), "Entity".to_string()],
                });
            }

            let store = connection(&connections, config, name)?;

            debug!(provider = name, model, "Creating entity tenant provider");

            models
                .build(model, name, store)
                .ok_or_else(|| TenantedError::UnknownDriver {
                    kind: RegistryKind::Provider,
                    name: name.to_string(),
                })
        })
}
