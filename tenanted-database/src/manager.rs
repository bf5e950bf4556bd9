//! Tenanted Database Manager
//!
//! Picks the relationship handler for each tenant-owned entity type and runs
//! the creation, retrieval and query hooks against the right tenancy.

use crate::entity::{ModelSchema, RelationShape, TenantOwned};
use crate::error::{DatabaseResult, RelationshipError};
use crate::query::TenantQuery;
use crate::relationships::{
    BelongsToHandler, HasOneOrManyHandler, PivotHandler, TenantRelationshipHandler,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tenanted_core::{Tenancy, TenantedManager};
use tracing::debug;

/// Creates a relationship handler for an entity type
pub type HandlerFactory =
    Arc<dyn Fn(&ModelSchema) -> Arc<dyn TenantRelationshipHandler> + Send + Sync>;

/// Tenant-owned entity hooks
pub struct TenantedDatabase {
    manager: Arc<TenantedManager>,
    custom: RwLock<HashMap<String, HandlerFactory>>,
    builtin: Mutex<HashMap<String, Arc<dyn TenantRelationshipHandler>>>,
    models: Mutex<HashMap<(String, String), Arc<dyn TenantRelationshipHandler>>>,
}

impl TenantedDatabase {
    pub fn new(manager: Arc<TenantedManager>) -> Self {
        Self {
            manager,
            custom: RwLock::new(HashMap::new()),
            builtin: Mutex::new(HashMap::new()),
            models: Mutex::new(HashMap::new()),
        }
    }

    /// The tenancy manager hooks resolve tenancies through
    pub fn manager(&self) -> &Arc<TenantedManager> {
        &self.manager
    }

    /// Register a handler factory for a relation shape
    ///
    /// Custom factories are consulted before the built-in handlers. Entity
    /// types whose handler was already selected keep it.
    pub fn register_relationship_handler<F>(&self, shape: impl Into<String>, factory: F)
    where
        F: Fn(&ModelSchema) -> Arc<dyn TenantRelationshipHandler> + Send + Sync + 'static,
    {
        let shape = shape.into();
        debug!(shape = %shape, "Registering custom relationship handler");
        self.custom.write().insert(shape, Arc::new(factory));
    }

    /// The handler for one of an entity type's relations
    pub fn relationship(
        &self,
        schema: &ModelSchema,
        relation: &str,
    ) -> DatabaseResult<Arc<dyn TenantRelationshipHandler>> {
        let shape = schema
            .relation(relation)
            .map(|relation| relation.shape.clone())
            .ok_or_else(|| RelationshipError::no_relationship(schema.model(), relation))?;

        let custom = self.custom.read().get(shape.name()).cloned();
        if let Some(factory) = custom {
            debug!(model = schema.model(), shape = %shape, "Using custom relationship handler");
            return Ok(factory(schema));
        }

        self.builtin_handler(&shape)
    }

    /// The handler for an entity type's tenant relation
    ///
    /// The relation comes from the entity's `tenant_relationship_name` hook.
    /// Selection happens once per entity type and relation.
    pub fn handler_for(
        &self,
        model: &dyn TenantOwned,
    ) -> DatabaseResult<Arc<dyn TenantRelationshipHandler>> {
        let relation = model.tenant_relationship_name().ok_or_else(|| {
            RelationshipError::missing_method(model.model_name(), "tenant_relationship_name")
        })?;
        let key = (model.model_name().to_string(), relation.to_string());

        if let Some(handler) = self.models.lock().get(&key) {
            return Ok(Arc::clone(handler));
        }

        let handler = self.relationship(model.schema(), relation)?;

        let mut models = self.models.lock();
        let handler = models.entry(key).or_insert(handler);

        Ok(Arc::clone(handler))
    }

    /// The tenancy an entity type belongs to
    pub fn tenancy(&self, name: Option<&str>) -> DatabaseResult<Arc<Tenancy>> {
        Ok(self.manager.tenancy(name)?)
    }

    /// Populate the tenant link on an entity about to be created
    pub fn creating(&self, model: &mut dyn TenantOwned) -> DatabaseResult<()> {
        let handler = self.handler_for(model)?;
        let tenancy = self.tenancy(model.tenancy_name())?;

        handler.populate_for_creation(model, &tenancy)
    }

    /// Check and attach the tenant on an entity that was just retrieved
    pub fn retrieved(&self, model: &mut dyn TenantOwned) -> DatabaseResult<()> {
        let handler = self.handler_for(model)?;
        let tenancy = self.tenancy(model.tenancy_name())?;

        handler.populate_after_retrieval(model, &tenancy)
    }

    /// Restrict a query over `model`'s entity type to the current tenant
    ///
    /// Queries opted out with [`TenantQuery::without_tenant`] are returned
    /// as they are.
    pub fn scope(
        &self,
        model: &dyn TenantOwned,
        query: TenantQuery,
    ) -> DatabaseResult<TenantQuery> {
        if !query.is_tenant_scoped() {
            return Ok(query);
        }

        let handler = self.handler_for(model)?;
        let tenancy = self.tenancy(model.tenancy_name())?;

        handler.scope_for_query(model, &tenancy, query)
    }

    /// A scoped query against the entity type's table
    pub fn query(&self, model: &dyn TenantOwned) -> DatabaseResult<TenantQuery> {
        self.scope(model, TenantQuery::new(model.schema().table()))
    }

    fn builtin_handler(
        &self,
        shape: &RelationShape,
    ) -> DatabaseResult<Arc<dyn TenantRelationshipHandler>> {
        let mut builtin = self.builtin.lock();
        if let Some(handler) = builtin.get(shape.name()) {
            return Ok(Arc::clone(handler));
        }

        let handler: Arc<dyn TenantRelationshipHandler> = match shape {
            RelationShape::BelongsTo => Arc::new(BelongsToHandler::new()),
            RelationShape::HasOneOrMany => Arc::new(HasOneOrManyHandler::new()),
            RelationShape::BelongsToMany | RelationShape::HasManyThrough => {
                Arc::new(PivotHandler::new(shape.clone()))
            }
            RelationShape::Other(name) => {
                return Err(RelationshipError::unknown_shape(name.as_str()).into());
            }
        };

        debug!(shape = %shape, "Created relationship handler");
        builtin.insert(shape.name().to_string(), Arc::clone(&handler));

        Ok(handler)
    }
}

impl fmt::Debug for TenantedDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantedDatabase")
            .field("custom", &self.custom.read().keys().collect::<Vec<_>>())
            .field("models", &self.models.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}
