//! Tenant-owned entities and their relation descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tenanted_core::{Row, SharedTenant};

/// Shape of the relation between an entity and its tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationShape {
    /// The entity holds the tenant's key.
    BelongsTo,
    /// The tenant holds a reference to the entity.
    HasOneOrMany,
    /// Entity and tenant are linked through a pivot table.
    BelongsToMany,
    /// The tenant is reached through an intermediate entity.
    HasManyThrough,
    /// A host-specific shape, handled only by a registered custom handler.
    Other(String),
}

impl RelationShape {
    /// Name used to register custom handlers for this shape
    pub fn name(&self) -> &str {
        match self {
            Self::BelongsTo => "BelongsTo",
            Self::HasOneOrMany => "HasOneOrMany",
            Self::BelongsToMany => "BelongsToMany",
            Self::HasManyThrough => "HasManyThrough",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for RelationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named relation on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub shape: RelationShape,
    /// Column holding the reference.
    ///
    /// On the entity for [`RelationShape::BelongsTo`], on the tenant for
    /// [`RelationShape::HasOneOrMany`].
    pub foreign_key: String,
    /// Column the reference points at.
    pub owner_key: String,
}

impl Relation {
    pub fn new(
        name: impl Into<String>,
        shape: RelationShape,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            foreign_key: foreign_key.into(),
            owner_key: "id".to_string(),
        }
    }

    /// The entity holds the tenant key in `foreign_key`
    pub fn belongs_to(name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(name, RelationShape::BelongsTo, foreign_key)
    }

    /// The tenant holds the entity's `owner_key` in `foreign_key`
    pub fn has_one_or_many(name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(name, RelationShape::HasOneOrMany, foreign_key)
    }

    pub fn with_owner_key(mut self, owner_key: impl Into<String>) -> Self {
        self.owner_key = owner_key.into();
        self
    }
}

/// Static description of a tenant-owned entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    model: String,
    table: String,
    relations: Vec<Relation>,
    tenant_relation: Option<String>,
    tenancy: Option<String>,
    scope_to_tenant: bool,
    function_without_tenant: bool,
}

impl ModelSchema {
    /// Create a schema for `model` stored in `table`
    ///
    /// Entities are scoped to the current tenant and require one by default.
    pub fn new(model: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            table: table.into(),
            relations: Vec::new(),
            tenant_relation: None,
            tenancy: None,
            scope_to_tenant: true,
            function_without_tenant: false,
        }
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Name of the relation that points at the tenant
    pub fn with_tenant_relation(mut self, relation: impl Into<String>) -> Self {
        self.tenant_relation = Some(relation.into());
        self
    }

    /// Tenancy the entity belongs to, the default tenancy otherwise
    pub fn with_tenancy(mut self, tenancy: impl Into<String>) -> Self {
        self.tenancy = Some(tenancy.into());
        self
    }

    pub fn with_scoping(mut self, scope_to_tenant: bool) -> Self {
        self.scope_to_tenant = scope_to_tenant;
        self
    }

    /// Let entities be created and retrieved while there is no tenant
    pub fn with_function_without_tenant(mut self, function_without_tenant: bool) -> Self {
        self.function_without_tenant = function_without_tenant;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn tenant_relation(&self) -> Option<&str> {
        self.tenant_relation.as_deref()
    }

    pub fn tenancy(&self) -> Option<&str> {
        self.tenancy.as_deref()
    }

    pub fn should_scope_to_tenant(&self) -> bool {
        self.scope_to_tenant
    }

    pub fn should_function_without_tenant(&self) -> bool {
        self.function_without_tenant
    }
}

/// An entity owned by a tenant.
///
/// The hook methods default to what the [`ModelSchema`] says, implementors
/// override them when the answer depends on the instance.
pub trait TenantOwned: Send + Sync {
    fn schema(&self) -> &ModelSchema;

    fn attribute(&self, column: &str) -> Option<&Value>;

    fn set_attribute(&mut self, column: &str, value: Value);

    /// The tenant attached under `relation`, if loaded
    fn loaded_relation(&self, relation: &str) -> Option<&SharedTenant>;

    fn set_relation(&mut self, relation: &str, tenant: SharedTenant);

    fn model_name(&self) -> &str {
        self.schema().model()
    }

    fn tenant_relationship_name(&self) -> Option<&str> {
        self.schema().tenant_relation()
    }

    fn tenancy_name(&self) -> Option<&str> {
        self.schema().tenancy()
    }

    fn should_function_without_tenant(&self) -> bool {
        self.schema().should_function_without_tenant()
    }
}

/// Row-backed tenant-owned entity
///
/// For hosts that don't have entity types of their own.
#[derive(Clone)]
pub struct Record {
    schema: Arc<ModelSchema>,
    attributes: Row,
    relations: HashMap<String, SharedTenant>,
}

impl Record {
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        Self::from_row(schema, Row::new())
    }

    pub fn from_row(schema: Arc<ModelSchema>, attributes: Row) -> Self {
        Self {
            schema,
            attributes,
            relations: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }

    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    pub fn into_row(self) -> Row {
        self.attributes
    }
}

impl TenantOwned for Record {
    fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    fn attribute(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    fn set_attribute(&mut self, column: &str, value: Value) {
        self.attributes.insert(column.to_string(), value);
    }

    fn loaded_relation(&self, relation: &str) -> Option<&SharedTenant> {
        self.relations.get(relation)
    }

    fn set_relation(&mut self, relation: &str, tenant: SharedTenant) {
        self.relations.insert(relation.to_string(), tenant);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.schema.model())
            .field("attributes", &self.attributes)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tenanted_core::GenericTenant;

    fn schema() -> Arc<ModelSchema> {
        Arc::new(
            ModelSchema::new("Project", "projects")
                .with_relation(Relation::belongs_to("organisation", "organisation_id"))
                .with_tenant_relation("organisation"),
        )
    }

    #[test]
    fn test_schema_defaults() {
        let schema = schema();
        assert_eq!(schema.model(), "Project");
        assert_eq!(schema.table(), "projects");
        assert!(schema.should_scope_to_tenant());
        assert!(!schema.should_function_without_tenant());
        assert_eq!(schema.tenancy(), None);

        let relation = schema.relation("organisation").unwrap();
        assert_eq!(relation.shape, RelationShape::BelongsTo);
        assert_eq!(relation.foreign_key, "organisation_id");
        assert_eq!(relation.owner_key, "id");
        assert!(schema.relation("owner").is_none());
    }

    #[test]
    fn test_shape_names() {
        assert_eq!(RelationShape::BelongsTo.to_string(), "BelongsTo");
        assert_eq!(RelationShape::HasManyThrough.name(), "HasManyThrough");
        assert_eq!(RelationShape::Other("MorphTo".to_string()).name(), "MorphTo");
    }

    #[test]
    fn test_record_hooks_follow_schema() {
        let mut record = Record::new(schema()).with_attribute("name", "Launch");
        assert_eq!(record.model_name(), "Project");
        assert_eq!(record.tenant_relationship_name(), Some("organisation"));
        assert_eq!(record.attribute("name"), Some(&json!("Launch")));
        assert!(record.loaded_relation("organisation").is_none());

        record.set_attribute("organisation_id", json!(7));
        record.set_relation("organisation", Arc::new(GenericTenant::new(7, "acme")));

        assert_eq!(
            record.loaded_relation("organisation").map(|t| t.identifier().to_string()),
            Some("acme".to_string())
        );
        assert_eq!(record.into_row().get("organisation_id"), Some(&json!(7)));
    }
}
