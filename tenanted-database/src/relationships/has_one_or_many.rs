use super::{
    TenantRelationshipHandler, current_tenant, relation, relation_name, required_tenant,
};
use crate::entity::{Relation, TenantOwned};
use crate::error::{DatabaseResult, RelationshipError};
use crate::query::{TenantFilter, TenantQuery, key_matches};
use serde_json::Value;
use tenanted_core::{SharedTenant, Tenancy, TenantKey};

/// Handler for entities the tenant references
///
/// The tenant carries the entity's `owner_key` in its `foreign_key`
/// attribute, so there is nothing to stamp on creation. Entities are checked
/// against that reference and queries are filtered by it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HasOneOrManyHandler;

impl HasOneOrManyHandler {
    pub fn new() -> Self {
        Self
    }

    /// The entity key the tenant points at
    fn reference(
        model: &dyn TenantOwned,
        relation: &Relation,
        tenant: &SharedTenant,
        tenancy: &Tenancy,
    ) -> DatabaseResult<TenantKey> {
        tenant
            .attribute(&relation.foreign_key)
            .as_ref()
            .and_then(TenantKey::from_value)
            .ok_or_else(|| {
                RelationshipError::invalid(model.model_name(), &relation.name, tenancy.name()).into()
            })
    }

    fn validate(
        model: &dyn TenantOwned,
        relation: &Relation,
        tenant: &SharedTenant,
        tenancy: &Tenancy,
    ) -> DatabaseResult<()> {
        let reference = Self::reference(model, relation, tenant, tenancy)?;

        match model.attribute(&relation.owner_key) {
            None | Some(Value::Null) => Ok(()),
            Some(value) if key_matches(value, &reference) => Ok(()),
            Some(_) => Err(RelationshipError::invalid(
                model.model_name(),
                &relation.name,
                tenancy.name(),
            )
            .into()),
        }
    }
}

impl TenantRelationshipHandler for HasOneOrManyHandler {
    fn populate_for_creation(
        &self,
        model: &mut dyn TenantOwned,
        tenancy: &Tenancy,
    ) -> DatabaseResult<()> {
        let Some(tenant) = current_tenant(model, tenancy)? else {
            return Ok(());
        };

        let name = relation_name(model.tenant_relationship_name(), tenancy);
        let relation = relation(model.schema(), name)?;

        Self::validate(model, relation, &tenant, tenancy)
    }

    fn populate_after_retrieval(
        &self,
        model: &mut dyn TenantOwned,
        tenancy: &Tenancy,
    ) -> DatabaseResult<()> {
        let Some(tenant) = current_tenant(model, tenancy)? else {
            return Ok(());
        };

        let name = relation_name(model.tenant_relationship_name(), tenancy).to_string();
        let relation = relation(model.schema(), &name)?.clone();

        Self::validate(model, &relation, &tenant, tenancy)?;
        model.set_relation(&name, tenant);

        Ok(())
    }

    fn scope_for_query(
        &self,
        model: &dyn TenantOwned,
        tenancy: &Tenancy,
        query: TenantQuery,
    ) -> DatabaseResult<TenantQuery> {
        if !model.schema().should_scope_to_tenant() {
            return Ok(query);
        }

        let tenant = required_tenant(tenancy)?;
        let relation = relation(
            model.schema(),
            relation_name(model.tenant_relationship_name(), tenancy),
        )?;
        let reference = Self::reference(model, relation, &tenant, tenancy)?;

        Ok(query.scoped_to(TenantFilter::new(&relation.owner_key, reference)))
    }
}
