use super::{
    TenantRelationshipHandler, current_tenant, relation, relation_name, required_tenant,
};
use crate::entity::{Relation, TenantOwned};
use crate::error::{DatabaseResult, RelationshipError};
use crate::query::{TenantFilter, TenantQuery, key_matches};
use serde_json::Value;
use tenanted_core::{Tenancy, TenantKey};
use tracing::debug;

/// Handler for entities that hold their tenant's key
#[derive(Debug, Clone, Copy, Default)]
pub struct BelongsToHandler;

impl BelongsToHandler {
    pub fn new() -> Self {
        Self
    }

    /// Reject entities that point at another tenant
    ///
    /// A loaded relation is compared by key, otherwise the foreign key column
    /// is. An unset foreign key is only acceptable on creation.
    fn validate(
        model: &dyn TenantOwned,
        relation: &Relation,
        tenancy: &Tenancy,
        key: &TenantKey,
        allow_unset: bool,
    ) -> DatabaseResult<()> {
        let valid = match model.loaded_relation(&relation.name) {
            Some(loaded) => loaded.key() == *key,
            None => match model.attribute(&relation.foreign_key) {
                None | Some(Value::Null) => allow_unset,
                Some(value) => key_matches(value, key),
            },
        };

        if valid {
            Ok(())
        } else {
            Err(
                RelationshipError::invalid(model.model_name(), &relation.name, tenancy.name())
                    .into(),
            )
        }
    }
}

impl TenantRelationshipHandler for BelongsToHandler {
    fn populate_for_creation(
        &self,
        model: &mut dyn TenantOwned,
        tenancy: &Tenancy,
    ) -> DatabaseResult<()> {
        let Some(tenant) = current_tenant(model, tenancy)? else {
            return Ok(());
        };

        let name = relation_name(model.tenant_relationship_name(), tenancy).to_string();
        let relation = relation(model.schema(), &name)?.clone();
        let key = tenant.key();

        Self::validate(model, &relation, tenancy, &key, true)?;

        debug!(
            model = model.model_name(),
            relation = %name,
            key = %key,
            "Associating new entity with tenant"
        );

        model.set_attribute(&relation.foreign_key, key.to_value());
        model.set_relation(&name, tenant);

        Ok(())
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

        Self::validate(model, &relation, tenancy, &tenant.key(), false)?;
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

        Ok(query.scoped_to(TenantFilter::new(&relation.foreign_key, tenant.key())))
    }
}
