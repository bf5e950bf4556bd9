//! Tenant relationship handlers
//!
//! A handler keeps an entity's link to its tenant consistent with the
//! tenancy: it populates the link when the entity is created, checks and
//! attaches it when the entity is retrieved, and scopes queries.

mod belongs_to;
mod has_one_or_many;
mod pivot;

pub use belongs_to::BelongsToHandler;
pub use has_one_or_many::HasOneOrManyHandler;
pub use pivot::PivotHandler;

use crate::entity::{ModelSchema, Relation, TenantOwned};
use crate::error::{DatabaseResult, RelationshipError};
use crate::query::TenantQuery;
use std::fmt;
use tenanted_core::{SharedTenant, Tenancy, TenantNotFound};

/// Keeps a tenant-owned entity in step with its tenancy.
pub trait TenantRelationshipHandler: fmt::Debug + Send + Sync {
    /// Populate the tenant link on an entity about to be created
    fn populate_for_creation(
        &self,
        model: &mut dyn TenantOwned,
        tenancy: &Tenancy,
    ) -> DatabaseResult<()>;

    /// Check and attach the tenant on an entity that was just retrieved
    fn populate_after_retrieval(
        &self,
        model: &mut dyn TenantOwned,
        tenancy: &Tenancy,
    ) -> DatabaseResult<()>;

    /// Restrict a query to the current tenant
    ///
    /// `model` stands for the entity type being queried; only its hooks and
    /// schema are read.
    fn scope_for_query(
        &self,
        model: &dyn TenantOwned,
        tenancy: &Tenancy,
        query: TenantQuery,
    ) -> DatabaseResult<TenantQuery>;
}

/// Name of the tenant relation, the tenancy name when the entity doesn't say
fn relation_name<'a>(tenant_relation: Option<&'a str>, tenancy: &'a Tenancy) -> &'a str {
    tenant_relation.unwrap_or_else(|| tenancy.name())
}

fn relation<'a>(schema: &'a ModelSchema, name: &str) -> DatabaseResult<&'a Relation> {
    schema
        .relation(name)
        .ok_or_else(|| RelationshipError::no_relationship(schema.model(), name).into())
}

/// The current tenant for a populate hook
///
/// `Ok(None)` means the entity may go ahead without one.
fn current_tenant(
    model: &dyn TenantOwned,
    tenancy: &Tenancy,
) -> DatabaseResult<Option<SharedTenant>> {
    match tenancy.tenant() {
        Some(tenant) => Ok(Some(tenant)),
        None if model.should_function_without_tenant() => Ok(None),
        None => Err(TenantNotFound::none(tenancy.name()).into()),
    }
}

/// The current tenant for a scope, which can't be skipped
fn required_tenant(tenancy: &Tenancy) -> DatabaseResult<SharedTenant> {
    tenancy
        .tenant()
        .ok_or_else(|| TenantNotFound::none(tenancy.name()).into())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::entity::Record;
    use std::sync::Arc;
    use tenanted_core::{
        DatabaseTenantProvider, GenericTenant, InMemoryTenantStore, NullSink, TenantProvider,
    };

    pub fn tenancy() -> Tenancy {
        let provider: Arc<dyn TenantProvider> = Arc::new(DatabaseTenantProvider::new(
            "tenants",
            Arc::new(InMemoryTenantStore::new()),
            "tenants",
        ));
        Tenancy::new("primary", provider, Arc::new(NullSink))
    }

    pub fn acme() -> SharedTenant {
        Arc::new(GenericTenant::new(7, "acme").with_attribute("project_id", 3))
    }

    pub fn record(schema: ModelSchema) -> Record {
        Record::new(Arc::new(schema))
    }
}
