use super::TenantRelationshipHandler;
use crate::entity::{RelationShape, TenantOwned};
use crate::error::DatabaseResult;
use crate::query::TenantQuery;
use tenanted_core::Tenancy;
use tracing::trace;

/// Handler for tenants reached through a pivot or intermediate table
///
/// Populating and scoping these needs a join the query layer doesn't model,
/// so entities and queries pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotHandler {
    shape: RelationShape,
}

impl PivotHandler {
    pub fn new(shape: RelationShape) -> Self {
        Self { shape }
    }

    pub fn shape(&self) -> &RelationShape {
        &self.shape
    }
}

impl TenantRelationshipHandler for PivotHandler {
    fn populate_for_creation(
        &self,
        model: &mut dyn TenantOwned,
        tenancy: &Tenancy,
    ) -> DatabaseResult<()> {
        trace!(
            shape = %self.shape,
            model = model.model_name(),
            tenancy = tenancy.name(),
            "No tenant link to populate"
        );
        Ok(())
    }

    fn populate_after_retrieval(
        &self,
        _model: &mut dyn TenantOwned,
        _tenancy: &Tenancy,
    ) -> DatabaseResult<()> {
        Ok(())
    }

    fn scope_for_query(
        &self,
        _model: &dyn TenantOwned,
        _tenancy: &Tenancy,
        query: TenantQuery,
    ) -> DatabaseResult<TenantQuery> {
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{record, tenancy};
    use super::*;
    use crate::entity::ModelSchema;

    #[test]
    fn test_passes_through() {
        let tenancy = tenancy();
        let schema = ModelSchema::new("Project", "projects");
        let handler = PivotHandler::new(RelationShape::BelongsToMany);
        let mut project = record(schema);

        handler.populate_for_creation(&mut project, &tenancy).unwrap();
        handler.populate_after_retrieval(&mut project, &tenancy).unwrap();

        let query = handler
            .scope_for_query(&project, &tenancy, TenantQuery::new("projects"))
            .unwrap();
        assert_eq!(query, TenantQuery::new("projects"));
        assert_eq!(handler.shape(), &RelationShape::BelongsToMany);
    }
}
