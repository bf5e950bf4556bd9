//! Tenant-Owned Entities for Tenanted
//!
//! Keeps entities that belong to a tenant consistent with the current
//! tenancy, and scopes queries against them.
//!
//! # Features
//!
//! - **Entity Schemas** - Describe an entity's table, relations and tenant hooks
//! - **Relationship Handlers** - Populate, validate and scope per relation shape
//! - **Tenant Queries** - Equality filters with a `without_tenant` escape hatch
//! - **sea-query** - Convert filters to `sea_query::Condition` (feature `sea-query`)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tenanted_core::{GenericTenant, InMemoryTenantStore, StoreConnections, TenantedConfig, TenantedManager};
//! use tenanted_database::{ModelSchema, Record, Relation, TenantOwned, TenantedDatabase};
//!
//! let manager = TenantedManager::builder(TenantedConfig::default())
//!     .with_connections(StoreConnections::new().with_default(Arc::new(InMemoryTenantStore::new())))
//!     .build();
//! let database = TenantedDatabase::new(Arc::new(manager));
//!
//! let projects = Arc::new(
//!     ModelSchema::new("Project", "projects")
//!         .with_relation(Relation::belongs_to("organisation", "organisation_id"))
//!         .with_tenant_relation("organisation"),
//! );
//!
//! database
//!     .tenancy(None)
//!     .unwrap()
//!     .set_tenant(Some(Arc::new(GenericTenant::new(7, "acme"))));
//!
//! let mut project = Record::new(projects).with_attribute("name", "Launch");
//! database.creating(&mut project).unwrap();
//!
//! assert_eq!(project.attribute("organisation_id"), Some(&serde_json::json!(7)));
//! ```

pub mod entity;
pub mod error;
pub mod manager;
pub mod query;
pub mod relationships;

pub use entity::{ModelSchema, Record, Relation, RelationShape, TenantOwned};
pub use error::{DatabaseError, DatabaseResult, RelationshipError};
pub use manager::{HandlerFactory, TenantedDatabase};
pub use query::{TenantFilter, TenantQuery, key_matches};
pub use relationships::{
    BelongsToHandler, HasOneOrManyHandler, PivotHandler, TenantRelationshipHandler,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::entity::{ModelSchema, Record, Relation, RelationShape, TenantOwned};
    pub use crate::error::{DatabaseError, DatabaseResult, RelationshipError};
    pub use crate::manager::TenantedDatabase;
    pub use crate::query::{TenantFilter, TenantQuery};
    pub use crate::relationships::TenantRelationshipHandler;
}
