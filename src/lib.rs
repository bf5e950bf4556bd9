// Tenanted - Multi-tenancy for Rust services
//
// This library identifies the tenant behind each request, tracks it for the
// unit of work, and keeps tenant-owned entities scoped to it.

// Re-export core functionality
pub use tenanted_core::*;

// Re-export optional crates
#[cfg(feature = "database")]
pub use tenanted_database;

#[cfg(feature = "database")]
pub use tenanted_database::{
    ModelSchema, Record, Relation, RelationShape, RelationshipError, TenantFilter, TenantOwned,
    TenantQuery, TenantRelationshipHandler, TenantedDatabase,
};

// Prelude for common imports
pub mod prelude {
    pub use tenanted_core::prelude::*;

    #[cfg(feature = "database")]
    pub use tenanted_database::prelude::*;
}
