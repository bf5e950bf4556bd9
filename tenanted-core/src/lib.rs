//! Multi-Tenancy Core for Tenanted
//!
//! Works out which tenant an inbound request belongs to and keeps track of
//! it for the rest of the unit of work.
//!
//! # Features
//!
//! - **Driver Registries** - Providers, tenancies and resolvers built by name from configuration, with custom factory overrides
//! - **Tenant Providers** - Lookup by identifier or key against a table or a host entity type
//! - **Identity Resolvers** - Subdomain, path and header identification
//! - **Tenancy State** - Current tenant with provenance and change events
//! - **Route Guards** - Framework-independent `tenanted.route` and `tenanted.header` handling
//!
//! # Quick Start
//!
//! ## 1. Configure
//!
//! ```
//! use tenanted_core::TenantedConfig;
//!
//! let config = TenantedConfig::from_json_str(r#"{
//!     "defaults": {"provider": "tenants", "tenancy": "primary", "resolver": "header"},
//!     "providers": {"tenants": {"driver": "database", "table": "tenants"}},
//!     "tenancies": {"primary": {"driver": "default", "provider": "tenants"}},
//!     "resolvers": {"header": {"driver": "header", "header": "Tenant-Identifier"}}
//! }"#).unwrap();
//! # assert_eq!(config.defaults.resolver.as_deref(), Some("header"));
//! ```
//!
//! ## 2. Build the Manager (with your store)
//!
//! ```rust,ignore
//! use tenanted_core::*;
//!
//! let manager = TenantedManager::builder(config)
//!     .with_connections(StoreConnections::new().with_default(Arc::new(MyTenantStore::new(pool))))
//!     .with_events(Arc::new(dispatcher))
//!     .with_subdomain_exclusion(|_host, subdomain| subdomain == "www")
//!     .build();
//! ```
//!
//! ## 3. Identify Per Request
//!
//! ```rust,ignore
//! let scoped = manager.scoped();
//! on_route_matched(&scoped, &mut request).await?;
//! let tenancy = ensure_tenanted(&scoped, &mut request, None, None).await?;
//!
//! println!("Serving {}", tenancy.identifier().unwrap_or_default());
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod middleware;
pub mod provider;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod routing;
pub mod store;
pub mod tenancy;
pub mod tenant;

pub use config::{Defaults, DriverConfig, TenantedConfig};
pub use error::{Result, TenantNotFound, TenantedError};
pub use events::{
    BroadcastSink, EventDispatcher, ListenerError, NullSink, RecordingSink, TenantEvent,
    TenantEventKind, TenantEventSink, TenantListener,
};
pub use manager::{TenantedManager, TenantedManagerBuilder};
pub use middleware::{TenantGuard, ensure_tenanted, on_route_matched, tenant_header};
pub use provider::{
    DatabaseTenantProvider, EntityTenantProvider, ModelCatalog, ProviderRegistry, TenantEntity,
    TenantProvider, provider_registry,
};
pub use registry::{Factory, Registry, RegistryKind};
pub use request::{MatchedRoute, Request, RequestContext, Route, UrlDefaults};
pub use resolver::{
    ExclusionPredicate, HeaderIdentityResolver, IdentityResolver, PathIdentityResolver,
    Resolution, ResolverRegistry, SubdomainIdentityResolver, parameter_name, resolver_registry,
};
pub use routing::{
    MarkerKind, MiddlewareMarker, RouteGroup, RouteRegistrar, TENANT_HEADER, TENANTED_ROUTE,
};
pub use store::{InMemoryTenantStore, Row, StoreConnections, StoreError, TenantStore};
pub use tenancy::{Tenancy, TenancyRegistry, tenancy_registry};
pub use tenant::{GenericTenant, SharedTenant, Tenant, TenantKey, same_tenant};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{DriverConfig, TenantedConfig};
    pub use crate::error::{Result, TenantNotFound, TenantedError};
    pub use crate::events::{TenantEvent, TenantEventKind, TenantEventSink};
    pub use crate::manager::TenantedManager;
    pub use crate::middleware::{TenantGuard, ensure_tenanted, on_route_matched, tenant_header};
    pub use crate::provider::{TenantEntity, TenantProvider};
    pub use crate::request::{MatchedRoute, RequestContext, UrlDefaults};
    pub use crate::resolver::{IdentityResolver, Resolution};
    pub use crate::routing::{MiddlewareMarker, RouteRegistrar};
    pub use crate::store::{StoreConnections, TenantStore};
    pub use crate::tenancy::Tenancy;
    pub use crate::tenant::{SharedTenant, Tenant, TenantKey};
}
