//! Tenanted Manager
//!
//! Ties the provider, tenancy and resolver registries together and runs
//! identification for a request.

use crate::config::TenantedConfig;
use crate::error::Result;
use crate::events::{NullSink, TenantEventSink};
use crate::provider::{ModelCatalog, ProviderRegistry, TenantProvider, provider_registry};
use crate::request::{RequestContext, UrlDefaults};
use crate::resolver::{
    ExclusionPredicate, IdentityResolver, Resolution, ResolverRegistry, resolver_registry,
};
use crate::store::StoreConnections;
use crate::tenancy::{Tenancy, TenancyRegistry, tenancy_registry};
use crate::tenant::SharedTenant;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builder for [`TenantedManager`]
pub struct TenantedManagerBuilder {
    config: TenantedConfig,
    connections: StoreConnections,
    models: ModelCatalog,
    events: Arc<dyn TenantEventSink>,
    exclusion: Option<ExclusionPredicate>,
}

impl TenantedManagerBuilder {
    /// Store connections used by the `database` and `entity` providers
    pub fn with_connections(mut self, connections: StoreConnections) -> Self {
        self.connections = connections;
        self
    }

    /// Entity types usable by the `entity` provider
    pub fn with_models(mut self, models: ModelCatalog) -> Self {
        self.models = models;
        self
    }

    /// Sink receiving tenant events
    pub fn with_events(mut self, events: Arc<dyn TenantEventSink>) -> Self {
        self.events = events;
        self
    }

    /// Predicate rejecting subdomain identifiers, called with host and
    /// identifier
    pub fn with_subdomain_exclusion<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        let predicate: ExclusionPredicate = Arc::new(predicate);
        self.exclusion = Some(predicate);
        self
    }

    pub fn build(self) -> TenantedManager {
        let TenantedConfig {
            defaults,
            providers,
            tenancies,
            resolvers,
        } = self.config;

        let providers = Arc::new(provider_registry(
            providers,
            defaults.provider,
            self.connections,
            self.models,
        ));
        let tenancies = Arc::new(tenancy_registry(
            tenancies,
            defaults.tenancy,
            Arc::clone(&providers),
            self.events,
        ));
        let resolvers = Arc::new(resolver_registry(
            resolvers,
            defaults.resolver,
            self.exclusion,
        ));

        TenantedManager {
            providers,
            tenancies,
            resolvers,
            current: RwLock::new(None),
        }
    }
}

/// Tenanted manager
///
/// Provider and resolver instances are stateless and shared process-wide.
/// Tenancies hold per-request state, so each unit of work should run against
/// its own [`TenantedManager::scoped`] manager.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tenanted_core::{InMemoryTenantStore, Request, StoreConnections, TenantedConfig, TenantedManager};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryTenantStore::new()
///     .with_row("tenants", serde_json::json!({"id": 1, "identifier": "acme"}));
///
/// let manager = TenantedManager::builder(TenantedConfig::default())
///     .with_connections(StoreConnections::new().with_default(Arc::new(store)))
///     .build();
///
/// let mut request = Request::new("acme.localhost", "/");
/// let scoped = manager.scoped();
/// assert!(scoped.identify(&mut request, None, None).await.unwrap());
/// assert_eq!(scoped.current_tenancy().unwrap().identifier().as_deref(), Some("acme"));
/// # });
/// ```
pub struct TenantedManager {
    providers: Arc<ProviderRegistry>,
    tenancies: Arc<TenancyRegistry>,
    resolvers: Arc<ResolverRegistry>,
    current: RwLock<Option<Arc<Tenancy>>>,
}

impl TenantedManager {
    /// Start building a manager from configuration
    pub fn builder(config: TenantedConfig) -> TenantedManagerBuilder {
        TenantedManagerBuilder {
            config,
            connections: StoreConnections::new(),
            models: ModelCatalog::new(),
            events: Arc::new(NullSink),
            exclusion: None,
        }
    }

    /// The provider registry, for registering custom factories
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// The tenancy registry, for registering custom factories
    pub fn tenancies(&self) -> &TenancyRegistry {
        &self.tenancies
    }

    /// The resolver registry, for registering custom factories
    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    /// Get a provider by name, or the default provider
    pub fn provider(&self, name: Option<&str>) -> Result<Arc<dyn TenantProvider>> {
        self.providers.get(name)
    }

    /// Get a tenancy by name, or the default tenancy
    pub fn tenancy(&self, name: Option<&str>) -> Result<Arc<Tenancy>> {
        self.tenancies.get(name)
    }

    /// Get a resolver by name, or the default resolver
    pub fn resolver(&self, name: Option<&str>) -> Result<Arc<dyn IdentityResolver>> {
        self.resolvers.get(name)
    }

    /// A manager for one unit of work
    ///
    /// Shares providers and resolvers with this manager, but builds its own
    /// tenancies.
    pub fn scoped(&self) -> Self {
        Self {
            providers: Arc::clone(&self.providers),
            tenancies: Arc::new(self.tenancies.fork()),
            resolvers: Arc::clone(&self.resolvers),
            current: RwLock::new(None),
        }
    }

    pub fn set_current_tenancy(&self, tenancy: Option<Arc<Tenancy>>) {
        *self.current.write() = tenancy;
    }

    /// The tenancy used by the last identification
    pub fn current_tenancy(&self) -> Option<Arc<Tenancy>> {
        self.current.read().clone()
    }

    /// Tenant of the current tenancy
    pub fn current_tenant(&self) -> Option<SharedTenant> {
        self.current_tenancy().and_then(|tenancy| tenancy.tenant())
    }

    /// Resolver that identified the current tenant
    pub fn current_resolver(&self) -> Result<Option<Arc<dyn IdentityResolver>>> {
        match self.current_tenancy().and_then(|tenancy| tenancy.identified_by()) {
            Some(name) => self.resolver(Some(&name)).map(Some),
            None => Ok(None),
        }
    }

    /// Identify the tenant for a request
    ///
    /// The selected tenancy becomes the current tenancy whether or not a
    /// tenant is found. Returns `true` if the current tenant changed.
    pub async fn identify(
        &self,
        request: &mut dyn RequestContext,
        tenancy: Option<&str>,
        resolver: Option<&str>,
    ) -> Result<bool> {
        let tenancy = self.tenancy(tenancy)?;
        self.set_current_tenancy(Some(Arc::clone(&tenancy)));

        let resolver = self.resolver(resolver)?;

        match resolver.resolve(request, &tenancy) {
            Resolution::Found(identifier) => tenancy.identify(&identifier, resolver.name()).await,
            resolution => {
                debug!(
                    tenancy = tenancy.name(),
                    resolver = resolver.name(),
                    ?resolution,
                    "No identifier resolved"
                );
                Ok(false)
            }
        }
    }

    /// Write the current tenant identifier into reverse routing defaults
    pub fn setup_url_defaults(&self, defaults: &mut dyn UrlDefaults) -> Result<()> {
        let Some(tenancy) = self.current_tenancy() else {
            return Ok(());
        };

        if let Some(resolver) = self.current_resolver()? {
            resolver.setup(&tenancy, tenancy.tenant().as_ref(), defaults);
        }

        Ok(())
    }
}

impl fmt::Debug for TenantedManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantedManager")
            .field("providers", &self.providers)
            .field("tenancies", &self.tenancies)
            .field("resolvers", &self.resolvers)
            .field("current", &self.current.read().as_ref().map(|t| t.name().to_string()))
            .finish()
    }
}
