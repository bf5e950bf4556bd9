//! Tenancy
//!
//! Holds the current tenant for one unit of work and records how it got
//! there. A tenancy is in one of three states:
//!
//! - no tenant
//! - loaded: a tenant retrieved by key, or set by hand
//! - identified: a tenant found from an identifier produced by a resolver
//!
//! A `Changed` event is published before the current tenant is swapped, and
//! only when the new tenant actually differs from the old one.

use crate::config::DriverConfig;
use crate::error::Result;
use crate::events::{TenantEvent, TenantEventKind, TenantEventSink};
use crate::provider::{ProviderRegistry, TenantProvider};
use crate::registry::{Registry, RegistryKind};
use crate::tenant::{SharedTenant, TenantKey, same_tenant};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of tenancies
pub type TenancyRegistry = Registry<Tenancy>;

#[derive(Default)]
struct TenancyState {
    tenant: Option<SharedTenant>,
    identified_by: Option<String>,
}

/// A named tenancy
pub struct Tenancy {
    name: String,
    provider: Arc<dyn TenantProvider>,
    options: Map<String, Value>,
    events: Arc<dyn TenantEventSink>,
    state: RwLock<TenancyState>,
}

impl Tenancy {
    /// Create a tenancy with no current tenant
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn TenantProvider>,
        events: Arc<dyn TenantEventSink>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            options: Map::new(),
            events,
            state: RwLock::new(TenancyState::default()),
        }
    }

    /// Set the options bag
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &Arc<dyn TenantProvider> {
        &self.provider
    }

    /// Whether there is a current tenant
    pub fn check(&self) -> bool {
        self.state.read().tenant.is_some()
    }

    /// The current tenant
    pub fn tenant(&self) -> Option<SharedTenant> {
        self.state.read().tenant.clone()
    }

    /// Identifier of the current tenant
    pub fn identifier(&self) -> Option<String> {
        self.state
            .read()
            .tenant
            .as_ref()
            .map(|tenant| tenant.identifier().to_string())
    }

    /// Key of the current tenant
    pub fn key(&self) -> Option<TenantKey> {
        self.state.read().tenant.as_ref().map(|tenant| tenant.key())
    }

    /// Name of the resolver that identified the current tenant
    pub fn identified_by(&self) -> Option<String> {
        self.state.read().identified_by.clone()
    }

    /// Whether the current tenant was loaded by key or set by hand
    pub fn was_loaded(&self) -> bool {
        let state = self.state.read();
        state.tenant.is_some() && state.identified_by.is_none()
    }

    /// Whether the current tenant was identified by a resolver
    pub fn was_identified(&self) -> bool {
        let state = self.state.read();
        state.tenant.is_some() && state.identified_by.is_some()
    }

    /// Identify the tenant from a resolved identifier
    ///
    /// Returns `true` only if the current tenant actually changed.
    pub async fn identify(&self, identifier: &str, resolver: &str) -> Result<bool> {
        let Some(tenant) = self.provider.retrieve_by_identifier(identifier).await? else {
            debug!(tenancy = %self.name, identifier, resolver, "No tenant for identifier");
            return Ok(false);
        };

        self.publish(TenantEventKind::Identified {
            tenant: Arc::clone(&tenant),
            resolver: resolver.to_string(),
        });

        let changed = self.swap(Some(tenant), Some(resolver.to_string()));

        if changed {
            info!(tenancy = %self.name, identifier, resolver, "Tenant identified");
        }

        Ok(changed)
    }

    /// Load the tenant by key
    ///
    /// Returns `true` only if the current tenant actually changed.
    pub async fn load(&self, key: &TenantKey) -> Result<bool> {
        let Some(tenant) = self.provider.retrieve_by_key(key).await? else {
            debug!(tenancy = %self.name, %key, "No tenant for key");
            return Ok(false);
        };

        self.publish(TenantEventKind::Loaded {
            tenant: Arc::clone(&tenant),
        });

        let changed = self.swap(Some(tenant), None);

        if changed {
            info!(tenancy = %self.name, %key, "Tenant loaded");
        }

        Ok(changed)
    }

    /// Replace the current tenant
    ///
    /// The tenant counts as loaded afterwards. Returns `true` if it differs
    /// from the previous one.
    pub fn set_tenant(&self, tenant: Option<SharedTenant>) -> bool {
        self.swap(tenant, None)
    }

    /// Read an option by dotted path, e.g. `database.connection`
    pub fn option(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;

        segments.try_fold(self.options.get(first)?, |value, segment| {
            value.as_object()?.get(segment)
        })
    }

    /// Read an option, falling back to `default`
    pub fn option_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.option(path).cloned().unwrap_or_else(|| default.into())
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Replace the current tenant
    ///
    /// The comparison, the `Changed` event and the write happen under one
    /// upgradable guard, so concurrent swaps to the same tenant publish once.
    /// Listeners may read the tenancy but must not swap it.
    fn swap(&self, tenant: Option<SharedTenant>, identified_by: Option<String>) -> bool {
        let state = self.state.upgradable_read();
        if same_tenant(state.tenant.as_ref(), tenant.as_ref()) {
            return false;
        }

        self.publish(TenantEventKind::Changed {
            previous: state.tenant.clone(),
            current: tenant.clone(),
        });

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        state.tenant = tenant;
        state.identified_by = identified_by;

        true
    }

    fn publish(&self, kind: TenantEventKind) {
        self.events.publish(TenantEvent::new(self.name.as_str(), kind));
    }
}

impl fmt::Debug for Tenancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Tenancy")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("tenant", &state.tenant)
            .field("identified_by", &state.identified_by)
            .finish()
    }
}

/// Build the tenancy registry with the `default` driver
pub fn tenancy_registry(
    configs: HashMap<String, DriverConfig>,
    default: Option<String>,
    providers: Arc<ProviderRegistry>,
    events: Arc<dyn TenantEventSink>,
) -> TenancyRegistry {
    Registry::new(RegistryKind::Tenancy, configs, default).with_builtin(
        "default",
        move |config: &DriverConfig, name: &str| {
            let provider = providers.get(config.get_str("provider"))?;
            let options = config.get_map("options").cloned().unwrap_or_default();

            debug!(tenancy = name, provider = provider.name(), "Creating tenancy");

            Ok(Arc::new(
                Tenancy::new(name, provider, Arc::clone(&events)).with_options(options),
            ))
        },
    )
}
