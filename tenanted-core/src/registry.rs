//! Driver Registry
//!
//! A named instance cache shared by tenant providers, tenancies and identity
//! resolvers. Instances are built from their configuration block the first
//! time a name is requested, trying in order:
//!
//! 1. a custom factory registered for the exact name
//! 2. a custom factory registered for the configured `driver`
//! 3. the built-in factory for the configured `driver`
//!
//! Each name is built at most once and the result is shared from then on.

use crate::config::DriverConfig;
use crate::error::{Result, TenantedError};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Which kind of thing a registry builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    Provider,
    Tenancy,
    Resolver,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider => write!(f, "tenant provider"),
            Self::Tenancy => write!(f, "tenancy"),
            Self::Resolver => write!(f, "identity resolver"),
        }
    }
}

/// Factory invoked with the name's configuration block and the name itself
pub type Factory<T> = Arc<dyn Fn(&DriverConfig, &str) -> Result<Arc<T>> + Send + Sync>;

/// Generic name to instance registry
pub struct Registry<T: ?Sized + Send + Sync> {
    kind: RegistryKind,
    default: Option<String>,
    configs: HashMap<String, DriverConfig>,
    builtin: HashMap<String, Factory<T>>,
    custom: RwLock<HashMap<String, Factory<T>>>,
    instances: Mutex<HashMap<String, Arc<OnceCell<Arc<T>>>>>,
}

impl<T: ?Sized + Send + Sync> Registry<T> {
    /// Create a registry over a set of configuration blocks
    pub fn new(
        kind: RegistryKind,
        configs: HashMap<String, DriverConfig>,
        default: Option<String>,
    ) -> Self {
        Self {
            kind,
            default,
            configs,
            builtin: HashMap::new(),
            custom: RwLock::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Add a built-in factory for a driver
    pub fn with_builtin<F>(mut self, driver: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&DriverConfig, &str) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.builtin.insert(driver.into(), Arc::new(factory));
        self
    }

    /// Register a custom factory under a name or a driver
    ///
    /// Instances that were already built are left untouched.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&DriverConfig, &str) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register_factory(name, Arc::new(factory));
    }

    /// Register an already shared custom factory
    pub fn register_factory(&self, name: impl Into<String>, factory: Factory<T>) {
        let name = name.into();
        debug!(kind = %self.kind, name = %name, "Registered custom factory");
        self.custom.write().insert(name, factory);
    }

    /// Get an instance by name, or the default instance
    pub fn get(&self, name: Option<&str>) -> Result<Arc<T>> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self
                .default
                .clone()
                .ok_or(TenantedError::NoDefault { kind: self.kind })?,
        };

        let cell = {
            let mut instances = self.instances.lock();
            Arc::clone(
                instances
                    .entry(name.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        cell.get_or_try_init(|| self.build(&name)).map(Arc::clone)
    }

    /// Whether an instance has already been built for a name
    pub fn is_built(&self, name: &str) -> bool {
        self.instances
            .lock()
            .get(name)
            .is_some_and(|cell| cell.get().is_some())
    }

    /// The configured default name
    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// The configuration block for a name
    pub fn config(&self, name: &str) -> Option<&DriverConfig> {
        self.configs.get(name)
    }

    /// What this registry builds
    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    /// Create a registry with the same configuration and factories but no
    /// built instances
    pub fn fork(&self) -> Self {
        Self {
            kind: self.kind,
            default: self.default.clone(),
            configs: self.configs.clone(),
            builtin: self.builtin.clone(),
            custom: RwLock::new(self.custom.read().clone()),
            instances: Mutex::new(HashMap::new()),
        }
    }

    fn custom_factory(&self, key: &str) -> Option<Factory<T>> {
        self.custom.read().get(key).cloned()
    }

    fn build(&self, name: &str) -> Result<Arc<T>> {
        let config = self.configs.get(name).cloned().unwrap_or_default();

        if let Some(factory) = self.custom_factory(name) {
            debug!(kind = %self.kind, name, "Building from custom factory for name");
            return factory(&config, name);
        }

        let driver = config.driver().ok_or_else(|| TenantedError::NoDriver {
            kind: self.kind,
            name: name.to_string(),
        })?;

        if let Some(factory) = self.custom_factory(driver) {
            debug!(kind = %self.kind, name, driver, "Building from custom factory for driver");
            return factory(&config, name);
        }

        if let Some(factory) = self.builtin.get(driver) {
            debug!(kind = %self.kind, name, driver, "Building from built-in driver");
            return factory(&config, name);
        }

        Err(TenantedError::UnknownDriver {
            kind: self.kind,
            name: name.to_string(),
        })
    }
}

impl<T: ?Sized + Send + Sync> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("configs", &self.configs.keys().collect::<Vec<_>>())
            .field("builtin", &self.builtin.keys().collect::<Vec<_>>())
            .finish()
    }
}
