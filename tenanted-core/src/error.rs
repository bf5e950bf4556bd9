// Error types for tenant identification and registries

use crate::registry::RegistryKind;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TenantedError {
    #[error("No default {kind} configured")]
    NoDefault { kind: RegistryKind },

    #[error("No driver specified for {kind} '{name}'")]
    NoDriver { kind: RegistryKind, name: String },

    #[error("Missing config value '{key}' for {kind} '{name}'")]
    MissingConfig {
        kind: RegistryKind,
        name: String,
        key: String,
    },

    #[error("Unable to create a {kind} '{name}'")]
    UnknownDriver { kind: RegistryKind, name: String },

    #[error(
        "Config value '{key}' for {kind} '{name}' must be one of the following: {}",
        .expected.join(", ")
    )]
    InvalidConfiguredClass {
        kind: RegistryKind,
        name: String,
        key: String,
        expected: Vec<String>,
    },

    #[error(transparent)]
    TenantNotFound(#[from] TenantNotFound),

    #[error("Identity resolver '{name}' is not a {expected} resolver")]
    UnexpectedResolver { name: String, expected: &'static str },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Raised when a tenant is required but there isn't a usable one
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantNotFound {
    #[error("There is no current tenant for the '{tenancy}' tenancy")]
    NoTenant { tenancy: String },

    #[error(
        "The identity resolver '{resolver}' was unable to resolve a tenant for the '{tenancy}' tenancy"
    )]
    Missing { tenancy: String, resolver: String },

    #[error(
        "The tenant for the '{tenancy}' tenancy was not resolved using the '{expected}' resolver, it was resolved by '{actual}'"
    )]
    InvalidResolver {
        tenancy: String,
        expected: String,
        actual: String,
    },
}

impl TenantNotFound {
    pub fn none(tenancy: impl Into<String>) -> Self {
        Self::NoTenant {
            tenancy: tenancy.into(),
        }
    }

    pub fn missing(tenancy: impl Into<String>, resolver: impl Into<String>) -> Self {
        Self::Missing {
            tenancy: tenancy.into(),
            resolver: resolver.into(),
        }
    }

    pub fn invalid_resolver(
        tenancy: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidResolver {
            tenancy: tenancy.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TenantedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_messages() {
        let err = TenantedError::NoDriver {
            kind: RegistryKind::Resolver,
            name: "api".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No driver specified for identity resolver 'api'"
        );

        let err = TenantedError::MissingConfig {
            kind: RegistryKind::Resolver,
            name: "api".to_string(),
            key: "header".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing config value 'header' for identity resolver 'api'"
        );

        let err = TenantedError::InvalidConfiguredClass {
            kind: RegistryKind::Provider,
            name: "tenants".to_string(),
            key: "model".to_string(),
            expected: vec!["Tenant".to_string(), "Entity".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Config value 'model' for tenant provider 'tenants' must be one of the following: Tenant, Entity"
        );
    }

    #[test]
    fn test_tenant_not_found_converts() {
        let err: TenantedError = TenantNotFound::none("primary").into();
        assert!(matches!(
            err,
            TenantedError::TenantNotFound(TenantNotFound::NoTenant { .. })
        ));
        assert_eq!(
            err.to_string(),
            "There is no current tenant for the 'primary' tenancy"
        );
    }
}
