//! Error types for tenant-owned entities.

use tenanted_core::{TenantNotFound, TenantedError};
use thiserror::Error;

/// Misconfigured or inconsistent tenant relationships.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelationshipError {
    /// The entity references a different tenant than the current one.
    #[error(
        "The value of the '{relation}' relationship on the '{model}' model, does not match the current tenant for the '{tenancy}' tenancy"
    )]
    InvalidValue {
        model: String,
        relation: String,
        tenancy: String,
    },

    /// The entity does not provide a required hook.
    #[error("The model '{model}' is misconfigured, it is missing the '{method}' method")]
    MissingHookMethod { model: String, method: String },

    /// The entity has no relation by that name.
    #[error("The relationship '{relation}' does not exist on the '{model}' model")]
    NoSuchRelationship { model: String, relation: String },

    /// Nothing can handle the relation's shape.
    #[error("Could not create a relationship handler for the '{shape}' relation type")]
    NoHandlerForRelationShape { shape: String },
}

impl RelationshipError {
    pub fn invalid(
        model: impl Into<String>,
        relation: impl Into<String>,
        tenancy: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            model: model.into(),
            relation: relation.into(),
            tenancy: tenancy.into(),
        }
    }

    pub fn missing_method(model: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MissingHookMethod {
            model: model.into(),
            method: method.into(),
        }
    }

    pub fn no_relationship(model: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::NoSuchRelationship {
            model: model.into(),
            relation: relation.into(),
        }
    }

    pub fn unknown_shape(shape: impl Into<String>) -> Self {
        Self::NoHandlerForRelationShape {
            shape: shape.into(),
        }
    }
}

/// Errors raised by tenant-owned entity hooks and scopes.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Relationship misconfiguration or mismatch.
    #[error(transparent)]
    Relationship(#[from] RelationshipError),

    /// Error from the tenancy layer.
    #[error(transparent)]
    Tenanted(#[from] TenantedError),
}

impl From<TenantNotFound> for DatabaseError {
    fn from(err: TenantNotFound) -> Self {
        DatabaseError::Tenanted(err.into())
    }
}

impl DatabaseError {
    /// The tenant-not-found error, if that's what this is
    pub fn tenant_not_found(&self) -> Option<&TenantNotFound> {
        match self {
            DatabaseError::Tenanted(TenantedError::TenantNotFound(err)) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for tenant-owned entity operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
