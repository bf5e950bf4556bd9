//! Tenant Route Guards
//!
//! The logic behind the `tenanted.route` and `tenanted.header` markers,
//! independent of any HTTP stack. Host frameworks call these from their own
//! middleware and route-matched hooks.

use crate::error::{Result, TenantNotFound, TenantedError};
use crate::manager::TenantedManager;
use crate::request::RequestContext;
use crate::resolver::Resolution;
use crate::routing::{MarkerKind, MiddlewareMarker};
use crate::tenancy::Tenancy;
use std::sync::Arc;
use tracing::{debug, warn};

/// Identify the tenant once a route has been matched
///
/// Uses the arguments of the first `tenanted.route` marker on the route.
/// Routes without one are left alone and `Ok(false)` is returned.
pub async fn on_route_matched(
    manager: &TenantedManager,
    request: &mut dyn RequestContext,
) -> Result<bool> {
    let marker = request.route().and_then(|route| {
        route
            .middleware()
            .iter()
            .filter_map(|marker| MiddlewareMarker::parse(marker))
            .find(|marker| marker.kind == MarkerKind::Route)
    });

    let Some(marker) = marker else {
        return Ok(false);
    };

    debug!(%marker, "Identifying tenant for matched route");

    manager
        .identify(request, marker.tenancy.as_deref(), marker.resolver.as_deref())
        .await
}

/// Require a tenant identified by the expected resolver
///
/// Requests without a matched route never went through
/// [`on_route_matched`], so identification is forced for them first.
pub async fn ensure_tenanted(
    manager: &TenantedManager,
    request: &mut dyn RequestContext,
    tenancy: Option<&str>,
    resolver: Option<&str>,
) -> Result<Arc<Tenancy>> {
    let tenancy = manager.tenancy(tenancy)?;
    let resolver = manager.resolver(resolver)?;

    if request.route().is_none() {
        if let Resolution::Found(identifier) = resolver.resolve(request, &tenancy) {
            tenancy.identify(&identifier, resolver.name()).await?;
        }
    }

    if !tenancy.check() {
        return Err(TenantNotFound::missing(tenancy.name(), resolver.name()).into());
    }

    if let Some(identified_by) = tenancy.identified_by() {
        if identified_by != resolver.name() {
            return Err(
                TenantNotFound::invalid_resolver(tenancy.name(), resolver.name(), identified_by)
                    .into(),
            );
        }
    }

    Ok(tenancy)
}

/// Header to add to the response for header-identified routes
///
/// Returns the header name and the current tenant identifier, or `None` when
/// there is no tenant.
pub fn tenant_header(
    manager: &TenantedManager,
    tenancy: Option<&str>,
    resolver: Option<&str>,
) -> Result<Option<(String, String)>> {
    let tenancy = manager.tenancy(tenancy)?;

    let Some(identifier) = tenancy.identifier() else {
        return Ok(None);
    };

    let resolver = manager.resolver(resolver)?;
    let header = resolver
        .header_name()
        .ok_or_else(|| TenantedError::UnexpectedResolver {
            name: resolver.name().to_string(),
            expected: "header",
        })?;

    Ok(Some((header.to_string(), identifier)))
}

/// Tenant guard
///
/// Bundles the guard functions for one tenancy and resolver pair.
pub struct TenantGuard {
    manager: Arc<TenantedManager>,
    tenancy: Option<String>,
    resolver: Option<String>,
    optional: bool,
}

impl TenantGuard {
    /// Create a guard for the default tenancy and resolver
    pub fn new(manager: Arc<TenantedManager>) -> Self {
        Self {
            manager,
            tenancy: None,
            resolver: None,
            optional: false,
        }
    }

    /// Create a guard from a route marker's arguments
    pub fn for_marker(manager: Arc<TenantedManager>, marker: &MiddlewareMarker) -> Self {
        Self {
            manager,
            tenancy: marker.tenancy.clone(),
            resolver: marker.resolver.clone(),
            optional: false,
        }
    }

    /// Make the tenant optional
    ///
    /// If true, requests without a valid tenant pass with no tenancy.
    /// If false, they fail with [`TenantNotFound`].
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Run the tenanted route check
    pub async fn check(&self, request: &mut dyn RequestContext) -> Result<Option<Arc<Tenancy>>> {
        match ensure_tenanted(
            &self.manager,
            request,
            self.tenancy.as_deref(),
            self.resolver.as_deref(),
        )
        .await
        {
            Ok(tenancy) => Ok(Some(tenancy)),
            Err(TenantedError::TenantNotFound(e)) if self.optional => {
                warn!("Continuing without tenant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The response header for this guard's tenancy
    pub fn response_header(&self) -> Result<Option<(String, String)>> {
        tenant_header(
            &self.manager,
            self.tenancy.as_deref(),
            self.resolver.as_deref(),
        )
    }
}
