//! Identity Resolution
//!
//! Strategies for extracting a tenant identifier from a request.
//!
//! A resolver answers with a three-valued [`Resolution`]: an identifier, a
//! marker that the request doesn't carry what the resolver looks for, or a
//! marker that it did but the value was rejected.

use crate::config::DriverConfig;
use crate::error::{Result, TenantedError};
use crate::registry::{Registry, RegistryKind};
use crate::request::{RequestContext, UrlDefaults};
use crate::routing::{MiddlewareMarker, RouteRegistrar};
use crate::tenancy::Tenancy;
use crate::tenant::SharedTenant;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registry of identity resolvers
pub type ResolverRegistry = Registry<dyn IdentityResolver>;

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Outcome of a resolution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An identifier was found
    Found(String),

    /// The request doesn't carry an identifier for this resolver at all
    NotPresent,

    /// The identifier was there but excluded or invalid
    Rejected,
}

impl Resolution {
    /// The identifier, if one was found
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Found(identifier) => Some(identifier),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Identity resolver trait
pub trait IdentityResolver: fmt::Debug + Send + Sync {
    /// Resolver name
    fn name(&self) -> &str;

    /// Extract an identifier from the request for a tenancy
    fn resolve(&self, request: &mut dyn RequestContext, tenancy: &Tenancy) -> Resolution;

    /// Prime defaults used by reverse routing
    fn setup(
        &self,
        tenancy: &Tenancy,
        tenant: Option<&SharedTenant>,
        defaults: &mut dyn UrlDefaults,
    );

    /// Describe how routes using this resolver are registered
    fn routes(&self, tenancy: &str, registrar: &mut dyn RouteRegistrar) {
        registrar.middleware(MiddlewareMarker::route(tenancy, self.name()).to_string());
    }

    /// Header name, for header-based resolvers
    fn header_name(&self) -> Option<&str> {
        None
    }
}

/// Predicate deciding whether a subdomain identifier must be rejected
///
/// Called with the request host and the candidate identifier.
pub type ExclusionPredicate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Route parameter name carrying the identifier for a tenancy and resolver
///
/// # Examples
///
/// ```
/// use tenanted_core::parameter_name;
///
/// assert_eq!(parameter_name("primary", "path"), "primary-path");
/// assert_eq!(parameter_name("Main Tenancy", "sub_domain"), "main-tenancy-sub-domain");
/// ```
pub fn parameter_name(tenancy: &str, resolver: &str) -> String {
    let name = format!("{}_{}", tenancy, resolver).to_lowercase();
    NON_SLUG.replace_all(&name, "-").trim_matches('-').to_string()
}

/// Read and forget the identifier parameter on the matched route
fn resolve_parameter(
    request: &mut dyn RequestContext,
    tenancy: &str,
    resolver: &str,
) -> Resolution {
    let Some(route) = request.route_mut() else {
        return Resolution::Rejected;
    };

    let parameter = parameter_name(tenancy, resolver);

    if !route.has_parameter(&parameter) {
        return Resolution::Rejected;
    }

    let identifier = route.parameter(&parameter).map(str::to_string);
    route.forget_parameter(&parameter);

    match identifier {
        Some(identifier) => Resolution::Found(identifier),
        None => Resolution::NotPresent,
    }
}

fn set_parameter_default(
    tenancy: &Tenancy,
    resolver: &str,
    tenant: Option<&SharedTenant>,
    defaults: &mut dyn UrlDefaults,
) {
    defaults.set_default(
        &parameter_name(tenancy.name(), resolver),
        tenant.map(|tenant| tenant.identifier().to_string()),
    );
}

/// Header resolver
///
/// Reads the identifier from a fixed request header.
#[derive(Debug, Clone)]
pub struct HeaderIdentityResolver {
    name: String,
    header: String,
}

impl HeaderIdentityResolver {
    pub fn new(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header: header.into(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }
}

impl IdentityResolver for HeaderIdentityResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, request: &mut dyn RequestContext, _tenancy: &Tenancy) -> Resolution {
        match request.header(&self.header) {
            Some(identifier) => Resolution::Found(identifier.to_string()),
            None => Resolution::Rejected,
        }
    }

    fn setup(
        &self,
        _tenancy: &Tenancy,
        _tenant: Option<&SharedTenant>,
        _defaults: &mut dyn UrlDefaults,
    ) {
    }

    fn routes(&self, tenancy: &str, registrar: &mut dyn RouteRegistrar) {
        registrar.middleware(MiddlewareMarker::route(tenancy, &self.name).to_string());
        registrar.middleware(MiddlewareMarker::header(tenancy, &self.name).to_string());
    }

    fn header_name(&self) -> Option<&str> {
        Some(&self.header)
    }
}

/// Path resolver
///
/// Uses the `{<tenancy>-<resolver>}` route parameter when a route is matched,
/// otherwise a fixed zero-based path segment.
#[derive(Debug, Clone)]
pub struct PathIdentityResolver {
    name: String,
    segment: usize,
}

impl PathIdentityResolver {
    pub fn new(name: impl Into<String>, segment: usize) -> Self {
        Self {
            name: name.into(),
            segment,
        }
    }

    pub fn segment(&self) -> usize {
        self.segment
    }
}

impl IdentityResolver for PathIdentityResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, request: &mut dyn RequestContext, tenancy: &Tenancy) -> Resolution {
        if request.route().is_some() {
            return resolve_parameter(request, tenancy.name(), &self.name);
        }

        match request.segment(self.segment) {
            Some(identifier) => Resolution::Found(identifier.to_string()),
            None => Resolution::NotPresent,
        }
    }

    fn setup(
        &self,
        tenancy: &Tenancy,
        tenant: Option<&SharedTenant>,
        defaults: &mut dyn UrlDefaults,
    ) {
        set_parameter_default(tenancy, &self.name, tenant, defaults);
    }

    fn routes(&self, tenancy: &str, registrar: &mut dyn RouteRegistrar) {
        registrar.middleware(MiddlewareMarker::route(tenancy, &self.name).to_string());
        registrar.prefix(format!("{{{}}}", parameter_name(tenancy, &self.name)));
        registrar.fallback();
    }
}

/// Subdomain resolver
///
/// Uses the `{<tenancy>-<resolver>}` domain parameter when a route is
/// matched, otherwise strips `.<domain>` from the request host.
#[derive(Clone)]
pub struct SubdomainIdentityResolver {
    name: String,
    domain: String,
    exclude: Option<ExclusionPredicate>,
}

impl SubdomainIdentityResolver {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            exclude: None,
        }
    }

    /// Reject identifiers matching a predicate, e.g. reserved subdomains
    pub fn with_exclusion(mut self, predicate: ExclusionPredicate) -> Self {
        self.exclude = Some(predicate);
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn excluded(&self, host: &str, identifier: &str) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|exclude| exclude(host, identifier))
    }
}

impl IdentityResolver for SubdomainIdentityResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, request: &mut dyn RequestContext, tenancy: &Tenancy) -> Resolution {
        let host = request.host().to_string();

        if request.route().is_some() {
            return match resolve_parameter(request, tenancy.name(), &self.name) {
                Resolution::Found(identifier) if self.excluded(&host, &identifier) => {
                    debug!(resolver = %self.name, %host, %identifier, "Subdomain excluded");
                    Resolution::Rejected
                }
                resolution => resolution,
            };
        }

        let host = host.split(':').next().unwrap_or_default();

        match host.strip_suffix(&format!(".{}", self.domain)) {
            Some(identifier) if !identifier.is_empty() => Resolution::Found(identifier.to_string()),
            _ => Resolution::Rejected,
        }
    }

    fn setup(
        &self,
        tenancy: &Tenancy,
        tenant: Option<&SharedTenant>,
        defaults: &mut dyn UrlDefaults,
    ) {
        set_parameter_default(tenancy, &self.name, tenant, defaults);
    }

    fn routes(&self, tenancy: &str, registrar: &mut dyn RouteRegistrar) {
        let parameter = parameter_name(tenancy, &self.name);

        registrar.middleware(MiddlewareMarker::route(tenancy, &self.name).to_string());
        registrar.domain(format!("{{{}}}.{}", parameter, self.domain));
        registrar.pattern(parameter, ".*".to_string());
        registrar.fallback();
    }
}

impl fmt::Debug for SubdomainIdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubdomainIdentityResolver")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("exclude", &self.exclude.is_some())
            .finish()
    }
}

fn required<'a>(config: &'a DriverConfig, name: &str, key: &str) -> Result<&'a str> {
    config
        .get_str(key)
        .ok_or_else(|| TenantedError::MissingConfig {
            kind: RegistryKind::Resolver,
            name: name.to_string(),
            key: key.to_string(),
        })
}

/// Build the resolver registry with the `header`, `path` and `subdomain`
/// drivers
pub fn resolver_registry(
    configs: HashMap<String, DriverConfig>,
    default: Option<String>,
    exclusion: Option<ExclusionPredicate>,
) -> ResolverRegistry {
    Registry::new(RegistryKind::Resolver, configs, default)
        .with_builtin("header", |config: &DriverConfig, name: &str| {
            let resolver: Arc<dyn IdentityResolver> =
                Arc::new(HeaderIdentityResolver::new(name, required(config, name, "header")?));
            Ok(resolver)
        })
        .with_builtin("path", |config: &DriverConfig, name: &str| {
            let segment = config.get_i64("segment").unwrap_or(0).max(0);
            let resolver: Arc<dyn IdentityResolver> = Arc::new(PathIdentityResolver::new(
                name,
                usize::try_from(segment).unwrap_or_default(),
            ));
            Ok(resolver)
        })
        .with_builtin("subdomain", move |config: &DriverConfig, name: &str| {
            let mut resolver =
                SubdomainIdentityResolver::new(name, required(config, name, "domain")?);

            if let Some(exclusion) = &exclusion {
                resolver = resolver.with_exclusion(Arc::clone(exclusion));
            }

            let resolver: Arc<dyn IdentityResolver> = Arc::new(resolver);
            Ok(resolver)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::provider::DatabaseTenantProvider;
    use crate::request::{MatchedRoute, Request, Route};
    use crate::routing::RouteGroup;
    use crate::store::InMemoryTenantStore;
    use crate::tenant::GenericTenant;

    fn tenancy() -> Tenancy {
        let provider =
            DatabaseTenantProvider::new("tenants", Arc::new(InMemoryTenantStore::new()), "tenants");
        Tenancy::new("primary", Arc::new(provider), Arc::new(NullSink))
    }

    fn reserved() -> ExclusionPredicate {
        Arc::new(|_host: &str, identifier: &str| identifier == "www")
    }

    #[test]
    fn test_parameter_name() {
        assert_eq!(parameter_name("primary", "subdomain"), "primary-subdomain");
        assert_eq!(parameter_name("-Edge--", "__x__"), "edge-x");
    }

    #[test]
    fn test_header_resolver() {
        let resolver = HeaderIdentityResolver::new("header", "Tenant-Identifier");
        let tenancy = tenancy();

        let mut request =
            Request::new("example.com", "/").with_header("Tenant-Identifier", "acme");
        assert_eq!(
            resolver.resolve(&mut request, &tenancy),
            Resolution::Found("acme".to_string())
        );

        let mut request = Request::new("example.com", "/");
        assert_eq!(resolver.resolve(&mut request, &tenancy), Resolution::Rejected);
        assert_eq!(resolver.header_name(), Some("Tenant-Identifier"));
    }

    #[test]
    fn test_path_resolver_routeless() {
        let resolver = PathIdentityResolver::new("path", 0);
        let tenancy = tenancy();

        let mut request = Request::new("example.com", "/acme/dashboard");
        assert_eq!(
            resolver.resolve(&mut request, &tenancy),
            Resolution::Found("acme".to_string())
        );

        let mut request = Request::new("example.com", "/");
        assert_eq!(resolver.resolve(&mut request, &tenancy), Resolution::NotPresent);

        let resolver = PathIdentityResolver::new("path", 1);
        let mut request = Request::new("example.com", "/acme/dashboard");
        assert_eq!(
            resolver.resolve(&mut request, &tenancy),
            Resolution::Found("dashboard".to_string())
        );
    }

    #[test]
    fn test_path_resolver_with_route() {
        let resolver = PathIdentityResolver::new("path", 0);
        let tenancy = tenancy();

        let mut request = Request::new("example.com", "/acme/dashboard").with_route(
            Route::new()
                .with_parameter("primary-path", "acme")
                .with_parameter("page", "dashboard"),
        );
        assert_eq!(
            resolver.resolve(&mut request, &tenancy),
            Resolution::Found("acme".to_string())
        );

        let route = request.matched().unwrap();
        assert!(!route.has_parameter("primary-path"));
        assert!(route.has_parameter("page"));
    }

    #[test]
    fn test_parameter_missing_or_empty() {
        let resolver = PathIdentityResolver::new("path", 0);
        let tenancy = tenancy();

        let mut request =
            Request::new("example.com", "/acme").with_route(Route::new().with_parameter("page", "x"));
        assert_eq!(resolver.resolve(&mut request, &tenancy), Resolution::Rejected);

        let mut request = Request::new("example.com", "/")
            .with_route(Route::new().with_empty_parameter("primary-path"));
        assert_eq!(resolver.resolve(&mut request, &tenancy), Resolution::NotPresent);
        assert!(!request.matched().unwrap().has_parameter("primary-path"));
    }

    #[test]
    fn test_subdomain_resolver_routeless() {
        let resolver = SubdomainIdentityResolver::new("subdomain", "example.com");
        let tenancy = tenancy();

        let mut request = Request::new("acme.example.com", "/");
        assert_eq!(
            resolver.resolve(&mut request, &tenancy),
            Resolution::Found("acme".to_string())
        );

        let mut request = Request::new("acme.example.com:8080", "/");
        assert_eq!(
            resolver.resolve(&mut request, &tenancy),
            Resolution::Found("acme".to_string())
        );

        let mut request = Request::new("example.com", "/");
        assert_eq!(resolver.resolve(&mut request, &tenancy), Resolution::Rejected);

        let mut request = Request::new("acme.other.com", "/");
        assert_eq!(resolver.resolve(&mut request, &tenancy), Resolution::Rejected);
    }

    #[test]
    fn test_subdomain_resolver_with_route() {
        let resolver =
            SubdomainIdentityResolver::new("subdomain", "example.com").with_exclusion(reserved());
        let tenancy = tenancy();

        let mut request = Request::new("acme.example.com", "/")
            .with_route(Route::new().with_parameter("primary-subdomain", "acme"));
        assert_eq!(
            resolver.resolve(&mut request, &tenancy),
            Resolution::Found("acme".to_string())
        );

        let mut request = Request::new("www.example.com", "/")
            .with_route(Route::new().with_parameter("primary-subdomain", "www"));
        assert_eq!(resolver.resolve(&mut request, &tenancy), Resolution::Rejected);
        assert!(!request.matched().unwrap().has_parameter("primary-subdomain"));
    }

    #[test]
    fn test_setup_sets_url_defaults() {
        let tenancy = tenancy();
        let tenant: SharedTenant = Arc::new(GenericTenant::new(7, "acme"));
        let mut defaults = HashMap::new();

        PathIdentityResolver::new("path", 0).setup(&tenancy, Some(&tenant), &mut defaults);
        assert_eq!(defaults["primary-path"], "acme");

        HeaderIdentityResolver::new("header", "Tenant-Identifier").setup(
            &tenancy,
            Some(&tenant),
            &mut defaults,
        );
        assert_eq!(defaults.len(), 1);

        PathIdentityResolver::new("path", 0).setup(&tenancy, None, &mut defaults);
        assert!(defaults.is_empty());
    }

    #[test]
    fn test_route_groups() {
        let mut group = RouteGroup::new();
        HeaderIdentityResolver::new("header", "Tenant-Identifier").routes("primary", &mut group);
        assert_eq!(
            group.middleware,
            vec![
                "tenanted.route:primary,header".to_string(),
                "tenanted.header:primary,header".to_string()
            ]
        );
        assert!(!group.fallback);

        let mut group = RouteGroup::new();
        PathIdentityResolver::new("path", 0).routes("primary", &mut group);
        assert_eq!(group.prefix.as_deref(), Some("{primary-path}"));
        assert!(group.fallback);

        let mut group = RouteGroup::new();
        SubdomainIdentityResolver::new("subdomain", "example.com").routes("primary", &mut group);
        assert_eq!(
            group.domain.as_deref(),
            Some("{primary-subdomain}.example.com")
        );
        assert_eq!(group.patterns["primary-subdomain"], ".*");
        assert!(group.fallback);
    }

    #[test]
    fn test_registry_drivers() {
        let mut configs = HashMap::new();
        configs.insert(
            "header".to_string(),
            DriverConfig::new("header").with("header", "X-Tenant"),
        );
        configs.insert("path".to_string(), DriverConfig::new("path").with("segment", -3));
        configs.insert(
            "subdomain".to_string(),
            DriverConfig::new("subdomain").with("domain", "example.com"),
        );
        configs.insert("no-domain".to_string(), DriverConfig::new("subdomain"));
        configs.insert("no-header".to_string(), DriverConfig::new("header"));

        let registry = resolver_registry(configs, Some("header".to_string()), Some(reserved()));
        let tenancy = tenancy();

        assert_eq!(registry.get(None).unwrap().header_name(), Some("X-Tenant"));

        let mut request = Request::new("example.com", "/acme/x");
        assert_eq!(
            registry.get(Some("path")).unwrap().resolve(&mut request, &tenancy),
            Resolution::Found("acme".to_string())
        );

        let mut request = Request::new("www.example.com", "/")
            .with_route(Route::new().with_parameter("primary-subdomain", "www"));
        assert_eq!(
            registry.get(Some("subdomain")).unwrap().resolve(&mut request, &tenancy),
            Resolution::Rejected
        );

        let err = registry.get(Some("no-domain")).unwrap_err();
        assert!(matches!(err, TenantedError::MissingConfig { ref key, .. } if key == "domain"));

        let err = registry.get(Some("no-header")).unwrap_err();
        assert!(matches!(err, TenantedError::MissingConfig { ref key, .. } if key == "header"));
    }
}
