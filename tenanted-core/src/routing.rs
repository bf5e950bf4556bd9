//! Route Registration
//!
//! Resolvers describe how tenanted routes must be registered through the
//! [`RouteRegistrar`] trait, so any router can consume the description.

use std::collections::HashMap;
use std::fmt;

/// Marker alias for routes that require an identified tenant
pub const TENANTED_ROUTE: &str = "tenanted.route";

/// Marker alias for routes that echo the tenant identifier in a header
pub const TENANT_HEADER: &str = "tenanted.header";

/// Which marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Route,
    Header,
}

impl MarkerKind {
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Route => TENANTED_ROUTE,
            Self::Header => TENANT_HEADER,
        }
    }
}

/// A middleware marker of the form `<alias>:<tenancy>,<resolver>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareMarker {
    pub kind: MarkerKind,
    pub tenancy: Option<String>,
    pub resolver: Option<String>,
}

impl MiddlewareMarker {
    /// `tenanted.route` marker
    pub fn route(tenancy: impl Into<String>, resolver: impl Into<String>) -> Self {
        Self {
            kind: MarkerKind::Route,
            tenancy: Some(tenancy.into()),
            resolver: Some(resolver.into()),
        }
    }

    /// `tenanted.header` marker
    pub fn header(tenancy: impl Into<String>, resolver: impl Into<String>) -> Self {
        Self {
            kind: MarkerKind::Header,
            tenancy: Some(tenancy.into()),
            resolver: Some(resolver.into()),
        }
    }

    /// Parse a marker, returning `None` for unrelated middleware
    ///
    /// # Examples
    ///
    /// ```
    /// use tenanted_core::{MarkerKind, MiddlewareMarker};
    ///
    /// let marker = MiddlewareMarker::parse("tenanted.route:primary,path").unwrap();
    /// assert_eq!(marker.kind, MarkerKind::Route);
    /// assert_eq!(marker.resolver.as_deref(), Some("path"));
    ///
    /// assert!(MiddlewareMarker::parse("auth").is_none());
    /// ```
    pub fn parse(marker: &str) -> Option<Self> {
        let (alias, arguments) = match marker.split_once(':') {
            Some((alias, arguments)) => (alias, Some(arguments)),
            None => (marker, None),
        };

        let kind = match alias {
            TENANTED_ROUTE => MarkerKind::Route,
            TENANT_HEADER => MarkerKind::Header,
            _ => return None,
        };

        let mut arguments = arguments
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .map(|argument| (!argument.is_empty()).then(|| argument.to_string()));

        Some(Self {
            kind,
            tenancy: arguments.next().flatten(),
            resolver: arguments.next().flatten(),
        })
    }
}

impl fmt::Display for MiddlewareMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.alias())?;

        if self.tenancy.is_some() || self.resolver.is_some() {
            write!(
                f,
                ":{},{}",
                self.tenancy.as_deref().unwrap_or_default(),
                self.resolver.as_deref().unwrap_or_default()
            )?;
        }

        Ok(())
    }
}

/// Route registration abstraction
pub trait RouteRegistrar {
    /// Attach a middleware marker
    fn middleware(&mut self, marker: String);

    /// Group routes under a path prefix
    fn prefix(&mut self, prefix: String);

    /// Group routes under a domain pattern
    fn domain(&mut self, domain: String);

    /// Constrain a route parameter with a pattern
    fn pattern(&mut self, parameter: String, pattern: String);

    /// Add a catch-all route that answers not found
    fn fallback(&mut self);
}

/// Description of a tenanted route group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGroup {
    pub middleware: Vec<String>,
    pub prefix: Option<String>,
    pub domain: Option<String>,
    pub patterns: HashMap<String, String>,
    pub fallback: bool,
}

impl RouteGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed tenanted markers in this group
    pub fn markers(&self) -> impl Iterator<Item = MiddlewareMarker> + '_ {
        self.middleware
            .iter()
            .filter_map(|marker| MiddlewareMarker::parse(marker))
    }
}

impl RouteRegistrar for RouteGroup {
    fn middleware(&mut self, marker: String) {
        self.middleware.push(marker);
    }

    fn prefix(&mut self, prefix: String) {
        self.prefix = Some(prefix);
    }

    fn domain(&mut self, domain: String) {
        self.domain = Some(domain);
    }

    fn pattern(&mut self, parameter: String, pattern: String) {
        self.patterns.insert(parameter, pattern);
    }

    fn fallback(&mut self) {
        self.fallback = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_display() {
        assert_eq!(
            MiddlewareMarker::route("primary", "path").to_string(),
            "tenanted.route:primary,path"
        );
        assert_eq!(
            MiddlewareMarker::header("primary", "header").to_string(),
            "tenanted.header:primary,header"
        );
    }

    #[test]
    fn test_marker_parse() {
        let marker = MiddlewareMarker::parse("tenanted.header:primary,header").unwrap();
        assert_eq!(marker, MiddlewareMarker::header("primary", "header"));

        let bare = MiddlewareMarker::parse("tenanted.route").unwrap();
        assert_eq!(bare.tenancy, None);
        assert_eq!(bare.resolver, None);
        assert_eq!(bare.to_string(), "tenanted.route");

        let tenancy_only = MiddlewareMarker::parse("tenanted.route:primary").unwrap();
        assert_eq!(tenancy_only.tenancy.as_deref(), Some("primary"));
        assert_eq!(tenancy_only.resolver, None);

        assert!(MiddlewareMarker::parse("tenanted.routes:primary,path").is_none());
        assert!(MiddlewareMarker::parse("throttle:60,1").is_none());
    }

    #[test]
    fn test_route_group_markers() {
        let mut group = RouteGroup::new();
        group.middleware("auth".to_string());
        group.middleware(MiddlewareMarker::route("primary", "path").to_string());
        group.fallback();

        let markers: Vec<_> = group.markers().collect();
        assert_eq!(markers, vec![MiddlewareMarker::route("primary", "path")]);
        assert!(group.fallback);
    }
}
