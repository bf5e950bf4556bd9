//! Request Context
//!
//! The view of an inbound request that identity resolvers work against. Host
//! frameworks implement [`RequestContext`] and [`MatchedRoute`] for their own
//! request types; [`Request`] and [`Route`] are plain implementations for
//! hosts without one, and for tests.

use std::collections::HashMap;

/// Inbound request
pub trait RequestContext: Send {
    /// Host name, possibly including a port
    fn host(&self) -> &str;

    /// Header value, looked up case-insensitively
    fn header(&self, name: &str) -> Option<&str>;

    /// Zero-based, non-empty path segment
    fn segment(&self, index: usize) -> Option<&str>;

    /// The matched route, if routing has happened
    fn route(&self) -> Option<&dyn MatchedRoute>;

    /// Mutable access to the matched route
    fn route_mut(&mut self) -> Option<&mut dyn MatchedRoute>;
}

/// A route matched for the current request
pub trait MatchedRoute: Send {
    /// Whether the route declares a parameter, even one with no value
    fn has_parameter(&self, name: &str) -> bool;

    /// Parameter value, `None` if absent or without a value
    fn parameter(&self, name: &str) -> Option<&str>;

    /// Remove a parameter so it is not bound as a handler argument
    fn forget_parameter(&mut self, name: &str);

    /// Middleware markers attached to the route
    fn middleware(&self) -> &[String];
}

/// Sink for default URL parameters used by reverse routing
pub trait UrlDefaults {
    /// Set a default, or clear it with `None`
    fn set_default(&mut self, name: &str, value: Option<String>);
}

impl UrlDefaults for HashMap<String, String> {
    fn set_default(&mut self, name: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.insert(name.to_string(), value);
            }
            None => {
                self.remove(name);
            }
        }
    }
}

/// Plain matched route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    parameters: HashMap<String, Option<String>>,
    middleware: Vec<String>,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with a value
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), Some(value.into()));
        self
    }

    /// Add an optional parameter that has no value
    pub fn with_empty_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), None);
        self
    }

    /// Attach a middleware marker
    pub fn with_middleware(mut self, marker: impl ToString) -> Self {
        self.middleware.push(marker.to_string());
        self
    }

    pub fn parameters(&self) -> &HashMap<String, Option<String>> {
        &self.parameters
    }
}

impl MatchedRoute for Route {
    fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(|value| value.as_deref())
    }

    fn forget_parameter(&mut self, name: &str) {
        self.parameters.remove(name);
    }

    fn middleware(&self) -> &[String] {
        &self.middleware
    }
}

/// Plain inbound request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    host: String,
    path: String,
    headers: HashMap<String, String>,
    route: Option<Route>,
}

impl Request {
    /// Create a request for a host and path
    ///
    /// # Examples
    ///
    /// ```
    /// use tenanted_core::{Request, RequestContext};
    ///
    /// let request = Request::new("acme.example.com", "/projects/42")
    ///     .with_header("Tenant-Identifier", "acme");
    ///
    /// assert_eq!(request.segment(0), Some("projects"));
    /// assert_eq!(request.header("tenant-identifier"), Some("acme"));
    /// ```
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            headers: HashMap::new(),
            route: None,
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_lowercase(), value.into());
        self
    }

    /// Set the matched route
    pub fn with_route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The matched route, as the concrete type
    pub fn matched(&self) -> Option<&Route> {
        self.route.as_ref()
    }
}

impl RequestContext for Request {
    fn host(&self) -> &str {
        &self.host
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    fn segment(&self, index: usize) -> Option<&str> {
        self.path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .nth(index)
    }

    fn route(&self) -> Option<&dyn MatchedRoute> {
        self.route.as_ref().map(|route| route as &dyn MatchedRoute)
    }

    fn route_mut(&mut self) -> Option<&mut dyn MatchedRoute> {
        self.route
            .as_mut()
            .map(|route| route as &mut dyn MatchedRoute)
    }
}
