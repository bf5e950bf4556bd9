//! Integration tests for common Tenanted workflows.
//!
//! These tests drive a request from identification through to tenant-owned
//! entity scoping, the way a host framework would.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tenanted::{
    DriverConfig, GenericTenant, HeaderIdentityResolver, IdentityResolver, InMemoryTenantStore,
    MiddlewareMarker, ModelSchema, Record, RecordingSink, Relation, RelationshipError, Request,
    Route, RouteGroup, StoreConnections, TenantGuard, TenantKey, TenantNotFound, TenantOwned,
    TenantQuery, TenantedConfig, TenantedDatabase, TenantedError, TenantedManager,
    ensure_tenanted, on_route_matched, tenant_header,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn store() -> InMemoryTenantStore {
    InMemoryTenantStore::new()
        .with_row("tenants", json!({"id": 7, "identifier": "acme", "plan": "pro"}))
        .with_row("tenants", json!({"id": 9, "identifier": "globex", "plan": "free"}))
}

fn config() -> TenantedConfig {
    TenantedConfig::default().with_resolver(
        "subdomain",
        DriverConfig::new("subdomain").with("domain", "example.com"),
    )
}

fn manager(sink: &RecordingSink) -> TenantedManager {
    TenantedManager::builder(config())
        .with_connections(StoreConnections::new().with_default(Arc::new(store())))
        .with_events(Arc::new(sink.clone()))
        .with_subdomain_exclusion(|_host, subdomain| subdomain == "www")
        .build()
}

fn projects() -> Arc<ModelSchema> {
    Arc::new(
        ModelSchema::new("Project", "projects")
            .with_relation(Relation::belongs_to("organisation", "organisation_id"))
            .with_tenant_relation("organisation"),
    )
}

// =============================================================================
// Identification
// =============================================================================

#[tokio::test]
async fn test_subdomain_request_lifecycle() {
    init_tracing();
    let sink = RecordingSink::new();
    let manager = manager(&sink);

    let mut request = Request::new("acme.example.com:8080", "/dashboard");
    assert!(manager.identify(&mut request, None, None).await.unwrap());

    let tenancy = manager.current_tenancy().unwrap();
    assert_eq!(tenancy.name(), "primary");
    assert_eq!(tenancy.identifier().as_deref(), Some("acme"));
    assert_eq!(tenancy.key(), Some(TenantKey::Int(7)));
    assert_eq!(tenancy.identified_by().as_deref(), Some("subdomain"));
    assert_eq!(
        tenancy.tenant().and_then(|tenant| tenant.attribute("plan")),
        Some(json!("pro"))
    );
    assert_eq!(sink.names(), vec!["tenant.identified", "tenant.changed"]);

    let mut defaults = HashMap::new();
    manager.setup_url_defaults(&mut defaults).unwrap();
    assert_eq!(defaults["primary-subdomain"], "acme");
}

#[tokio::test]
async fn test_excluded_and_unknown_subdomains() {
    let sink = RecordingSink::new();
    let manager = manager(&sink);

    let mut request = Request::new("www.example.com", "/")
        .with_route(Route::new().with_parameter("primary-subdomain", "www"));
    assert!(!manager.identify(&mut request, None, None).await.unwrap());

    let mut request = Request::new("umbrella.example.com", "/");
    assert!(!manager.identify(&mut request, None, None).await.unwrap());

    let mut request = Request::new("acme.other.com", "/");
    assert!(!manager.identify(&mut request, None, None).await.unwrap());

    assert!(!manager.tenancy(None).unwrap().check());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_scoped_managers_are_isolated() {
    let sink = RecordingSink::new();
    let manager = manager(&sink);

    let first = manager.scoped();
    let second = manager.scoped();

    let mut request = Request::new("acme.example.com", "/");
    first.identify(&mut request, None, None).await.unwrap();

    let mut request = Request::new("localhost", "/").with_header("Tenant-Identifier", "globex");
    second
        .identify(&mut request, None, Some("header"))
        .await
        .unwrap();

    assert_eq!(
        first.tenancy(None).unwrap().identifier().as_deref(),
        Some("acme")
    );
    assert_eq!(
        second.tenancy(None).unwrap().identifier().as_deref(),
        Some("globex")
    );
    assert!(!manager.tenancies().is_built("primary"));

    let first_provider = first.provider(None).unwrap();
    let second_provider = second.provider(None).unwrap();
    assert!(Arc::ptr_eq(&first_provider, &second_provider));
}

#[tokio::test]
async fn test_custom_resolver_factory() {
    let sink = RecordingSink::new();
    let manager = manager(&sink);

    manager.resolvers().register("api", |_: &DriverConfig, name: &str| {
        let resolver: Arc<dyn IdentityResolver> =
            Arc::new(HeaderIdentityResolver::new(name, "X-Api-Tenant"));
        Ok(resolver)
    });

    let mut request = Request::new("localhost", "/").with_header("X-Api-Tenant", "globex");
    assert!(
        manager
            .identify(&mut request, None, Some("api"))
            .await
            .unwrap()
    );
    assert_eq!(
        manager.tenancy(None).unwrap().identified_by().as_deref(),
        Some("api")
    );

    let err = manager.resolver(Some("missing")).err().unwrap();
    assert!(matches!(err, TenantedError::NoDriver { .. }));
}

// =============================================================================
// Route Guards
// =============================================================================

#[tokio::test]
async fn test_path_routes_and_guard() {
    let sink = RecordingSink::new();
    let manager = Arc::new(manager(&sink));

    let resolver = manager.resolver(Some("path")).unwrap();
    let mut group = RouteGroup::new();
    resolver.routes("primary", &mut group);
    let marker = group.markers().next().unwrap();
    assert_eq!(marker, MiddlewareMarker::route("primary", "path"));

    let mut request = Request::new("localhost", "/acme/projects").with_route(
        group
            .middleware
            .iter()
            .fold(Route::new(), |route, marker| route.with_middleware(marker))
            .with_parameter("primary-path", "acme"),
    );

    assert!(on_route_matched(&manager, &mut request).await.unwrap());

    let guard = TenantGuard::for_marker(Arc::clone(&manager), &marker);
    let tenancy = guard.check(&mut request).await.unwrap().unwrap();
    assert_eq!(tenancy.identifier().as_deref(), Some("acme"));

    let err = ensure_tenanted(&manager, &mut request, None, Some("header"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TenantedError::TenantNotFound(TenantNotFound::InvalidResolver { .. })
    ));
}

#[tokio::test]
async fn test_header_route_echoes_identifier() {
    let sink = RecordingSink::new();
    let manager = manager(&sink);

    let mut request = Request::new("api.internal", "/").with_header("tenant-identifier", "globex");
    ensure_tenanted(&manager, &mut request, None, Some("header"))
        .await
        .unwrap();

    assert_eq!(
        tenant_header(&manager, None, Some("header")).unwrap(),
        Some(("Tenant-Identifier".to_string(), "globex".to_string()))
    );
}

// =============================================================================
// Tenant-Owned Entities
// =============================================================================

#[tokio::test]
async fn test_identified_tenant_owns_new_entities() {
    let sink = RecordingSink::new();
    let manager = Arc::new(manager(&sink));
    let database = TenantedDatabase::new(Arc::clone(&manager));

    let mut draft = Record::new(projects()).with_attribute("name", "Launch");
    let err = database.creating(&mut draft).unwrap_err();
    assert_eq!(err.tenant_not_found(), Some(&TenantNotFound::none("primary")));

    let mut request = Request::new("acme.example.com", "/");
    manager.identify(&mut request, None, None).await.unwrap();

    database.creating(&mut draft).unwrap();
    assert_eq!(draft.attribute("organisation_id"), Some(&json!(7)));

    let rows = vec![
        draft.clone().into_row(),
        Record::new(projects())
            .with_attribute("name", "Rival")
            .with_attribute("organisation_id", 9)
            .into_row(),
    ];

    let project = Record::new(projects());
    let query = database.query(&project).unwrap();
    let visible = query.filter(&rows);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].get("name"), Some(&json!("Launch")));

    let everything = database
        .scope(&project, TenantQuery::new("projects").without_tenant())
        .unwrap();
    assert_eq!(everything.filter(&rows).len(), 2);

    let mut rival = Record::from_row(projects(), rows[1].clone());
    let err = database.retrieved(&mut rival).unwrap_err();
    assert!(matches!(
        err,
        tenanted::tenanted_database::DatabaseError::Relationship(
            RelationshipError::InvalidValue { .. }
        )
    ));
}

#[tokio::test]
async fn test_switching_tenants_rescopes_queries() {
    let sink = RecordingSink::new();
    let manager = Arc::new(manager(&sink));
    let database = TenantedDatabase::new(Arc::clone(&manager));

    let tenancy = manager.tenancy(None).unwrap();
    tenancy.load(&TenantKey::Int(9)).await.unwrap();
    assert!(tenancy.was_loaded());

    let project = Record::new(projects());
    let query = database.query(&project).unwrap();
    assert_eq!(query.tenant_filter().map(|filter| &filter.key), Some(&TenantKey::Int(9)));

    tenancy.set_tenant(Some(Arc::new(GenericTenant::new(7, "acme"))));
    let query = database.query(&project).unwrap();
    assert_eq!(query.tenant_filter().map(|filter| &filter.key), Some(&TenantKey::Int(7)));

    assert_eq!(
        sink.names(),
        vec!["tenant.loaded", "tenant.changed", "tenant.changed"]
    );
}
