//! Cached view behavior over the public API and the axum router

use apidoc::{
    cache::{CacheBackend, MemoryBackend},
    inspector::{Inspection, InspectionContext, RouteInspector},
    renderer::Presentation,
    route::{FieldKind, FieldShape, RouteCatalog, RouteEntry},
    view::{RequestContext, SchemaViewFactory, ViewConfig},
    ApiDocError, ApiDocResult, DocumentConfig, SchemaGenerator,
};
use axum::{
    body::Body,
    http::{header, HeaderName, Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tower::ServiceExt;

/// Counts inspected routes without handling any of them
struct CountingInspector {
    calls: Arc<AtomicUsize>,
}

impl RouteInspector for CountingInspector {
    fn name(&self) -> &str {
        "counting"
    }

    fn interpret(
        &self,
        _route: &RouteEntry,
        _ctx: &mut InspectionContext<'_>,
    ) -> ApiDocResult<Inspection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Inspection::Skip("observer".to_string()))
    }
}

struct Fixture {
    calls: Arc<AtomicUsize>,
    cache: Arc<MemoryBackend>,
    factory: SchemaViewFactory,
}

fn catalog() -> RouteCatalog {
    RouteCatalog::new(vec![
        RouteEntry::get("/items").with_response_body(FieldShape::string()),
        RouteEntry::get("/admin/stats").internal(),
    ])
}

fn fixture(config: ViewConfig) -> Fixture {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(MemoryBackend::new());
    let generator = SchemaGenerator::new(DocumentConfig::new("Items", "1.0.0")).with_inspector(
        Arc::new(CountingInspector {
            calls: Arc::clone(&calls),
        }),
    );
    let factory = SchemaViewFactory::new(
        generator,
        catalog(),
        config.with_cache(cache.clone() as Arc<dyn CacheBackend>),
    );
    Fixture {
        calls,
        cache,
        factory,
    }
}

#[tokio::test]
async fn test_rejected_request_never_reaches_cache_or_generator() {
    let fx = fixture(
        ViewConfig::new("docs")
            .with_permission(|_: &RequestContext| -> ApiDocResult<()> {
                Err(ApiDocError::unauthorized("login required"))
            }),
    );
    let view = fx.factory.without_ui();

    let err = view
        .handle(&RequestContext::get("/openapi.json"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiDocError::PermissionDenied {
            status: StatusCode::UNAUTHORIZED,
            ..
        }
    ));

    let response = view.respond(&RequestContext::get("/openapi")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    let stats = fx.cache.stats().await.unwrap();
    assert_eq!(stats.hits + stats.misses, 0);
    assert_eq!(stats.documents, 0);
}

#[tokio::test]
async fn test_cached_bytes_match_uncached_output() {
    let fx = fixture(ViewConfig::new("docs"));
    let view = fx.factory.without_ui();
    let request = RequestContext::get("/openapi.json");

    let first = view.handle(&request).await.unwrap();
    let second = view.handle(&request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.content_type, "application/json");
    // one generation run over the single public route
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

    let uncached = SchemaViewFactory::new(
        SchemaGenerator::new(DocumentConfig::new("Items", "1.0.0")),
        catalog(),
        ViewConfig::new("docs").without_cache(),
    )
    .without_ui()
    .handle(&request)
    .await
    .unwrap();
    assert_eq!(uncached.body, first.body);

    let stats = fx.cache.stats().await.unwrap();
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn test_suffix_and_accept_header_yield_same_payload() {
    let fx = fixture(ViewConfig::new("docs"));
    let view = fx.factory.without_ui();

    let by_suffix = view
        .handle(&RequestContext::get("/openapi.yaml"))
        .await
        .unwrap();
    let by_accept = view
        .handle(&RequestContext::get("/openapi").with_header(header::ACCEPT, "application/yaml"))
        .await
        .unwrap();
    let by_query = view
        .handle(&RequestContext::get("/openapi?format=yaml"))
        .await
        .unwrap();

    assert_eq!(by_suffix.content_type, "application/yaml");
    assert_eq!(by_suffix.body, by_accept.body);
    assert_eq!(by_suffix.body, by_query.body);
}

#[tokio::test]
async fn test_unsupported_media_type_is_not_acceptable() {
    let fx = fixture(ViewConfig::new("docs"));
    let view = fx.factory.without_ui();

    let request = RequestContext::get("/openapi").with_header(header::ACCEPT, "text/csv");
    assert!(matches!(
        view.handle(&request).await,
        Err(ApiDocError::Negotiation(_))
    ));

    let response = view.respond(&request).await;
    assert_eq!(response.status, StatusCode::NOT_ACCEPTABLE);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"]["code"], "NOT_ACCEPTABLE");

    // raw views do not serve HTML
    let html = RequestContext::get("/openapi").with_header(header::ACCEPT, "text/html");
    assert!(view.handle(&html).await.is_err());
}

#[tokio::test]
async fn test_ui_view_embeds_raw_document_url() {
    let fx = fixture(ViewConfig::new("docs"));
    let swagger = fx.factory.with_ui(Presentation::SwaggerUi);

    let page = swagger
        .handle(&RequestContext::get("/docs").with_header(header::ACCEPT, "text/html,*/*;q=0.8"))
        .await
        .unwrap();
    assert!(page.content_type.starts_with("text/html"));
    let html = String::from_utf8(page.body.to_vec()).unwrap();
    assert!(html.contains("/docs?format=openapi"));

    // the raw document is still reachable from the UI view
    let raw = swagger
        .handle(&RequestContext::get("/docs?format=openapi"))
        .await
        .unwrap();
    assert_eq!(raw.content_type, "application/json");

    let redoc = fx
        .factory
        .with_ui(Presentation::Redoc)
        .handle(&RequestContext::get("/docs"))
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&redoc.body).contains("redoc"));
    assert_ne!(redoc.body, page.body);
}

#[tokio::test]
async fn test_invalidate_forces_regeneration() {
    let fx = fixture(ViewConfig::new("docs"));
    let view = fx.factory.without_ui();
    let request = RequestContext::get("/openapi.json");

    view.handle(&request).await.unwrap();
    view.handle(&request).await.unwrap();
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

    // one rendered document and one graph
    assert_eq!(fx.factory.invalidate().await.unwrap(), 2);

    view.handle(&request).await.unwrap();
    assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_public_predicate_selects_document() {
    let staff = HeaderName::from_static("x-staff");
    let fx = fixture(
        ViewConfig::new("docs").with_public_predicate(|request: &RequestContext| {
            request.header("x-staff").is_none()
        }),
    );
    let view = fx.factory.without_ui();

    let public = view
        .handle(&RequestContext::get("/openapi.json"))
        .await
        .unwrap();
    let private = view
        .handle(&RequestContext::get("/openapi.json").with_header(staff, "1"))
        .await
        .unwrap();

    let public: serde_json::Value = serde_json::from_slice(&public.body).unwrap();
    let private: serde_json::Value = serde_json::from_slice(&private.body).unwrap();
    assert!(public["paths"].get("/admin/stats").is_none());
    assert!(private["paths"].get("/admin/stats").is_some());
    assert!(private["components"]["securitySchemes"]
        .get("bearerAuth")
        .is_some());
}

#[tokio::test]
async fn test_cached_callable_serves_raw_document() {
    let fx = fixture(ViewConfig::new("docs"));
    let handler = fx.factory.as_cached_callable();

    let response = handler(RequestContext::get("/openapi")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type, "application/json");

    let again = handler(RequestContext::get("/openapi")).await;
    assert_eq!(again.body, response.body);
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_router_serves_suffixed_paths() {
    let fx = fixture(ViewConfig::new("docs"));
    let app = fx.factory.without_ui().router("/openapi/");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/openapi.yaml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/yaml"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("openapi: 3.0.3"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi")
                .header(header::ACCEPT, "image/png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_router_rejects_before_generation() {
    let fx = fixture(
        ViewConfig::new("docs")
            .with_permission(|_: &RequestContext| -> ApiDocResult<()> {
                Err(ApiDocError::forbidden("staff only"))
            }),
    );
    let app = fx.factory.without_ui().router("/openapi");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["message"], "staff only");
    assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
}

fn on_host(host: &str) -> RequestContext {
    RequestContext::get("/openapi.json").with_header(header::HOST, host)
}

#[tokio::test]
async fn test_server_url_follows_each_host() {
    let fx = fixture(ViewConfig::new("docs"));
    let view = fx.factory.without_ui();

    let tenant_a = view.handle(&on_host("tenant-a.example.com")).await.unwrap();
    let tenant_b = view.handle(&on_host("tenant-b.example.com")).await.unwrap();

    let tenant_a: serde_json::Value = serde_json::from_slice(&tenant_a.body).unwrap();
    let tenant_b: serde_json::Value = serde_json::from_slice(&tenant_b.body).unwrap();
    assert_eq!(tenant_a["servers"][0]["url"], "http://tenant-a.example.com");
    assert_eq!(tenant_b["servers"][0]["url"], "http://tenant-b.example.com");
    assert_eq!(fx.calls.load(Ordering::SeqCst), 2);

    // the same host is still served from the cache
    let again = view.handle(&on_host("tenant-b.example.com")).await.unwrap();
    let again: serde_json::Value = serde_json::from_slice(&again.body).unwrap();
    assert_eq!(again, tenant_b);
    assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ui_page_points_at_its_own_mount() {
    let fx = fixture(ViewConfig::new("docs"));
    let swagger = fx.factory.with_ui(Presentation::SwaggerUi);

    let public_docs = swagger.handle(&RequestContext::get("/docs")).await.unwrap();
    let staff_docs = swagger
        .handle(&RequestContext::get("/staff/docs"))
        .await
        .unwrap();

    let public_page = String::from_utf8_lossy(&public_docs.body);
    assert!(public_page.contains("/docs?format=openapi"));
    assert!(!public_page.contains("/staff/docs"));
    assert!(String::from_utf8_lossy(&staff_docs.body).contains("/staff/docs?format=openapi"));
    // both pages share one generated graph
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_generation_failure_is_a_structured_server_error() {
    let cache = Arc::new(MemoryBackend::new());
    let factory = SchemaViewFactory::new(
        SchemaGenerator::new(DocumentConfig::new("Orders", "1.0.0")),
        RouteCatalog::new(vec![
            RouteEntry::get("/orders").with_response_body(FieldShape::named("Order")),
        ]),
        ViewConfig::new("orders").with_cache(cache.clone() as Arc<dyn CacheBackend>),
    );
    let view = factory.without_ui();
    let request = RequestContext::get("/openapi.json");

    assert!(matches!(
        view.handle(&request).await,
        Err(ApiDocError::GenerationConsistency(_))
    ));

    let response = view.respond(&request).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"]["code"], "GENERATION_CONSISTENCY_ERROR");
    assert!(body["error"]["message"].is_string());

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.documents, 0);
    assert_eq!(stats.graphs, 0);
}

#[tokio::test]
async fn test_encoding_failure_leaves_other_formats_served() {
    let cache = Arc::new(MemoryBackend::new());
    let unbounded = FieldShape::new(FieldKind::Number {
        minimum: None,
        maximum: Some(f64::INFINITY),
    });
    let factory = SchemaViewFactory::new(
        SchemaGenerator::new(DocumentConfig::new("Metrics", "1.0.0")),
        RouteCatalog::new(vec![RouteEntry::get("/ratio").with_response_body(unbounded)]),
        ViewConfig::new("metrics").with_cache(cache.clone() as Arc<dyn CacheBackend>),
    );
    let view = factory.without_ui();

    let json = view.respond(&RequestContext::get("/openapi.json")).await;
    assert_eq!(json.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_slice(&json.body).unwrap();
    assert_eq!(body["error"]["code"], "ENCODING_ERROR");
    assert_eq!(cache.stats().await.unwrap().documents, 0);

    let yaml = view.respond(&RequestContext::get("/openapi.yaml")).await;
    assert_eq!(yaml.status, StatusCode::OK);
    assert_eq!(yaml.content_type, "application/yaml");
    assert_eq!(cache.stats().await.unwrap().documents, 1);

    // the failure is not cached and repeats
    let again = view.respond(&RequestContext::get("/openapi.json")).await;
    assert_eq!(again.status, StatusCode::INTERNAL_SERVER_ERROR);
}
