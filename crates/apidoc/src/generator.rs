use crate::{
    config::DocumentConfig,
    consistency::check_consistency,
    error::{ApiDocError, ApiDocResult},
    inspector::{
        DefaultRouteInspector, DocumentHook, Inspection, InspectionContext, RequestServerHook,
        RouteInspector,
    },
    route::{RouteCatalog, RouteEntry},
    schema::{ComponentRegistry, FieldInspector, SchemaBuilder},
    specification::{Components, Operation, SchemaGraph},
    view::RequestContext,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Builds a [`SchemaGraph`] from a route catalog
#[derive(Clone)]
pub struct SchemaGenerator {
    config: DocumentConfig,
    /// Application inspectors, tried before the default one
    inspectors: Vec<Arc<dyn RouteInspector>>,
    default_inspector: Option<Arc<dyn RouteInspector>>,
    schemas: SchemaBuilder,
    hooks: Vec<Arc<dyn DocumentHook>>,
}

impl SchemaGenerator {
    /// Create a generator with the default route inspector and the
    /// request server hook
    pub fn new(config: DocumentConfig) -> Self {
        let schemas = SchemaBuilder::new(config.nullable_optional);
        Self {
            config,
            inspectors: Vec::new(),
            default_inspector: Some(Arc::new(DefaultRouteInspector::new())),
            schemas,
            hooks: vec![Arc::new(RequestServerHook)],
        }
    }

    /// Register a route inspector ahead of the default one
    pub fn with_inspector(mut self, inspector: Arc<dyn RouteInspector>) -> Self {
        self.inspectors.push(inspector);
        self
    }

    /// Register a field inspector ahead of the built-in field mapping
    pub fn with_field_inspector(mut self, inspector: Arc<dyn FieldInspector>) -> Self {
        self.schemas.add_field_inspector(inspector);
        self
    }

    /// Register a document hook, run after the built-in ones
    pub fn with_hook(mut self, hook: Arc<dyn DocumentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Drop the default inspector so only registered inspectors run
    pub fn without_default_inspector(mut self) -> Self {
        self.default_inspector = None;
        self
    }

    /// Drop all document hooks, including the request server hook
    pub fn without_hooks(mut self) -> Self {
        self.hooks.clear();
        self
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Inspectors in the order they are tried
    fn inspector_chain(&self) -> impl Iterator<Item = &Arc<dyn RouteInspector>> {
        self.inspectors.iter().chain(self.default_inspector.iter())
    }

    /// Generate a document from `catalog`
    pub fn generate(
        &self,
        catalog: &RouteCatalog,
        public: bool,
        request: Option<&RequestContext>,
    ) -> ApiDocResult<SchemaGraph> {
        self.generate_with_cancel(catalog, public, request, &CancellationToken::new())
    }

    /// Generate a document, giving up between routes once `cancel` fires
    pub fn generate_with_cancel(
        &self,
        catalog: &RouteCatalog,
        public: bool,
        request: Option<&RequestContext>,
        cancel: &CancellationToken,
    ) -> ApiDocResult<SchemaGraph> {
        debug!(
            "Generating {} document from {} routes",
            if public { "public" } else { "private" },
            catalog.len()
        );

        let mut registry = ComponentRegistry::new();
        for shape in &catalog.shapes {
            let name = shape.ref_name.as_deref().ok_or_else(|| {
                ApiDocError::consistency("catalog shapes must declare a ref_name")
            })?;
            self.schemas.register_shape(name, shape, &mut registry)?;
        }

        let mut graph = SchemaGraph {
            openapi: self.config.openapi_version.clone(),
            info: self.config.document_info(),
            servers: self.config.document_servers(),
            paths: IndexMap::new(),
            components: None,
            tags: self.config.document_tags(),
            external_docs: self.config.document_external_docs(),
        };

        let mut operation_ids: HashMap<String, String> = HashMap::new();
        for route in &catalog.routes {
            if cancel.is_cancelled() {
                debug!("Document generation cancelled before {}", route.label());
                return Err(ApiDocError::Cancelled);
            }
            if public && route.internal {
                debug!("Omitting internal route {} from public document", route.label());
                continue;
            }

            let checkpoint = registry.len();
            let operation = match self.inspect_route(route, public, request, &mut registry) {
                Ok(Some(operation)) => operation,
                Ok(None) => {
                    registry.truncate(checkpoint);
                    warn!("No inspector could describe route {}; omitted", route.label());
                    continue;
                }
                Err(ApiDocError::RouteInterpretation { route: label, message }) => {
                    registry.truncate(checkpoint);
                    warn!("Omitting route {}: {}", label, message);
                    continue;
                }
                Err(err) => return Err(err),
            };

            self.insert_operation(&mut graph, &mut operation_ids, route, operation)?;
        }

        let mut components = Components {
            schemas: registry.into_schemas(),
            security_schemes: IndexMap::new(),
        };
        if !public {
            components.security_schemes = self.config.security_schemes.clone();
        }
        if !components.is_empty() {
            graph.components = Some(components);
        }

        for hook in &self.hooks {
            hook.apply(&mut graph, request, public)?;
        }

        check_consistency(&graph)?;
        debug!(
            "Generated document with {} paths and {} operations",
            graph.paths.len(),
            graph.operation_count()
        );
        Ok(graph)
    }

    fn inspect_route(
        &self,
        route: &RouteEntry,
        public: bool,
        request: Option<&RequestContext>,
        registry: &mut ComponentRegistry,
    ) -> ApiDocResult<Option<Operation>> {
        let selected: Vec<&Arc<dyn RouteInspector>> = match &route.overrides.inspector {
            Some(name) => {
                let inspector = self
                    .inspector_chain()
                    .find(|inspector| inspector.name() == name.as_str())
                    .ok_or_else(|| {
                        ApiDocError::consistency(format!(
                            "{} selects unknown inspector `{}`",
                            route.label(),
                            name
                        ))
                    })?;
                vec![inspector]
            }
            None => self.inspector_chain().collect(),
        };

        for inspector in selected {
            let checkpoint = registry.len();
            let mut ctx = InspectionContext {
                config: &self.config,
                public,
                request,
                schemas: &self.schemas,
                registry: &mut *registry,
            };
            match inspector.interpret(route, &mut ctx)? {
                Inspection::Operation(operation) => return Ok(Some(operation)),
                Inspection::Skip(reason) => {
                    registry.truncate(checkpoint);
                    debug!(
                        "Inspector `{}` skipped {}: {}",
                        inspector.name(),
                        route.label(),
                        reason
                    );
                }
            }
        }
        Ok(None)
    }

    fn insert_operation(
        &self,
        graph: &mut SchemaGraph,
        operation_ids: &mut HashMap<String, String>,
        route: &RouteEntry,
        operation: Operation,
    ) -> ApiDocResult<()> {
        let label = route.label();

        if let Some(id) = &operation.operation_id {
            if let Some(previous) = operation_ids.insert(id.clone(), label.clone()) {
                return Err(ApiDocError::consistency(format!(
                    "operationId `{}` produced by both {} and {}",
                    id, previous, label
                )));
            }
        }

        let slot = graph
            .paths
            .entry(route.path.clone())
            .or_default()
            .slot_mut(route.method);
        if slot.is_some() {
            return Err(ApiDocError::consistency(format!(
                "route {} declared more than once",
                label
            )));
        }
        debug!("Documented route {}", label);
        *slot = Some(operation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{FieldShape, ObjectShape, OperationOverrides};

    fn catalog() -> RouteCatalog {
        let item = FieldShape::object(
            ObjectShape::named("Item")
                .with_field("id", FieldShape::integer().read_only())
                .with_field("name", FieldShape::string()),
        );
        RouteCatalog::new(vec![
            RouteEntry::get("/items").with_response_body(item.clone()),
            RouteEntry::post("/items")
                .with_request_body(item.clone())
                .with_response_body(item.clone())
                .with_security("bearerAuth"),
            RouteEntry::get("/items/{id}").with_response_body(item),
            RouteEntry::get("/admin/stats").internal(),
        ])
    }

    #[test]
    fn test_generate_preserves_route_order() {
        let generator = SchemaGenerator::new(DocumentConfig::new("Items", "1.0.0"));
        let graph = generator.generate(&catalog(), false, None).unwrap();

        let paths: Vec<_> = graph.paths.keys().cloned().collect();
        assert_eq!(paths, vec!["/items", "/items/{id}", "/admin/stats"]);
        assert_eq!(graph.operation_count(), 4);
        assert!(graph.component_schemas().unwrap().contains_key("Item"));
        assert_eq!(graph.info.title, "Items");
    }

    #[test]
    fn test_public_document_omits_internal_routes_and_security() {
        let generator = SchemaGenerator::new(DocumentConfig::default());
        let graph = generator.generate(&catalog(), true, None).unwrap();

        assert!(!graph.paths.contains_key("/admin/stats"));
        let components = graph.components.unwrap();
        assert!(components.security_schemes.is_empty());
        let create = graph.paths["/items"].post.as_ref().unwrap();
        assert!(create.security.is_empty());
    }

    #[test]
    fn test_operation_id_collision_names_both_routes() {
        let catalog = RouteCatalog::new(vec![
            RouteEntry::get("/items").with_operation_id("fetch"),
            RouteEntry::get("/products").with_operation_id("fetch"),
        ]);
        let generator = SchemaGenerator::new(DocumentConfig::default());
        let err = generator.generate(&catalog, true, None).unwrap_err();

        assert!(matches!(err, ApiDocError::GenerationConsistency(_)));
        let message = err.to_string();
        assert!(message.contains("GET /items"));
        assert!(message.contains("GET /products"));
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let catalog = RouteCatalog::new(vec![
            RouteEntry::get("/items").with_operation_id("a"),
            RouteEntry::get("/items").with_operation_id("b"),
        ]);
        let generator = SchemaGenerator::new(DocumentConfig::default());
        assert!(generator.generate(&catalog, true, None).is_err());
    }

    #[test]
    fn test_uninterpretable_route_is_omitted() {
        let catalog = RouteCatalog::new(vec![
            RouteEntry::get("/items"),
            RouteEntry::get("/uploads").with_overrides(OperationOverrides {
                query_shape: Some(ObjectShape::inline().with_field(
                    "file",
                    FieldShape::new(crate::route::FieldKind::File),
                )),
                ..Default::default()
            }),
        ]);
        let generator = SchemaGenerator::new(DocumentConfig::default());
        let graph = generator.generate(&catalog, true, None).unwrap();

        assert_eq!(graph.paths.len(), 1);
        assert!(graph.paths.contains_key("/items"));
    }

    #[test]
    fn test_dangling_named_type_fails_generation() {
        let catalog = RouteCatalog::new(vec![
            RouteEntry::get("/orders").with_response_body(FieldShape::named("Order"))
        ]);
        let generator = SchemaGenerator::new(DocumentConfig::default());
        let err = generator.generate(&catalog, true, None).unwrap_err();
        assert!(err.to_string().contains("Order"));

        let catalog = catalog.with_shape(
            ObjectShape::named("Order").with_field("total", FieldShape::number()),
        );
        generator.generate(&catalog, true, None).unwrap();
    }

    #[test]
    fn test_cancelled_generation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let generator = SchemaGenerator::new(DocumentConfig::default());
        let err = generator
            .generate_with_cancel(&catalog(), true, None, &cancel)
            .unwrap_err();
        assert!(matches!(err, ApiDocError::Cancelled));
    }

    struct HealthInspector;

    impl RouteInspector for HealthInspector {
        fn name(&self) -> &str {
            "health"
        }

        fn interpret(
            &self,
            route: &RouteEntry,
            _ctx: &mut InspectionContext<'_>,
        ) -> ApiDocResult<Inspection> {
            if route.path != "/health" {
                return Ok(Inspection::Skip("not a health route".to_string()));
            }
            let mut operation = Operation {
                operation_id: Some("health_check".to_string()),
                ..Default::default()
            };
            operation.responses.insert(
                "200".to_string(),
                crate::specification::Response {
                    description: "Service is healthy".to_string(),
                    content: IndexMap::new(),
                },
            );
            Ok(Inspection::Operation(operation))
        }
    }

    #[test]
    fn test_custom_inspector_runs_before_default() {
        let catalog = RouteCatalog::new(vec![RouteEntry::get("/health"), RouteEntry::get("/items")]);
        let generator = SchemaGenerator::new(DocumentConfig::default())
            .with_inspector(Arc::new(HealthInspector));
        let graph = generator.generate(&catalog, true, None).unwrap();

        let health = graph.paths["/health"].get.as_ref().unwrap();
        assert_eq!(health.operation_id.as_deref(), Some("health_check"));
        let items = graph.paths["/items"].get.as_ref().unwrap();
        assert_eq!(items.operation_id.as_deref(), Some("items_list"));
    }

    #[test]
    fn test_all_inspectors_skipping_omits_route() {
        let catalog = RouteCatalog::new(vec![RouteEntry::get("/health"), RouteEntry::get("/items")]);
        let generator = SchemaGenerator::new(DocumentConfig::default())
            .with_inspector(Arc::new(HealthInspector))
            .without_default_inspector();
        let graph = generator.generate(&catalog, true, None).unwrap();
        assert_eq!(graph.paths.len(), 1);
    }

    #[test]
    fn test_unknown_named_inspector() {
        let catalog = RouteCatalog::new(vec![RouteEntry::get("/items").with_overrides(
            OperationOverrides {
                inspector: Some("missing".to_string()),
                ..Default::default()
            },
        )]);
        let generator = SchemaGenerator::new(DocumentConfig::default());
        let err = generator.generate(&catalog, true, None).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let generator = SchemaGenerator::new(DocumentConfig::default());
        let first = generator.generate(&catalog(), false, None).unwrap();
        let second = generator.generate(&catalog(), false, None).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
