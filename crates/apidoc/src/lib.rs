/*!
# apidoc

OpenAPI 3.0 document generation for HTTP route catalogs.

This crate turns an ordered catalog of route descriptions into an OpenAPI
document, serves it as JSON, YAML, Swagger UI or ReDoc with content
negotiation and caching, and exports it offline.

## Features

- Pluggable route and field inspectors with a default interpretation
- Deterministic generation with consistency checks (unique operation ids,
  resolvable references)
- JSON and YAML codecs with document validators
- Raw, Swagger UI and ReDoc renderers negotiated from `Accept` or an
  explicit format
- Cached views with permission checks, public/private documents and
  invalidation
- Atomic file export

## Usage

```rust,no_run
use apidoc::{DocumentConfig, RouteCatalog, RouteEntry, SchemaGenerator};

let generator = SchemaGenerator::new(DocumentConfig::new("Items API", "1.0.0"));
let catalog = RouteCatalog::new(vec![RouteEntry::get("/items")]);
let graph = generator.generate(&catalog, true, None).unwrap();
```
*/

// Re-export main types
pub use crate::{
    cache::{CacheBackend, CacheKey, CacheStats, CachedDocument, GraphKey, MemoryBackend},
    codec::{Codec, DocumentValidator, ErrorBody, Format, JsonCodec, ReferenceValidator, YamlCodec},
    config::DocumentConfig,
    error::{ApiDocError, ApiDocResult},
    export::{export_document, Destination, ExportOptions, ExportSummary},
    generator::SchemaGenerator,
    inspector::{
        DefaultRouteInspector, DocumentHook, Inspection, InspectionContext, RequestServerHook,
        RouteInspector,
    },
    renderer::{negotiate, Presentation, Renderer, UiSettings},
    route::{
        FieldKind, FieldShape, HttpMethod, ObjectShape, OperationOverrides, ParamHint,
        RouteCatalog, RouteEntry,
    },
    schema::{ComponentRegistry, FieldInspector, SchemaBuilder},
    specification::SchemaGraph,
    view::{
        DocResponse, PermissionCheck, PublicPredicate, RequestContext, SchemaView,
        SchemaViewFactory, ViewConfig,
    },
};

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod route;
pub mod specification;

// Generation
pub mod consistency;
pub mod generator;
pub mod inspector;
pub mod schema;

// Serialization and presentation
pub mod codec;
pub mod renderer;

// Serving and export
pub mod cache;
pub mod export;
pub mod view;
