//! End-to-end generation, encoding and export

use apidoc::{
    codec::{decode_document, Codec, Format, JsonCodec, YamlCodec},
    consistency::check_consistency,
    export::{export_document, load_document, Destination, ExportOptions},
    route::{FieldShape, ObjectShape, ParamHint, RouteCatalog, RouteEntry},
    ApiDocError, DocumentConfig, HttpMethod, SchemaGenerator,
};
use std::collections::HashSet;

fn item_shape() -> ObjectShape {
    ObjectShape::named("Item")
        .with_field("id", FieldShape::integer().read_only())
        .with_field("name", FieldShape::string())
        .with_field("price", FieldShape::number().optional())
}

fn shop_catalog() -> RouteCatalog {
    RouteCatalog::new(vec![
        RouteEntry::get("/items")
            .with_summary("List items")
            .with_parameter(ParamHint::query("page", FieldShape::integer().optional()))
            .with_response_body(FieldShape::object(item_shape())),
        RouteEntry::post("/items")
            .with_request_body(FieldShape::object(item_shape()))
            .with_response_body(FieldShape::object(item_shape()))
            .with_security("bearerAuth"),
        RouteEntry::get("/items/{id}").with_response_body(FieldShape::object(item_shape())),
        RouteEntry::delete("/items/{id}").with_security("bearerAuth"),
        RouteEntry::get("/admin/stats").internal(),
    ])
}

fn generator() -> SchemaGenerator {
    SchemaGenerator::new(DocumentConfig::new("Shop", "1.0.0"))
}

#[test]
fn test_single_route_document() {
    let catalog = RouteCatalog::new(vec![RouteEntry::get("/items")]);
    let graph = generator().generate(&catalog, true, None).unwrap();

    let bytes = JsonCodec::default().encode(&graph).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    let paths = json["paths"].as_object().unwrap();
    assert_eq!(paths.len(), 1);
    let item = paths["/items"].as_object().unwrap();
    assert_eq!(item.len(), 1);
    assert!(item.contains_key("get"));
}

#[test]
fn test_yaml_and_json_describe_the_same_document() {
    let catalog = RouteCatalog::new(vec![RouteEntry::get("/items")]);
    let graph = generator().generate(&catalog, true, None).unwrap();

    let json = JsonCodec::default().encode(&graph).unwrap();
    let yaml = YamlCodec::default().encode(&graph).unwrap();
    assert!(String::from_utf8(yaml.clone()).unwrap().contains("paths:\n"));

    assert_eq!(
        decode_document(Format::Json, &json).unwrap(),
        decode_document(Format::Yaml, &yaml).unwrap()
    );
}

#[test]
fn test_export_round_trip_is_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("openapi.yaml");
    let options = ExportOptions {
        format: Format::Yaml,
        public: false,
        pretty: true,
    };

    let summary = export_document(
        &generator(),
        &shop_catalog(),
        &options,
        &Destination::File(path.clone()),
    )
    .unwrap();
    assert_eq!(summary.operations, 5);

    let graph = load_document(&path).unwrap();
    check_consistency(&graph).unwrap();

    let mut seen = HashSet::new();
    for (path, method, operation) in graph.operations() {
        assert!(seen.insert((path.to_string(), method)));
        assert!(operation.operation_id.is_some());
    }
    assert!(graph.component_schemas().unwrap().contains_key("Item"));
}

#[test]
fn test_generation_is_deterministic() {
    let first = generator().generate(&shop_catalog(), true, None).unwrap();
    let second = generator().generate(&shop_catalog(), true, None).unwrap();

    for codec in [
        Box::new(JsonCodec::default()) as Box<dyn Codec>,
        Box::new(YamlCodec::default()),
    ] {
        assert_eq!(codec.encode(&first).unwrap(), codec.encode(&second).unwrap());
    }
}

#[test]
fn test_public_document_hides_internal_routes_and_security() {
    let public = generator().generate(&shop_catalog(), true, None).unwrap();
    let private = generator().generate(&shop_catalog(), false, None).unwrap();

    assert!(!public.paths.contains_key("/admin/stats"));
    assert!(private.paths.contains_key("/admin/stats"));

    let delete = |graph: &apidoc::SchemaGraph| {
        graph
            .operations()
            .find(|(path, method, _)| *path == "/items/{id}" && *method == HttpMethod::Delete)
            .map(|(_, _, op)| op.security.len())
    };
    assert_eq!(delete(&public), Some(0));
    assert_eq!(delete(&private), Some(1));
}

#[test]
fn test_operation_id_collision_aborts_generation() {
    let catalog = RouteCatalog::new(vec![
        RouteEntry::get("/a").with_operation_id("fetch"),
        RouteEntry::get("/b").with_operation_id("fetch"),
    ]);

    let err = generator().generate(&catalog, true, None).unwrap_err();
    match err {
        ApiDocError::GenerationConsistency(message) => {
            assert!(message.contains("GET /a"));
            assert!(message.contains("GET /b"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
