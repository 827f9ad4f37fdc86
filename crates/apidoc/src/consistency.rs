use crate::{
    error::{ApiDocError, ApiDocResult},
    specification::{Schema, SchemaGraph},
};
use std::collections::{HashMap, HashSet};

/// Visit every schema in the document with its dotted location,
/// e.g. `paths./items.get.parameters[0].schema`
pub fn visit_schemas<F>(graph: &SchemaGraph, mut visit: F) -> ApiDocResult<()>
where
    F: FnMut(&str, &Schema) -> ApiDocResult<()>,
{
    for (path, method, operation) in graph.operations() {
        let base = format!("paths.{}.{}", path, method.as_str().to_ascii_lowercase());

        for (index, parameter) in operation.parameters.iter().enumerate() {
            if let Some(schema) = &parameter.schema {
                walk(
                    &format!("{}.parameters[{}].schema", base, index),
                    schema,
                    &mut visit,
                )?;
            }
        }
        if let Some(body) = &operation.request_body {
            for (media_type, content) in &body.content {
                if let Some(schema) = &content.schema {
                    walk(
                        &format!("{}.requestBody.content.{}.schema", base, media_type),
                        schema,
                        &mut visit,
                    )?;
                }
            }
        }
        for (status, response) in &operation.responses {
            for (media_type, content) in &response.content {
                if let Some(schema) = &content.schema {
                    walk(
                        &format!("{}.responses.{}.content.{}.schema", base, status, media_type),
                        schema,
                        &mut visit,
                    )?;
                }
            }
        }
    }

    if let Some(schemas) = graph.component_schemas() {
        for (name, schema) in schemas {
            walk(&format!("components.schemas.{}", name), schema, &mut visit)?;
        }
    }
    Ok(())
}

fn walk<F>(location: &str, schema: &Schema, visit: &mut F) -> ApiDocResult<()>
where
    F: FnMut(&str, &Schema) -> ApiDocResult<()>,
{
    visit(location, schema)?;

    for (name, property) in &schema.properties {
        walk(&format!("{}.properties.{}", location, name), property, visit)?;
    }
    if let Some(items) = &schema.items {
        walk(&format!("{}.items", location), items, visit)?;
    }
    if let Some(additional) = &schema.additional_properties {
        walk(&format!("{}.additionalProperties", location), additional, visit)?;
    }
    for (keyword, list) in [
        ("allOf", &schema.all_of),
        ("anyOf", &schema.any_of),
        ("oneOf", &schema.one_of),
    ] {
        for (index, child) in list.iter().enumerate() {
            walk(&format!("{}.{}[{}]", location, keyword, index), child, visit)?;
        }
    }
    Ok(())
}

/// Check the invariants every returned document must satisfy:
/// unique operation ids, resolvable component references, declared
/// security schemes and well-formed path keys.
pub fn check_consistency(graph: &SchemaGraph) -> ApiDocResult<()> {
    let mut operation_ids: HashMap<&str, String> = HashMap::new();
    for (path, method, operation) in graph.operations() {
        if !path.starts_with('/') {
            return Err(ApiDocError::consistency(format!(
                "path `{}` must start with '/'",
                path
            )));
        }
        if let Some(id) = operation.operation_id.as_deref() {
            let label = format!("{} {}", method, path);
            if let Some(previous) = operation_ids.insert(id, label.clone()) {
                return Err(ApiDocError::consistency(format!(
                    "duplicate operationId `{}` on {} and {}",
                    id, previous, label
                )));
            }
        }
    }

    let declared: HashSet<&str> = graph
        .component_schemas()
        .map(|schemas| schemas.keys().map(String::as_str).collect())
        .unwrap_or_default();
    visit_schemas(graph, |location, schema| {
        match (&schema.reference, schema.referenced_component()) {
            (Some(_), Some(name)) if !declared.contains(name) => Err(ApiDocError::consistency(
                format!("dangling reference to `{}` at {}", name, location),
            )),
            (Some(reference), None) if reference.starts_with('#') => Err(
                ApiDocError::consistency(format!(
                    "unsupported local reference `{}` at {}",
                    reference, location
                )),
            ),
            _ => Ok(()),
        }
    })?;

    let schemes: HashSet<&str> = graph
        .components
        .as_ref()
        .map(|c| c.security_schemes.keys().map(String::as_str).collect())
        .unwrap_or_default();
    for (path, method, operation) in graph.operations() {
        for requirement in &operation.security {
            if let Some(name) = requirement.keys().find(|name| !schemes.contains(name.as_str())) {
                return Err(ApiDocError::consistency(format!(
                    "{} {} requires undeclared security scheme `{}`",
                    method, path, name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::{Components, MediaType, Operation, PathItem, Response, SecurityScheme};
    use indexmap::IndexMap;

    fn graph_with(path: &str, operation: Operation) -> SchemaGraph {
        let mut graph = SchemaGraph::new("API", "1.0.0");
        let mut item = PathItem::default();
        item.get = Some(operation);
        graph.paths.insert(path.to_string(), item);
        graph
    }

    fn returning(schema: Schema) -> Operation {
        let mut content = IndexMap::new();
        content.insert(
            "application/json".to_string(),
            MediaType {
                schema: Some(schema),
                example: None,
            },
        );
        let mut responses = IndexMap::new();
        responses.insert(
            "200".to_string(),
            Response {
                description: "OK".to_string(),
                content,
            },
        );
        Operation {
            operation_id: Some("items_list".to_string()),
            responses,
            ..Default::default()
        }
    }

    #[test]
    fn test_dangling_reference_names_location() {
        let graph = graph_with("/items", returning(Schema::array_of(Schema::reference("Item"))));
        let err = check_consistency(&graph).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("`Item`"));
        assert!(message.contains("paths./items.get.responses.200.content.application/json.schema.items"));
    }

    #[test]
    fn test_resolved_reference_passes() {
        let mut graph = graph_with("/items", returning(Schema::reference("Item")));
        let mut components = Components::default();
        components
            .schemas
            .insert("Item".to_string(), Schema::typed("object"));
        graph.components = Some(components);
        check_consistency(&graph).unwrap();
    }

    #[test]
    fn test_duplicate_operation_id() {
        let mut graph = graph_with("/items", returning(Schema::typed("string")));
        let mut other = PathItem::default();
        other.get = Some(returning(Schema::typed("string")));
        graph.paths.insert("/products".to_string(), other);

        let err = check_consistency(&graph).unwrap_err();
        assert!(err.to_string().contains("GET /items"));
        assert!(err.to_string().contains("GET /products"));
    }

    #[test]
    fn test_undeclared_security_scheme() {
        let mut requirement = IndexMap::new();
        requirement.insert("oauth".to_string(), Vec::new());
        let mut operation = returning(Schema::typed("string"));
        operation.security.push(requirement);
        let mut graph = graph_with("/items", operation);
        assert!(check_consistency(&graph).is_err());

        let mut components = Components::default();
        components.security_schemes.insert(
            "oauth".to_string(),
            SecurityScheme::Http {
                scheme: "bearer".to_string(),
                bearer_format: None,
            },
        );
        graph.components = Some(components);
        check_consistency(&graph).unwrap();
    }

    #[test]
    fn test_visit_schemas_reaches_nested_properties() {
        let mut object = Schema::typed("object");
        object
            .properties
            .insert("tags".to_string(), Schema::array_of(Schema::typed("string")));
        let graph = graph_with("/items", returning(object));

        let mut seen = Vec::new();
        visit_schemas(&graph, |location, _| {
            seen.push(location.to_string());
            Ok(())
        })
        .unwrap();
        assert!(seen
            .iter()
            .any(|l| l.ends_with("schema.properties.tags.items")));
    }
}
