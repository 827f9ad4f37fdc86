use crate::{
    error::{ApiDocError, ApiDocResult},
    route::{FieldKind, FieldShape, IpProtocol, ObjectShape},
    specification::Schema,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

const SLUG_PATTERN: &str = "^[-a-zA-Z0-9_]+$";

/// Hook that can take over the schema of a single field.
///
/// Returning `None` defers to the next inspector and finally to the
/// built-in mapping.
pub trait FieldInspector: Send + Sync {
    fn field_to_schema(
        &self,
        field: &FieldShape,
        registry: &mut ComponentRegistry,
    ) -> Option<ApiDocResult<Schema>>;
}

/// Component schemas collected during one generation run
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    schemas: IndexMap<String, Schema>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema` under `name`.
    ///
    /// Registering an identical schema again is a no-op; a different schema
    /// under an existing name is a consistency error.
    pub fn register(&mut self, name: &str, schema: Schema) -> ApiDocResult<()> {
        match self.schemas.get(name) {
            Some(existing) if *existing == schema => Ok(()),
            Some(_) => Err(ApiDocError::consistency(format!(
                "component schema `{}` registered twice with different definitions",
                name
            ))),
            None => {
                self.schemas.insert(name.to_string(), schema);
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Drop everything registered after the first `len` entries
    pub fn truncate(&mut self, len: usize) {
        self.schemas.truncate(len);
    }

    pub fn into_schemas(self) -> IndexMap<String, Schema> {
        self.schemas
    }
}

/// Maps field shapes to OpenAPI schemas
#[derive(Clone, Default)]
pub struct SchemaBuilder {
    field_inspectors: Vec<Arc<dyn FieldInspector>>,
    nullable_optional: bool,
}

impl SchemaBuilder {
    pub fn new(nullable_optional: bool) -> Self {
        Self {
            field_inspectors: Vec::new(),
            nullable_optional,
        }
    }

    /// Register a field inspector, tried in registration order
    pub fn add_field_inspector(&mut self, inspector: Arc<dyn FieldInspector>) {
        self.field_inspectors.push(inspector);
    }

    pub fn set_nullable_optional(&mut self, nullable: bool) {
        self.nullable_optional = nullable;
    }

    /// Schema for a field, including its documentation attributes
    pub fn field_schema(
        &self,
        field: &FieldShape,
        registry: &mut ComponentRegistry,
    ) -> ApiDocResult<Schema> {
        for inspector in &self.field_inspectors {
            if let Some(result) = inspector.field_to_schema(field, registry) {
                return result;
            }
        }

        let mut schema = self.kind_schema(&field.kind, registry)?;

        // Siblings of `$ref` are ignored by OpenAPI 3.0 tooling
        if schema.reference.is_some() {
            return Ok(schema);
        }
        if let Some(help_text) = &field.help_text {
            schema.description = Some(help_text.clone());
        }
        if let Some(default) = &field.default {
            schema.default = Some(default.clone());
        }
        if field.read_only {
            schema.read_only = Some(true);
        }
        if field.nullable {
            schema.nullable = Some(true);
        }
        Ok(schema)
    }

    /// Schema for a shape: a `$ref` to a registered component when the
    /// shape is named, otherwise the inline object
    pub fn shape_schema(
        &self,
        shape: &ObjectShape,
        registry: &mut ComponentRegistry,
    ) -> ApiDocResult<Schema> {
        match &shape.ref_name {
            Some(name) => {
                self.register_shape(name, shape, registry)?;
                Ok(Schema::reference(name))
            }
            None => self.object_schema(shape, registry),
        }
    }

    /// Register a named shape as a component without referencing it
    pub fn register_shape(
        &self,
        name: &str,
        shape: &ObjectShape,
        registry: &mut ComponentRegistry,
    ) -> ApiDocResult<()> {
        let schema = self.object_schema(shape, registry)?;
        registry.register(name, schema)
    }

    /// Inline object schema for a shape
    pub fn object_schema(
        &self,
        shape: &ObjectShape,
        registry: &mut ComponentRegistry,
    ) -> ApiDocResult<Schema> {
        let mut properties = IndexMap::new();
        let mut required = Vec::new();

        for (name, field) in &shape.fields {
            properties.insert(name.clone(), self.field_schema(field, registry)?);
            if self.is_required(field) {
                required.push(name.clone());
            }
        }

        Ok(Schema {
            schema_type: Some("object".to_string()),
            description: shape.description.clone(),
            properties,
            required,
            ..Default::default()
        })
    }

    /// Whether a field is listed in its object's `required` array
    pub fn is_required(&self, field: &FieldShape) -> bool {
        let optional_type = matches!(
            &field.kind,
            FieldKind::Named { type_name } if type_name.starts_with("Option<")
        );
        field.required && !field.read_only && !optional_type
    }

    /// Schema for a parameter value.
    ///
    /// Parameters are flat values, so files and nested objects are rejected.
    pub fn parameter_schema(
        &self,
        route: &str,
        name: &str,
        field: &FieldShape,
        registry: &mut ComponentRegistry,
    ) -> ApiDocResult<Schema> {
        match &field.kind {
            FieldKind::File => Err(ApiDocError::route_interpretation(
                route,
                format!("parameter `{}` cannot be a file upload", name),
            )),
            FieldKind::Object { .. } => Err(ApiDocError::route_interpretation(
                route,
                format!("parameter `{}` cannot be a nested object", name),
            )),
            FieldKind::List { child } if !is_flat(child) => {
                Err(ApiDocError::route_interpretation(
                    route,
                    format!("parameter `{}` must be a list of plain values", name),
                ))
            }
            _ => self.field_schema(field, registry),
        }
    }

    fn kind_schema(
        &self,
        kind: &FieldKind,
        registry: &mut ComponentRegistry,
    ) -> ApiDocResult<Schema> {
        let schema = match kind {
            FieldKind::String {
                min_length,
                max_length,
            } => Schema {
                schema_type: Some("string".to_string()),
                min_length: *min_length,
                max_length: *max_length,
                ..Default::default()
            },
            FieldKind::Integer { minimum, maximum } => Schema {
                schema_type: Some("integer".to_string()),
                minimum: *minimum,
                maximum: *maximum,
                ..Default::default()
            },
            FieldKind::Number { minimum, maximum } => Schema {
                schema_type: Some("number".to_string()),
                minimum: *minimum,
                maximum: *maximum,
                ..Default::default()
            },
            FieldKind::Boolean => Schema::typed("boolean"),
            FieldKind::Uuid => Schema::formatted("string", "uuid"),
            FieldKind::Date => Schema::formatted("string", "date"),
            FieldKind::DateTime => Schema::formatted("string", "date-time"),
            FieldKind::Email => Schema::formatted("string", "email"),
            FieldKind::Uri => Schema::formatted("string", "uri"),
            FieldKind::Slug => Schema {
                schema_type: Some("string".to_string()),
                format: Some("slug".to_string()),
                pattern: Some(SLUG_PATTERN.to_string()),
                ..Default::default()
            },
            FieldKind::IpAddress { protocol } => match protocol {
                IpProtocol::V4 => Schema::formatted("string", "ipv4"),
                IpProtocol::V6 => Schema::formatted("string", "ipv6"),
                IpProtocol::Both => Schema::typed("string"),
            },
            FieldKind::Pattern { pattern } => Schema {
                schema_type: Some("string".to_string()),
                pattern: Some(pattern.clone()),
                ..Default::default()
            },
            FieldKind::Choice { choices } => choice_schema(choices),
            FieldKind::MultipleChoice { choices } => Schema {
                unique_items: Some(true),
                ..Schema::array_of(choice_schema(choices))
            },
            FieldKind::List { child } => Schema::array_of(self.field_schema(child, registry)?),
            FieldKind::Map { child } => Schema {
                schema_type: Some("object".to_string()),
                additional_properties: Some(Box::new(self.field_schema(child, registry)?)),
                ..Default::default()
            },
            FieldKind::File => Schema::formatted("string", "binary"),
            FieldKind::Object { shape } => self.shape_schema(shape, registry)?,
            FieldKind::Named { type_name } => self.named_type_schema(type_name)?,
        };
        Ok(schema)
    }

    /// Schema for a Rust-style type name.
    ///
    /// Unknown names become a reference to the component of the same name.
    pub fn named_type_schema(&self, type_name: &str) -> ApiDocResult<Schema> {
        let type_name = type_name.trim();
        let schema = match type_name {
            "String" | "str" | "&str" | "char" => Schema::typed("string"),
            "i8" | "i16" | "i32" => Schema::formatted("integer", "int32"),
            "i64" | "isize" => Schema::formatted("integer", "int64"),
            "u8" | "u16" | "u32" => Schema {
                minimum: Some(0.0),
                ..Schema::formatted("integer", "int32")
            },
            "u64" | "usize" => Schema {
                minimum: Some(0.0),
                ..Schema::formatted("integer", "int64")
            },
            "f32" => Schema::formatted("number", "float"),
            "f64" => Schema::formatted("number", "double"),
            "bool" => Schema::typed("boolean"),
            "Uuid" => Schema::formatted("string", "uuid"),
            "DateTime" | "DateTime<Utc>" => Schema::formatted("string", "date-time"),
            "NaiveDate" => Schema::formatted("string", "date"),
            "Value" | "serde_json::Value" => Schema::default(),
            _ => {
                if let Some(inner) = generic_argument(type_name, "Option")? {
                    let mut schema = self.named_type_schema(inner)?;
                    if self.nullable_optional && schema.reference.is_none() {
                        schema.nullable = Some(true);
                    }
                    schema
                } else if let Some(inner) = generic_argument(type_name, "Vec")? {
                    Schema::array_of(self.named_type_schema(inner)?)
                } else if let Some(inner) = ["HashMap", "BTreeMap", "IndexMap"]
                    .into_iter()
                    .find_map(|wrapper| generic_argument(type_name, wrapper).transpose())
                    .transpose()?
                {
                    let value_type = map_value_type(type_name, inner)?;
                    Schema {
                        schema_type: Some("object".to_string()),
                        additional_properties: Some(Box::new(
                            self.named_type_schema(value_type)?,
                        )),
                        ..Default::default()
                    }
                } else if is_identifier(type_name) {
                    Schema::reference(type_name)
                } else {
                    return Err(ApiDocError::consistency(format!(
                        "Unsupported type name: {}",
                        type_name
                    )));
                }
            }
        };
        Ok(schema)
    }
}

fn choice_schema(choices: &[String]) -> Schema {
    Schema {
        schema_type: Some("string".to_string()),
        enum_values: choices.iter().map(|c| Value::String(c.clone())).collect(),
        ..Default::default()
    }
}

fn is_flat(field: &FieldShape) -> bool {
    !matches!(
        field.kind,
        FieldKind::File | FieldKind::Object { .. } | FieldKind::List { .. } | FieldKind::Map { .. }
    )
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Extract the generic argument of `wrapper<..>` (e.g. "T" from "Option<T>")
fn generic_argument<'a>(type_name: &'a str, wrapper: &str) -> ApiDocResult<Option<&'a str>> {
    let Some(rest) = type_name
        .strip_prefix(wrapper)
        .and_then(|rest| rest.strip_prefix('<'))
    else {
        return Ok(None);
    };

    match rest.strip_suffix('>').map(str::trim) {
        Some(inner) if !inner.is_empty() => Ok(Some(inner)),
        _ => Err(ApiDocError::consistency(format!(
            "Invalid generic type: {}",
            type_name
        ))),
    }
}

/// Value type of a map's `K, V` argument list, split at the top-level comma
fn map_value_type<'a>(type_name: &str, arguments: &'a str) -> ApiDocResult<&'a str> {
    let mut depth = 0usize;
    for (index, c) in arguments.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                let value = arguments[index + 1..].trim();
                if !value.is_empty() {
                    return Ok(value);
                }
                break;
            }
            _ => {}
        }
    }
    Err(ApiDocError::consistency(format!(
        "Invalid map type: {}",
        type_name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SchemaBuilder {
        SchemaBuilder::new(true)
    }

    #[test]
    fn test_primitive_named_types() {
        let builder = builder();

        let string_schema = builder.named_type_schema("String").unwrap();
        assert_eq!(string_schema.schema_type, Some("string".to_string()));

        let int_schema = builder.named_type_schema("i32").unwrap();
        assert_eq!(int_schema.format, Some("int32".to_string()));

        let unsigned = builder.named_type_schema("u64").unwrap();
        assert_eq!(unsigned.minimum, Some(0.0));
    }

    #[test]
    fn test_generic_named_types() {
        let builder = builder();

        let optional = builder.named_type_schema("Option<String>").unwrap();
        assert_eq!(optional.nullable, Some(true));

        let list = builder.named_type_schema("Vec<Item>").unwrap();
        assert_eq!(list.schema_type, Some("array".to_string()));
        assert_eq!(list.items.unwrap().referenced_component(), Some("Item"));

        let map = builder
            .named_type_schema("HashMap<String, Vec<i64>>")
            .unwrap();
        let values = map.additional_properties.unwrap();
        assert_eq!(values.schema_type, Some("array".to_string()));

        assert!(builder.named_type_schema("Vec<>").is_err());
        assert!(builder.named_type_schema("HashMap<String>").is_err());
    }

    #[test]
    fn test_field_formats_and_attributes() {
        let builder = builder();
        let mut registry = ComponentRegistry::new();

        let email = FieldShape::new(FieldKind::Email)
            .with_help_text("Contact address")
            .read_only();
        let schema = builder.field_schema(&email, &mut registry).unwrap();
        assert_eq!(schema.format, Some("email".to_string()));
        assert_eq!(schema.description, Some("Contact address".to_string()));
        assert_eq!(schema.read_only, Some(true));

        let slug = builder
            .field_schema(&FieldShape::new(FieldKind::Slug), &mut registry)
            .unwrap();
        assert_eq!(slug.pattern.as_deref(), Some(SLUG_PATTERN));

        let tags = FieldShape::new(FieldKind::MultipleChoice {
            choices: vec!["new".to_string(), "sale".to_string()],
        });
        let schema = builder.field_schema(&tags, &mut registry).unwrap();
        assert_eq!(schema.unique_items, Some(true));
        assert_eq!(schema.items.unwrap().enum_values.len(), 2);

        let attrs = FieldShape::new(FieldKind::Map {
            child: Box::new(FieldShape::integer()),
        });
        let schema = builder.field_schema(&attrs, &mut registry).unwrap();
        assert_eq!(
            schema.additional_properties.unwrap().schema_type,
            Some("integer".to_string())
        );
    }

    #[test]
    fn test_named_shape_registers_component() {
        let builder = builder();
        let mut registry = ComponentRegistry::new();

        let item = ObjectShape::named("Item")
            .with_field("id", FieldShape::integer().read_only())
            .with_field("name", FieldShape::string())
            .with_field("note", FieldShape::named("Option<String>"));
        let schema = builder
            .field_schema(&FieldShape::object(item.clone()), &mut registry)
            .unwrap();

        assert_eq!(schema.referenced_component(), Some("Item"));
        let component = registry.get("Item").unwrap();
        assert_eq!(component.required, vec!["name".to_string()]);

        // same definition again is fine
        builder.shape_schema(&item, &mut registry).unwrap();
        assert_eq!(registry.len(), 1);

        let conflicting = ObjectShape::named("Item").with_field("sku", FieldShape::string());
        let err = builder.shape_schema(&conflicting, &mut registry).unwrap_err();
        assert!(matches!(err, ApiDocError::GenerationConsistency(_)));
    }

    #[test]
    fn test_inline_shape_is_not_registered() {
        let builder = builder();
        let mut registry = ComponentRegistry::new();

        let shape = ObjectShape::inline().with_field("q", FieldShape::string());
        let schema = builder.shape_schema(&shape, &mut registry).unwrap();
        assert_eq!(schema.schema_type, Some("object".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_parameter_schema_rejects_files_and_objects() {
        let builder = builder();
        let mut registry = ComponentRegistry::new();

        let err = builder
            .parameter_schema(
                "GET /items",
                "upload",
                &FieldShape::new(FieldKind::File),
                &mut registry,
            )
            .unwrap_err();
        assert!(matches!(err, ApiDocError::RouteInterpretation { .. }));

        let nested = FieldShape::object(ObjectShape::inline());
        assert!(builder
            .parameter_schema("GET /items", "filter", &nested, &mut registry)
            .is_err());

        let ids = FieldShape::list(FieldShape::integer());
        assert!(builder
            .parameter_schema("GET /items", "ids", &ids, &mut registry)
            .is_ok());
    }

    struct MoneyInspector;

    impl FieldInspector for MoneyInspector {
        fn field_to_schema(
            &self,
            field: &FieldShape,
            _registry: &mut ComponentRegistry,
        ) -> Option<ApiDocResult<Schema>> {
            match &field.kind {
                FieldKind::Named { type_name } if type_name == "Money" => {
                    Some(Ok(Schema::formatted("string", "decimal")))
                }
                _ => None,
            }
        }
    }

    #[test]
    fn test_field_inspector_runs_before_builtin_mapping() {
        let mut builder = builder();
        builder.add_field_inspector(Arc::new(MoneyInspector));
        let mut registry = ComponentRegistry::new();

        let price = builder
            .field_schema(&FieldShape::named("Money"), &mut registry)
            .unwrap();
        assert_eq!(price.format, Some("decimal".to_string()));

        let other = builder
            .field_schema(&FieldShape::named("Currency"), &mut registry)
            .unwrap();
        assert_eq!(other.referenced_component(), Some("Currency"));
    }

    #[test]
    fn test_registry_truncate_rolls_back() {
        let mut registry = ComponentRegistry::new();
        registry.register("A", Schema::typed("string")).unwrap();
        let checkpoint = registry.len();
        registry.register("B", Schema::typed("integer")).unwrap();
        registry.truncate(checkpoint);
        assert!(registry.contains("A"));
        assert!(!registry.contains("B"));
    }
}
