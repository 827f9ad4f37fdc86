/*!
Route catalog model.

A [`RouteCatalog`] is the ordered, read-only list of operations the hosting
router exposes, together with the handler-derived type hints the inspector
hooks turn into parameters, bodies and responses.
*/

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP method of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "delete")]
    Delete,
    #[serde(alias = "options")]
    Options,
    #[serde(alias = "head")]
    Head,
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "trace")]
    Trace,
}

impl HttpMethod {
    /// All methods in path item serialization order
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Whether requests with this method carry a body by default
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unsupported HTTP method: {}", s))
    }
}

/// Where a parameter is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
        }
    }
}

/// IP address protocol accepted by an address field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    #[default]
    Both,
    V4,
    V6,
}

/// Kind of value a field carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Integer {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    Uuid,
    Date,
    DateTime,
    Email,
    Uri,
    Slug,
    IpAddress {
        #[serde(default)]
        protocol: IpProtocol,
    },
    /// String constrained by a regular expression
    Pattern { pattern: String },
    Choice { choices: Vec<String> },
    MultipleChoice { choices: Vec<String> },
    List { child: Box<FieldShape> },
    Map { child: Box<FieldShape> },
    File,
    Object { shape: ObjectShape },
    /// Rust-style type name (`i64`, `Vec<String>`, `Option<Item>`, `Item`)
    Named { type_name: String },
}

fn default_true() -> bool {
    true
}

/// A typed field with its documentation attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldShape {
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl FieldShape {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: true,
            read_only: false,
            nullable: false,
            help_text: None,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String {
            min_length: None,
            max_length: None,
        })
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer {
            minimum: None,
            maximum: None,
        })
    }

    pub fn number() -> Self {
        Self::new(FieldKind::Number {
            minimum: None,
            maximum: None,
        })
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn named(type_name: &str) -> Self {
        Self::new(FieldKind::Named {
            type_name: type_name.to_string(),
        })
    }

    pub fn object(shape: ObjectShape) -> Self {
        Self::new(FieldKind::Object { shape })
    }

    pub fn list(child: FieldShape) -> Self {
        Self::new(FieldKind::List {
            child: Box::new(child),
        })
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_help_text(mut self, help_text: &str) -> Self {
        self.help_text = Some(help_text.to_string());
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Whether a file upload appears anywhere in this field
    pub fn contains_file(&self) -> bool {
        match &self.kind {
            FieldKind::File => true,
            FieldKind::List { child } | FieldKind::Map { child } => child.contains_file(),
            FieldKind::Object { shape } => shape.fields.values().any(FieldShape::contains_file),
            _ => false,
        }
    }
}

/// A structured request or response shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ObjectShape {
    /// Component name; `None` inlines the shape wherever it is used
    #[serde(default)]
    pub ref_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldShape>,
}

impl ObjectShape {
    /// Shape registered as a reusable component under `ref_name`
    pub fn named(ref_name: &str) -> Self {
        Self {
            ref_name: Some(ref_name.to_string()),
            ..Default::default()
        }
    }

    /// Shape that is always inlined
    pub fn inline() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_field(mut self, name: &str, field: FieldShape) -> Self {
        self.fields.insert(name.to_string(), field);
        self
    }
}

/// Parameter hint supplied by the handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamHint {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    #[serde(default = "FieldShape::string")]
    pub field: FieldShape,
    #[serde(default)]
    pub description: Option<String>,
}

impl ParamHint {
    pub fn new(name: &str, location: ParamLocation, field: FieldShape) -> Self {
        Self {
            name: name.to_string(),
            location,
            field,
            description: None,
        }
    }

    pub fn path(name: &str, field: FieldShape) -> Self {
        Self::new(name, ParamLocation::Path, field)
    }

    pub fn query(name: &str, field: FieldShape) -> Self {
        Self::new(name, ParamLocation::Query, field)
    }

    pub fn header(name: &str, field: FieldShape) -> Self {
        Self::new(name, ParamLocation::Header, field)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Identity used to detect duplicate and overriding parameters
    pub fn key(&self) -> (String, ParamLocation) {
        (self.name.clone(), self.location)
    }
}

/// Documented response for a status code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponseHint {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub body: Option<FieldShape>,
}

impl ResponseHint {
    pub fn described(description: &str) -> Self {
        Self {
            description: Some(description.to_string()),
            body: None,
        }
    }

    pub fn with_body(body: FieldShape) -> Self {
        Self {
            description: None,
            body: Some(body),
        }
    }
}

/// How the request body of an operation is documented
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RequestBodyOverride {
    /// Use the route's request shape when the method carries a body
    #[default]
    Default,
    /// Document no body at all
    NoBody,
    /// Document this body regardless of method
    Shape { body: FieldShape },
}

/// Per-route customization of the generated operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OperationOverrides {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub request_body: RequestBodyOverride,
    /// Shape whose fields become query parameters
    #[serde(default)]
    pub query_shape: Option<ObjectShape>,
    /// Replace automatic parameters with the same (name, location), append others
    #[serde(default)]
    pub manual_parameters: Vec<ParamHint>,
    /// Name of the registered inspector that must handle this route
    #[serde(default)]
    pub inspector: Option<String>,
}

/// One operation exposed by the hosting router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub method: HttpMethod,
    /// Path template, e.g. `/items/{id}`
    pub path: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParamHint>,
    #[serde(default)]
    pub request_body: Option<FieldShape>,
    /// Body of the automatic success response
    #[serde(default)]
    pub response: Option<FieldShape>,
    /// Explicitly documented responses keyed by status code.
    /// Any 2xx entry suppresses the automatic success response.
    #[serde(default)]
    pub responses: IndexMap<String, ResponseHint>,
    /// `None` infers list vs detail from the path
    #[serde(default)]
    pub list_view: Option<bool>,
    #[serde(default)]
    pub security: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    /// Only documented in private documents
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub overrides: OperationOverrides,
}

impl RouteEntry {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            summary: None,
            description: None,
            operation_id: None,
            tags: Vec::new(),
            parameters: Vec::new(),
            request_body: None,
            response: None,
            responses: IndexMap::new(),
            list_view: None,
            security: Vec::new(),
            deprecated: false,
            internal: false,
            overrides: OperationOverrides::default(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_operation_id(mut self, operation_id: &str) -> Self {
        self.operation_id = Some(operation_id.to_string());
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn with_parameter(mut self, parameter: ParamHint) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_request_body(mut self, body: FieldShape) -> Self {
        self.request_body = Some(body);
        self
    }

    pub fn with_response_body(mut self, body: FieldShape) -> Self {
        self.response = Some(body);
        self
    }

    pub fn with_response(mut self, status: &str, response: ResponseHint) -> Self {
        self.responses.insert(status.to_string(), response);
        self
    }

    pub fn with_list_view(mut self, list_view: bool) -> Self {
        self.list_view = Some(list_view);
        self
    }

    pub fn with_security(mut self, scheme: &str) -> Self {
        self.security.push(scheme.to_string());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn with_overrides(mut self, overrides: OperationOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// `METHOD /path`, used in log events and error messages
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Ordered route catalog supplied by the hosting router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RouteCatalog {
    pub routes: Vec<RouteEntry>,
    /// Shapes registered as components before any route is inspected
    #[serde(default)]
    pub shapes: Vec<ObjectShape>,
}

impl RouteCatalog {
    pub fn new(routes: Vec<RouteEntry>) -> Self {
        Self {
            routes,
            shapes: Vec::new(),
        }
    }

    pub fn with_shape(mut self, shape: ObjectShape) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl From<Vec<RouteEntry>> for RouteCatalog {
    fn from(routes: Vec<RouteEntry>) -> Self {
        Self::new(routes)
    }
}
