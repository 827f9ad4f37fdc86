/*!
Route inspector hooks.

A [`RouteInspector`] turns one [`RouteEntry`] into an [`Operation`]. The
generator tries inspectors in registration order and keeps the first one
that does not skip. [`DefaultRouteInspector`] covers ordinary routes;
applications register their own for routes it cannot describe.

[`DocumentHook`]s run once per document after all routes are inspected.
*/

use crate::{
    config::DocumentConfig,
    error::{ApiDocError, ApiDocResult},
    route::{FieldShape, HttpMethod, ParamHint, ParamLocation, RequestBodyOverride, RouteEntry},
    schema::{ComponentRegistry, SchemaBuilder},
    specification::{
        MediaType, Operation, Parameter, RequestBody, Response, Schema, SchemaGraph, Server,
    },
    view::RequestContext,
};
use indexmap::IndexMap;

/// Outcome of inspecting one route
#[derive(Debug, Clone, PartialEq)]
pub enum Inspection {
    Operation(Operation),
    /// The inspector does not handle this route
    Skip(String),
}

/// Run-local state shared with inspectors
pub struct InspectionContext<'a> {
    pub config: &'a DocumentConfig,
    pub public: bool,
    /// Request that triggered generation, `None` for offline export
    pub request: Option<&'a RequestContext>,
    pub schemas: &'a SchemaBuilder,
    pub registry: &'a mut ComponentRegistry,
}

/// Maps a route to an operation description
pub trait RouteInspector: Send + Sync {
    /// Name used by per-route `inspector` overrides
    fn name(&self) -> &str;

    fn interpret(
        &self,
        route: &RouteEntry,
        ctx: &mut InspectionContext<'_>,
    ) -> ApiDocResult<Inspection>;
}

/// Whole-document post-processing step
pub trait DocumentHook: Send + Sync {
    fn apply(
        &self,
        graph: &mut SchemaGraph,
        request: Option<&RequestContext>,
        public: bool,
    ) -> ApiDocResult<()>;
}

/// Adds a server entry derived from the request's `Host` and
/// `X-Forwarded-Proto` headers when the configuration declares none
#[derive(Debug, Clone, Default)]
pub struct RequestServerHook;

impl DocumentHook for RequestServerHook {
    fn apply(
        &self,
        graph: &mut SchemaGraph,
        request: Option<&RequestContext>,
        _public: bool,
    ) -> ApiDocResult<()> {
        if !graph.servers.is_empty() {
            return Ok(());
        }
        if let Some(url) = request.and_then(RequestContext::base_url) {
            graph.servers.push(Server {
                url,
                description: None,
                variables: None,
            });
        }
        Ok(())
    }
}

/// Parsed path template such as `/items/{id}/reviews`
#[derive(Debug, Clone, PartialEq)]
pub struct PathTemplate {
    segments: Vec<String>,
    params: Vec<String>,
}

impl PathTemplate {
    /// Parse a template, rejecting unbalanced braces, non-identifier
    /// parameter names and repeated parameters
    pub fn parse(path: &str) -> ApiDocResult<Self> {
        if !path.starts_with('/') {
            return Err(ApiDocError::consistency(format!(
                "path `{}` must start with '/'",
                path
            )));
        }

        let mut params: Vec<String> = Vec::new();
        let mut current: Option<String> = None;
        for c in path.chars() {
            match c {
                '{' => {
                    if current.is_some() {
                        return Err(ApiDocError::consistency(format!(
                            "nested '{{' in path `{}`",
                            path
                        )));
                    }
                    current = Some(String::new());
                }
                '}' => {
                    let Some(name) = current.take() else {
                        return Err(ApiDocError::consistency(format!(
                            "unbalanced '}}' in path `{}`",
                            path
                        )));
                    };
                    if !is_param_name(&name) {
                        return Err(ApiDocError::consistency(format!(
                            "invalid parameter name `{}` in path `{}`",
                            name, path
                        )));
                    }
                    if params.contains(&name) {
                        return Err(ApiDocError::consistency(format!(
                            "parameter `{}` repeated in path `{}`",
                            name, path
                        )));
                    }
                    params.push(name);
                }
                other => {
                    if let Some(name) = current.as_mut() {
                        name.push(other);
                    }
                }
            }
        }
        if current.is_some() {
            return Err(ApiDocError::consistency(format!(
                "unclosed '{{' in path `{}`",
                path
            )));
        }

        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self { segments, params })
    }

    /// Parameter names in template order
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p == name)
    }

    /// Segments without parameters
    pub fn static_segments(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .filter(|s| !s.contains('{'))
            .map(String::as_str)
    }

    /// Whether the last segment addresses a single resource
    pub fn ends_with_param(&self) -> bool {
        self.segments.last().is_some_and(|s| s.contains('{'))
    }
}

fn is_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether a GET route returns a collection.
///
/// An explicit hint wins; otherwise a route whose last segment is a path
/// parameter is a detail view.
pub fn is_list_view(route: &RouteEntry, template: &PathTemplate) -> bool {
    route
        .list_view
        .unwrap_or_else(|| route.method == HttpMethod::Get && !template.ends_with_param())
}

/// Human-readable description of a status code
pub fn status_description(status: &str) -> &'static str {
    match status {
        "200" => "OK",
        "201" => "Created",
        "202" => "Accepted",
        "204" => "No Content",
        "301" => "Moved Permanently",
        "304" => "Not Modified",
        "400" => "Bad Request",
        "401" => "Unauthorized",
        "403" => "Forbidden",
        "404" => "Not Found",
        "405" => "Method Not Allowed",
        "409" => "Conflict",
        "422" => "Unprocessable Entity",
        "429" => "Too Many Requests",
        "500" => "Internal Server Error",
        "503" => "Service Unavailable",
        _ => "Response",
    }
}

/// Inspector that handles every route from its declared hints
#[derive(Debug, Clone, Default)]
pub struct DefaultRouteInspector;

impl DefaultRouteInspector {
    pub const NAME: &'static str = "default";

    pub fn new() -> Self {
        Self
    }

    /// `{static segments}_{action}`, e.g. `items_reviews_list`
    pub fn derive_operation_id(route: &RouteEntry, template: &PathTemplate) -> String {
        let action = match route.method {
            HttpMethod::Get if is_list_view(route, template) => "list",
            HttpMethod::Get => "read",
            HttpMethod::Post => "create",
            HttpMethod::Put => "update",
            HttpMethod::Patch => "partial_update",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Trace => "trace",
        };

        let prefix: Vec<String> = template
            .static_segments()
            .map(|segment| {
                segment
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                    .collect()
            })
            .collect();
        let prefix = if prefix.is_empty() {
            "root".to_string()
        } else {
            prefix.join("_")
        };
        format!("{}_{}", prefix, action)
    }

    fn parameters(
        &self,
        route: &RouteEntry,
        template: &PathTemplate,
        ctx: &mut InspectionContext<'_>,
    ) -> ApiDocResult<Vec<Parameter>> {
        let label = route.label();
        check_unique_hints(&label, &route.parameters)?;
        check_unique_hints(&label, &route.overrides.manual_parameters)?;

        for hint in route
            .parameters
            .iter()
            .chain(&route.overrides.manual_parameters)
            .filter(|h| h.location == ParamLocation::Path)
        {
            if !template.has_param(&hint.name) {
                return Err(ApiDocError::consistency(format!(
                    "{}: path parameter `{}` is not in the path template",
                    label, hint.name
                )));
            }
        }

        let mut keyed: Vec<((String, ParamLocation), Parameter)> = Vec::new();

        // Path parameters follow template order; unhinted ones are strings
        for name in template.params() {
            let hint = route
                .parameters
                .iter()
                .find(|h| h.location == ParamLocation::Path && &h.name == name);
            let field = hint.map(|h| h.field.clone()).unwrap_or_else(FieldShape::string);
            let mut parameter = build_parameter(&label, name, ParamLocation::Path, &field, ctx)?;
            parameter.description = hint.and_then(|h| h.description.clone());
            parameter.required = Some(true);
            keyed.push(((name.clone(), ParamLocation::Path), parameter));
        }

        for hint in route
            .parameters
            .iter()
            .filter(|h| h.location != ParamLocation::Path)
        {
            let mut parameter = build_parameter(&label, &hint.name, hint.location, &hint.field, ctx)?;
            parameter.description = hint.description.clone();
            keyed.push((hint.key(), parameter));
        }

        if let Some(shape) = &route.overrides.query_shape {
            for (name, field) in &shape.fields {
                let key = (name.clone(), ParamLocation::Query);
                if keyed.iter().any(|(k, _)| *k == key) {
                    return Err(ApiDocError::consistency(format!(
                        "{}: query parameter `{}` declared twice",
                        label, name
                    )));
                }
                let mut parameter = build_parameter(&label, name, ParamLocation::Query, field, ctx)?;
                parameter.description = field.help_text.clone();
                keyed.push((key, parameter));
            }
        }

        for hint in &route.overrides.manual_parameters {
            let mut parameter = build_parameter(&label, &hint.name, hint.location, &hint.field, ctx)?;
            parameter.description = hint.description.clone();
            if hint.location == ParamLocation::Path {
                parameter.required = Some(true);
            }
            let key = hint.key();
            match keyed.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => *existing = parameter,
                None => keyed.push((key, parameter)),
            }
        }

        Ok(keyed.into_iter().map(|(_, p)| p).collect())
    }

    fn request_body(
        &self,
        route: &RouteEntry,
        ctx: &mut InspectionContext<'_>,
    ) -> ApiDocResult<Option<RequestBody>> {
        let body = match &route.overrides.request_body {
            RequestBodyOverride::NoBody => None,
            RequestBodyOverride::Shape { body } => Some(body),
            RequestBodyOverride::Default if route.method.has_body() => route.request_body.as_ref(),
            RequestBodyOverride::Default => None,
        };
        let Some(body) = body else {
            return Ok(None);
        };

        let media_type = if body.contains_file() {
            "multipart/form-data"
        } else {
            "application/json"
        };
        let schema = ctx.schemas.field_schema(body, ctx.registry)?;

        let mut content = IndexMap::new();
        content.insert(
            media_type.to_string(),
            MediaType {
                schema: Some(schema),
                example: None,
            },
        );
        Ok(Some(RequestBody {
            description: body.help_text.clone(),
            content,
            required: Some(body.required),
        }))
    }

    fn responses(
        &self,
        route: &RouteEntry,
        template: &PathTemplate,
        ctx: &mut InspectionContext<'_>,
    ) -> ApiDocResult<IndexMap<String, Response>> {
        let mut responses = IndexMap::new();

        let declares_success = route.responses.keys().any(|status| status.starts_with('2'));
        if !declares_success {
            let status = match route.method {
                HttpMethod::Post => "201",
                HttpMethod::Delete => "204",
                _ => "200",
            };
            let body = match (&route.response, status) {
                (_, "204") | (None, _) => None,
                (Some(shape), _) => {
                    let schema = ctx.schemas.field_schema(shape, ctx.registry)?;
                    if route.method == HttpMethod::Get && is_list_view(route, template) {
                        Some(Schema::array_of(schema))
                    } else {
                        Some(schema)
                    }
                }
            };
            responses.insert(
                status.to_string(),
                Response {
                    description: status_description(status).to_string(),
                    content: json_content(body),
                },
            );
        }

        for (status, hint) in &route.responses {
            let body = match &hint.body {
                Some(shape) => Some(ctx.schemas.field_schema(shape, ctx.registry)?),
                None => None,
            };
            let description = hint
                .description
                .clone()
                .unwrap_or_else(|| status_description(status).to_string());
            responses.insert(
                status.clone(),
                Response {
                    description,
                    content: json_content(body),
                },
            );
        }

        Ok(responses)
    }
}

impl RouteInspector for DefaultRouteInspector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interpret(
        &self,
        route: &RouteEntry,
        ctx: &mut InspectionContext<'_>,
    ) -> ApiDocResult<Inspection> {
        let template = PathTemplate::parse(&route.path)?;

        let parameters = self.parameters(route, &template, ctx)?;
        let request_body = self.request_body(route, ctx)?;
        let responses = self.responses(route, &template, ctx)?;

        let tags = if route.tags.is_empty() {
            template
                .static_segments()
                .next()
                .map(|segment| vec![segment.to_string()])
                .unwrap_or_default()
        } else {
            route.tags.clone()
        };

        let security = if ctx.public {
            Vec::new()
        } else {
            route
                .security
                .iter()
                .map(|scheme| {
                    let mut requirement = IndexMap::new();
                    requirement.insert(scheme.clone(), Vec::new());
                    requirement
                })
                .collect()
        };

        let operation_id = route
            .operation_id
            .clone()
            .unwrap_or_else(|| Self::derive_operation_id(route, &template));

        Ok(Inspection::Operation(Operation {
            tags,
            summary: route.summary.clone(),
            description: route
                .overrides
                .description
                .clone()
                .or_else(|| route.description.clone()),
            operation_id: Some(operation_id),
            parameters,
            request_body,
            responses,
            security,
            deprecated: route.deprecated.then_some(true),
        }))
    }
}

fn check_unique_hints(label: &str, hints: &[ParamHint]) -> ApiDocResult<()> {
    for (index, hint) in hints.iter().enumerate() {
        if hints[..index].iter().any(|h| h.key() == hint.key()) {
            return Err(ApiDocError::consistency(format!(
                "{}: duplicate {} parameter `{}`",
                label,
                hint.location.as_str(),
                hint.name
            )));
        }
    }
    Ok(())
}

fn build_parameter(
    label: &str,
    name: &str,
    location: ParamLocation,
    field: &FieldShape,
    ctx: &mut InspectionContext<'_>,
) -> ApiDocResult<Parameter> {
    let schema = ctx
        .schemas
        .parameter_schema(label, name, field, ctx.registry)?;
    Ok(Parameter {
        name: name.to_string(),
        location: location.as_str().to_string(),
        description: None,
        required: Some(location == ParamLocation::Path || ctx.schemas.is_required(field)),
        deprecated: None,
        schema: Some(schema),
    })
}

fn json_content(schema: Option<Schema>) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    if let Some(schema) = schema {
        content.insert(
            "application/json".to_string(),
            MediaType {
                schema: Some(schema),
                example: None,
            },
        );
    }
    content
}
