/*!
Cached schema views.

A [`SchemaViewFactory`] owns the generator, the route catalog and a
[`ViewConfig`]. It hands out [`SchemaView`]s (with or without an HTML
presentation) that share one cache, and can mount them on an axum
[`Router`].

Request flow: permission check, public flag, negotiation, rendered-bytes
cache, graph cache or generation, render, store.
*/

use crate::{
    cache::{CacheBackend, CacheKey, CachedDocument, MemoryBackend},
    codec::{Codec, DocumentValidator, ErrorBody, Format, JsonCodec, YamlCodec},
    error::{ApiDocError, ApiDocResult},
    generator::SchemaGenerator,
    renderer::{
        negotiate, Presentation, RawRenderer, RedocRenderer, RenderInput, Renderer,
        SwaggerUiRenderer, UiSettings,
    },
    route::RouteCatalog,
    specification::SchemaGraph,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The parts of an HTTP request the document views look at
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn new(method: Method, path: &str, query: Option<&str>, headers: HeaderMap) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: query.map(str::to_string),
            headers,
        }
    }

    pub fn from_parts(method: Method, uri: &Uri, headers: HeaderMap) -> Self {
        Self::new(method, uri.path(), uri.query(), headers)
    }

    /// Shorthand for a GET of `path_and_query` without headers
    pub fn get(path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };
        Self::new(Method::GET, path, query, HeaderMap::new())
    }

    pub fn with_header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn accept(&self) -> Option<&str> {
        self.header("accept")
    }

    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }

    fn suffix_format(&self) -> Option<Format> {
        let (_, suffix) = self.path.rsplit_once('.')?;
        match Format::from_suffix(suffix) {
            Some(format @ (Format::Json | Format::Yaml)) => Some(format),
            _ => None,
        }
    }

    /// Format forced by a `.json`/`.yaml` path suffix or `?format=`
    pub fn explicit_format(&self) -> ApiDocResult<Option<Format>> {
        if let Some(format) = self.suffix_format() {
            return Ok(Some(format));
        }
        self.query_param("format")
            .filter(|value| !value.is_empty())
            .map(str::parse)
            .transpose()
    }

    /// URL of the raw JSON document for UI pages to load
    pub fn document_url(&self) -> String {
        let path = match self.suffix_format() {
            Some(_) => self
                .path
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(self.path.as_str()),
            None => self.path.as_str(),
        };
        format!("{}?format=openapi", path)
    }

    /// `scheme://host` as seen by the client, if the request names a host
    pub fn base_url(&self) -> Option<String> {
        let host = self
            .header("x-forwarded-host")
            .or_else(|| self.header("host"))?
            .split(',')
            .next()?
            .trim();
        if host.is_empty() {
            return None;
        }
        let scheme = self
            .header("x-forwarded-proto")
            .and_then(|proto| proto.split(',').next())
            .map(str::trim)
            .filter(|proto| matches!(*proto, "http" | "https"))
            .unwrap_or("http");
        Some(format!("{}://{}", scheme, host))
    }
}

/// Authorization check run before anything else
pub trait PermissionCheck: Send + Sync {
    fn check(&self, request: &RequestContext) -> ApiDocResult<()>;
}

impl<F> PermissionCheck for F
where
    F: Fn(&RequestContext) -> ApiDocResult<()> + Send + Sync,
{
    fn check(&self, request: &RequestContext) -> ApiDocResult<()> {
        self(request)
    }
}

/// Lets every request through
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAny;

impl PermissionCheck for AllowAny {
    fn check(&self, _request: &RequestContext) -> ApiDocResult<()> {
        Ok(())
    }
}

/// Decides whether a request sees the public document
pub trait PublicPredicate: Send + Sync {
    fn is_public(&self, request: &RequestContext) -> bool;
}

impl<F> PublicPredicate for F
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    fn is_public(&self, request: &RequestContext) -> bool {
        self(request)
    }
}

/// Same flag for every request
#[derive(Debug, Clone, Copy)]
pub struct FixedPublic(pub bool);

impl PublicPredicate for FixedPublic {
    fn is_public(&self, _request: &RequestContext) -> bool {
        self.0
    }
}

/// View settings
#[derive(Clone)]
pub struct ViewConfig {
    /// Document variant id, part of every cache key
    pub variant: String,
    pub permission: Arc<dyn PermissionCheck>,
    pub public: Arc<dyn PublicPredicate>,
    /// `None` disables caching
    pub cache: Option<Arc<dyn CacheBackend>>,
    /// HTML presentation offered ahead of the raw formats
    pub ui: Option<Presentation>,
    pub ui_settings: UiSettings,
    /// Raw format listed first
    pub default_format: Format,
    pub pretty_json: bool,
    /// Extra validators run by both codecs
    pub validators: Vec<Arc<dyn DocumentValidator>>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            variant: "default".to_string(),
            permission: Arc::new(AllowAny),
            public: Arc::new(FixedPublic(true)),
            cache: Some(Arc::new(MemoryBackend::new())),
            ui: None,
            ui_settings: UiSettings::default(),
            default_format: Format::Json,
            pretty_json: true,
            validators: Vec::new(),
        }
    }
}

impl ViewConfig {
    pub fn new(variant: &str) -> Self {
        Self {
            variant: variant.to_string(),
            ..Default::default()
        }
    }

    pub fn with_permission<P: PermissionCheck + 'static>(mut self, permission: P) -> Self {
        self.permission = Arc::new(permission);
        self
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = Arc::new(FixedPublic(public));
        self
    }

    pub fn with_public_predicate<P: PublicPredicate + 'static>(mut self, predicate: P) -> Self {
        self.public = Arc::new(predicate);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn with_ui_settings(mut self, settings: UiSettings) -> Self {
        self.ui_settings = settings;
        self
    }

    pub fn with_default_format(mut self, format: Format) -> Self {
        self.default_format = format;
        self
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn DocumentValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    fn json_codec(&self) -> JsonCodec {
        self.validators
            .iter()
            .fold(JsonCodec::new(self.pretty_json), |codec, v| {
                codec.with_validator(Arc::clone(v))
            })
    }

    fn yaml_codec(&self) -> YamlCodec {
        self.validators
            .iter()
            .fold(YamlCodec::new(), |codec, v| codec.with_validator(Arc::clone(v)))
    }

    /// Renderers in negotiation order: UI page, default raw format, other raw format
    pub fn renderers(&self) -> Vec<Arc<dyn Renderer>> {
        let mut renderers: Vec<Arc<dyn Renderer>> = Vec::new();
        match self.ui {
            Some(Presentation::SwaggerUi) => {
                renderers.push(Arc::new(SwaggerUiRenderer::new(self.ui_settings.clone())))
            }
            Some(Presentation::Redoc) => {
                renderers.push(Arc::new(RedocRenderer::new(self.ui_settings.clone())))
            }
            Some(Presentation::Raw) | None => {}
        }

        let json: Arc<dyn Renderer> = Arc::new(RawRenderer::new(Arc::new(self.json_codec())));
        let yaml: Arc<dyn Renderer> = Arc::new(RawRenderer::new(Arc::new(self.yaml_codec())));
        match self.default_format {
            Format::Yaml => renderers.extend([yaml, json]),
            Format::Json | Format::Html => renderers.extend([json, yaml]),
        }
        renderers
    }
}

/// HTTP response produced by a view
#[derive(Debug, Clone, PartialEq)]
pub struct DocResponse {
    pub status: StatusCode,
    pub body: Bytes,
    pub content_type: String,
}

impl DocResponse {
    pub fn ok(document: CachedDocument) -> Self {
        Self {
            status: StatusCode::OK,
            body: document.body,
            content_type: document.content_type,
        }
    }

    /// Error response encoded in `format` when it is a raw format, JSON otherwise
    pub fn error(err: &ApiDocError, format: Option<Format>) -> Self {
        let body = ErrorBody::from(err);
        let encoded = match format {
            Some(Format::Yaml) => YamlCodec::new()
                .encode_error(&body)
                .map(|bytes| (bytes, Format::Yaml.media_type())),
            _ => JsonCodec::compact()
                .encode_error(&body)
                .map(|bytes| (bytes, Format::Json.media_type())),
        };
        let (bytes, content_type) = encoded.unwrap_or_else(|_| {
            (
                br#"{"error":{"code":"INTERNAL_ERROR","message":"Internal server error"}}"#
                    .to_vec(),
                Format::Json.media_type(),
            )
        });

        Self {
            status: err.status_code(),
            body: Bytes::from(bytes),
            content_type: content_type.to_string(),
        }
    }
}

impl IntoResponse for DocResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [
                (header::CONTENT_TYPE, self.content_type),
                (header::VARY, "Accept".to_string()),
            ],
            self.body,
        )
            .into_response()
    }
}

/// Boxed future returned by [`DocHandler`]
pub type DocFuture = Pin<Box<dyn Future<Output = DocResponse> + Send>>;

/// Framework-neutral handler for the raw document
pub type DocHandler = Arc<dyn Fn(RequestContext) -> DocFuture + Send + Sync>;

/// Builds views sharing one generator, catalog and cache
#[derive(Clone)]
pub struct SchemaViewFactory {
    generator: Arc<SchemaGenerator>,
    catalog: Arc<RouteCatalog>,
    config: ViewConfig,
}

impl SchemaViewFactory {
    pub fn new(generator: SchemaGenerator, catalog: RouteCatalog, config: ViewConfig) -> Self {
        Self {
            generator: Arc::new(generator),
            catalog: Arc::new(catalog),
            config,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    fn view(&self, ui: Option<Presentation>) -> SchemaView {
        let mut config = self.config.clone();
        config.ui = ui.filter(|p| *p != Presentation::Raw);
        SchemaView::new(Arc::clone(&self.generator), Arc::clone(&self.catalog), config)
    }

    /// View offering an HTML page ahead of the raw formats
    pub fn with_ui(&self, presentation: Presentation) -> SchemaView {
        self.view(Some(presentation))
    }

    /// View serving only the raw formats
    pub fn without_ui(&self) -> SchemaView {
        self.view(None)
    }

    /// Raw document view as a plain async callable
    pub fn as_cached_callable(&self) -> DocHandler {
        let view = self.without_ui();
        Arc::new(move |request: RequestContext| {
            let view = view.clone();
            Box::pin(async move { view.respond(&request).await }) as DocFuture
        })
    }

    /// Drop every cached artifact of this document variant
    pub async fn invalidate(&self) -> ApiDocResult<usize> {
        match &self.config.cache {
            Some(cache) => {
                let removed = cache.invalidate_variant(&self.config.variant).await?;
                info!(
                    "Invalidated {} cached entries for document variant `{}`",
                    removed, self.config.variant
                );
                Ok(removed)
            }
            None => Ok(0),
        }
    }
}

/// Serves one document in the negotiated presentation
#[derive(Clone)]
pub struct SchemaView {
    generator: Arc<SchemaGenerator>,
    catalog: Arc<RouteCatalog>,
    config: ViewConfig,
    renderers: Arc<Vec<Arc<dyn Renderer>>>,
}

impl SchemaView {
    fn new(generator: Arc<SchemaGenerator>, catalog: Arc<RouteCatalog>, config: ViewConfig) -> Self {
        let renderers = Arc::new(config.renderers());
        Self {
            generator,
            catalog,
            config,
            renderers,
        }
    }

    pub fn renderers(&self) -> &[Arc<dyn Renderer>] {
        &self.renderers
    }

    /// Serve a request, propagating failures
    pub async fn handle(&self, request: &RequestContext) -> ApiDocResult<DocResponse> {
        self.config.permission.check(request)?;

        let public = self.config.public.is_public(request);
        let explicit = request.explicit_format()?;
        let renderer = negotiate(&self.renderers, request.accept(), explicit)?;
        let selection = renderer.selection();

        let document_url = request.document_url();
        let key = CacheKey {
            variant: self.config.variant.clone(),
            format: selection.format,
            public,
            presentation: selection.presentation,
            base_url: request.base_url(),
            document_url: (selection.presentation != Presentation::Raw)
                .then(|| document_url.clone()),
        };

        if let Some(cache) = &self.config.cache {
            if let Some(document) = cache.get(&key).await? {
                debug!("Serving cached {:?} document", key);
                return Ok(DocResponse::ok(document));
            }
        }

        let graph = self.graph(&key, request).await?;
        let rendered = renderer.render(&RenderInput {
            graph: &graph,
            document_url: &document_url,
        })?;
        let document = CachedDocument {
            body: Bytes::from(rendered.body),
            content_type: rendered.content_type,
        };

        if let Some(cache) = &self.config.cache {
            cache.put(key, document.clone()).await?;
        }
        Ok(DocResponse::ok(document))
    }

    /// Serve a request, mapping failures to structured error responses
    pub async fn respond(&self, request: &RequestContext) -> DocResponse {
        match self.handle(request).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_client_error() {
                    warn!("Rejected document request {}: {}", request.path, err);
                } else {
                    error!("Failed to serve document {}: {}", request.path, err);
                }
                DocResponse::error(&err, request.explicit_format().ok().flatten())
            }
        }
    }

    async fn graph(&self, key: &CacheKey, request: &RequestContext) -> ApiDocResult<Arc<SchemaGraph>> {
        let graph_key = key.graph_key();
        if let Some(cache) = &self.config.cache {
            if let Some(graph) = cache.get_graph(&graph_key).await? {
                return Ok(graph);
            }
        }

        let generator = Arc::clone(&self.generator);
        let catalog = Arc::clone(&self.catalog);
        let request = request.clone();
        let public = key.public;
        let cancel = CancellationToken::new();
        // Dropping this future (client gone) cancels the blocking generation
        let guard = cancel.clone().drop_guard();

        let graph = tokio::task::spawn_blocking(move || {
            generator.generate_with_cancel(&catalog, public, Some(&request), &cancel)
        })
        .await
        .map_err(|e| ApiDocError::Internal(format!("generation task failed: {}", e)))??;
        guard.disarm();

        let graph = Arc::new(graph);
        if let Some(cache) = &self.config.cache {
            cache.put_graph(graph_key, Arc::clone(&graph)).await?;
        }
        Ok(graph)
    }

    /// Mount the view at `path`, `path.json` and `path.yaml`
    pub fn router(&self, path: &str) -> Router {
        let base = path.trim_end_matches('/');
        let base = if base.is_empty() { "/openapi" } else { base };

        Router::new()
            .route(base, get(serve_document))
            .route(&format!("{}.json", base), get(serve_document))
            .route(&format!("{}.yaml", base), get(serve_document))
            .with_state(self.clone())
    }
}

async fn serve_document(
    State(view): State<SchemaView>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> DocResponse {
    let request = RequestContext::from_parts(method, &uri, headers);
    view.respond(&request).await
}
