/*!
Document renderers and content negotiation.

A renderer produces one presentation of a document: the raw serialized
document or an HTML page that loads it into Swagger UI or ReDoc. The view
keeps an ordered renderer list and [`negotiate`] picks one per request from
an explicit format or the `Accept` header.
*/

use crate::{
    codec::{Codec, Format},
    error::{ApiDocError, ApiDocResult},
    specification::SchemaGraph,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// How a document is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presentation {
    Raw,
    SwaggerUi,
    Redoc,
}

impl Presentation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presentation::Raw => "raw",
            Presentation::SwaggerUi => "swagger_ui",
            Presentation::Redoc => "redoc",
        }
    }
}

/// Negotiated presentation and format pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RendererSelection {
    pub presentation: Presentation,
    pub format: Format,
}

/// What a renderer needs from the request
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub graph: &'a SchemaGraph,
    /// URL of the raw JSON document, embedded by UI pages
    pub document_url: &'a str,
}

/// Rendered artifact
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Produces one presentation of a document
pub trait Renderer: Send + Sync {
    fn selection(&self) -> RendererSelection;

    fn media_type(&self) -> &'static str;

    /// Whether this renderer satisfies an exact `Accept` media type
    fn accepts(&self, media_type: &str) -> bool {
        media_type == self.media_type()
    }

    fn render(&self, input: &RenderInput<'_>) -> ApiDocResult<Rendered>;
}

/// Serialized document through a codec
#[derive(Clone)]
pub struct RawRenderer {
    codec: Arc<dyn Codec>,
}

impl RawRenderer {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }
}

impl Renderer for RawRenderer {
    fn selection(&self) -> RendererSelection {
        RendererSelection {
            presentation: Presentation::Raw,
            format: self.codec.format(),
        }
    }

    fn media_type(&self) -> &'static str {
        self.codec.media_type()
    }

    fn accepts(&self, media_type: &str) -> bool {
        let aliases: &[&str] = match self.codec.format() {
            Format::Json => &["application/vnd.oai.openapi+json"],
            Format::Yaml => &[
                "application/x-yaml",
                "text/yaml",
                "text/x-yaml",
                "application/vnd.oai.openapi",
            ],
            Format::Html => &[],
        };
        media_type == self.media_type() || aliases.contains(&media_type)
    }

    fn render(&self, input: &RenderInput<'_>) -> ApiDocResult<Rendered> {
        Ok(Rendered {
            body: self.codec.encode(input.graph)?,
            content_type: self.codec.media_type().to_string(),
        })
    }
}

/// OAuth client settings passed to Swagger UI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub client_id: String,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub use_pkce: bool,
}

/// Settings shared by the HTML presentations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Page title; the document title when unset
    pub title: Option<String>,
    /// Base URL the UI bundles are loaded from
    pub cdn_base: String,
    pub swagger_ui_version: String,
    pub redoc_version: String,
    /// Swagger UI validator badge URL; disabled when unset
    pub validator_url: Option<String>,
    pub deep_linking: bool,
    pub oauth: Option<OAuthSettings>,
    pub custom_css: Option<String>,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            title: None,
            cdn_base: "https://cdn.jsdelivr.net/npm".to_string(),
            swagger_ui_version: "5".to_string(),
            redoc_version: "2".to_string(),
            validator_url: None,
            deep_linking: true,
            oauth: None,
            custom_css: None,
        }
    }
}

impl UiSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_cdn_base(mut self, cdn_base: &str) -> Self {
        self.cdn_base = cdn_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_validator_url(mut self, url: &str) -> Self {
        self.validator_url = Some(url.to_string());
        self
    }

    pub fn with_deep_linking(mut self, enabled: bool) -> Self {
        self.deep_linking = enabled;
        self
    }

    pub fn with_oauth(mut self, oauth: OAuthSettings) -> Self {
        self.oauth = Some(oauth);
        self
    }

    pub fn with_custom_css(mut self, css: &str) -> Self {
        self.custom_css = Some(css.to_string());
        self
    }

    fn page_title(&self, graph: &SchemaGraph) -> String {
        let title = self.title.as_deref().unwrap_or(&graph.info.title);
        html_escape::encode_text(title).to_string()
    }

    fn style(&self) -> String {
        // CSS is inserted into a <style> element, so it must not close it
        self.custom_css
            .as_deref()
            .unwrap_or("")
            .replace("</", "<\\/")
    }
}

/// JSON value safe to embed in an inline `<script>`
fn script_literal(value: &serde_json::Value) -> ApiDocResult<String> {
    let text = serde_json::to_string(value).map_err(|e| ApiDocError::encoding("ui", e))?;
    Ok(text.replace("</", "<\\/"))
}

fn html(body: String) -> Rendered {
    Rendered {
        body: body.into_bytes(),
        content_type: "text/html; charset=utf-8".to_string(),
    }
}

/// Swagger UI page loading the raw document from its URL
#[derive(Debug, Clone, Default)]
pub struct SwaggerUiRenderer {
    settings: UiSettings,
}

impl SwaggerUiRenderer {
    pub fn new(settings: UiSettings) -> Self {
        Self { settings }
    }
}

impl Renderer for SwaggerUiRenderer {
    fn selection(&self) -> RendererSelection {
        RendererSelection {
            presentation: Presentation::SwaggerUi,
            format: Format::Html,
        }
    }

    fn media_type(&self) -> &'static str {
        "text/html"
    }

    fn render(&self, input: &RenderInput<'_>) -> ApiDocResult<Rendered> {
        let settings = &self.settings;
        let ui_config = script_literal(&json!({
            "url": input.document_url,
            "dom_id": "#swagger-ui",
            "deepLinking": settings.deep_linking,
            "validatorUrl": settings.validator_url,
            "layout": "StandaloneLayout",
            "filter": true,
        }))?;
        let oauth = match &settings.oauth {
            Some(oauth) => format!(
                "ui.initOAuth({});",
                script_literal(&json!({
                    "clientId": oauth.client_id,
                    "realm": oauth.realm,
                    "appName": oauth.app_name,
                    "scopes": oauth.scopes,
                    "usePkceWithAuthorizationCodeGrant": oauth.use_pkce,
                }))?
            ),
            None => String::new(),
        };
        let bundle = format!(
            "{}/swagger-ui-dist@{}",
            settings.cdn_base, settings.swagger_ui_version
        );

        Ok(html(format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" type="text/css" href="{bundle}/swagger-ui.css" />
    <style>
        html {{
            box-sizing: border-box;
            overflow-y: scroll;
        }}

        *, *:before, *:after {{
            box-sizing: inherit;
        }}

        body {{
            margin: 0;
            background: #fafafa;
        }}

        {css}
    </style>
</head>
<body>
    <div id="swagger-ui"></div>

    <script src="{bundle}/swagger-ui-bundle.js"></script>
    <script src="{bundle}/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {{
            const config = {ui_config};
            config.presets = [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset];
            config.plugins = [SwaggerUIBundle.plugins.DownloadUrl];
            const ui = SwaggerUIBundle(config);
            {oauth}
            window.ui = ui;
        }};
    </script>
</body>
</html>"#,
            title = settings.page_title(input.graph),
            bundle = bundle,
            css = settings.style(),
            ui_config = ui_config,
            oauth = oauth,
        )))
    }
}

/// ReDoc page loading the raw document from its URL
#[derive(Debug, Clone, Default)]
pub struct RedocRenderer {
    settings: UiSettings,
}

impl RedocRenderer {
    pub fn new(settings: UiSettings) -> Self {
        Self { settings }
    }
}

impl Renderer for RedocRenderer {
    fn selection(&self) -> RendererSelection {
        RendererSelection {
            presentation: Presentation::Redoc,
            format: Format::Html,
        }
    }

    fn media_type(&self) -> &'static str {
        "text/html"
    }

    fn render(&self, input: &RenderInput<'_>) -> ApiDocResult<Rendered> {
        let settings = &self.settings;
        let url = script_literal(&json!(input.document_url))?;

        Ok(html(format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            margin: 0;
            padding: 0;
        }}

        {css}
    </style>
</head>
<body>
    <div id="redoc-container"></div>

    <script src="{cdn}/redoc@{version}/bundles/redoc.standalone.js"></script>
    <script>
        Redoc.init({url}, {{ expandResponses: "200,201" }}, document.getElementById("redoc-container"));
    </script>
</body>
</html>"#,
            title = settings.page_title(input.graph),
            css = settings.style(),
            cdn = settings.cdn_base,
            version = settings.redoc_version,
            url = url,
        )))
    }
}

/// One media range of an `Accept` header
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    pub media_type: String,
    pub quality: f32,
}

impl MediaRange {
    /// Parse a single range such as `application/json;q=0.8`
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(';');
        let media_type = parts.next()?.trim().to_ascii_lowercase();
        if !media_type.contains('/') {
            return None;
        }

        let mut quality = 1.0;
        for param in parts {
            if let Some((key, val)) = param.split_once('=') {
                if key.trim() == "q" {
                    quality = val.trim().parse().unwrap_or(1.0);
                }
            }
        }

        Some(Self {
            media_type,
            quality,
        })
    }
}

/// Parse an `Accept` header into ranges ordered by preference.
///
/// Ranges with `q=0` are dropped; equal qualities keep header order.
pub fn parse_accept(header: &str) -> Vec<MediaRange> {
    let mut ranges: Vec<MediaRange> = header
        .split(',')
        .filter_map(|value| MediaRange::parse(value.trim()))
        .filter(|range| range.quality > 0.0)
        .collect();
    ranges.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranges
}

/// Media ranges an `Accept` header refuses with `q=0`
pub fn refused_ranges(header: &str) -> Vec<String> {
    header
        .split(',')
        .filter_map(|value| MediaRange::parse(value.trim()))
        .filter(|range| range.quality <= 0.0)
        .map(|range| range.media_type)
        .collect()
}

fn category_matches(renderer: &dyn Renderer, category: &str) -> bool {
    renderer
        .media_type()
        .split('/')
        .next()
        .is_some_and(|kind| kind == category)
}

fn specificity(media_type: &str) -> u8 {
    if media_type == "*/*" {
        0
    } else if media_type.ends_with("/*") {
        1
    } else {
        2
    }
}

/// Whether a `q=0` range at least as specific as `range` covers the renderer
fn is_refused(renderer: &dyn Renderer, refused: &[String], range: &str) -> bool {
    let level = specificity(range);
    refused
        .iter()
        .filter(|media_type| specificity(media_type) >= level)
        .any(|media_type| match specificity(media_type) {
            0 => true,
            1 => media_type
                .strip_suffix("/*")
                .is_some_and(|category| category_matches(renderer, category)),
            _ => renderer.accepts(media_type),
        })
}

/// Pick the renderer for a request.
///
/// An explicit format (path suffix or `?format=`) wins over `Accept`.
/// Without either, the first renderer is used. Wildcards never resolve
/// to a renderer the header refuses with `q=0`.
pub fn negotiate(
    renderers: &[Arc<dyn Renderer>],
    accept: Option<&str>,
    explicit: Option<Format>,
) -> ApiDocResult<Arc<dyn Renderer>> {
    let first = renderers
        .first()
        .ok_or_else(|| ApiDocError::not_acceptable("no renderers are configured"))?;

    if let Some(format) = explicit {
        return renderers
            .iter()
            .find(|r| r.selection().format == format)
            .cloned()
            .ok_or_else(|| {
                ApiDocError::not_acceptable(format!("format `{}` is not served here", format))
            });
    }

    let accept = match accept.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(Arc::clone(first)),
    };

    let refused = refused_ranges(accept);

    for range in parse_accept(accept) {
        let allowed =
            |r: &&Arc<dyn Renderer>| !is_refused(r.as_ref(), &refused, &range.media_type);
        let found = if range.media_type == "*/*" {
            renderers.iter().find(allowed)
        } else if let Some(category) = range.media_type.strip_suffix("/*") {
            renderers
                .iter()
                .filter(allowed)
                .find(|r| category_matches(r.as_ref(), category))
        } else {
            renderers
                .iter()
                .filter(allowed)
                .find(|r| r.accepts(&range.media_type))
        };
        if let Some(renderer) = found {
            return Ok(Arc::clone(renderer));
        }
    }

    Err(ApiDocError::not_acceptable(format!(
        "none of `{}` can be produced",
        accept
    )))
}
