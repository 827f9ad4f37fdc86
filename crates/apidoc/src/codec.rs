use crate::{
    consistency::{check_consistency, visit_schemas},
    error::{ApiDocError, ApiDocResult},
    specification::SchemaGraph,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Output format of a rendered document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
    Html,
}

impl Format {
    /// Format named by a path suffix or `?format=` value.
    ///
    /// `openapi` is an alias for the raw JSON document.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.trim().to_ascii_lowercase().as_str() {
            "json" | "openapi" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "html" => Some(Format::Html),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Html => "html",
        }
    }

    /// Canonical media type
    pub fn media_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Yaml => "application/yaml",
            Format::Html => "text/html",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ApiDocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::from_suffix(s)
            .ok_or_else(|| ApiDocError::not_acceptable(format!("unsupported format `{}`", s)))
    }
}

/// Structured error body returned to HTTP callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl From<&ApiDocError> for ErrorBody {
    fn from(error: &ApiDocError) -> Self {
        Self::new(error.error_code(), &error.public_message())
    }
}

/// Check run on a document before it is serialized
pub trait DocumentValidator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, graph: &SchemaGraph) -> ApiDocResult<()>;
}

/// Re-checks reference resolution and operation id uniqueness
#[derive(Debug, Clone, Default)]
pub struct ReferenceValidator;

impl DocumentValidator for ReferenceValidator {
    fn name(&self) -> &str {
        "references"
    }

    fn validate(&self, graph: &SchemaGraph) -> ApiDocResult<()> {
        check_consistency(graph)
    }
}

/// Serializes documents to bytes
pub trait Codec: Send + Sync {
    fn format(&self) -> Format;

    fn media_type(&self) -> &'static str {
        self.format().media_type()
    }

    fn encode(&self, graph: &SchemaGraph) -> ApiDocResult<Vec<u8>>;

    fn encode_error(&self, body: &ErrorBody) -> ApiDocResult<Vec<u8>>;
}

fn run_validators(validators: &[Arc<dyn DocumentValidator>], graph: &SchemaGraph) -> ApiDocResult<()> {
    for validator in validators {
        validator.validate(graph)?;
    }
    Ok(())
}

fn default_validators() -> Vec<Arc<dyn DocumentValidator>> {
    vec![Arc::new(ReferenceValidator)]
}

/// JSON codec, pretty-printed by default
#[derive(Clone)]
pub struct JsonCodec {
    pretty: bool,
    validators: Vec<Arc<dyn DocumentValidator>>,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new(true)
    }
}

impl JsonCodec {
    pub fn new(pretty: bool) -> Self {
        Self {
            pretty,
            validators: default_validators(),
        }
    }

    pub fn compact() -> Self {
        Self::new(false)
    }

    pub fn with_validator(mut self, validator: Arc<dyn DocumentValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Replace all validators, including the reference validator
    pub fn with_validators(mut self, validators: Vec<Arc<dyn DocumentValidator>>) -> Self {
        self.validators = validators;
        self
    }
}

/// JSON has no representation for NaN or infinities
fn reject_non_finite(graph: &SchemaGraph) -> ApiDocResult<()> {
    visit_schemas(graph, |location, schema| {
        for (keyword, value) in [("minimum", schema.minimum), ("maximum", schema.maximum)] {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(ApiDocError::encoding(
                    format!("{}.{}", location, keyword),
                    format!("{} cannot be represented in JSON", value),
                ));
            }
        }
        Ok(())
    })
}

impl Codec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn encode(&self, graph: &SchemaGraph) -> ApiDocResult<Vec<u8>> {
        run_validators(&self.validators, graph)?;
        reject_non_finite(graph)?;

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(graph)
        } else {
            serde_json::to_vec(graph)
        };
        bytes.map_err(|e| ApiDocError::encoding("document", e))
    }

    fn encode_error(&self, body: &ErrorBody) -> ApiDocResult<Vec<u8>> {
        serde_json::to_vec(body).map_err(|e| ApiDocError::encoding("error", e))
    }
}

/// YAML codec emitting block style without anchors or aliases
#[derive(Clone)]
pub struct YamlCodec {
    validators: Vec<Arc<dyn DocumentValidator>>,
}

impl Default for YamlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl YamlCodec {
    pub fn new() -> Self {
        Self {
            validators: default_validators(),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn DocumentValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_validators(mut self, validators: Vec<Arc<dyn DocumentValidator>>) -> Self {
        self.validators = validators;
        self
    }
}

impl Codec for YamlCodec {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn encode(&self, graph: &SchemaGraph) -> ApiDocResult<Vec<u8>> {
        run_validators(&self.validators, graph)?;
        serde_yaml::to_string(graph)
            .map(String::into_bytes)
            .map_err(|e| ApiDocError::encoding("document", e))
    }

    fn encode_error(&self, body: &ErrorBody) -> ApiDocResult<Vec<u8>> {
        serde_yaml::to_string(body)
            .map(String::into_bytes)
            .map_err(|e| ApiDocError::encoding("error", e))
    }
}

/// Default codec for a raw document format
pub fn codec_for(format: Format, pretty: bool) -> Option<Arc<dyn Codec>> {
    match format {
        Format::Json => Some(Arc::new(JsonCodec::new(pretty))),
        Format::Yaml => Some(Arc::new(YamlCodec::new())),
        Format::Html => None,
    }
}

/// Decode a raw document previously produced by a codec
pub fn decode_document(format: Format, bytes: &[u8]) -> ApiDocResult<SchemaGraph> {
    match format {
        Format::Json => Ok(serde_json::from_slice(bytes)?),
        Format::Yaml => Ok(serde_yaml::from_slice(bytes)?),
        Format::Html => Err(ApiDocError::not_acceptable(
            "HTML pages do not contain a decodable document",
        )),
    }
}
