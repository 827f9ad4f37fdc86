use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for document generation and serving
pub type ApiDocResult<T> = Result<T, ApiDocError>;

/// Errors that can occur while generating, encoding or serving a document
#[derive(Debug, Error)]
pub enum ApiDocError {
    /// A hook could not interpret an otherwise well-formed route.
    /// The generator recovers from this by omitting the route.
    #[error("Cannot interpret route {route}: {message}")]
    RouteInterpretation { route: String, message: String },

    /// Duplicate operation id, dangling reference, malformed path template
    #[error("Generation consistency error: {0}")]
    GenerationConsistency(String),

    /// A value cannot be represented in the target serialization
    #[error("Encoding error at `{path}`: {message}")]
    Encoding { path: String, message: String },

    /// No acceptable presentation/format combination
    #[error("Not acceptable: {0}")]
    Negotiation(String),

    /// Raised by the caller-supplied permission check
    #[error("Permission denied: {message}")]
    PermissionDenied { status: StatusCode, message: String },

    /// The originating request went away while generating
    #[error("Document generation cancelled")]
    Cancelled,

    /// Cache backend failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (file export, catalog loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Background task failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiDocError {
    /// Create a new route interpretation error
    pub fn route_interpretation<R: ToString, M: ToString>(route: R, message: M) -> Self {
        Self::RouteInterpretation {
            route: route.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a new generation consistency error
    pub fn consistency<T: ToString>(msg: T) -> Self {
        Self::GenerationConsistency(msg.to_string())
    }

    /// Create a new encoding error for the field at `path`
    pub fn encoding<P: ToString, M: ToString>(path: P, message: M) -> Self {
        Self::Encoding {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a new negotiation error
    pub fn not_acceptable<T: ToString>(msg: T) -> Self {
        Self::Negotiation(msg.to_string())
    }

    /// Permission rejection with a 403 status
    pub fn forbidden<T: ToString>(msg: T) -> Self {
        Self::PermissionDenied {
            status: StatusCode::FORBIDDEN,
            message: msg.to_string(),
        }
    }

    /// Permission rejection with a 401 status
    pub fn unauthorized<T: ToString>(msg: T) -> Self {
        Self::PermissionDenied {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
        }
    }

    /// Create a new cache error
    pub fn cache_error<T: ToString>(msg: T) -> Self {
        Self::Cache(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config_error<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// HTTP status reported to callers
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiDocError::Negotiation(_) => StatusCode::NOT_ACCEPTABLE,
            ApiDocError::PermissionDenied { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error kind for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiDocError::RouteInterpretation { .. } => "ROUTE_INTERPRETATION_ERROR",
            ApiDocError::GenerationConsistency(_) => "GENERATION_CONSISTENCY_ERROR",
            ApiDocError::Encoding { .. } => "ENCODING_ERROR",
            ApiDocError::Negotiation(_) => "NOT_ACCEPTABLE",
            ApiDocError::PermissionDenied { .. } => "PERMISSION_DENIED",
            ApiDocError::Cancelled => "CANCELLED",
            ApiDocError::Cache(_) => "CACHE_ERROR",
            ApiDocError::Config(_) => "CONFIGURATION_ERROR",
            ApiDocError::Io(_)
            | ApiDocError::Json(_)
            | ApiDocError::Yaml(_)
            | ApiDocError::Toml(_)
            | ApiDocError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to expose to HTTP callers.
    ///
    /// Errors that may carry file system paths or backend details collapse
    /// to a generic message.
    pub fn public_message(&self) -> String {
        match self {
            ApiDocError::Io(_)
            | ApiDocError::Json(_)
            | ApiDocError::Yaml(_)
            | ApiDocError::Toml(_)
            | ApiDocError::Cache(_)
            | ApiDocError::Config(_)
            | ApiDocError::Internal(_) => "Internal server error".to_string(),
            ApiDocError::PermissionDenied { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the error is the caller's fault rather than a server fault
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for ApiDocError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.error_code(),
                "message": self.public_message(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ApiDocError::not_acceptable("text/csv").status_code(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(ApiDocError::forbidden("no").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiDocError::unauthorized("login").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiDocError::consistency("dup").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiDocError::encoding("$.paths", "bad").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_message_hides_internal_details() {
        let io = ApiDocError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "/srv/secret/catalog.yaml",
        ));
        assert_eq!(io.public_message(), "Internal server error");
        assert_eq!(io.error_code(), "INTERNAL_ERROR");

        let consistency = ApiDocError::consistency("duplicate operationId `items_list`");
        assert!(consistency.public_message().contains("items_list"));
        assert!(!consistency.is_client_error());
        assert!(ApiDocError::not_acceptable("x").is_client_error());
    }

    #[test]
    fn test_encoding_error_names_field_path() {
        let err = ApiDocError::encoding("components.schemas.Item.maximum", "NaN");
        assert!(err.to_string().contains("components.schemas.Item.maximum"));
    }
}
