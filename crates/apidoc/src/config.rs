use crate::error::{ApiDocError, ApiDocResult};
use crate::specification::{
    Contact, ExternalDocumentation, Info, License, SecurityScheme, Server, Tag,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global metadata applied to every generated document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// OpenAPI specification version (should be "3.0.3")
    pub openapi_version: String,

    /// API information
    pub info: InfoConfig,

    /// Server configurations
    pub servers: Vec<ServerConfig>,

    /// Security schemes, only emitted in private documents
    pub security_schemes: IndexMap<String, SecurityScheme>,

    /// Global tags for grouping operations
    pub tags: Vec<TagConfig>,

    /// External documentation
    pub external_docs: Option<ExternalDocsConfig>,

    /// Mark `Option<T>` named types as nullable
    pub nullable_optional: bool,
}

/// API information section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoConfig {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    #[serde(default)]
    pub terms_of_service: Option<String>,
    #[serde(default)]
    pub contact: Option<ContactConfig>,
    #[serde(default)]
    pub license: Option<LicenseConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContactConfig {
    pub name: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConfig {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalDocsConfig {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        let mut security_schemes = IndexMap::new();
        security_schemes.insert(
            "bearerAuth".to_string(),
            SecurityScheme::Http {
                scheme: "bearer".to_string(),
                bearer_format: Some("JWT".to_string()),
            },
        );

        Self {
            openapi_version: "3.0.3".to_string(),
            info: InfoConfig {
                title: "API Documentation".to_string(),
                description: None,
                version: "1.0.0".to_string(),
                terms_of_service: None,
                contact: None,
                license: None,
            },
            servers: Vec::new(),
            security_schemes,
            tags: Vec::new(),
            external_docs: None,
            nullable_optional: true,
        }
    }
}

impl DocumentConfig {
    /// Create a new configuration with custom API info
    pub fn new(title: &str, version: &str) -> Self {
        let mut config = Self::default();
        config.info.title = title.to_string();
        config.info.version = version.to_string();
        config
    }

    /// Set the API description
    pub fn with_description(mut self, description: &str) -> Self {
        self.info.description = Some(description.to_string());
        self
    }

    /// Add a server configuration
    pub fn add_server(mut self, url: &str, description: Option<&str>) -> Self {
        self.servers.push(ServerConfig {
            url: url.to_string(),
            description: description.map(|s| s.to_string()),
        });
        self
    }

    /// Add a security scheme
    pub fn add_security_scheme(mut self, name: &str, scheme: SecurityScheme) -> Self {
        self.security_schemes.insert(name.to_string(), scheme);
        self
    }

    /// Remove all security schemes, including the default bearer scheme
    pub fn without_security_schemes(mut self) -> Self {
        self.security_schemes.clear();
        self
    }

    /// Add a tag
    pub fn add_tag(mut self, name: &str, description: Option<&str>) -> Self {
        self.tags.push(TagConfig {
            name: name.to_string(),
            description: description.map(|s| s.to_string()),
        });
        self
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(input: &str) -> ApiDocResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ApiDocResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Check required fields
    pub fn validate(&self) -> ApiDocResult<()> {
        if self.info.title.trim().is_empty() {
            return Err(ApiDocError::config_error("info.title must not be empty"));
        }
        if self.info.version.trim().is_empty() {
            return Err(ApiDocError::config_error("info.version must not be empty"));
        }
        if !self.openapi_version.starts_with("3.0") {
            return Err(ApiDocError::config_error(format!(
                "Unsupported OpenAPI version: {}",
                self.openapi_version
            )));
        }
        Ok(())
    }

    pub(crate) fn document_info(&self) -> Info {
        Info {
            title: self.info.title.clone(),
            description: self.info.description.clone(),
            terms_of_service: self.info.terms_of_service.clone(),
            contact: self.info.contact.as_ref().map(|c| Contact {
                name: c.name.clone(),
                url: c.url.clone(),
                email: c.email.clone(),
            }),
            license: self.info.license.as_ref().map(|l| License {
                name: l.name.clone(),
                url: l.url.clone(),
            }),
            version: self.info.version.clone(),
        }
    }

    pub(crate) fn document_servers(&self) -> Vec<Server> {
        self.servers
            .iter()
            .map(|s| Server {
                url: s.url.clone(),
                description: s.description.clone(),
                variables: None,
            })
            .collect()
    }

    pub(crate) fn document_tags(&self) -> Vec<Tag> {
        self.tags
            .iter()
            .map(|t| Tag {
                name: t.name.clone(),
                description: t.description.clone(),
                external_docs: None,
            })
            .collect()
    }

    pub(crate) fn document_external_docs(&self) -> Option<ExternalDocumentation> {
        self.external_docs.as_ref().map(|d| ExternalDocumentation {
            url: d.url.clone(),
            description: d.description.clone(),
        })
    }
}
