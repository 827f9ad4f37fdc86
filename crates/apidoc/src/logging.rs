//! Logging setup for binaries embedding the document views or running exports.
//!
//! Output goes to stderr so exported documents can be piped from stdout.

use crate::error::{ApiDocError, ApiDocResult};
use serde::Deserialize;
use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// JSON structured logging instead of plain text
    pub json_format: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Complex filters like "apidoc=debug,tower=info"; overrides `level`
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            include_location: false,
            env_filter: Some("apidoc=info,tower=warn,axum=warn".to_string()),
        }
    }

    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            include_location: true,
            env_filter: Some("apidoc=debug,apidoc_cli=debug".to_string()),
        }
    }

    /// Map a `-v` count to a level: 0 warn, 1 info, 2 debug, 3+ trace
    pub fn verbosity(count: u8) -> Self {
        let level = match count {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            level: level.to_string(),
            ..Default::default()
        }
    }

    pub fn with_json_format(mut self, json: bool) -> Self {
        self.json_format = json;
        self
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive in effect when `RUST_LOG` is unset
    pub fn directive(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(&self.level)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_logging(config: &LoggingConfig) -> ApiDocResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directive()))
        .map_err(|e| ApiDocError::config_error(format!("invalid log filter: {}", e)))?;

    let layer = Layer::new()
        .with_writer(io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let installed = if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
    };
    installed.map_err(|e| ApiDocError::config_error(format!("logging already initialized: {}", e)))?;

    tracing::debug!(
        "Logging initialized (level: {}, format: {})",
        config.directive(),
        if config.json_format { "JSON" } else { "text" }
    );
    Ok(())
}
