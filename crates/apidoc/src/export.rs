use crate::{
    codec::{codec_for, decode_document, Format},
    error::{ApiDocError, ApiDocResult},
    generator::SchemaGenerator,
    route::RouteCatalog,
    specification::SchemaGraph,
};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Where an exported document goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    /// Format implied by the file extension, if any
    pub fn implied_format(&self) -> Option<Format> {
        match self {
            Destination::Stdout => None,
            Destination::File(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(Format::from_suffix)
                .filter(|format| *format != Format::Html),
        }
    }
}

impl FromStr for Destination {
    type Err = ApiDocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ApiDocError::config_error("export destination must not be empty")),
            "-" => Ok(Destination::Stdout),
            path => Ok(Destination::File(PathBuf::from(path))),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Stdout => f.write_str("-"),
            Destination::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub format: Format,
    pub public: bool,
    pub pretty: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: Format::Json,
            public: true,
            pretty: true,
        }
    }
}

/// What an export produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub destination: Destination,
    pub format: Format,
    pub bytes: usize,
    pub operations: usize,
}

/// Generate without a request context and encode.
///
/// Nothing is written if generation or encoding fails.
pub fn render_document(
    generator: &SchemaGenerator,
    catalog: &RouteCatalog,
    options: &ExportOptions,
) -> ApiDocResult<(SchemaGraph, Vec<u8>)> {
    let codec = codec_for(options.format, options.pretty).ok_or_else(|| {
        ApiDocError::not_acceptable(format!("cannot export `{}` documents", options.format))
    })?;
    let graph = generator.generate(catalog, options.public, None)?;
    let bytes = codec.encode(&graph)?;
    Ok((graph, bytes))
}

/// Generate, encode and write a document
pub fn export_document(
    generator: &SchemaGenerator,
    catalog: &RouteCatalog,
    options: &ExportOptions,
    destination: &Destination,
) -> ApiDocResult<ExportSummary> {
    let (graph, bytes) = render_document(generator, catalog, options)?;

    match destination {
        Destination::Stdout => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
        Destination::File(path) => write_atomic(path, &bytes)?,
    }

    info!(
        "Exported {} document with {} operations to {}",
        options.format,
        graph.operation_count(),
        destination
    );
    Ok(ExportSummary {
        destination: destination.clone(),
        format: options.format,
        bytes: bytes.len(),
        operations: graph.operation_count(),
    })
}

/// Replace `path` with `bytes` through a temp file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> ApiDocResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.is_dir() {
        fs::create_dir_all(&dir)?;
    }

    let mut file = NamedTempFile::new_in(&dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| ApiDocError::Io(e.error))?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

fn format_of(path: &Path) -> ApiDocResult<Format> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    match Format::from_suffix(extension) {
        Some(format @ (Format::Json | Format::Yaml)) => Ok(format),
        _ => Err(ApiDocError::config_error(format!(
            "unsupported file extension `{}` for {}",
            extension,
            path.display()
        ))),
    }
}

/// Load a route catalog from a `.json`, `.yaml` or `.yml` file
pub fn load_catalog<P: AsRef<Path>>(path: P) -> ApiDocResult<RouteCatalog> {
    let path = path.as_ref();
    let format = format_of(path)?;
    let content = fs::read(path)?;
    let catalog = match format {
        Format::Yaml => serde_yaml::from_slice(&content)?,
        _ => serde_json::from_slice(&content)?,
    };
    Ok(catalog)
}

/// Load a previously exported document
pub fn load_document<P: AsRef<Path>>(path: P) -> ApiDocResult<SchemaGraph> {
    let path = path.as_ref();
    let format = format_of(path)?;
    decode_document(format, &fs::read(path)?)
}
