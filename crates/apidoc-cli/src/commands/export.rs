use anyhow::{Context, Result};
use apidoc::{
    export::{export_document, load_catalog, Destination, ExportOptions, ExportSummary},
    DocumentConfig, Format, SchemaGenerator,
};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Yaml,
}

impl From<ExportFormat> for Format {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Format::Json,
            ExportFormat::Yaml => Format::Yaml,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Output file, or `-` for stdout
    pub destination: String,

    /// Output format (defaults to the destination's extension, then JSON)
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,

    /// Export the public document (default)
    #[arg(long, conflicts_with = "private")]
    pub public: bool,

    /// Export the private document with internal routes and security
    #[arg(long)]
    pub private: bool,

    /// Route catalog (.json, .yaml or .yml)
    #[arg(long)]
    pub routes: PathBuf,

    /// Document settings (.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Compact JSON output
    #[arg(long)]
    pub compact: bool,
}

impl ExportArgs {
    fn destination(&self) -> Result<Destination> {
        self.destination
            .parse()
            .with_context(|| format!("invalid destination `{}`", self.destination))
    }

    fn options(&self, destination: &Destination) -> ExportOptions {
        let format = self
            .format
            .map(Format::from)
            .or_else(|| destination.implied_format())
            .unwrap_or(Format::Json);
        ExportOptions {
            format,
            public: self.public || !self.private,
            pretty: !self.compact,
        }
    }
}

pub fn run(args: &ExportArgs) -> Result<()> {
    let summary = export(args)?;
    if let Destination::File(path) = &summary.destination {
        eprintln!(
            "Exported {} operations to {} ({} bytes, {})",
            summary.operations,
            path.display(),
            summary.bytes,
            summary.format
        );
    }
    Ok(())
}

fn export(args: &ExportArgs) -> Result<ExportSummary> {
    let destination = args.destination()?;
    let options = args.options(&destination);

    let config = match &args.config {
        Some(path) => DocumentConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DocumentConfig::default(),
    };
    let catalog = load_catalog(&args.routes)
        .with_context(|| format!("failed to load routes {}", args.routes.display()))?;
    if catalog.is_empty() {
        warn!("Route catalog {} declares no routes", args.routes.display());
    }
    debug!(
        "Exporting {} routes as {} (public: {})",
        catalog.len(),
        options.format,
        options.public
    );

    let generator = SchemaGenerator::new(config);
    export_document(&generator, &catalog, &options, &destination)
        .with_context(|| format!("failed to export {}", destination))
}
