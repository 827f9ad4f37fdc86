mod commands;

use apidoc::logging::{init_logging, LoggingConfig};
use clap::{Parser, Subcommand};
use commands::export::ExportArgs;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "apidoc")]
#[command(about = "Generate and export OpenAPI documents from route catalogs")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the document for a route catalog to a file or stdout
    Export(ExportArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::verbosity(cli.verbose).with_json_format(cli.log_json);
    if let Err(e) = init_logging(&logging) {
        eprintln!("warning: {}", e);
    }

    let result = match cli.command {
        Commands::Export(args) => commands::export::run(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
