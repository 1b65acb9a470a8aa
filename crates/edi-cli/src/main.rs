//! # edi-cli
//!
//! The `edi` binary: parse or validate EDI flat files and XML documents
//! against a schema file.

mod config;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use config::{Config, FormatChoice};
use edi_engine::{DocumentFormat, ParsedDocument, parse_flat_file, parse_xml_file};
use edi_schema::{DocumentPlug, SchemaLoader};
use edi_validation::ValidationReporter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edi")]
#[command(about = "Schema-driven EDI flat-file and XML parser")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a document and print its JSON report
    Parse {
        /// Input file path
        input: PathBuf,

        /// Schema file path (YAML or JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Input format
        #[arg(short, long, value_enum)]
        format: Option<FormatChoice>,

        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },

    /// Validate documents against a schema
    Validate {
        /// Input file paths
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Schema file path (YAML or JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Input format
        #[arg(short, long, value_enum)]
        format: Option<FormatChoice>,

        /// List errors only; warnings are still counted
        #[arg(long)]
        errors_only: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Parse {
            input,
            schema,
            format,
            pretty,
        } => {
            let plug = load_plug(&schema)?;
            let doc = parse_path(&input, plug, format.unwrap_or(config.default_format))?;
            let report = doc.report();
            let json = if pretty || config.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate {
            inputs,
            schema,
            format,
            errors_only,
        } => {
            let plug = load_plug(&schema)?;
            let format = format.unwrap_or(config.default_format);
            let reporter = ValidationReporter::new().with_warnings(!errors_only);
            validate(inputs, plug, format, &reporter).await
        }
    }
}

fn load_plug(path: &Path) -> anyhow::Result<Arc<DocumentPlug>> {
    let plug = SchemaLoader::default()
        .load_path(path)
        .with_context(|| format!("loading schema {}", path.display()))?;
    info!(schema = plug.name(), path = %path.display(), "Loaded schema");
    Ok(plug)
}

fn parse_path(
    path: &Path,
    plug: Arc<DocumentPlug>,
    format: FormatChoice,
) -> anyhow::Result<ParsedDocument> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let format = format.resolve(&bytes);
    debug!(path = %path.display(), ?format, "Parsing input");

    let doc = match format {
        DocumentFormat::FlatFile => parse_flat_file(Some(bytes.as_slice()), Some(plug)),
        DocumentFormat::Xml => parse_xml_file(Some(bytes.as_slice()), Some(plug)),
    };
    doc.with_context(|| format!("parsing {}", path.display()))
}

/// Parse every input on the blocking pool against one shared plug
async fn validate(
    inputs: Vec<PathBuf>,
    plug: Arc<DocumentPlug>,
    format: FormatChoice,
    reporter: &ValidationReporter,
) -> anyhow::Result<ExitCode> {
    let tasks: Vec<_> = inputs
        .into_iter()
        .map(|path| {
            let plug = Arc::clone(&plug);
            let task = tokio::task::spawn_blocking({
                let path = path.clone();
                move || parse_path(&path, plug, format)
            });
            (path, task)
        })
        .collect();

    let total = tasks.len();
    let mut valid = 0;
    for (path, task) in tasks {
        let doc = task
            .await
            .map_err(|e| anyhow!("validation task for {} failed: {e}", path.display()))??;
        if doc.is_valid() {
            valid += 1;
        }
        print!("{}: {}", path.display(), reporter.render_text(&doc.diagnostics));
    }

    println!("{valid} of {total} file(s) valid");
    Ok(if valid == total {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
