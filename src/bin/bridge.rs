//! model-bridge CLI
//!
//! Translates generic JSON models to record documents and back, driven by a
//! schema catalog.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use model_bridge::generic::{records_from_json, translate_generic_model, translate_generic_records};
use model_bridge::{BridgeConfig, GenericModel, SchemaCatalog};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-bridge")]
#[command(about = "Translate between domain models and schema-tagged records")]
struct Cli {
    /// Config file (layered over bridge.toml and BRIDGE__* variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Domain model -> record documents
    Forward {
        /// Generic model JSON
        #[arg(short, long)]
        model: PathBuf,
        /// Schema catalog JSON
        #[arg(short, long)]
        schemas: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record documents -> domain model
    Reverse {
        /// Record documents JSON
        #[arg(short, long)]
        records: PathBuf,
        /// Schema catalog JSON
        #[arg(short, long)]
        schemas: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the tags of a schema catalog
    Schemas {
        /// Schema catalog JSON
        #[arg(short, long)]
        schemas: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match BridgeConfig::load_from(cli.config.as_deref().and_then(Path::to_str)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli, &config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when the run should exit non-zero without a fatal error
fn run(cli: Cli, config: &BridgeConfig) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Forward {
            model,
            schemas,
            output,
        } => {
            let catalog = load_catalog(&schemas)?;
            let store = GenericModel::load(&model)
                .with_context(|| format!("reading model {}", model.display()))?
                .into_store()?;

            let report = translate_generic_model(&store, &catalog, config)?;
            write_output(output.as_deref(), &serde_json::to_string_pretty(&report.documents())?)?;

            for failure in &report.failures {
                eprintln!("{}", failure);
            }
            eprintln!("{}", report.summary());
            eprintln!("fingerprint: {}", report.fingerprint().short());

            Ok(!(config.translation.fail_on_error && report.has_errors()))
        }

        Commands::Reverse {
            records,
            schemas,
            output,
        } => {
            let catalog = load_catalog(&schemas)?;
            let content = fs::read_to_string(&records)
                .with_context(|| format!("reading records {}", records.display()))?;
            let records = records_from_json(&content, &catalog)?;

            let report = translate_generic_records(&records, &catalog, config)?;
            let model = GenericModel::from_store(&report.store);
            write_output(output.as_deref(), &serde_json::to_string_pretty(&model)?)?;

            for failure in &report.failures {
                eprintln!("{}", failure);
            }
            eprintln!(
                "{} records, {} objects, {} failures",
                records.len(),
                report.store.len(),
                report.failures.len()
            );

            Ok(!(config.translation.fail_on_error && report.has_errors()))
        }

        Commands::Schemas { schemas } => {
            let catalog = load_catalog(&schemas)?;
            if let Some(version) = catalog.version() {
                println!("Catalog version {}", version);
            }
            for tag in catalog.tags() {
                let Some(schema) = catalog.get(tag) else {
                    continue;
                };
                let group = schema
                    .extensible_group_arity()
                    .map(|n| format!(", group of {}", n))
                    .unwrap_or_default();
                println!(
                    "  {} ({} fields, {} required{})",
                    tag,
                    schema.field_count(),
                    schema.required.len(),
                    group
                );
            }
            println!("{} schemas", catalog.len());
            Ok(true)
        }
    }
}

fn load_catalog(path: &Path) -> anyhow::Result<SchemaCatalog> {
    SchemaCatalog::load(path).with_context(|| format!("loading schema catalog {}", path.display()))
}

fn write_output(path: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        }
        None => println!("{}", content),
    }
    Ok(())
}
