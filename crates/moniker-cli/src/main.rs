//! Moniker CLI - operator tooling for the moniker resolution catalog

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use moniker_catalog::CatalogDefinition;
use moniker_core::{Caller, MonikerService, ServiceConfig};
use moniker_telemetry::TracingSink;

#[derive(Parser)]
#[command(name = "moniker")]
#[command(about = "Moniker resolution service - catalog-driven data source directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Validate a catalog definition file
    Check {
        /// Catalog definition file path
        catalog: PathBuf,
    },
    /// Resolve a moniker against a catalog
    Resolve {
        /// The moniker to resolve (e.g. prices.equity/AAPL@latest)
        moniker: String,
        /// Catalog definition file path
        #[arg(short, long)]
        catalog: PathBuf,
        /// Calling application id for telemetry
        #[arg(long, default_value = "moniker-cli")]
        app: String,
    },
    /// Show full metadata for a catalog path
    Describe {
        /// Catalog path (e.g. prices.equity)
        path: String,
        #[arg(short, long)]
        catalog: PathBuf,
    },
    /// List every node in the catalog
    Tree {
        #[arg(short, long)]
        catalog: PathBuf,
    },
    /// Aggregate catalog counts
    Stats {
        #[arg(short, long)]
        catalog: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { catalog } => check(catalog),
        Commands::Resolve {
            moniker,
            catalog,
            app,
        } => {
            let service = open_service(catalog)?;
            let result = service.resolve(&moniker, &Caller::new(app))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            service.stop().await?;
            Ok(())
        }
        Commands::Describe { path, catalog } => {
            let service = open_service(catalog)?;
            let described = service.describe(&path, &Caller::new("moniker-cli"))?;
            println!("{}", serde_json::to_string_pretty(&described)?);
            service.stop().await?;
            Ok(())
        }
        Commands::Tree { catalog } => {
            let service = open_service(catalog)?;
            println!("{}", serde_json::to_string_pretty(&service.tree())?);
            service.stop().await?;
            Ok(())
        }
        Commands::Stats { catalog } => {
            let service = open_service(catalog)?;
            println!("{}", serde_json::to_string_pretty(&service.stats())?);
            service.stop().await?;
            Ok(())
        }
    }
}

fn open_service(catalog: PathBuf) -> anyhow::Result<MonikerService> {
    let mut config = ServiceConfig::from_env();
    config.catalog.path = Some(catalog);
    MonikerService::load(config, Arc::new(TracingSink)).context("failed to load catalog")
}

fn check(catalog: PathBuf) -> anyhow::Result<()> {
    let definition = CatalogDefinition::load(&catalog)
        .with_context(|| format!("failed to read {}", catalog.display()))?;
    let nodes = definition.into_nodes().context("invalid catalog definition")?;
    let registry = moniker_catalog::CatalogRegistry::from_nodes(nodes)?;

    if registry.is_empty() {
        bail!("catalog is empty");
    }
    let warnings = registry.validate_successors();
    for warning in &warnings {
        eprintln!("warning: {warning}");
    }
    println!(
        "{} nodes ok ({} successor warnings)",
        registry.len(),
        warnings.len()
    );
    Ok(())
}
