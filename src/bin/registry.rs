//! Data Model Registry CLI
//!
//! Commands for managing a file-backed data model registry.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use datamodel_registry::{
    DataModelInput, DataModelRegistry, FileStore, ModelVersion, Package, PackageStatus,
    PackageVersion, RegistryConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "datamodel-registry")]
#[command(about = "Versioned data model registry for plugin packages")]
struct Cli {
    /// Path to the registry (overrides the configured store path)
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the package catalog
    Package {
        #[command(subcommand)]
        command: PackageCommands,
    },

    /// Register a data model from a JSON file
    Register {
        /// Data model file (camelCase JSON)
        file: PathBuf,
    },

    /// List the latest data model of every package
    List,

    /// Show all entities of all latest data models with their references
    Overview,

    /// Show the entities of one package with their references
    View {
        /// Package name
        package: String,
    },

    /// Print a data model
    Show {
        /// Package name
        package: String,
        /// Data model version (defaults to latest)
        #[arg(short, long)]
        version: Option<u32>,
    },

    /// Verify checksums of every version of a package
    Verify {
        /// Package name
        package: String,
    },
}

#[derive(Subcommand)]
enum PackageCommands {
    /// Add a package version to the catalog
    Add {
        name: String,
        /// Package version (e.g., "v1.2.0")
        version: String,
        #[arg(short, long, value_enum, default_value = "registered")]
        status: StatusArg,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum StatusArg {
    Unregistered,
    Registered,
    Running,
    Stopped,
    Decommissioned,
}

impl From<StatusArg> for PackageStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Unregistered => PackageStatus::Unregistered,
            StatusArg::Registered => PackageStatus::Registered,
            StatusArg::Running => PackageStatus::Running,
            StatusArg::Stopped => PackageStatus::Stopped,
            StatusArg::Decommissioned => PackageStatus::Decommissioned,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = RegistryConfig::load_from(cli.config.as_deref())?;
    let path = cli.registry.unwrap_or_else(|| config.store_path());

    let mut store = FileStore::open(&path)?;
    if config.store.git_history {
        store = store.with_history(config.store.author.as_deref())?;
    }
    let store = Arc::new(store);
    let registry = DataModelRegistry::with_options(store.clone(), store.clone(), config.registration.clone());

    match cli.command {
        Commands::Package { command: PackageCommands::Add { name, version, status } } => {
            let version = PackageVersion::parse(&version)?;
            store.add_package(Package::new(name.clone(), version.clone()).with_status(status.into()))?;
            println!("✅ Added package {} {}", name, version);
        }

        Commands::Register { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let input: DataModelInput = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file.display()))?;
            let model = registry.register(input)?;
            println!(
                "✅ Registered {} data model v{} ({} entities)",
                model.package_name,
                model.version,
                model.entities.len()
            );
        }

        Commands::List => {
            let models = registry.all_data_models()?;
            if models.is_empty() {
                println!("No data models registered yet.");
            }
            for model in models {
                println!(
                    "  {} v{} {} ({} entities)",
                    model.package_name,
                    model.version,
                    model.created_at.format("%Y-%m-%d"),
                    model.entities.len()
                );
            }
        }

        Commands::Overview => {
            println!("{}", serde_json::to_string_pretty(&registry.overview()?)?);
        }

        Commands::View { package } => {
            println!("{}", serde_json::to_string_pretty(&registry.package_view(&package)?)?);
        }

        Commands::Show { package, version } => {
            let model = registry.data_model(&package, version.map(ModelVersion::new))?;
            println!("{}", serde_json::to_string_pretty(model.as_ref())?);
        }

        Commands::Verify { package } => {
            let versions = registry.verify(&package)?;
            println!("✅ {} versions of {} verified", versions.len(), package);
        }
    }

    Ok(())
}
