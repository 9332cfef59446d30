//! Rust Lambda bundler - command line entry point
//!
//! Reads a deployment definition and:
//! - bundles its functions and extensions
//! - prints the bundling plan without building
//! - prints asset hashes known before building

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_lambda_bundler::archive::archive_directory;
use rust_lambda_bundler::props::AssetHashType;
use rust_lambda_bundler::{Bundler, BundlerConfig, DeploymentDefinition, PackageTarget};

#[derive(Parser)]
#[command(
    name = "rust-lambda-bundler",
    version,
    about = "Bundle Rust Lambda functions and extensions with cargo-lambda"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every unit and print the resulting assets as JSON
    Bundle {
        #[command(flatten)]
        units: Units,
        /// Zip directory assets after bundling
        #[arg(long)]
        archive: bool,
    },
    /// Print how each unit would be bundled, without building
    Plan {
        #[command(flatten)]
        units: Units,
    },
    /// Print the asset hash of each unit when it is known before building
    Hash {
        #[command(flatten)]
        units: Units,
    },
}

#[derive(clap::Args)]
struct Units {
    /// Deployment definition (YAML)
    definition: PathBuf,
    /// Only handle these units
    #[arg(long)]
    only: Vec<String>,
    /// Directory bundling outputs are written under
    #[arg(long, env = "CARGO_LAMBDA_BUNDLER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashReport {
    name: String,
    hash_type: AssetHashType,
    hash: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,rust_lambda_bundler=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bundle { units, archive } => {
            let (bundler, targets) = load(&units)?;
            let total = targets.len();
            let results = bundler.clone().bundle_all(targets).await;

            let mut assets = Vec::new();
            let mut failed = Vec::new();
            for (name, result) in results {
                match result {
                    Ok(mut asset) => {
                        if archive && !asset.archived {
                            let dest = bundler.config().output_dir.join(format!("{}.zip", name));
                            asset.path = archive_directory(&asset.path, &dest)
                                .with_context(|| format!("Failed to archive '{}'", name))?;
                            asset.archived = true;
                        }
                        assets.push(asset);
                    }
                    Err(e) => {
                        if let Some(output) = e.build_output() {
                            eprintln!("{}", output);
                        }
                        failed.push(name);
                    }
                }
            }

            println!("{}", serde_json::to_string_pretty(&assets)?);

            if !failed.is_empty() {
                anyhow::bail!(
                    "{} of {} units failed to bundle: {}",
                    failed.len(),
                    total,
                    failed.join(", ")
                );
            }
        }
        Commands::Plan { units } => {
            let plans = plan(&units).await?;
            println!("{}", serde_json::to_string_pretty(&plans)?);
        }
        Commands::Hash { units } => {
            let reports: Vec<_> = plan(&units)
                .await?
                .into_iter()
                .map(|p| HashReport {
                    name: p.name,
                    hash_type: p.hash_type,
                    hash: p.hash,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    Ok(())
}

/// Load and validate the definition, then select the requested units
fn load(units: &Units) -> Result<(Arc<Bundler>, Vec<PackageTarget>)> {
    let mut config = BundlerConfig::from_env();
    if let Some(output_dir) = &units.output_dir {
        config.output_dir = output_dir.clone();
    }
    tracing::debug!("Configuration loaded: {:?}", config);

    let definition = DeploymentDefinition::load(&units.definition)?;
    definition.validate()?;

    let mut targets = definition.targets();
    if !units.only.is_empty() {
        if let Some(unknown) = units.only.iter().find(|n| !targets.iter().any(|t| &t.name == *n)) {
            anyhow::bail!("'{}' is not declared in {:?}", unknown, units.definition);
        }
        targets.retain(|t| units.only.contains(&t.name));
    }

    Ok((Arc::new(Bundler::new(config)), targets))
}

async fn plan(units: &Units) -> Result<Vec<rust_lambda_bundler::BundlePlan>> {
    let (bundler, targets) = load(units)?;

    // Planning may clone repositories and probe the host
    tokio::task::spawn_blocking(move || {
        targets
            .iter()
            .map(|t| {
                bundler
                    .plan(t)
                    .with_context(|| format!("Failed to plan '{}'", t.name))
            })
            .collect::<Result<Vec<_>>>()
    })
    .await?
}
