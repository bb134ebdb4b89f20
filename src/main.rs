//! Gravity Dataset Builder
//!
//! A tool for merging bilateral trade flows with gravity covariates and
//! writing the domestic, foreign, and sectoral dataset files.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gravity_data_builder::Config;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "gravity-data-builder")]
#[command(about = "Build gravity-model trade datasets from ITPD-E and DGD sources", long_about = None)]
struct Args {
    /// Path to the configuration YAML file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    info!("Loading configuration from {:?}", args.config);
    let config = Config::from_file(&args.config).context("Failed to load configuration")?;

    info!(
        "Retaining top {} countries across {} years",
        config.num_countries,
        config.years.len()
    );

    gravity_data_builder::run(&config)?;

    info!("Dataset build completed successfully!");
    Ok(())
}
