//! Gravity Dataset Builder Library
//!
//! Builds a research dataset for gravity-model trade analysis: merges
//! bilateral ITPD-E trade flows with DGD country-pair covariates, filters to
//! the top-trading countries, and writes three labeled Parquet files.

pub mod aggregate;
pub mod config;
pub mod covariates;
pub mod loader;
pub mod merge;
pub mod parquet_writer;

// Re-export commonly used types
pub use aggregate::{aggregate_trade, top_traders, TradeFlow, TOTAL_SECTOR};
pub use config::{Config, InputConfig, OutputConfig};
pub use covariates::{prepare_covariates, CovariateRecord, EU_BLOC_CODE};
pub use loader::{load_covariates, load_trade, DgdRecord, TradeRecord};
pub use merge::{merge_and_filter, GravityRecord};
pub use parquet_writer::{split_views, write_views, DatasetViews};

use anyhow::Result;
use tracing::info;

/// Run the full pipeline for a validated configuration.
pub fn run(config: &Config) -> Result<()> {
    config.validate()?;

    info!("Loading trade data from {:?}", config.input.trade_file);
    let trade = load_trade(&config.input.trade_file, &config.years)?;

    info!(
        "Loading {} covariate slices",
        config.input.covariate_files.len()
    );
    let raw_covariates = load_covariates(&config.input.covariate_files)?;

    let flows = aggregate_trade(&trade)?;
    let top = top_traders(&flows, config.num_countries);
    let covariates = prepare_covariates(&raw_covariates)?;

    let merged = merge_and_filter(&flows, &covariates, &top)?;
    let views = split_views(merged);
    write_views(&views, &config.output.dir)?;

    Ok(())
}
