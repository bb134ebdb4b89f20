//! CSV loading module
//!
//! Reads the ITPD-E trade flow CSV and the time-sliced DGD covariate CSVs
//! into typed records. Required columns are verified against the header row
//! up front so a schema mismatch fails with a descriptive error instead of
//! surfacing later in the pipeline.

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// One row of the ITPD-E trade source
#[derive(Debug, Clone, Deserialize)]
pub struct TradeRecord {
    pub exporter_iso3: String,
    pub importer_iso3: String,
    pub year: i64,
    pub broad_sector: String,
    pub trade: f64,
}

/// One row of a DGD covariate slice, in source field names.
///
/// Numeric cells may be empty in the source feed, so every covariate is
/// optional at this stage.
#[derive(Debug, Clone, Deserialize)]
pub struct DgdRecord {
    pub iso3_o: String,
    pub iso3_d: String,
    pub year: i64,
    pub agree_pta: Option<f64>,
    pub member_eu_joint: Option<f64>,
    pub member_wto_joint: Option<f64>,
    pub distance: Option<f64>,
    pub colony_ever: Option<f64>,
    pub contiguity: Option<f64>,
    pub common_language: Option<f64>,
    pub gdp_pwt_cur_d: Option<f64>,
    pub gdp_pwt_cur_o: Option<f64>,
}

const TRADE_COLUMNS: &[&str] = &[
    "exporter_iso3",
    "importer_iso3",
    "year",
    "broad_sector",
    "trade",
];

const COVARIATE_COLUMNS: &[&str] = &[
    "iso3_o",
    "iso3_d",
    "year",
    "agree_pta",
    "member_eu_joint",
    "member_wto_joint",
    "distance",
    "colony_ever",
    "contiguity",
    "common_language",
    "gdp_pwt_cur_d",
    "gdp_pwt_cur_o",
];

fn verify_required_columns(headers: &csv::StringRecord, required: &[&str], path: &Path) -> Result<()> {
    let present: HashSet<&str> = headers.iter().collect();
    for column in required {
        if !present.contains(column) {
            bail!(
                "Schema mismatch in {:?}: required column '{}' not found in header",
                path,
                column
            );
        }
    }
    Ok(())
}

/// Load trade records, keeping only rows whose year is in `years`.
pub fn load_trade(path: &Path, years: &[i64]) -> Result<Vec<TradeRecord>> {
    let year_set: HashSet<i64> = years.iter().copied().collect();

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(format!("Failed to open trade file: {:?}", path))?;

    let headers = rdr.headers().context("Failed to read trade header row")?;
    verify_required_columns(headers, TRADE_COLUMNS, path)?;

    let mut records = Vec::new();
    let mut total_rows = 0usize;
    for result in rdr.deserialize() {
        let record: TradeRecord =
            result.context(format!("Failed to parse trade row in {:?}", path))?;
        total_rows += 1;
        if year_set.contains(&record.year) {
            records.push(record);
        }
    }

    info!(
        "Loaded {} trade records from {:?} ({} rows outside year window dropped)",
        records.len(),
        path,
        total_rows - records.len()
    );
    Ok(records)
}

/// Load and concatenate the DGD covariate slices in the given order.
pub fn load_covariates(paths: &[PathBuf]) -> Result<Vec<DgdRecord>> {
    let mut records = Vec::new();

    for path in paths {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .context(format!("Failed to open covariate file: {:?}", path))?;

        let headers = rdr
            .headers()
            .context("Failed to read covariate header row")?;
        verify_required_columns(headers, COVARIATE_COLUMNS, path)?;

        let before = records.len();
        for result in rdr.deserialize() {
            let record: DgdRecord =
                result.context(format!("Failed to parse covariate row in {:?}", path))?;
            records.push(record);
        }
        info!(
            "Loaded {} covariate records from {:?}",
            records.len() - before,
            path
        );
    }

    Ok(records)
}
