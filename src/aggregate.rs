//! Trade aggregation module
//!
//! Reduces raw trade records to two granularities per (exporter, importer,
//! year): an all-sector "Total" and one row per broad sector. Also ranks
//! countries by combined import + export flow to produce the top-trader set.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use tracing::info;

use crate::loader::TradeRecord;

/// Sector label used for the all-sector aggregation
pub const TOTAL_SECTOR: &str = "Total";

/// One aggregated trade flow
#[derive(Debug, Clone, PartialEq)]
pub struct TradeFlow {
    pub exporter: String,
    pub importer: String,
    pub year: i64,
    pub sector: String,
    pub trade: f64,
    /// ln(trade); missing when trade is exactly zero
    pub ln_trade: Option<f64>,
}

/// Log of a trade value. Zero trade maps to missing rather than -inf so the
/// undefined value never propagates into the merged dataset.
fn ln_or_missing(trade: f64) -> Result<Option<f64>> {
    if trade < 0.0 || trade.is_nan() {
        bail!("Cannot take log of invalid trade value: {}", trade);
    }
    if trade == 0.0 {
        Ok(None)
    } else {
        Ok(Some(trade.ln()))
    }
}

/// Aggregate trade records to the "Total" and per-sector granularities.
///
/// The output is the vertical concatenation of both: all "Total" rows first,
/// then the sector rows. BTreeMap grouping keeps the ordering deterministic
/// for identical input.
pub fn aggregate_trade(records: &[TradeRecord]) -> Result<Vec<TradeFlow>> {
    let mut totals: BTreeMap<(String, String, i64), f64> = BTreeMap::new();
    let mut sectoral: BTreeMap<(String, String, i64, String), f64> = BTreeMap::new();

    for record in records {
        if record.trade < 0.0 || record.trade.is_nan() {
            bail!(
                "Negative or invalid trade value {} for {} -> {} in {}",
                record.trade,
                record.exporter_iso3,
                record.importer_iso3,
                record.year
            );
        }
        let total_key = (
            record.exporter_iso3.clone(),
            record.importer_iso3.clone(),
            record.year,
        );
        *totals.entry(total_key).or_insert(0.0) += record.trade;

        let sector_key = (
            record.exporter_iso3.clone(),
            record.importer_iso3.clone(),
            record.year,
            record.broad_sector.clone(),
        );
        *sectoral.entry(sector_key).or_insert(0.0) += record.trade;
    }

    let mut flows = Vec::with_capacity(totals.len() + sectoral.len());
    for ((exporter, importer, year), trade) in totals {
        let ln_trade = ln_or_missing(trade)?;
        flows.push(TradeFlow {
            exporter,
            importer,
            year,
            sector: TOTAL_SECTOR.to_string(),
            trade,
            ln_trade,
        });
    }
    let num_totals = flows.len();
    for ((exporter, importer, year, sector), trade) in sectoral {
        let ln_trade = ln_or_missing(trade)?;
        flows.push(TradeFlow {
            exporter,
            importer,
            year,
            sector,
            trade,
            ln_trade,
        });
    }

    info!(
        "Aggregated {} trade records into {} total and {} sectoral flows",
        records.len(),
        num_totals,
        flows.len() - num_totals
    );
    Ok(flows)
}

/// Rank countries by combined trade and return the top `num_countries` codes.
///
/// Export and import sums are computed independently from the "Total"
/// granularity and outer-merged by country code, so a country appearing only
/// on one side still ranks with the other side counted as zero. Ties break
/// on country code ascending to keep the ranking a total order.
pub fn top_traders(flows: &[TradeFlow], num_countries: usize) -> Vec<String> {
    let mut exports: BTreeMap<String, f64> = BTreeMap::new();
    let mut imports: BTreeMap<String, f64> = BTreeMap::new();

    for flow in flows.iter().filter(|f| f.sector == TOTAL_SECTOR) {
        *exports.entry(flow.exporter.clone()).or_insert(0.0) += flow.trade;
        *imports.entry(flow.importer.clone()).or_insert(0.0) += flow.trade;
    }

    // Outer merge on country code
    let mut combined: BTreeMap<String, f64> = BTreeMap::new();
    for (code, value) in exports {
        *combined.entry(code).or_insert(0.0) += value;
    }
    for (code, value) in imports {
        *combined.entry(code).or_insert(0.0) += value;
    }

    let mut ranked: Vec<(String, f64)> = combined.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(num_countries);

    let top: Vec<String> = ranked.into_iter().map(|(code, _)| code).collect();
    info!("Selected {} top-trading countries", top.len());
    top
}
