//! Merge module
//!
//! Left-joins aggregated trade flows to prepared covariates on
//! (exporter, importer, year), restricts both pair sides to the top-trader
//! set, and sorts the result into its publication order.

use anyhow::{bail, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::aggregate::{TradeFlow, TOTAL_SECTOR};
use crate::covariates::CovariateRecord;

/// One merged gravity record, in publication-facing field names.
///
/// Covariate fields are None when the trade flow had no matching covariate
/// row (left join) or when the source cell was missing.
#[derive(Debug, Clone, PartialEq)]
pub struct GravityRecord {
    pub exporter: String,
    pub importer: String,
    pub year: i64,
    pub broad_sector: String,
    pub trade: f64,
    pub ln_trade: Option<f64>,
    pub pta: Option<f64>,
    pub eu: Option<f64>,
    pub wto: Option<f64>,
    pub colony: Option<f64>,
    pub contiguity: Option<f64>,
    pub language: Option<f64>,
    pub ln_distance: Option<f64>,
    pub ln_gdp_exporter: Option<f64>,
    pub ln_gdp_importer: Option<f64>,
    pub foreign: Option<i64>,
}

/// Left-join trade flows to covariates and filter to the top-trader set.
///
/// The covariate side must be unique per (origin, destination, year); the
/// preparer guarantees this, and a violation here is a join-cardinality
/// error rather than silent row duplication.
pub fn merge_and_filter(
    flows: &[TradeFlow],
    covariates: &[CovariateRecord],
    top_traders: &[String],
) -> Result<Vec<GravityRecord>> {
    let mut index: HashMap<(&str, &str, i64), &CovariateRecord> =
        HashMap::with_capacity(covariates.len());
    for record in covariates {
        let key = (record.origin.as_str(), record.destination.as_str(), record.year);
        if index.insert(key, record).is_some() {
            bail!(
                "Join cardinality violation: covariate key {}/{}/{} is not unique",
                record.origin,
                record.destination,
                record.year
            );
        }
    }

    let top: HashSet<&str> = top_traders.iter().map(String::as_str).collect();

    let mut merged = Vec::new();
    let mut matched = 0usize;
    for flow in flows {
        if !top.contains(flow.exporter.as_str()) || !top.contains(flow.importer.as_str()) {
            continue;
        }

        let key = (flow.exporter.as_str(), flow.importer.as_str(), flow.year);
        let covariate = index.get(&key);
        if covariate.is_some() {
            matched += 1;
        }

        merged.push(GravityRecord {
            exporter: flow.exporter.clone(),
            importer: flow.importer.clone(),
            year: flow.year,
            broad_sector: flow.sector.clone(),
            trade: flow.trade,
            ln_trade: flow.ln_trade,
            pta: covariate.and_then(|c| c.pta),
            eu: covariate.and_then(|c| c.eu),
            wto: covariate.and_then(|c| c.wto),
            colony: covariate.and_then(|c| c.colony),
            contiguity: covariate.and_then(|c| c.contiguity),
            language: covariate.and_then(|c| c.language),
            ln_distance: covariate.and_then(|c| c.ln_distance),
            ln_gdp_exporter: covariate.and_then(|c| c.ln_gdp_origin),
            ln_gdp_importer: covariate.and_then(|c| c.ln_gdp_destination),
            foreign: covariate.map(|c| c.foreign),
        });
    }

    merged.sort_by(|a, b| publication_order(a, b));

    info!(
        "Merged {} gravity records ({} with covariates, {} unmatched)",
        merged.len(),
        matched,
        merged.len() - matched
    );
    Ok(merged)
}

/// Stable ordering for output: (exporter, importer, year), with the "Total"
/// row ahead of the sector rows for the same pair-year.
fn publication_order(a: &GravityRecord, b: &GravityRecord) -> Ordering {
    a.exporter
        .cmp(&b.exporter)
        .then_with(|| a.importer.cmp(&b.importer))
        .then_with(|| a.year.cmp(&b.year))
        .then_with(|| sector_rank(&a.broad_sector).cmp(&sector_rank(&b.broad_sector)))
        .then_with(|| a.broad_sector.cmp(&b.broad_sector))
}

fn sector_rank(sector: &str) -> u8 {
    if sector == TOTAL_SECTOR {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(exporter: &str, importer: &str, year: i64, sector: &str, trade: f64) -> TradeFlow {
        TradeFlow {
            exporter: exporter.to_string(),
            importer: importer.to_string(),
            year,
            sector: sector.to_string(),
            trade,
            ln_trade: if trade == 0.0 { None } else { Some(trade.ln()) },
        }
    }

    fn covariate(origin: &str, destination: &str, year: i64) -> CovariateRecord {
        CovariateRecord {
            origin: origin.to_string(),
            destination: destination.to_string(),
            year,
            pta: Some(1.0),
            eu: Some(0.0),
            wto: Some(1.0),
            colony: Some(0.0),
            contiguity: Some(1.0),
            language: Some(1.0),
            ln_distance: Some(6.6),
            ln_gdp_origin: Some(9.4),
            ln_gdp_destination: Some(6.7),
            foreign: if origin != destination { 1 } else { 0 },
        }
    }

    #[test]
    fn test_left_join_attaches_covariates() {
        let flows = vec![flow("USA", "CAN", 2000, "Total", 150.0)];
        let covariates = vec![covariate("USA", "CAN", 2000)];
        let top = vec!["USA".to_string(), "CAN".to_string()];

        let merged = merge_and_filter(&flows, &covariates, &top).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pta, Some(1.0));
        assert_eq!(merged[0].ln_gdp_exporter, Some(9.4));
        assert_eq!(merged[0].foreign, Some(1));
    }

    #[test]
    fn test_unmatched_flows_keep_null_covariates() {
        let flows = vec![flow("USA", "CAN", 2000, "Services", 100.0)];
        let top = vec!["USA".to_string(), "CAN".to_string()];

        let merged = merge_and_filter(&flows, &[], &top).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].trade, 100.0);
        assert_eq!(merged[0].ln_trade, Some(100.0_f64.ln()));
        assert_eq!(merged[0].pta, None);
        assert_eq!(merged[0].ln_distance, None);
        assert_eq!(merged[0].foreign, None);
    }

    #[test]
    fn test_filter_requires_both_sides_in_top_set() {
        let flows = vec![
            flow("USA", "CAN", 2000, "Total", 10.0),
            flow("USA", "ZZZ", 2000, "Total", 10.0),
            flow("ZZZ", "CAN", 2000, "Total", 10.0),
        ];
        let top = vec!["USA".to_string(), "CAN".to_string()];

        let merged = merge_and_filter(&flows, &[], &top).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].importer, "CAN");
    }

    #[test]
    fn test_duplicate_covariate_key_is_cardinality_error() {
        let flows = vec![flow("USA", "CAN", 2000, "Total", 10.0)];
        let covariates = vec![covariate("USA", "CAN", 2000), covariate("USA", "CAN", 2000)];
        let top = vec!["USA".to_string(), "CAN".to_string()];

        assert!(merge_and_filter(&flows, &covariates, &top).is_err());
    }

    #[test]
    fn test_output_ordering() {
        let flows = vec![
            flow("USA", "CAN", 2003, "Total", 1.0),
            flow("USA", "CAN", 2000, "Services", 1.0),
            flow("USA", "CAN", 2000, "Total", 1.0),
            flow("CAN", "USA", 2000, "Total", 1.0),
            flow("USA", "CAN", 2000, "Agriculture", 1.0),
        ];
        let top = vec!["USA".to_string(), "CAN".to_string()];

        let merged = merge_and_filter(&flows, &[], &top).unwrap();
        let order: Vec<(String, i64, String)> = merged
            .iter()
            .map(|r| (r.exporter.clone(), r.year, r.broad_sector.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("CAN".to_string(), 2000, "Total".to_string()),
                ("USA".to_string(), 2000, "Total".to_string()),
                ("USA".to_string(), 2000, "Agriculture".to_string()),
                ("USA".to_string(), 2000, "Services".to_string()),
                ("USA".to_string(), 2003, "Total".to_string()),
            ]
        );
    }
}
