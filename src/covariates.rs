//! Covariate preparation module
//!
//! Turns the concatenated DGD slices into canonical covariate records:
//! renames source fields, log-transforms distance and both GDPs, derives the
//! foreign indicator, resolves duplicate keys, and drops the "EUN" pseudo
//! country.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::loader::DgdRecord;

/// Aggregate entity code for the EU bloc. It has no trade observations, so
/// keeping it would only produce unmatched pair rows.
pub const EU_BLOC_CODE: &str = "EUN";

/// One prepared covariate record, keyed by (origin, destination, year)
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateRecord {
    pub origin: String,
    pub destination: String,
    pub year: i64,
    pub pta: Option<f64>,
    pub eu: Option<f64>,
    pub wto: Option<f64>,
    pub colony: Option<f64>,
    pub contiguity: Option<f64>,
    pub language: Option<f64>,
    pub ln_distance: Option<f64>,
    pub ln_gdp_origin: Option<f64>,
    pub ln_gdp_destination: Option<f64>,
    /// 1 when origin and destination differ, 0 for domestic pairs
    pub foreign: i64,
}

/// Log of a strictly positive covariate. Missing values stay missing; a
/// present nonpositive value has no defined log and aborts the run.
fn ln_positive(name: &str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        None => Ok(None),
        Some(v) if v > 0.0 => Ok(Some(v.ln())),
        Some(v) => bail!("Cannot take log of nonpositive {} value: {}", name, v),
    }
}

/// Prepare the concatenated covariate slices.
///
/// Duplicate (origin, destination, year) keys are a known quality issue in
/// the source feed; they are counted and logged, and the first occurrence in
/// concatenation order wins. Rows involving the EU bloc code are dropped
/// after duplicate detection.
pub fn prepare_covariates(records: &[DgdRecord]) -> Result<Vec<CovariateRecord>> {
    let mut by_key: BTreeMap<(String, String, i64), CovariateRecord> = BTreeMap::new();
    let mut duplicates: Vec<(String, String, i64)> = Vec::new();

    for record in records {
        let key = (record.iso3_o.clone(), record.iso3_d.clone(), record.year);
        if by_key.contains_key(&key) {
            duplicates.push(key);
            continue;
        }

        let foreign = if record.iso3_o != record.iso3_d { 1 } else { 0 };
        let prepared = CovariateRecord {
            origin: record.iso3_o.clone(),
            destination: record.iso3_d.clone(),
            year: record.year,
            pta: record.agree_pta,
            eu: record.member_eu_joint,
            wto: record.member_wto_joint,
            colony: record.colony_ever,
            contiguity: record.contiguity,
            language: record.common_language,
            ln_distance: ln_positive("distance", record.distance)?,
            ln_gdp_origin: ln_positive("origin GDP", record.gdp_pwt_cur_o)?,
            ln_gdp_destination: ln_positive("destination GDP", record.gdp_pwt_cur_d)?,
            foreign,
        };
        by_key.insert(key, prepared);
    }

    if !duplicates.is_empty() {
        let sample: Vec<String> = duplicates
            .iter()
            .take(5)
            .map(|(o, d, y)| format!("{}/{}/{}", o, d, y))
            .collect();
        warn!(
            "Found {} duplicate covariate keys (kept first occurrence), e.g. {}",
            duplicates.len(),
            sample.join(", ")
        );
    }

    let before = by_key.len();
    let prepared: Vec<CovariateRecord> = by_key
        .into_values()
        .filter(|r| r.origin != EU_BLOC_CODE && r.destination != EU_BLOC_CODE)
        .collect();

    info!(
        "Prepared {} covariate records ({} EUN rows dropped, {} duplicates resolved)",
        prepared.len(),
        before - prepared.len(),
        duplicates.len()
    );
    Ok(prepared)
}
