//! Configuration module for the gravity dataset builder
//!
//! This module defines the configuration structure for input/output paths,
//! the year window, and the top-trader cutoff.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_num_countries() -> usize {
    150
}

fn default_years() -> Vec<i64> {
    vec![2000, 2003, 2006, 2009, 2012, 2015, 2018]
}

/// Input file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Path to the ITPD-E trade flow CSV
    pub trade_file: PathBuf,
    /// Paths to the DGD covariate CSVs (time slices, concatenated in order)
    pub covariate_files: Vec<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the three dataset files are written into
    pub dir: PathBuf,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of top-trading countries to retain
    #[serde(default = "default_num_countries")]
    pub num_countries: usize,
    /// Years to retain from the trade data
    #[serde(default = "default_years")]
    pub years: Vec<i64>,
    /// Input file locations
    pub input: InputConfig,
    /// Output configuration
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config YAML")?;

        Ok(config)
    }

    /// Validate the configuration before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if self.num_countries == 0 {
            bail!("num_countries must be greater than zero");
        }
        if self.years.is_empty() {
            bail!("years must list at least one year to retain");
        }
        if self.input.trade_file.as_os_str().is_empty() {
            bail!("input.trade_file must be set");
        }
        if self.input.covariate_files.is_empty() {
            bail!("input.covariate_files must list at least one file");
        }
        if self.output.dir.as_os_str().is_empty() {
            bail!("output.dir must be set");
        }
        Ok(())
    }
}
