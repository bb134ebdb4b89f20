//! Parquet output module
//!
//! Splits the merged gravity table into the three publication views and
//! writes each as a Parquet file. Every Arrow field carries a "label"
//! metadata entry with the human-readable variable label, mirroring the
//! variable-label dictionaries statistical packages expect.

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Builder, Int64Builder, RecordBatch, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::aggregate::TOTAL_SECTOR;
use crate::merge::GravityRecord;

pub const DOMESTIC_FILE: &str = "aggregate_domestic_trade.parquet";
pub const FOREIGN_FILE: &str = "aggregate_foreign_trade.parquet";
pub const SECTORAL_FILE: &str = "sectoral_trade.parquet";

/// Sector relabeled for statistical packages that reject spaces in values
const MINING_SECTOR: &str = "Mining and Energy";
const MINING_SECTOR_RELABELED: &str = "MiningEnergy";

/// The three disjoint output views of the merged table
#[derive(Debug)]
pub struct DatasetViews {
    /// sector == "Total", exporter == importer
    pub domestic: Vec<GravityRecord>,
    /// sector == "Total", exporter != importer
    pub foreign: Vec<GravityRecord>,
    /// sector != "Total", both domestic and foreign pairs
    pub sectoral: Vec<GravityRecord>,
}

/// Partition the merged table into the domestic, foreign, and sectoral views.
/// The "Mining and Energy" sector is relabeled in the sectoral view.
pub fn split_views(merged: Vec<GravityRecord>) -> DatasetViews {
    let mut views = DatasetViews {
        domestic: Vec::new(),
        foreign: Vec::new(),
        sectoral: Vec::new(),
    };

    for mut record in merged {
        if record.broad_sector == TOTAL_SECTOR {
            if record.exporter == record.importer {
                views.domestic.push(record);
            } else {
                views.foreign.push(record);
            }
        } else {
            if record.broad_sector == MINING_SECTOR {
                record.broad_sector = MINING_SECTOR_RELABELED.to_string();
            }
            views.sectoral.push(record);
        }
    }

    info!(
        "Split views: {} domestic, {} foreign, {} sectoral records",
        views.domestic.len(),
        views.foreign.len(),
        views.sectoral.len()
    );
    views
}

/// Human-readable variable labels attached to the output fields
fn variable_label(field: &str) -> &'static str {
    match field {
        "exporter" => "Exporter label",
        "importer" => "Importer label",
        "year" => "Year",
        "broad_sector" => "Sector label",
        "trade" => "Bilateral trade value (current $M)",
        "ln_trade" => "Log of trade value",
        "pta" => "Preferential trade agreement indicator",
        "eu" => "Indicator for both being European Union members",
        "wto" => "Indicator for both being WTO members",
        "colony" => "Indicator for colonial ties",
        "contiguity" => "Indicator for shared land border",
        "language" => "Indicator for a shared common language",
        "ln_distance" => "Log population weighted geographic distance",
        "ln_gdp_exporter" => "Log GDP of exporter",
        "ln_gdp_importer" => "Log GDP of importer",
        "foreign" => "Indicator for international trade",
        _ => "",
    }
}

fn labeled_field(name: &str, data_type: DataType) -> Field {
    let metadata = HashMap::from([("label".to_string(), variable_label(name).to_string())]);
    Field::new(name, data_type, true).with_metadata(metadata)
}

/// Output schema shared by all three views
pub fn output_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        labeled_field("exporter", DataType::Utf8),
        labeled_field("importer", DataType::Utf8),
        labeled_field("year", DataType::Int64),
        labeled_field("broad_sector", DataType::Utf8),
        labeled_field("trade", DataType::Float64),
        labeled_field("ln_trade", DataType::Float64),
        labeled_field("pta", DataType::Float64),
        labeled_field("eu", DataType::Float64),
        labeled_field("wto", DataType::Float64),
        labeled_field("colony", DataType::Float64),
        labeled_field("contiguity", DataType::Float64),
        labeled_field("language", DataType::Float64),
        labeled_field("ln_distance", DataType::Float64),
        labeled_field("ln_gdp_exporter", DataType::Float64),
        labeled_field("ln_gdp_importer", DataType::Float64),
        labeled_field("foreign", DataType::Int64),
    ]))
}

fn string_column<F>(records: &[GravityRecord], get: F) -> ArrayRef
where
    F: Fn(&GravityRecord) -> &str,
{
    let mut builder = StringBuilder::new();
    for record in records {
        builder.append_value(get(record));
    }
    Arc::new(builder.finish())
}

fn float_column<F>(records: &[GravityRecord], get: F) -> ArrayRef
where
    F: Fn(&GravityRecord) -> Option<f64>,
{
    let mut builder = Float64Builder::new();
    for record in records {
        builder.append_option(get(record));
    }
    Arc::new(builder.finish())
}

fn int_column<F>(records: &[GravityRecord], get: F) -> ArrayRef
where
    F: Fn(&GravityRecord) -> Option<i64>,
{
    let mut builder = Int64Builder::new();
    for record in records {
        builder.append_option(get(record));
    }
    Arc::new(builder.finish())
}

/// Convert records to an Arrow RecordBatch in the output schema
pub fn records_to_batch(records: &[GravityRecord], schema: Arc<Schema>) -> Result<RecordBatch> {
    let arrays: Vec<ArrayRef> = vec![
        string_column(records, |r| &r.exporter),
        string_column(records, |r| &r.importer),
        int_column(records, |r| Some(r.year)),
        string_column(records, |r| &r.broad_sector),
        float_column(records, |r| Some(r.trade)),
        float_column(records, |r| r.ln_trade),
        float_column(records, |r| r.pta),
        float_column(records, |r| r.eu),
        float_column(records, |r| r.wto),
        float_column(records, |r| r.colony),
        float_column(records, |r| r.contiguity),
        float_column(records, |r| r.language),
        float_column(records, |r| r.ln_distance),
        float_column(records, |r| r.ln_gdp_exporter),
        float_column(records, |r| r.ln_gdp_importer),
        int_column(records, |r| r.foreign),
    ];

    RecordBatch::try_new(schema, arrays).context("Failed to create record batch")
}

/// Write one view to a Parquet file. The write is all-or-nothing: any
/// failure aborts the run with the partial file left for inspection.
fn write_view(records: &[GravityRecord], path: &PathBuf) -> Result<()> {
    let schema = output_schema();
    let batch = records_to_batch(records, schema.clone())?;

    let file =
        File::create(path).context(format!("Failed to create output file: {:?}", path))?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .context("Failed to create ArrowWriter")?;

    writer.write(&batch).context("Failed to write batch to parquet")?;
    writer.close().context("Failed to close writer")?;

    info!("Wrote {} records to {:?}", records.len(), path);
    Ok(())
}

/// Write the three views into the output directory.
pub fn write_views(views: &DatasetViews, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .context(format!("Failed to create output directory: {:?}", out_dir))?;

    write_view(&views.domestic, &out_dir.join(DOMESTIC_FILE))?;
    write_view(&views.foreign, &out_dir.join(FOREIGN_FILE))?;
    write_view(&views.sectoral, &out_dir.join(SECTORAL_FILE))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, StringArray};

    fn record(exporter: &str, importer: &str, sector: &str) -> GravityRecord {
        GravityRecord {
            exporter: exporter.to_string(),
            importer: importer.to_string(),
            year: 2000,
            broad_sector: sector.to_string(),
            trade: 100.0,
            ln_trade: Some(100.0_f64.ln()),
            pta: None,
            eu: None,
            wto: None,
            colony: None,
            contiguity: None,
            language: None,
            ln_distance: None,
            ln_gdp_exporter: None,
            ln_gdp_importer: None,
            foreign: None,
        }
    }

    #[test]
    fn test_split_views_are_disjoint_and_complete() {
        let merged = vec![
            record("USA", "USA", "Total"),
            record("USA", "CAN", "Total"),
            record("USA", "CAN", "Services"),
            record("USA", "USA", "Services"),
        ];

        let views = split_views(merged);
        assert_eq!(views.domestic.len(), 1);
        assert_eq!(views.foreign.len(), 1);
        assert_eq!(views.sectoral.len(), 2);

        assert_eq!(views.domestic[0].importer, "USA");
        assert_eq!(views.foreign[0].importer, "CAN");
    }

    #[test]
    fn test_split_relabels_mining_sector() {
        let merged = vec![record("USA", "CAN", "Mining and Energy")];
        let views = split_views(merged);
        assert_eq!(views.sectoral[0].broad_sector, "MiningEnergy");
    }

    #[test]
    fn test_schema_carries_labels() {
        let schema = output_schema();
        let trade = schema.field_with_name("trade").unwrap();
        assert_eq!(
            trade.metadata().get("label").map(String::as_str),
            Some("Bilateral trade value (current $M)")
        );
        let ln_distance = schema.field_with_name("ln_distance").unwrap();
        assert_eq!(
            ln_distance.metadata().get("label").map(String::as_str),
            Some("Log population weighted geographic distance")
        );
    }

    #[test]
    fn test_records_to_batch_nulls() {
        let records = vec![record("USA", "CAN", "Services")];
        let batch = records_to_batch(&records, output_schema()).unwrap();
        assert_eq!(batch.num_rows(), 1);

        let exporter = batch
            .column_by_name("exporter")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(exporter.value(0), "USA");

        let pta = batch
            .column_by_name("pta")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!(pta.is_null(0));

        let ln_trade = batch
            .column_by_name("ln_trade")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(ln_trade.value(0), 100.0_f64.ln());
    }

    #[test]
    fn test_empty_view_builds_empty_batch() {
        let batch = records_to_batch(&[], output_schema()).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 16);
    }
}
