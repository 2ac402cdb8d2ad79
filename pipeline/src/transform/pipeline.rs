//! High-level pipeline API: spreadsheet to warehouse.
//!
//! [`build_star_schema`] is the synchronous core; [`run_ingestion`] wraps it
//! with the reader and a warehouse writer for one run.
//!
//! # Example
//!
//! ```rust,ignore
//! use spore::{run_ingestion, CsvDirectory, PipelineConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut warehouse = CsvDirectory::new("out")?;
//!     let report = run_ingestion(
//!         Path::new("batch.xlsx"),
//!         &PipelineConfig::default(),
//!         &mut warehouse,
//!     )
//!     .await?;
//!     println!("Loaded {} rows", report.load.total_rows());
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineResult, TransformResult};
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::models::{RawSheets, StarSchema};
use crate::parser::read_sheets;
use crate::warehouse::{load_star_schema, LoadReport, Warehouse};

use super::columns::normalize_columns;
use super::dates::{build_date_dimension, convert_filtration_dates};
use super::matcher::assign_membranes;
use super::partition::partition;
use super::schema::fields::{BARCODE, IMAGE_NAME, MEMBRANE_NAME, USABLE_FOR_ML};
use super::schema::PERCENTAGE_FIELDS;
use super::values::{backfill, repair_boolean, scale_percentages};

/// Counters collected while building the star schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransformReport {
    pub membrane_rows: usize,
    pub image_rows: usize,
    pub camera_rows: usize,
    pub date_rows: usize,
    pub repaired_booleans: usize,
    pub backfilled_barcodes: usize,
    pub malformed_dates: usize,
    pub unmatched_images: usize,
}

/// Result of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub run_id: Uuid,
    pub transform: TransformReport,
    pub load: LoadReport,
}

/// Turn the two raw sheets into the five warehouse tables.
///
/// Steps:
/// 1. Normalize headers of both sheets
/// 2. Repair `usable_for_ml` and backfill both barcodes
/// 3. Partition into dimensions and fact table
/// 4. Build the date dimension from the raw compact dates
/// 5. Scale percentages and convert the fact table's dates
/// 6. Assign each image its membrane
pub fn build_star_schema(
    sheets: RawSheets,
    config: &PipelineConfig,
) -> TransformResult<(StarSchema, TransformReport)> {
    let RawSheets {
        mut membranes,
        mut images,
    } = sheets;
    let mut report = TransformReport::default();
    let columns = &config.columns;

    log_info("🔄 Normalizing columns...");
    normalize_columns(&mut membranes, &columns.common, &columns.membrane)?;
    normalize_columns(&mut images, &columns.common, &columns.images)?;

    report.repaired_booleans = repair_boolean(&mut images, USABLE_FOR_ML, &config.false_token)?;
    report.backfilled_barcodes = backfill(&mut membranes, BARCODE, MEMBRANE_NAME)?
        + backfill(&mut images, BARCODE, IMAGE_NAME)?;
    log_success(format!(
        "{} boolean value(s) repaired, {} barcode(s) backfilled",
        report.repaired_booleans, report.backfilled_barcodes
    ));

    log_info("🧩 Partitioning into star schema...");
    let parts = partition(membranes, images)?;
    let mut fact = parts.fact.with_name(config.fact_table.as_str());

    let date_dimension = build_date_dimension(&fact)?;
    scale_percentages(&mut fact, &PERCENTAGE_FIELDS, config.fraction_policy)?;

    report.malformed_dates = convert_filtration_dates(&mut fact)?;
    if report.malformed_dates > 0 {
        log_warning(format!(
            "{} filtration date(s) could not be parsed and were set to null",
            report.malformed_dates
        ));
    }

    log_info("🔗 Matching images to membranes...");
    report.unmatched_images = assign_membranes(&mut fact, &parts.membrane_dimension)?;
    if report.unmatched_images > 0 {
        log_warning(format!(
            "{} image(s) match no membrane name",
            report.unmatched_images
        ));
    } else {
        log_success("Every image matched a membrane");
    }

    report.membrane_rows = parts.membrane_dimension.len();
    report.image_rows = fact.len();
    report.camera_rows = parts.camera_dimension.len();
    report.date_rows = date_dimension.len();

    let schema = StarSchema {
        membrane_dimension: parts.membrane_dimension,
        images_dimension: parts.images_dimension,
        camera_dimension: parts.camera_dimension,
        date_dimension,
        fact,
    };
    Ok((schema, report))
}

async fn ingest<W>(
    path: &Path,
    config: &PipelineConfig,
    warehouse: &mut W,
) -> PipelineResult<(TransformReport, LoadReport)>
where
    W: Warehouse + ?Sized,
{
    let sheets = read_sheets(path)?;
    let (schema, transform) = build_star_schema(sheets, config)?;
    let ddl = config.ddl()?;
    let load = load_star_schema(warehouse, &schema, ddl.as_deref()).await?;
    Ok((transform, load))
}

/// Read, transform and load one spreadsheet.
///
/// The warehouse is closed before returning, whether the run succeeded or
/// not. A close failure after a failed run is logged; the run's own error
/// is returned.
pub async fn run_ingestion<W>(
    path: &Path,
    config: &PipelineConfig,
    warehouse: &mut W,
) -> PipelineResult<IngestionReport>
where
    W: Warehouse + ?Sized,
{
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!(target: "spore", "ingestion", %run_id);

    let outcome = ingest(path, config, warehouse).instrument(span).await;
    let closed = warehouse.close().await;

    match (outcome, closed) {
        (Ok((transform, load)), Ok(())) => {
            log_success(format!(
                "Run {} loaded {} rows",
                run_id,
                load.total_rows()
            ));
            Ok(IngestionReport {
                run_id,
                transform,
                load,
            })
        }
        (Ok(_), Err(close_err)) => Err(close_err.into()),
        (Err(err), close) => {
            if let Err(close_err) = close {
                log_error(format!("Closing the warehouse failed: {}", close_err));
            }
            log_error(format!("Run {} failed: {}", run_id, err));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, TransformError};
    use crate::models::Table;
    use crate::parser::parse_csv_bytes;
    use crate::transform::partition::tests::{images_fixture, membranes_fixture};
    use crate::warehouse::{cell_text, CsvDirectory, MemoryWarehouse};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    const MEMBRANES_CSV: &str = "membrane name;row;biosample_position_(0to999999);barcode;\
        experiment_name_(aaaa#what_it?);acquisitions_realized?;filtration_date_yymmdd;\
        types_of_microorganisms_(AAAA-Bxx);matrix_dilution_(dxx);\
        total number of bacteria measured in lab (log10);nomenclature_format_(from0tohigher);\
        number_of_acquisitions;ecoli %;pseudomonas %;pretreatment_operator\n\
        MEM1;1;10;;EXP-1;yes;210101;ECOL-B01;d10;3.5;0;2;0.8;0.2;AB\n";

    const IMAGES_CSV_HEADER: &str = "image name;Usable for ML;Exclusion reason;barcode;\
        number of bacteria pixels;optical setup;acquisitions_realized?;filtration_date_yymmdd;\
        types_of_microorganisms_(AAAA-Bxx);matrix_dilution_(dxx);\
        total number of bacteria measured in lab (log10);pseudomonas %;\
        nomenclature_format_(from0tohigher);ecoli %;number_of_acquisitions;\
        pretreatment_operator;lens diameter;objective;camera\n";

    /// Raw sheets as the laboratory exports them, before renaming.
    fn raw_sheets() -> RawSheets {
        let membranes = Table::from_records(
            "Membranes",
            vec![
                json!({
                    "membrane name": "MEM1", "row": 1, "biosample_position_(0to999999)": 10,
                    "barcode": null, "experiment_name_(aaaa#what_it?)": "EXP-1",
                    "acquisitions_realized?": "yes", "filtration_date_yymmdd": 210101,
                    "types_of_microorganisms_(AAAA-Bxx)": "ECOL-B01", "matrix_dilution_(dxx)": "d10",
                    "total number of bacteria measured in lab (log10)": 3.5,
                    "nomenclature_format_(from0tohigher)": 0, "number_of_acquisitions": 2,
                    "ecoli %": 0.8, "pseudomonas %": 0.2, "pretreatment_operator": "AB"
                }),
                json!({
                    "membrane name": "MEM12", "row": 2, "biosample_position_(0to999999)": 11,
                    "barcode": "B-12", "experiment_name_(aaaa#what_it?)": "EXP-1",
                    "acquisitions_realized?": "yes", "filtration_date_yymmdd": 210102,
                    "types_of_microorganisms_(AAAA-Bxx)": "ECOL-B01", "matrix_dilution_(dxx)": "d10",
                    "total number of bacteria measured in lab (log10)": 3.1,
                    "nomenclature_format_(from0tohigher)": 0, "number_of_acquisitions": 1,
                    "ecoli %": 0.5, "pseudomonas %": 0.5, "pretreatment_operator": "AB"
                }),
            ],
        );

        let image = |name: &str, date: Value, ecoli: Value, usable: Value| {
            json!({
                "image name": name, "Usable for ML": usable, "Exclusion reason": null,
                "barcode": null, "number of bacteria pixels": 1200, "optical setup": "OS-1",
                "acquisitions_realized?": "yes", "filtration_date_yymmdd": date,
                "types_of_microorganisms_(AAAA-Bxx)": "ECOL-B01", "matrix_dilution_(dxx)": "d10",
                "total number of bacteria measured in lab (log10)": 3.5,
                "pseudomonas %": null, "nomenclature_format_(from0tohigher)": 0,
                "ecoli %": ecoli, "number_of_acquisitions": 2, "pretreatment_operator": "AB",
                "lens diameter": 25, "objective": "x10", "camera": "cam-1"
            })
        };
        let images = Table::from_records(
            "Images",
            vec![
                image("IMG_MEM12_A", json!(210102), json!(0.5), json!(true)),
                image("IMG_MEM1_A", json!(210101), json!(0.1), json!("FAUX")),
                image("IMG_MEM1_B", json!("bad"), json!(null), json!(true)),
                image("IMG_OTHER", json!(210101), json!(0.55), json!(true)),
            ],
        );
        RawSheets { membranes, images }
    }

    #[test]
    fn test_build_star_schema() {
        let (schema, report) = build_star_schema(raw_sheets(), &PipelineConfig::default()).unwrap();

        assert_eq!(
            report,
            TransformReport {
                membrane_rows: 2,
                image_rows: 4,
                camera_rows: 1,
                date_rows: 2,
                repaired_booleans: 1,
                backfilled_barcodes: 5,
                malformed_dates: 1,
                unmatched_images: 1,
            }
        );

        let fact = &schema.fact;
        assert_eq!(fact.name, "membrane_images_camera");
        let membranes: Vec<&Value> = fact.column("membrane").unwrap();
        assert_eq!(membranes, vec![&json!("MEM12"), &json!("MEM1"), &json!("MEM1"), &json!("")]);

        let ecoli: Vec<f64> = fact
            .column("ecoli_percentage")
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(ecoli, vec![50.0, 10.0, 0.0, 55.0]);

        assert_eq!(fact.get(0, "filtration_date"), &json!("2021-01-02"));
        assert_eq!(fact.get(2, "filtration_date"), &Value::Null);

        let images = &schema.images_dimension;
        assert_eq!(images.get(1, "usable_for_ml"), &json!(false));
        assert_eq!(images.get(0, "barcode"), &json!("IMG_MEM12_A"));
        assert!(!images.has_column("camera"));

        let membrane = &schema.membrane_dimension;
        assert_eq!(membrane.get(0, "barcode"), &json!("MEM1"));
        assert_eq!(membrane.get(1, "barcode"), &json!("B-12"));
        assert!(!membrane.has_column("ecoli_percentage"));
    }

    #[test]
    fn test_custom_fact_table_name() {
        let config = PipelineConfig {
            fact_table: "acquisitions".to_string(),
            ..PipelineConfig::default()
        };
        let (schema, _) = build_star_schema(raw_sheets(), &config).unwrap();
        assert_eq!(schema.fact.name, "acquisitions");
        assert_eq!(schema.tables()[4].name, "acquisitions");
    }

    #[test]
    fn test_already_normalized_sheets() {
        let sheets = RawSheets {
            membranes: membranes_fixture(),
            images: images_fixture(),
        };
        let (schema, report) = build_star_schema(sheets, &PipelineConfig::default()).unwrap();
        assert_eq!(report.unmatched_images, 0);
        assert_eq!(schema.camera_dimension.len(), 2);
        assert_eq!(schema.date_dimension.len(), 1);
    }

    #[test]
    fn test_unknown_header_is_fatal() {
        let mut sheets = raw_sheets();
        sheets.images.rename_columns(
            &[("objective".to_string(), "Objective (x)".to_string())].into_iter().collect(),
        )
        .unwrap();

        let err = build_star_schema(sheets, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, TransformError::MissingColumn { ref column, .. } if column == "objective"));
    }

    #[test]
    fn test_csv_whole_floats_match_integers() {
        let images = format!(
            "{}IMG_MEM1_A;FAUX;;;1200;OS-1;yes;210101;ECOL-B01;d10;3.5;0.2;0;0.8;2;AB;25;x10;cam-1\n\
             IMG_MEM1_B;FAUX;;;1200;OS-1;yes;210101;ECOL-B01;d10;3.5;0,2;0;0,8;2.0;AB;25.0;x10;cam-1\n",
            IMAGES_CSV_HEADER
        );
        let sheets = RawSheets {
            membranes: parse_csv_bytes("Membranes", MEMBRANES_CSV.as_bytes()).unwrap(),
            images: parse_csv_bytes("Images", images.as_bytes()).unwrap(),
        };

        let (schema, report) = build_star_schema(sheets, &PipelineConfig::default()).unwrap();
        assert_eq!(report.camera_rows, 1);
        assert_eq!(schema.camera_dimension.get(0, "lens_diameter"), &json!(25));

        let fact = &schema.fact;
        assert_eq!(fact.column("number_of_acquisitions").unwrap(), vec![&json!(2), &json!(2)]);
        assert_eq!(cell_text(Some(fact.get(1, "number_of_acquisitions"))).as_deref(), Some("2"));
        let ecoli: Vec<f64> = fact
            .column("ecoli_percentage")
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(ecoli, vec![80.0, 80.0]);
    }

    #[tokio::test]
    async fn test_run_ingestion_closes_warehouse_on_failure() {
        let dir = tempdir().unwrap();
        let mut warehouse = MemoryWarehouse::new();
        let missing = dir.path().join("missing.xlsx");

        let err = run_ingestion(&missing, &PipelineConfig::default(), &mut warehouse)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Sheet(_)));
        assert!(warehouse.is_closed());
        assert!(warehouse.tables.is_empty());
    }

    #[tokio::test]
    async fn test_run_ingestion_from_csv_exports() {
        let input = tempdir().unwrap();
        std::fs::write(input.path().join("Membranes.csv"), MEMBRANES_CSV).unwrap();
        std::fs::write(
            input.path().join("Images.csv"),
            format!(
                "{}IMG_MEM1_A;FAUX;;;1200;OS-1;yes;210101;ECOL-B01;d10;3.5;0.2;0;0.8;2;AB;25;x10;cam-1\n",
                IMAGES_CSV_HEADER
            ),
        )
        .unwrap();

        let output = tempdir().unwrap();
        let mut warehouse = CsvDirectory::new(output.path()).unwrap();
        let report = run_ingestion(input.path(), &PipelineConfig::default(), &mut warehouse)
            .await
            .unwrap();

        assert_eq!(report.load.tables.len(), 5);
        assert_eq!(report.transform.unmatched_images, 0);

        let facts = warehouse
            .fetch_column("membrane_images_camera", "membrane")
            .await
            .unwrap();
        assert_eq!(facts, vec![json!("MEM1")]);
        let dates = warehouse
            .fetch_column("date_dimension", "filtration_date")
            .await
            .unwrap();
        assert_eq!(dates, vec![json!("2021-01-01")]);
    }
}
