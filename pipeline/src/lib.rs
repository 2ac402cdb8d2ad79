//! # Spore - membrane image ingestion into a star-schema warehouse
//!
//! Spore reads the laboratory workbook describing filtration membranes and
//! the microscope images taken of them, reshapes it into a star schema and
//! appends the result to a relational warehouse.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook   │────▶│   Parser    │────▶│  Transform  │────▶│  Warehouse  │
//! │ (xlsx/csv)  │     │ (2 sheets)  │     │ (star sch.) │     │ (postgres)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                                                             ┌──────▼──────┐
//!                                                             │  Barcodes   │
//!                                                             │   (SVG)     │
//!                                                             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spore::{run_ingestion, PipelineConfig, PostgresWarehouse};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = PipelineConfig::default();
//!     let mut warehouse = PostgresWarehouse::connect("postgres://localhost/lab", &config.schema)
//!         .await
//!         .unwrap();
//!     let report = run_ingestion(Path::new("batch.xlsx"), &config, &mut warehouse)
//!         .await
//!         .unwrap();
//!     println!("{} images matched", report.transform.image_rows - report.transform.unmatched_images);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Tables, raw sheets and the star schema
//! - [`parser`] - Workbook and CSV export reading
//! - [`transform`] - Normalization, partitioning, matching, dates
//! - [`warehouse`] - Warehouse writers and lookup reader
//! - [`barcode`] - Code 128 barcodes for stored names
//! - [`config`] - Run configuration
//! - [`logs`] - Progress logging

// Core modules
pub mod error;
pub mod models;

// Configuration and logging
pub mod config;
pub mod logs;

// Reading
pub mod parser;

// Transformation
pub mod transform;

// Loading
pub mod warehouse;

// Barcodes
pub mod barcode;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    BarcodeError, ConfigError, LoadError, PipelineError, PipelineResult, SheetError,
    TransformError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{RawSheets, Record, StarSchema, Table};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::PipelineConfig;
pub use parser::read_sheets;
pub use transform::{build_star_schema, run_ingestion, IngestionReport, TransformReport};

// =============================================================================
// Re-exports - Warehouse and barcodes
// =============================================================================

pub use barcode::{populate_barcodes, BarcodeReport};
pub use warehouse::{
    load_star_schema, CsvDirectory, LoadReport, MemoryWarehouse, PostgresWarehouse, Warehouse,
};
