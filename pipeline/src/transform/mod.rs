//! Transformation module.
//!
//! This module turns the two raw sheets into the star schema:
//! - Columns: header vocabulary and normalizer
//! - Values: boolean repair, barcode backfill, percentage scaling
//! - Schema: versioned field routes and column types
//! - Partition: dimensions and fact table
//! - Matcher: image to membrane relationship
//! - Dates: compact dates and the date dimension
//! - Pipeline: the run itself

pub mod columns;
pub mod dates;
pub mod matcher;
pub mod partition;
pub mod pipeline;
pub mod schema;
pub mod values;

pub use columns::{normalize_columns, ColumnMapping, ColumnMappings};
pub use pipeline::*;
pub use values::FractionPolicy;
