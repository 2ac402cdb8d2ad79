//! Error types for the spore ingestion pipeline.
//!
//! - [`SheetError`] - Spreadsheet reading errors
//! - [`TransformError`] - Schema and value errors raised by the core
//! - [`LoadError`] - Warehouse errors
//! - [`BarcodeError`] - Barcode rendering errors
//! - [`ConfigError`] - Configuration errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Conversions into [`PipelineError`] are `From` implementations, so `?`
//! works across stage boundaries.

use thiserror::Error;

// =============================================================================
// Spreadsheet Errors
// =============================================================================

/// Errors while reading the source spreadsheet.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The workbook could not be opened or decoded.
    #[error("Invalid workbook: {0}")]
    Workbook(#[from] calamine::Error),

    /// A CSV export could not be parsed.
    #[error("Invalid CSV export: {0}")]
    Csv(#[from] csv::Error),

    /// A required sheet is absent.
    #[error("Sheet '{0}' not found")]
    MissingSheet(String),

    /// The sheet has no header row.
    #[error("Sheet '{0}' has no header row")]
    NoHeaders(String),

    /// The path is neither a known workbook nor a directory of CSV exports.
    #[error("Unsupported input '{0}': expected .xlsx, .xlsm, .xls, .ods or a directory of CSV exports")]
    UnsupportedInput(String),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised by the transformation core.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A column listed by the schema contract is absent.
    #[error("Missing column '{column}' in table '{table}'")]
    MissingColumn { table: String, column: String },

    /// Renaming produced two columns with the same name.
    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// A cell value cannot be processed.
    #[error("Invalid value in '{table}.{column}' at row {row}: {message}")]
    InvalidValue {
        table: String,
        column: String,
        row: usize,
        message: String,
    },
}

// =============================================================================
// Warehouse Errors
// =============================================================================

/// Errors from a warehouse writer or lookup reader.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error.
    #[error("Warehouse IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV error.
    #[error("Warehouse CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Table not present in the warehouse.
    #[error("Table not found: {0}")]
    UnknownTable(String),

    /// Column not present in the table.
    #[error("Column '{column}' not found in table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// A value the column type cannot accept.
    #[error("Value '{value}' in column '{column}' of table '{table}' is not a valid {expected}")]
    InvalidValue {
        table: String,
        column: String,
        value: String,
        expected: &'static str,
    },

    /// The warehouse connection was already closed.
    #[error("Warehouse connection is closed")]
    Closed,
}

// =============================================================================
// Barcode Errors
// =============================================================================

/// Errors from barcode rendering.
#[derive(Debug, Error)]
pub enum BarcodeError {
    /// Character outside Code 128 set B.
    #[error("Cannot encode '{value}': character {character:?} is outside Code 128 set B")]
    UnsupportedCharacter { value: String, character: char },

    /// Empty payload.
    #[error("Cannot encode an empty barcode")]
    Empty,

    /// IO error.
    #[error("Barcode IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    /// The configuration file is not valid JSON.
    #[error("Invalid config: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A required environment variable is not set.
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_ingestion`]
/// and the barcode workflow step.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Spreadsheet error.
    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Warehouse error.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Barcode error.
    #[error("Barcode error: {0}")]
    Barcode(#[from] BarcodeError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for spreadsheet operations.
pub type SheetResult<T> = Result<T, SheetError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for warehouse operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for barcode operations.
pub type BarcodeResult<T> = Result<T, BarcodeError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
