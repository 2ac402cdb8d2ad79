//! Run configuration.
//!
//! A JSON file (`--config`) overrides any subset of the defaults:
//!
//! ```json
//! {
//!   "false_token": "FAUX",
//!   "fraction_policy": "warn",
//!   "schema": "spore",
//!   "fact_table": "membrane_images_camera",
//!   "ddl_script": "sql/create_tables.sql",
//!   "columns": { "images": { "image name": "image_name" } }
//! }
//! ```
//!
//! Environment: `DATABASE_URL` for the PostgreSQL warehouse and
//! `SPORE_SCHEMA` to override the schema name. `.env` is loaded by the CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::transform::columns::ColumnMappings;
use crate::transform::schema::FACT_TABLE;
use crate::transform::values::{FractionPolicy, DEFAULT_FALSE_TOKEN};

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const SCHEMA_VAR: &str = "SPORE_SCHEMA";
pub const DEFAULT_SCHEMA: &str = "spore";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Header vocabulary.
    pub columns: ColumnMappings,
    /// Spelling of boolean false on the images sheet.
    pub false_token: String,
    pub fraction_policy: FractionPolicy,
    /// Warehouse schema.
    pub schema: String,
    pub fact_table: String,
    /// DDL executed before the first insert.
    pub ddl_script: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnMappings::default(),
            false_token: DEFAULT_FALSE_TOKEN.to_string(),
            fraction_policy: FractionPolicy::default(),
            schema: DEFAULT_SCHEMA.to_string(),
            fact_table: FACT_TABLE.to_string(),
            ddl_script: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults, overlaid with `path` if given, then with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_json(&fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        if let Ok(schema) = std::env::var(SCHEMA_VAR) {
            if !schema.trim().is_empty() {
                config.schema = schema.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Content of the DDL script, if one is configured.
    pub fn ddl(&self) -> Result<Option<String>, ConfigError> {
        match &self.ddl_script {
            Some(path) => Ok(Some(fs::read_to_string(path)?)),
            None => Ok(None),
        }
    }
}

/// PostgreSQL URL from `DATABASE_URL`.
pub fn database_url() -> Result<String, ConfigError> {
    std::env::var(DATABASE_URL_VAR).map_err(|_| ConfigError::MissingVar(DATABASE_URL_VAR.to_string()))
}
