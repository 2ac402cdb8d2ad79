//! Domain models for the spore ingestion pipeline.
//!
//! - [`Table`] - Ordered columns plus JSON rows, used for raw sheets and
//!   finished warehouse tables alike
//! - [`RawSheets`] - The two source sheets of one workbook
//! - [`StarSchema`] - The five finished tables handed to the loader

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::error::{TransformError, TransformResult};

/// A single row, keyed by column name.
pub type Record = Map<String, Value>;

// =============================================================================
// Table
// =============================================================================

/// A named table with an explicit column order.
///
/// Rows are JSON objects; a column absent from a row reads as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    /// Name used in error messages and as the default destination.
    pub name: String,
    /// Column names, in output order.
    pub columns: Vec<String>,
    /// Row data.
    pub rows: Vec<Record>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from JSON objects. Columns are taken in first-seen order.
    pub fn from_records(name: impl Into<String>, records: Vec<Value>) -> Self {
        let mut table = Self::new(name, Vec::new());
        for record in records {
            if let Value::Object(row) = record {
                for key in row.keys() {
                    if !table.has_column(key) {
                        table.columns.push(key.clone());
                    }
                }
                table.rows.push(row);
            }
        }
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Append a row. Keys not yet known become new columns.
    pub fn push(&mut self, row: Record) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Cell value, `null` when the row does not carry the column.
    pub fn get(&self, row: usize, column: &str) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&Value::Null)
    }

    /// Fail with [`TransformError::MissingColumn`] unless `column` exists.
    pub fn require(&self, column: &str) -> TransformResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(TransformError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
        }
    }

    /// Add an all-null column if it is absent.
    pub fn ensure_column(&mut self, column: &str) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }

    /// Values of one column, in row order.
    pub fn column(&self, column: &str) -> TransformResult<Vec<&Value>> {
        self.require(column)?;
        Ok(self
            .rows
            .iter()
            .map(|r| r.get(column).unwrap_or(&Value::Null))
            .collect())
    }

    /// Apply a function to every cell of one column.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> TransformResult<()>
    where
        F: FnMut(usize, Value) -> TransformResult<Value>,
    {
        self.require(column)?;
        for (idx, row) in self.rows.iter_mut().enumerate() {
            let current = row.remove(column).unwrap_or(Value::Null);
            row.insert(column.to_string(), f(idx, current)?);
        }
        Ok(())
    }

    /// Rename columns. Unmapped columns pass through.
    pub fn rename_columns(&mut self, mapping: &HashMap<String, String>) -> TransformResult<()> {
        let renamed: Vec<String> = self
            .columns
            .iter()
            .map(|c| mapping.get(c).cloned().unwrap_or_else(|| c.clone()))
            .collect();

        let mut seen = HashSet::new();
        for column in &renamed {
            if !seen.insert(column.as_str()) {
                return Err(TransformError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.clone(),
                });
            }
        }

        for row in &mut self.rows {
            let old = std::mem::take(row);
            for (key, value) in old {
                let key = mapping.get(&key).cloned().unwrap_or(key);
                row.insert(key, value);
            }
        }
        self.columns = renamed;
        Ok(())
    }

    /// Copy a set of columns into a new table. Every column must exist.
    pub fn select(&self, name: impl Into<String>, columns: &[&str]) -> TransformResult<Table> {
        for column in columns {
            self.require(column)?;
        }
        let rows: Vec<Record> = self
            .rows
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| (c.to_string(), r.get(*c).cloned().unwrap_or(Value::Null)))
                    .collect::<Record>()
            })
            .collect();
        Ok(Table {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    /// Drop a set of columns. Every column must exist.
    pub fn drop_columns(&mut self, columns: &[&str]) -> TransformResult<()> {
        for column in columns {
            self.require(column)?;
        }
        self.columns.retain(|c| !columns.contains(&c.as_str()));
        for row in &mut self.rows {
            for column in columns {
                row.remove(*column);
            }
        }
        Ok(())
    }

    /// Remove duplicate rows, keeping the first occurrence.
    pub fn dedup(&mut self) {
        let mut seen = HashSet::new();
        let columns = self.columns.clone();
        self.rows.retain(|row| {
            let key: Vec<&Value> = columns
                .iter()
                .map(|c| row.get(c).unwrap_or(&Value::Null))
                .collect();
            seen.insert(serde_json::to_string(&key).unwrap_or_default())
        });
    }

    /// Rename the table.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// =============================================================================
// Sheets and Star Schema
// =============================================================================

/// Name of the membrane sheet in the source workbook.
pub const MEMBRANES_SHEET: &str = "Membranes";

/// Name of the images sheet in the source workbook.
pub const IMAGES_SHEET: &str = "Images";

/// The two raw sheets of one laboratory export.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheets {
    pub membranes: Table,
    pub images: Table,
}

/// Finished tables of one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StarSchema {
    pub membrane_dimension: Table,
    pub images_dimension: Table,
    pub camera_dimension: Table,
    pub date_dimension: Table,
    pub fact: Table,
}

impl StarSchema {
    /// Tables in load order: dimensions first, fact last.
    pub fn tables(&self) -> [&Table; 5] {
        [
            &self.membrane_dimension,
            &self.images_dimension,
            &self.camera_dimension,
            &self.date_dimension,
            &self.fact,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_records(
            "images",
            vec![
                json!({ "image name": "IMG_1", "camera": "A" }),
                json!({ "image name": "IMG_2", "camera": "A" }),
            ],
        )
    }

    #[test]
    fn test_from_records_collects_columns() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert!(table.has_column("image name"));
        assert!(table.has_column("camera"));
    }

    #[test]
    fn test_rename_columns() {
        let mut table = sample();
        let mapping = HashMap::from([("image name".to_string(), "image_name".to_string())]);
        table.rename_columns(&mapping).unwrap();

        assert!(table.has_column("image_name"));
        assert!(!table.has_column("image name"));
        assert_eq!(table.get(1, "image_name"), &json!("IMG_2"));
    }

    #[test]
    fn test_rename_into_existing_column_fails() {
        let mut table = sample();
        let mapping = HashMap::from([("image name".to_string(), "camera".to_string())]);
        let err = table.rename_columns(&mapping).unwrap_err();
        assert!(matches!(err, TransformError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_select_and_drop_require_columns() {
        let mut table = sample();
        assert!(table.select("x", &["lens"]).is_err());
        assert!(table.drop_columns(&["lens"]).is_err());

        let camera = table.select("camera_dimension", &["camera"]).unwrap();
        assert_eq!(camera.columns, vec!["camera"]);
        assert_eq!(camera.len(), 2);

        table.drop_columns(&["camera"]).unwrap();
        assert_eq!(table.columns, vec!["image name"]);
        assert!(table.rows[0].get("camera").is_none());
    }

    #[test]
    fn test_dedup_keeps_first() {
        let mut camera = sample().select("camera_dimension", &["camera"]).unwrap();
        camera.dedup();
        assert_eq!(camera.len(), 1);
    }

    #[test]
    fn test_missing_cell_reads_null() {
        let mut table = sample();
        table.ensure_column("barcode");
        assert_eq!(table.get(0, "barcode"), &Value::Null);
        assert_eq!(table.column("barcode").unwrap().len(), 2);
    }
}
