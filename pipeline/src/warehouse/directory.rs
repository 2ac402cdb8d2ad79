//! CSV directory warehouse: `<dir>/<table_name>.csv`.
//!
//! Appending to an existing file keeps its header; a column the header does
//! not know is an error. Values read back are strings (empty cells are null).

use async_trait::async_trait;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use super::{cell_text, Warehouse};
use crate::error::{LoadError, LoadResult};
use crate::logs::log_info;
use crate::models::Table;

pub struct CsvDirectory {
    root: PathBuf,
}

impl CsvDirectory {
    /// Use `root` as the warehouse, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> LoadResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.root.join(format!("{}.csv", table_name))
    }

    fn read_header(path: &Path) -> LoadResult<Vec<String>> {
        let mut reader = csv::Reader::from_path(path)?;
        Ok(reader.headers()?.iter().map(String::from).collect())
    }
}

#[async_trait]
impl Warehouse for CsvDirectory {
    fn describe(&self) -> String {
        format!("CSV directory {}", self.root.display())
    }

    async fn execute_script(&mut self, sql: &str) -> LoadResult<()> {
        log_info(format!(
            "Skipping DDL script ({} bytes): CSV directories have no schema",
            sql.len()
        ));
        Ok(())
    }

    async fn append(&mut self, table_name: &str, table: &Table) -> LoadResult<u64> {
        let path = self.table_path(table_name);
        let exists = path.exists();

        let header = if exists {
            let header = Self::read_header(&path)?;
            if let Some(column) = table.columns.iter().find(|c| !header.contains(c)) {
                return Err(LoadError::UnknownColumn {
                    table: table_name.to_string(),
                    column: column.clone(),
                });
            }
            header
        } else {
            table.columns.clone()
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if !exists {
            writer.write_record(&header)?;
        }
        for row in &table.rows {
            writer.write_record(
                header
                    .iter()
                    .map(|c| cell_text(row.get(c)).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(table.len() as u64)
    }

    async fn fetch_column(&mut self, table_name: &str, column: &str) -> LoadResult<Vec<Value>> {
        let path = self.table_path(table_name);
        if !path.exists() {
            return Err(LoadError::UnknownTable(table_name.to_string()));
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let index = reader
            .headers()?
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| LoadError::UnknownColumn {
                table: table_name.to_string(),
                column: column.to_string(),
            })?;

        let mut values = Vec::new();
        for record in reader.records() {
            let record = record?;
            values.push(match record.get(index) {
                Some(cell) if !cell.is_empty() => Value::String(cell.to_string()),
                _ => Value::Null,
            });
        }
        Ok(values)
    }

    async fn close(&mut self) -> LoadResult<()> {
        Ok(())
    }
}
