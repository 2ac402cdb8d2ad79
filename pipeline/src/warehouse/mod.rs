//! Warehouse writers and the lookup reader.
//!
//! - [`PostgresWarehouse`] - the relational warehouse
//! - [`CsvDirectory`] - one CSV file per table, for offline exports
//! - [`MemoryWarehouse`] - in-process tables
//!
//! All writes are appends. There is no upsert and no conflict resolution.

mod directory;
mod postgres;

pub use directory::CsvDirectory;
pub use postgres::PostgresWarehouse;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{LoadError, LoadResult};
use crate::logs::{log_info, log_success};
use crate::models::{StarSchema, Table};

/// Destination of a finished star schema.
#[async_trait]
pub trait Warehouse: Send {
    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;

    /// Run a DDL script before any insert.
    async fn execute_script(&mut self, sql: &str) -> LoadResult<()>;

    /// Append every row of `table` to `table_name`. Returns the rows written.
    async fn append(&mut self, table_name: &str, table: &Table) -> LoadResult<u64>;

    /// Values of one stored column, in storage order.
    async fn fetch_column(&mut self, table_name: &str, column: &str) -> LoadResult<Vec<Value>>;

    /// Release the underlying connection. Further calls fail or are no-ops.
    async fn close(&mut self) -> LoadResult<()>;
}

/// Rows written per table by [`load_star_schema`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub tables: Vec<(String, u64)>,
}

impl LoadReport {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|(_, rows)| rows).sum()
    }
}

/// Load the five tables, dimensions first and the fact table last.
///
/// The DDL script, when given, runs before the first insert.
pub async fn load_star_schema<W>(
    warehouse: &mut W,
    schema: &StarSchema,
    ddl_script: Option<&str>,
) -> LoadResult<LoadReport>
where
    W: Warehouse + ?Sized,
{
    log_info(format!("💾 Loading into {}...", warehouse.describe()));

    if let Some(sql) = ddl_script {
        warehouse.execute_script(sql).await?;
        log_success("DDL script executed");
    }

    let mut report = LoadReport::default();
    for table in schema.tables() {
        let rows = warehouse.append(&table.name, table).await?;
        log_success(format!("{}: {} rows", table.name, rows));
        report.tables.push((table.name.clone(), rows));
    }
    Ok(report)
}

// =============================================================================
// In-memory warehouse
// =============================================================================

/// Tables kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    pub tables: BTreeMap<String, Table>,
    pub scripts: Vec<String>,
    closed: bool,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a table under its own name, replacing any previous content.
    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> LoadResult<()> {
        if self.closed {
            Err(LoadError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn execute_script(&mut self, sql: &str) -> LoadResult<()> {
        self.check_open()?;
        self.scripts.push(sql.to_string());
        Ok(())
    }

    async fn append(&mut self, table_name: &str, table: &Table) -> LoadResult<u64> {
        self.check_open()?;
        let stored = self
            .tables
            .entry(table_name.to_string())
            .or_insert_with(|| Table::new(table_name, table.columns.clone()));
        for row in &table.rows {
            stored.push(row.clone());
        }
        Ok(table.len() as u64)
    }

    async fn fetch_column(&mut self, table_name: &str, column: &str) -> LoadResult<Vec<Value>> {
        self.check_open()?;
        let table = self
            .tables
            .get(table_name)
            .ok_or_else(|| LoadError::UnknownTable(table_name.to_string()))?;
        let values = table.column(column).map_err(|_| LoadError::UnknownColumn {
            table: table_name.to_string(),
            column: column.to_string(),
        })?;
        Ok(values.into_iter().cloned().collect())
    }

    async fn close(&mut self) -> LoadResult<()> {
        self.closed = true;
        Ok(())
    }
}

// =============================================================================
// Helpers shared by the writers
// =============================================================================

/// Text form of a cell; `None` for null.
pub(crate) fn cell_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}
