//! PostgreSQL warehouse.
//!
//! One connection per run. Inserts are multi-row `INSERT ... VALUES`
//! statements; every value is bound as text and cast to the column type the
//! schema contract declares.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Connection, Executor, PgConnection, Postgres, QueryBuilder};

use super::{cell_text, Warehouse};
use crate::error::{LoadError, LoadResult};
use crate::models::Table;
use crate::transform::schema::{column_type, SqlType};

/// PostgreSQL caps a statement at 65535 bind parameters.
const MAX_BINDS: usize = 65_535;

/// Quote an identifier, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Rows per statement for a table of `columns` columns.
fn rows_per_statement(columns: usize) -> usize {
    (MAX_BINDS / columns.max(1)).max(1)
}

fn sql_type_for(column: &str) -> SqlType {
    column_type(column).unwrap_or(SqlType::Text)
}

fn cast_for(column: &str) -> &'static str {
    sql_type_for(column).as_sql()
}

/// Spellings PostgreSQL accepts as boolean input.
fn is_boolean_literal(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "true" | "false" | "t" | "f" | "yes" | "no" | "y" | "n" | "on" | "off" | "1" | "0"
    )
}

/// Text bound for one cell. Boolean columns only take boolean spellings, so
/// an unrepaired token fails here with its location instead of mid-insert.
fn bind_text(
    table_name: &str,
    column: &str,
    sql_type: SqlType,
    value: Option<&Value>,
) -> LoadResult<Option<String>> {
    let text = cell_text(value);
    match text {
        Some(ref t) if sql_type == SqlType::Boolean && !is_boolean_literal(t) => {
            Err(LoadError::InvalidValue {
                table: table_name.to_string(),
                column: column.to_string(),
                value: t.clone(),
                expected: sql_type.as_sql(),
            })
        }
        _ => Ok(text),
    }
}

pub struct PostgresWarehouse {
    conn: Option<PgConnection>,
    schema: String,
}

impl PostgresWarehouse {
    /// Open the run's connection.
    pub async fn connect(database_url: &str, schema: impl Into<String>) -> LoadResult<Self> {
        let conn = PgConnection::connect(database_url).await?;
        Ok(Self {
            conn: Some(conn),
            schema: schema.into(),
        })
    }

    fn qualified(&self, table_name: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(table_name))
    }

    fn conn(&mut self) -> LoadResult<&mut PgConnection> {
        self.conn.as_mut().ok_or(LoadError::Closed)
    }

    /// `INSERT` statements for `table`, at most `per_statement` rows each.
    fn insert_statements(
        &self,
        table_name: &str,
        table: &Table,
        per_statement: usize,
    ) -> LoadResult<Vec<QueryBuilder<'static, Postgres>>> {
        let columns = &table.columns;
        let types: Vec<SqlType> = columns.iter().map(|c| sql_type_for(c)).collect();
        let prefix = format!(
            "INSERT INTO {} ({}) ",
            self.qualified(table_name),
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
        );

        let mut statements = Vec::new();
        for chunk in table.rows.chunks(per_statement.max(1)) {
            let mut tuples = Vec::with_capacity(chunk.len());
            for row in chunk {
                let texts = columns
                    .iter()
                    .zip(&types)
                    .map(|(column, sql_type)| bind_text(table_name, column, *sql_type, row.get(column)))
                    .collect::<LoadResult<Vec<_>>>()?;
                tuples.push(texts);
            }

            let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(prefix.clone());
            builder.push_values(tuples, |mut values, texts| {
                for (text, sql_type) in texts.into_iter().zip(&types) {
                    match text {
                        Some(text) => {
                            values
                                .push_bind(text)
                                .push_unseparated(format!("::{}", sql_type.as_sql()));
                        }
                        None => {
                            values.push(format!("NULL::{}", sql_type.as_sql()));
                        }
                    }
                }
            });
            statements.push(builder);
        }
        Ok(statements)
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    fn describe(&self) -> String {
        format!("postgres schema '{}'", self.schema)
    }

    /// Runs over the simple-query protocol, so a script may hold several
    /// statements.
    async fn execute_script(&mut self, sql: &str) -> LoadResult<()> {
        let conn = self.conn()?;
        Executor::execute(&mut *conn, sql).await?;
        Ok(())
    }

    async fn append(&mut self, table_name: &str, table: &Table) -> LoadResult<u64> {
        if table.is_empty() || table.columns.is_empty() {
            return Ok(0);
        }

        let statements =
            self.insert_statements(table_name, table, rows_per_statement(table.columns.len()))?;
        let conn = self.conn()?;
        let mut inserted = 0;
        for mut builder in statements {
            let result = builder.build().execute(&mut *conn).await?;
            inserted += result.rows_affected();
        }

        tracing::debug!(target: "spore", table = table_name, rows = inserted, "appended");
        Ok(inserted)
    }

    async fn fetch_column(&mut self, table_name: &str, column: &str) -> LoadResult<Vec<Value>> {
        let sql = format!(
            "SELECT {}::text FROM {}",
            quote_ident(column),
            self.qualified(table_name)
        );
        let conn = self.conn()?;
        let values: Vec<Option<String>> = sqlx::query_scalar(&sql).fetch_all(&mut *conn).await?;
        Ok(values
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::String))
            .collect())
    }

    async fn close(&mut self) -> LoadResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn closed_warehouse() -> PostgresWarehouse {
        PostgresWarehouse {
            conn: None,
            schema: "spore".to_string(),
        }
    }

    fn images() -> Table {
        Table::from_records(
            "images_dimension",
            vec![
                json!({ "image_name": "IMG_1", "usable_for_ml": false, "filtration_date": null }),
                json!({ "image_name": "IMG_2", "usable_for_ml": true, "filtration_date": "2021-01-01" }),
                json!({ "image_name": "IMG_3", "usable_for_ml": null, "filtration_date": "2021-01-02" }),
            ],
        )
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("image_name"), "\"image_name\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_rows_per_statement_stays_under_bind_limit() {
        assert_eq!(rows_per_statement(1), MAX_BINDS);
        assert!(rows_per_statement(13) * 13 <= MAX_BINDS);
        assert_eq!(rows_per_statement(0), MAX_BINDS);
        assert_eq!(rows_per_statement(100_000), 1);
    }

    #[test]
    fn test_cast_from_contract() {
        assert_eq!(cast_for("filtration_date"), "date");
        assert_eq!(cast_for("usable_for_ml"), "boolean");
        assert_eq!(cast_for("number_of_acquisitions"), "integer");
        assert_eq!(cast_for("ecoli_percentage"), "double precision");
        assert_eq!(cast_for("some_lab_note"), "text");
    }

    #[test]
    fn test_insert_statement_casts_and_nulls() {
        let warehouse = closed_warehouse();
        let statements = warehouse
            .insert_statements("images_dimension", &images(), 10)
            .unwrap();

        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].sql(),
            "INSERT INTO \"spore\".\"images_dimension\" \
             (\"filtration_date\", \"image_name\", \"usable_for_ml\") VALUES \
             (NULL::date, $1::text, $2::boolean), \
             ($3::date, $4::text, $5::boolean), \
             ($6::date, $7::text, NULL::boolean)"
        );
    }

    #[test]
    fn test_insert_statements_split_into_chunks() {
        let warehouse = closed_warehouse();
        let statements = warehouse
            .insert_statements("images_dimension", &images(), 2)
            .unwrap();

        assert_eq!(statements.len(), 2);
        assert!(statements[0].sql().ends_with("($3::date, $4::text, $5::boolean)"));
        assert!(statements[1].sql().ends_with("VALUES ($1::date, $2::text, NULL::boolean)"));
    }

    #[test]
    fn test_insert_rejects_unrepaired_boolean() {
        let mut table = images();
        table.rows[1].insert("usable_for_ml".to_string(), json!("VRAI"));

        let err = closed_warehouse()
            .insert_statements("images_dimension", &table, 10)
            .err().unwrap();
        assert!(matches!(
            err,
            LoadError::InvalidValue { ref column, ref value, .. }
                if column == "usable_for_ml" && value == "VRAI"
        ));
    }

    #[test]
    fn test_boolean_literals() {
        for text in ["true", "FALSE", "t", "no", " 1 ", "off"] {
            assert!(is_boolean_literal(text), "{}", text);
        }
        for text in ["FAUX", "maybe", "", "2"] {
            assert!(!is_boolean_literal(text), "{}", text);
        }
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let mut warehouse = closed_warehouse();
        assert!(matches!(
            warehouse.execute_script("CREATE SCHEMA spore;").await,
            Err(LoadError::Closed)
        ));
        assert!(matches!(
            warehouse.append("images_dimension", &images()).await,
            Err(LoadError::Closed)
        ));
        assert!(matches!(
            warehouse.fetch_column("images_dimension", "image_name").await,
            Err(LoadError::Closed)
        ));
        assert!(warehouse.close().await.is_ok());
    }
}
