//! Value normalization rules.
//!
//! - Boolean repair: a foreign-language "false" token becomes `false`
//! - Identifier backfill: a null fill column takes the value of a source column
//! - Percentage scaling: fractions become percentages

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{TransformError, TransformResult};
use crate::logs::log_warning;
use crate::models::Table;
use crate::parser::parse_decimal;

/// Token the laboratory sheets use for boolean false.
pub const DEFAULT_FALSE_TOKEN: &str = "FAUX";

/// Rewrite `false_token` to `false` in `column`. Other values are kept as-is.
///
/// Leftover tokens the warehouse cannot read as boolean (`VRAI`, `maybe`)
/// are rejected by the PostgreSQL writer with their table and column.
pub fn repair_boolean(table: &mut Table, column: &str, false_token: &str) -> TransformResult<usize> {
    let mut repaired = 0;
    table.map_column(column, |_, value| {
        Ok(match value {
            Value::String(ref s) if s == false_token => {
                repaired += 1;
                Value::Bool(false)
            }
            other => other,
        })
    })?;
    Ok(repaired)
}

/// Copy `source` into `fill` wherever `fill` is null.
///
/// The fill column is created when absent; the source column must exist.
pub fn backfill(table: &mut Table, fill: &str, source: &str) -> TransformResult<usize> {
    table.require(source)?;
    table.ensure_column(fill);

    let mut filled = 0;
    for row in &mut table.rows {
        let missing = row.get(fill).map_or(true, Value::is_null);
        if missing {
            let value = row.get(source).cloned().unwrap_or(Value::Null);
            if !value.is_null() {
                filled += 1;
            }
            row.insert(fill.to_string(), value);
        }
    }
    Ok(filled)
}

/// What to do with fraction inputs above 1 (already percentages?).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractionPolicy {
    /// Multiply unconditionally.
    #[default]
    Trust,
    /// Multiply, but log every value above 1.
    Warn,
    /// Fail the run on any value above 1.
    Reject,
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Replace null with 0 and multiply by 100, for each column.
///
/// Inputs are expected as decimal fractions (0–1). Results are rounded to
/// six decimals.
pub fn scale_percentages(
    table: &mut Table,
    columns: &[&str],
    policy: FractionPolicy,
) -> TransformResult<()> {
    let table_name = table.name.clone();
    for column in columns {
        let mut above_one = 0usize;
        table.map_column(column, |row, value| {
            if value.is_null() {
                return Ok(json!(0.0));
            }
            let fraction = as_number(&value).ok_or_else(|| TransformError::InvalidValue {
                table: table_name.clone(),
                column: column.to_string(),
                row,
                message: format!("expected a fraction, got {}", value),
            })?;
            if fraction > 1.0 {
                match policy {
                    FractionPolicy::Trust => {}
                    FractionPolicy::Warn => above_one += 1,
                    FractionPolicy::Reject => {
                        return Err(TransformError::InvalidValue {
                            table: table_name.clone(),
                            column: column.to_string(),
                            row,
                            message: format!("{} is not a fraction between 0 and 1", fraction),
                        })
                    }
                }
            }
            Ok(json!(round6(fraction * 100.0)))
        })?;
        if above_one > 0 {
            log_warning(format!(
                "{}: {} value(s) above 1 scaled anyway",
                column, above_one
            ));
        }
    }
    Ok(())
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
