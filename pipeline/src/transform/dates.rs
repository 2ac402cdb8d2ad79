//! Compact `yymmdd` filtration dates and the calendar dimension.

use chrono::{Datelike, NaiveDate};
use serde_json::{json, Map, Value};

use crate::error::TransformResult;
use crate::models::Table;

use super::schema::fields::{DATE_DAY, DATE_MONTH, DATE_YEAR, FILTRATION_DATE};
use super::schema::DATE_DIMENSION;

const COMPACT_FORMAT: &str = "%y%m%d";

/// Parse a six-digit `yymmdd` date.
///
/// Numeric cells are read as their integer digits and left-padded to six
/// digits. Anything else that is not exactly six ASCII digits yields `None`.
pub fn parse_compact_date(value: &Value) -> Option<NaiveDate> {
    let digits = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(i), _) => format!("{:06}", i),
            (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 => format!("{:06}", f as u64),
            _ => return None,
        },
        _ => return None,
    };
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(&digits, COMPACT_FORMAT).ok()
}

fn iso(date: NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

/// Convert the fact table's `filtration_date` to ISO dates in place.
///
/// Unparsable values become null; rows are kept. Returns the number of
/// values that did not parse.
pub fn convert_filtration_dates(fact: &mut Table) -> TransformResult<usize> {
    let mut malformed = 0;
    fact.map_column(FILTRATION_DATE, |row, value| {
        Ok(match parse_compact_date(&value) {
            Some(date) => iso(date),
            None => {
                if !value.is_null() {
                    malformed += 1;
                    tracing::debug!(target: "spore", row, value = %value, "unparsable filtration date");
                }
                Value::Null
            }
        })
    })?;
    Ok(malformed)
}

/// Build the deduplicated calendar dimension from raw compact dates.
///
/// Rows whose date does not parse are left out.
pub fn build_date_dimension(fact: &Table) -> TransformResult<Table> {
    let mut dimension = Table::new(
        DATE_DIMENSION,
        [FILTRATION_DATE, DATE_DAY, DATE_MONTH, DATE_YEAR]
            .iter()
            .map(|c| c.to_string())
            .collect(),
    );

    for value in fact.column(FILTRATION_DATE)? {
        if let Some(date) = parse_compact_date(value) {
            let mut row = Map::new();
            row.insert(FILTRATION_DATE.to_string(), iso(date));
            row.insert(DATE_DAY.to_string(), json!(date.day()));
            row.insert(DATE_MONTH.to_string(), json!(date.month()));
            row.insert(DATE_YEAR.to_string(), json!(date.year()));
            dimension.rows.push(row);
        }
    }
    dimension.dedup();
    Ok(dimension)
}
