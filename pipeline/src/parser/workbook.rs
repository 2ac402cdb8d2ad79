//! Workbook sheets via `calamine`.

use calamine::{open_workbook_auto, Data, Range, Reader};
use serde_json::Value;
use std::path::Path;

use super::{header_names, number_value, push_non_empty};
use crate::error::{SheetError, SheetResult};
use crate::models::{Record, RawSheets, Table, IMAGES_SHEET, MEMBRANES_SHEET};

/// Compact date layout used by the laboratory sheets.
const SHEET_DATE_FORMAT: &str = "%y%m%d";

/// Read the `Membranes` and `Images` sheets of a workbook.
pub fn read_workbook(path: &Path) -> SheetResult<RawSheets> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();

    let mut read = |sheet: &str| -> SheetResult<Table> {
        if !names.iter().any(|n| n == sheet) {
            return Err(SheetError::MissingSheet(sheet.to_string()));
        }
        let range = workbook.worksheet_range(sheet)?;
        range_to_table(sheet, &range)
    };

    Ok(RawSheets {
        membranes: read(MEMBRANES_SHEET)?,
        images: read(IMAGES_SHEET)?,
    })
}

/// JSON value of one workbook cell.
///
/// Whole floats become integers, as spreadsheet tools store every number
/// as a float. Date cells are written back in the sheets' compact layout.
/// Error cells (`#N/A`, `#DIV/0!`) read as null.
pub fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::String(s.trim().to_string()),
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => number_value(*f),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => Value::String(datetime.format(SHEET_DATE_FORMAT).to_string()),
            None => Value::from(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}

/// Build a table from a sheet range: first row headers, empty rows skipped.
pub fn range_to_table(sheet: &str, range: &Range<Data>) -> SheetResult<Table> {
    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| SheetError::NoHeaders(sheet.to_string()))?;

    let raw_headers: Vec<String> = header_row
        .iter()
        .map(|cell| match cell_value(cell) {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect();
    if raw_headers.iter().all(String::is_empty) {
        return Err(SheetError::NoHeaders(sheet.to_string()));
    }
    let headers = header_names(raw_headers);

    let mut table = Table::new(sheet, headers.clone());
    for cells in rows {
        let row: Record = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), cells.get(i).map(cell_value).unwrap_or(Value::Null)))
            .collect();
        push_non_empty(&mut table, row);
    }
    Ok(table)
}
