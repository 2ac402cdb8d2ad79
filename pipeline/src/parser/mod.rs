//! Spreadsheet reader.
//!
//! Turns a laboratory export into the two raw tables `Membranes` and
//! `Images`. Two layouts are accepted:
//!
//! - a workbook (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) with one sheet
//!   of each name, read with [`workbook`]
//! - a directory holding `Membranes.csv` and `Images.csv`, with encoding
//!   and delimiter auto-detection
//!
//! In both cases the first row holds the headers, fully empty rows are
//! skipped and empty cells become null.

pub mod workbook;

use serde_json::Value;
use std::path::Path;

use crate::error::{SheetError, SheetResult};
use crate::logs::{log_info, log_success};
use crate::models::{Record, RawSheets, Table, IMAGES_SHEET, MEMBRANES_SHEET};

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Read both sheets from a workbook or a directory of CSV exports.
pub fn read_sheets(path: &Path) -> SheetResult<RawSheets> {
    log_info(format!("📖 Reading {}...", path.display()));

    let sheets = if path.is_dir() {
        RawSheets {
            membranes: read_csv_sheet(path, MEMBRANES_SHEET)?,
            images: read_csv_sheet(path, IMAGES_SHEET)?,
        }
    } else if is_workbook(path) {
        workbook::read_workbook(path)?
    } else {
        return Err(SheetError::UnsupportedInput(path.display().to_string()));
    };

    log_success(format!(
        "Read {} membrane rows, {} image rows",
        sheets.membranes.len(),
        sheets.images.len()
    ));
    Ok(sheets)
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_csv_sheet(dir: &Path, sheet: &str) -> SheetResult<Table> {
    let path = dir.join(format!("{}.csv", sheet));
    if !path.exists() {
        return Err(SheetError::MissingSheet(sheet.to_string()));
    }
    let bytes = std::fs::read(&path)?;
    parse_csv_bytes(sheet, &bytes)
}

// =============================================================================
// CSV exports
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the given encoding, falling back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Typed value of one exported CSV cell.
///
/// Integers are kept only when they print back identically, so codes with
/// leading zeros (`050101`) stay strings. Decimals follow the workbook
/// reader: a comma separator is accepted and whole values become integers.
fn csv_cell(raw: &str) -> Value {
    let cell = raw.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        if i.to_string() == cell {
            return Value::from(i);
        }
    }
    let leading_zero = cell.len() > 1
        && cell.starts_with('0')
        && cell.as_bytes()[1].is_ascii_digit();
    match parse_decimal(cell) {
        Some(f) if !leading_zero => number_value(f),
        _ => Value::String(cell.to_string()),
    }
}

/// Parse one exported sheet.
pub fn parse_csv_bytes(sheet: &str, bytes: &[u8]) -> SheetResult<Table> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    tracing::debug!(target: "spore", sheet, %encoding, ?delimiter, "csv export detected");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let raw_headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    if raw_headers.iter().all(|h| h.trim().is_empty()) {
        return Err(SheetError::NoHeaders(sheet.to_string()));
    }
    let headers = header_names(raw_headers);

    let mut table = Table::new(sheet, headers.clone());
    for record in reader.records() {
        let record = record?;
        let row: Record = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).map(csv_cell).unwrap_or(Value::Null)))
            .collect();
        push_non_empty(&mut table, row);
    }
    Ok(table)
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Trimmed header names. Blank headers get a positional name and repeated
/// headers a `.N` suffix, so every column stays addressable.
pub(crate) fn header_names(raw: Vec<String>) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, header) in raw.into_iter().enumerate() {
        let base = match header.trim() {
            "" => format!("column_{}", idx + 1),
            trimmed => trimmed.to_string(),
        };
        let mut name = base.clone();
        let mut n = 1;
        while names.contains(&name) {
            name = format!("{}.{}", base, n);
            n += 1;
        }
        names.push(name);
    }
    names
}

/// Parse a decimal written with either `.` or a single `,` separator.
pub(crate) fn parse_decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    let parsed = if text.contains(',') {
        if text.contains('.') || text.matches(',').count() > 1 {
            return None;
        }
        text.replacen(',', ".", 1).parse::<f64>()
    } else {
        text.parse::<f64>()
    };
    parsed.ok().filter(|f| f.is_finite())
}

/// JSON number for a spreadsheet float. Whole values become integers, as
/// spreadsheet tools store every number as a float.
pub(crate) fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        Value::from(f)
    }
}

/// Append `row` unless every cell is null.
pub(crate) fn push_non_empty(table: &mut Table, row: Record) {
    if row.values().any(|v| !v.is_null()) {
        table.rows.push(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
    }

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_csv_cell_types() {
        assert_eq!(csv_cell(""), Value::Null);
        assert_eq!(csv_cell("  "), Value::Null);
        assert_eq!(csv_cell("12"), json!(12));
        assert_eq!(csv_cell("0.25"), json!(0.25));
        assert_eq!(csv_cell("3.5"), json!(3.5));
        assert_eq!(csv_cell("050101"), json!("050101"));
        assert_eq!(csv_cell("FAUX"), json!("FAUX"));
        assert_eq!(csv_cell("MEM1"), json!("MEM1"));
    }

    #[test]
    fn test_csv_cell_whole_floats_are_integers() {
        assert_eq!(csv_cell("25.0"), json!(25));
        assert_eq!(csv_cell("2.0"), json!(2));
        assert_eq!(csv_cell("210101.0"), json!(210101));
        assert_eq!(csv_cell("25"), csv_cell("25.0"));
    }

    #[test]
    fn test_csv_cell_decimal_comma() {
        assert_eq!(csv_cell("0,25"), json!(0.25));
        assert_eq!(csv_cell("3,0"), json!(3));
        assert_eq!(csv_cell("1,2,3"), json!("1,2,3"));
        assert_eq!(csv_cell("1.5,2"), json!("1.5,2"));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(" 0,5 "), Some(0.5));
        assert_eq!(parse_decimal("12.5"), Some(12.5));
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[test]
    fn test_parse_csv_export() {
        let csv = "membrane name;row;ecoli %\nMEM1;1;0.5\n;;\nMEM2;2;\n";
        let table = parse_csv_bytes("Membranes", csv.as_bytes()).unwrap();

        assert_eq!(table.columns, vec!["membrane name", "row", "ecoli %"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "row"), &json!(1));
        assert_eq!(table.get(0, "ecoli %"), &json!(0.5));
        assert_eq!(table.get(1, "ecoli %"), &Value::Null);
    }

    #[test]
    fn test_header_names() {
        let names = header_names(vec![
            " camera ".to_string(),
            "".to_string(),
            "camera".to_string(),
        ]);
        assert_eq!(names, vec!["camera", "column_2", "camera.1"]);
    }

    #[test]
    fn test_read_csv_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Membranes.csv"), "membrane name\nMEM1\n").unwrap();
        std::fs::write(dir.path().join("Images.csv"), "image name,camera\nIMG_MEM1,cam\n").unwrap();

        let sheets = read_sheets(dir.path()).unwrap();
        assert_eq!(sheets.membranes.name, "Membranes");
        assert_eq!(sheets.membranes.len(), 1);
        assert_eq!(sheets.images.get(0, "camera"), &json!("cam"));
    }

    #[test]
    fn test_missing_sheet() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Membranes.csv"), "membrane name\nMEM1\n").unwrap();

        let err = read_sheets(dir.path()).unwrap_err();
        assert!(matches!(err, SheetError::MissingSheet(ref s) if s == "Images"));
    }

    #[test]
    fn test_unsupported_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(read_sheets(&path), Err(SheetError::UnsupportedInput(_))));
    }
}
