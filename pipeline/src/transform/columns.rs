//! Column normalization.
//!
//! Raw spreadsheet headers drift between sheet revisions (synonyms, casing,
//! embedded format hints). A [`ColumnMappings`] holds the raw → canonical
//! tables: one shared by both sheets and one per sheet.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::TransformResult;
use crate::models::Table;

/// Raw header → canonical field name.
pub type ColumnMapping = HashMap<String, String>;

fn mapping(pairs: &[(&str, &str)]) -> ColumnMapping {
    pairs
        .iter()
        .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
        .collect()
}

/// Headers shared by both sheets.
pub static COMMON_COLUMNS: Lazy<ColumnMapping> = Lazy::new(|| {
    mapping(&[
        ("experiment_name_(aaaa#what_it?)", "experiment_name"),
        ("Usable for ML", "usable_for_ml"),
        ("Exclusion reason", "exclusion_reason"),
        ("acquisitions_realized?", "acquisitions_realized"),
        ("filtration_date_yymmdd", "filtration_date"),
        ("types_of_microorganisms_(AAAA-Bxx)", "types_of_microorganisms"),
        ("ecoli %", "ecoli_percentage"),
        ("pseudomonas %", "pseudomonas_percentage"),
        ("nomenclature_format_(from0tohigher)", "nomenclature_format"),
        ("matrix_dilution_(dxx)", "matrix_dilution"),
        (
            "total number of bacteria measured in lab (log10)",
            "total_number_of_bacteria_measured_in_lab",
        ),
    ])
});

/// Headers specific to the membrane sheet.
pub static MEMBRANE_COLUMNS: Lazy<ColumnMapping> = Lazy::new(|| {
    mapping(&[
        ("membrane name", "membrane_name"),
        ("row", "row_num"),
        ("biosample_position_(0to999999)", "biosample_position"),
    ])
});

/// Headers specific to the images sheet.
pub static IMAGES_COLUMNS: Lazy<ColumnMapping> = Lazy::new(|| {
    mapping(&[
        ("image name", "image_name"),
        ("number of bacteria pixels", "number_of_bacteria_pixels"),
        ("optical setup", "optical_setup"),
        ("lens diameter", "lens_diameter"),
    ])
});

/// The full vocabulary for one sheet revision.
///
/// A mapping left out of a config file keeps its built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMappings {
    pub common: ColumnMapping,
    pub membrane: ColumnMapping,
    pub images: ColumnMapping,
}

impl Default for ColumnMappings {
    fn default() -> Self {
        Self {
            common: COMMON_COLUMNS.clone(),
            membrane: MEMBRANE_COLUMNS.clone(),
            images: IMAGES_COLUMNS.clone(),
        }
    }
}

/// Overlay `common` onto a copy of `specific`; `common` wins on conflict.
pub fn merged_mapping(common: &ColumnMapping, specific: &ColumnMapping) -> ColumnMapping {
    let mut merged = specific.clone();
    merged.extend(common.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Rename a table's headers to canonical names.
///
/// Renames with `common` first, then with the merged mapping, so headers
/// covered only by `specific` are renamed in the second pass. Neither
/// mapping is modified.
pub fn normalize_columns(
    table: &mut Table,
    common: &ColumnMapping,
    specific: &ColumnMapping,
) -> TransformResult<()> {
    table.rename_columns(common)?;
    let merged = merged_mapping(common, specific);
    table.rename_columns(&merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> ColumnMapping {
        mapping(items)
    }

    #[test]
    fn test_common_and_specific_renamed() {
        let mut table = Table::from_records(
            "t",
            vec![json!({ "col1": 1, "col2": 4, "untouched": 7 })],
        );
        let common = pairs(&[("col1", "new_col1")]);
        let specific = pairs(&[("col2", "new_col2"), ("col3", "new_col3")]);

        normalize_columns(&mut table, &common, &specific).unwrap();

        assert!(table.has_column("new_col1"));
        assert!(table.has_column("new_col2"));
        assert!(table.has_column("untouched"));
        assert!(!table.has_column("col1"));
        assert!(!table.has_column("col2"));
        assert_eq!(table.get(0, "new_col2"), &json!(4));
    }

    #[test]
    fn test_common_wins_on_conflict() {
        let common = pairs(&[("shared", "from_common")]);
        let specific = pairs(&[("shared", "from_specific"), ("own", "own_field")]);
        let merged = merged_mapping(&common, &specific);

        assert_eq!(merged["shared"], "from_common");
        assert_eq!(merged["own"], "own_field");
    }

    #[test]
    fn test_mappings_not_mutated() {
        let common = pairs(&[("a", "x")]);
        let specific = pairs(&[("b", "y")]);
        let before = specific.clone();

        let mut first = Table::from_records("t1", vec![json!({ "a": 1, "b": 2 })]);
        let mut second = Table::from_records("t2", vec![json!({ "b": 3 })]);
        normalize_columns(&mut first, &common, &specific).unwrap();
        normalize_columns(&mut second, &common, &specific).unwrap();

        assert_eq!(specific, before);
        assert!(!specific.contains_key("a"));
        assert_eq!(second.columns, vec!["y"]);
    }

    #[test]
    fn test_no_merged_key_left_unrenamed() {
        let mappings = ColumnMappings::default();
        let mut table = Table::from_records(
            "images",
            vec![json!({
                "image name": "IMG_1",
                "Usable for ML": "FAUX",
                "ecoli %": 0.1,
                "lens diameter": 4,
                "camera": "cam-1"
            })],
        );
        normalize_columns(&mut table, &mappings.common, &mappings.images).unwrap();

        let merged = merged_mapping(&mappings.common, &mappings.images);
        for column in &table.columns {
            assert!(!merged.contains_key(column), "{} left unrenamed", column);
        }
        assert!(table.has_column("usable_for_ml"));
        assert!(table.has_column("lens_diameter"));
        assert!(table.has_column("camera"));
    }

    #[test]
    fn test_membrane_vocabulary() {
        let mappings = ColumnMappings::default();
        let mut table = Table::from_records(
            "membranes",
            vec![json!({ "membrane name": "MEM1", "row": 1, "filtration_date_yymmdd": "210101" })],
        );
        normalize_columns(&mut table, &mappings.common, &mappings.membrane).unwrap();

        assert!(table.has_column("membrane_name"));
        assert!(table.has_column("row_num"));
        assert!(table.has_column("filtration_date"));
    }
}
