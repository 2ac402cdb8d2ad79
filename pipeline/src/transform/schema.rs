//! Versioned star-schema contract.
//!
//! One table says, for every canonical field of the images sheet, where the
//! partitioner sends it. The copy and drop lists used by
//! [`super::partition`] are all derived from [`FIELD_ROUTES`], so adding a
//! field is a one-line change here.
//!
//! The contract also carries the PostgreSQL type each warehouse column is
//! cast to on insert.

use serde::Serialize;

/// Bumped whenever a route or a column type changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Warehouse table names.
pub const MEMBRANE_DIMENSION: &str = "membrane_dimension";
pub const IMAGES_DIMENSION: &str = "images_dimension";
pub const CAMERA_DIMENSION: &str = "camera_dimension";
pub const DATE_DIMENSION: &str = "date_dimension";
pub const FACT_TABLE: &str = "membrane_images_camera";

/// Canonical fields referenced by the core outside of the routes.
pub mod fields {
    pub const MEMBRANE_NAME: &str = "membrane_name";
    pub const IMAGE_NAME: &str = "image_name";
    pub const BARCODE: &str = "barcode";
    pub const USABLE_FOR_ML: &str = "usable_for_ml";
    pub const FILTRATION_DATE: &str = "filtration_date";
    pub const ECOLI_PERCENTAGE: &str = "ecoli_percentage";
    pub const PSEUDOMONAS_PERCENTAGE: &str = "pseudomonas_percentage";
    /// Derived foreign key from the fact table to the membrane dimension.
    pub const MEMBRANE: &str = "membrane";
    pub const DATE_DAY: &str = "date_day";
    pub const DATE_MONTH: &str = "date_month";
    pub const DATE_YEAR: &str = "date_year";
}

/// Fraction columns rescaled to percentages.
pub const PERCENTAGE_FIELDS: [&str; 2] = [fields::ECOLI_PERCENTAGE, fields::PSEUDOMONAS_PERCENTAGE];

/// PostgreSQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Text,
    Integer,
    Double,
    Boolean,
    Date,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "text",
            SqlType::Integer => "integer",
            SqlType::Double => "double precision",
            SqlType::Boolean => "boolean",
            SqlType::Date => "date",
        }
    }
}

/// Placement of one images-sheet field in the star schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldRoute {
    pub field: &'static str,
    /// Copied into the fact table.
    pub fact: bool,
    /// Copied into the camera dimension.
    pub camera: bool,
    /// Stays in the images dimension after partitioning.
    pub keep_in_images: bool,
    /// Also present on the membrane sheet, where it is dropped.
    pub drop_from_membrane: bool,
    pub sql_type: SqlType,
}

const fn route(
    field: &'static str,
    fact: bool,
    camera: bool,
    keep_in_images: bool,
    drop_from_membrane: bool,
    sql_type: SqlType,
) -> FieldRoute {
    FieldRoute {
        field,
        fact,
        camera,
        keep_in_images,
        drop_from_membrane,
        sql_type,
    }
}

/// Contract version 1.
#[rustfmt::skip]
pub const FIELD_ROUTES: &[FieldRoute] = &[
    //     field                                        fact   camera keep   membrane
    route("image_name",                               true,  false, true,  false, SqlType::Text),
    route("number_of_bacteria_pixels",                true,  false, false, false, SqlType::Double),
    route("optical_setup",                            true,  true,  false, false, SqlType::Text),
    route("acquisitions_realized",                    true,  false, false, true,  SqlType::Text),
    route("filtration_date",                          true,  false, false, true,  SqlType::Date),
    route("types_of_microorganisms",                  true,  false, false, true,  SqlType::Text),
    route("matrix_dilution",                          true,  false, false, true,  SqlType::Text),
    route("total_number_of_bacteria_measured_in_lab", true,  false, false, true,  SqlType::Double),
    route("pseudomonas_percentage",                   true,  false, false, true,  SqlType::Double),
    route("nomenclature_format",                      true,  false, false, true,  SqlType::Text),
    route("ecoli_percentage",                         true,  false, false, true,  SqlType::Double),
    route("number_of_acquisitions",                   true,  false, false, true,  SqlType::Integer),
    route("pretreatment_operator",                    true,  false, false, true,  SqlType::Text),
    route("lens_diameter",                            false, true,  false, false, SqlType::Double),
    route("objective",                                false, true,  false, false, SqlType::Text),
    route("camera",                                   false, true,  false, false, SqlType::Text),
];

/// Types of warehouse columns that are not routed by the partitioner.
const OTHER_COLUMN_TYPES: &[(&str, SqlType)] = &[
    (fields::MEMBRANE_NAME, SqlType::Text),
    (fields::MEMBRANE, SqlType::Text),
    (fields::BARCODE, SqlType::Text),
    (fields::USABLE_FOR_ML, SqlType::Boolean),
    ("experiment_name", SqlType::Text),
    ("exclusion_reason", SqlType::Text),
    ("row_num", SqlType::Integer),
    ("biosample_position", SqlType::Integer),
    (fields::DATE_DAY, SqlType::Integer),
    (fields::DATE_MONTH, SqlType::Integer),
    (fields::DATE_YEAR, SqlType::Integer),
];

/// Columns copied from the images table into the fact table.
pub fn fact_columns() -> Vec<&'static str> {
    FIELD_ROUTES.iter().filter(|r| r.fact).map(|r| r.field).collect()
}

/// Columns copied from the images table into the camera dimension.
pub fn camera_columns() -> Vec<&'static str> {
    FIELD_ROUTES.iter().filter(|r| r.camera).map(|r| r.field).collect()
}

/// Columns dropped from the images table once fact and camera are built.
pub fn images_drop_columns() -> Vec<&'static str> {
    FIELD_ROUTES
        .iter()
        .filter(|r| (r.fact || r.camera) && !r.keep_in_images)
        .map(|r| r.field)
        .collect()
}

/// Columns dropped from the membrane table.
pub fn membrane_drop_columns() -> Vec<&'static str> {
    FIELD_ROUTES
        .iter()
        .filter(|r| r.drop_from_membrane)
        .map(|r| r.field)
        .collect()
}

/// Declared warehouse type of a column, if the contract knows it.
pub fn column_type(column: &str) -> Option<SqlType> {
    FIELD_ROUTES
        .iter()
        .find(|r| r.field == column)
        .map(|r| r.sql_type)
        .or_else(|| {
            OTHER_COLUMN_TYPES
                .iter()
                .find(|(name, _)| *name == column)
                .map(|(_, t)| *t)
        })
}

/// Serializable view of the contract, printed by `spore schema`.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaContract {
    pub version: u32,
    pub fact_table: &'static str,
    pub routes: &'static [FieldRoute],
    pub fact_columns: Vec<&'static str>,
    pub camera_columns: Vec<&'static str>,
    pub images_drop_columns: Vec<&'static str>,
    pub membrane_drop_columns: Vec<&'static str>,
}

pub fn contract() -> SchemaContract {
    SchemaContract {
        version: SCHEMA_VERSION,
        fact_table: FACT_TABLE,
        routes: FIELD_ROUTES,
        fact_columns: fact_columns(),
        camera_columns: camera_columns(),
        images_drop_columns: images_drop_columns(),
        membrane_drop_columns: membrane_drop_columns(),
    }
}
