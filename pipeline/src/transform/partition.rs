//! Star-schema partitioning.
//!
//! Splits the two normalized sheets into the membrane and images dimensions,
//! the camera dimension and the fact table, following the routes of
//! [`super::schema`]. Steps run in a fixed order because each one expects
//! the columns the previous one left in place.

use crate::error::TransformResult;
use crate::models::Table;

use super::schema::{
    camera_columns, fact_columns, images_drop_columns, membrane_drop_columns, CAMERA_DIMENSION,
    FACT_TABLE, IMAGES_DIMENSION, MEMBRANE_DIMENSION,
};

/// Output of [`partition`].
#[derive(Debug, Clone, PartialEq)]
pub struct Partitioned {
    pub membrane_dimension: Table,
    pub images_dimension: Table,
    pub fact: Table,
    pub camera_dimension: Table,
}

/// Partition the normalized membrane and images tables.
///
/// Any column of the contract missing from its source table is a
/// [`crate::error::TransformError::MissingColumn`].
pub fn partition(membranes: Table, images: Table) -> TransformResult<Partitioned> {
    let fact = images.select(FACT_TABLE, &fact_columns())?;

    let mut camera_dimension = images.select(CAMERA_DIMENSION, &camera_columns())?;
    camera_dimension.dedup();

    let mut images_dimension = images.with_name(IMAGES_DIMENSION);
    images_dimension.drop_columns(&images_drop_columns())?;

    let mut membrane_dimension = membranes.with_name(MEMBRANE_DIMENSION);
    membrane_dimension.drop_columns(&membrane_drop_columns())?;

    Ok(Partitioned {
        membrane_dimension,
        images_dimension,
        fact,
        camera_dimension,
    })
}
