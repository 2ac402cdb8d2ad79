//! Membrane ↔ image relationship inference.
//!
//! Image names embed the name of the membrane they were taken from
//! (`IMG_MEM12_X` belongs to `MEM12`). The fact table gets a `membrane`
//! column holding the longest membrane name found inside its image name.
//!
//! Every fact row is checked against every membrane name. Laboratory
//! batches (hundreds to low thousands of rows) keep this cheap; larger
//! batches grow as rows × membranes.

use serde_json::Value;

use crate::error::TransformResult;
use crate::models::Table;

use super::schema::fields::{IMAGE_NAME, MEMBRANE, MEMBRANE_NAME};

/// Longest candidate contained in `image_name`.
///
/// Equal-length matches resolve to the lexicographically smallest name.
/// Returns `None` when no candidate matches.
pub fn longest_match<'a, I>(image_name: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<&'a str> = None;
    for candidate in candidates {
        if candidate.is_empty() || !image_name.contains(candidate) {
            continue;
        }
        best = match best {
            Some(current)
                if current.len() > candidate.len()
                    || (current.len() == candidate.len() && current <= candidate) =>
            {
                Some(current)
            }
            _ => Some(candidate),
        };
    }
    best
}

/// Set `membrane` on every fact row. Unmatched rows get an empty string.
///
/// Returns the number of unmatched rows.
pub fn assign_membranes(fact: &mut Table, membranes: &Table) -> TransformResult<usize> {
    fact.require(IMAGE_NAME)?;
    let names: Vec<&str> = membranes
        .column(MEMBRANE_NAME)?
        .into_iter()
        .filter_map(Value::as_str)
        .collect();

    fact.ensure_column(MEMBRANE);
    let mut unmatched = 0;
    for row in &mut fact.rows {
        let matched = row
            .get(IMAGE_NAME)
            .and_then(Value::as_str)
            .and_then(|image| longest_match(image, names.iter().copied()));
        if matched.is_none() {
            unmatched += 1;
        }
        row.insert(
            MEMBRANE.to_string(),
            Value::String(matched.unwrap_or_default().to_string()),
        );
    }
    Ok(unmatched)
}
