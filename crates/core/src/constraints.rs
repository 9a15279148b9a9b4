//! Shared-dimension constraint solver.
//!
//! Every variable reports its proposed dimension list. Dimensions are matched
//! by name; a name reported with two different lengths is marked as
//! conflicting and the scan continues, so a single failure names every
//! offending dimension.

use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::dimension::{Dimension, DimensionList};
use crate::error::ConstraintsFailed;
use crate::variable::VariableId;

/// Resolves the dataset-wide dimension list from per-variable proposals.
///
/// Dimensions appear in order of first occurrence.
///
/// # Errors
///
/// Returns [`ConstraintsFailed`] naming every dimension reported with more
/// than one length.
pub fn check_shared_dimensions<'a, I>(variables: I) -> Result<DimensionList, ConstraintsFailed>
where
    I: IntoIterator<Item = (VariableId, &'a DimensionList)>,
{
    let mut order: Vec<String> = Vec::new();
    // `None` marks a conflict
    let mut lengths: HashMap<String, Option<usize>> = HashMap::new();

    for (id, dimensions) in variables {
        for dimension in dimensions.iter() {
            match lengths.get_mut(&dimension.name) {
                None => {
                    order.push(dimension.name.clone());
                    lengths.insert(dimension.name.clone(), Some(dimension.length));
                }
                Some(slot) => {
                    if slot.is_some_and(|length| length != dimension.length) {
                        tracing::debug!(
                            variable = %id,
                            dimension = %dimension.name,
                            length = dimension.length,
                            "conflicting shared dimension"
                        );
                        *slot = None;
                    }
                }
            }
        }
    }

    let conflicts: Vec<String> = order
        .iter()
        .filter(|name| matches!(lengths.get(*name), Some(None)))
        .cloned()
        .collect();
    if !conflicts.is_empty() {
        return Err(ConstraintsFailed::conflicting_dimensions(conflicts));
    }

    Ok(order
        .into_iter()
        .filter_map(|name| {
            let length = lengths.get(&name).copied().flatten()?;
            Some(Dimension::new(name, length))
        })
        .collect())
}
