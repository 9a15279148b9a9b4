//! Named groups of axis variables.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashSet;

use crate::error::ConstraintsFailed;
use crate::variable::VariableId;

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateSystem {
    pub name: String,
    pub axes: Vec<VariableId>,
    committed: bool,
}

impl CoordinateSystem {
    #[must_use]
    pub fn new(name: impl Into<String>, axes: Vec<VariableId>) -> Self {
        Self {
            name: name.into(),
            axes,
            committed: false,
        }
    }

    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.committed
    }

    pub(crate) fn commit(&mut self) {
        self.committed = true;
    }
}

/// Every axis must be a variable of the proposed collection and names must
/// be unique.
pub(crate) fn check_coordinate_systems(
    systems: &[CoordinateSystem],
    variables: &[VariableId],
) -> Result<(), ConstraintsFailed> {
    let mut names = HashSet::new();
    for system in systems {
        if !names.insert(system.name.as_str()) {
            return Err(ConstraintsFailed::rule(format!(
                "coordinate system {} is defined more than once",
                system.name
            )));
        }
        if system.axes.is_empty() {
            return Err(ConstraintsFailed::rule(format!(
                "coordinate system {} has no axes",
                system.name
            )));
        }
        if let Some(axis) = system.axes.iter().find(|a| !variables.contains(a)) {
            return Err(ConstraintsFailed::rule(format!(
                "coordinate system {} uses variable {axis} which is not in the dataset",
                system.name
            )));
        }
    }
    Ok(())
}
