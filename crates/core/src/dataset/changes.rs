use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::coordinate::CoordinateSystem;
use crate::dimension::DimensionList;
use crate::metadata::MetadataValue;
use crate::rectangle::Rectangle;
use crate::schema::DataSetSchema;
use crate::variable::changes::VariableChanges;
use crate::variable::VariableId;

/// The open transaction of a dataset.
///
/// Created by the first mutation after a commit or rollback and discarded by
/// the next successful commit or rollback.
#[derive(Debug, Clone)]
pub struct DataSetChanges {
    /// Version this transaction proposes to become.
    pub changeset: u64,
    /// Committed schema frozen when the transaction started.
    pub initial_schema: Arc<DataSetSchema>,
    /// Proposed variable collection: committed variables plus added ones.
    pub variables: Vec<VariableId>,
    /// Proposed coordinate-system collection.
    pub coordinate_systems: Vec<CoordinateSystem>,
    /// Changes of every variable that has some, collected at commit time.
    pub variable_changes: BTreeMap<VariableId, VariableChanges>,
    /// Proposed global metadata entries.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl DataSetChanges {
    #[must_use]
    pub fn new(
        changeset: u64,
        initial_schema: Arc<DataSetSchema>,
        variables: Vec<VariableId>,
        coordinate_systems: Vec<CoordinateSystem>,
    ) -> Self {
        Self {
            changeset,
            initial_schema,
            variables,
            coordinate_systems,
            variable_changes: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Variables of the proposed collection that were not committed when the
    /// transaction started.
    #[must_use]
    pub fn added_variables(&self) -> Vec<VariableId> {
        self.variables
            .iter()
            .copied()
            .filter(|id| self.initial_schema.variable(*id).is_none())
            .collect()
    }
}

/// Result of a successful precommit, consumed by final commit.
#[derive(Debug, Clone)]
pub struct PrecommitOutput {
    /// The proposed changes with every append rewritten into a put.
    pub actual_changes: DataSetChanges,
    /// Dataset dimensions resolved by the constraint check.
    pub updated_dimensions: DimensionList,
}

/// Summary of a committed transaction.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSetChangeset {
    /// Version the dataset reached.
    pub changeset: u64,
    pub added: Vec<VariableId>,
    pub updated: Vec<VariableId>,
    /// Region touched in each variable that had data written.
    pub affected: BTreeMap<VariableId, Rectangle>,
    pub metadata_changed: bool,
}
