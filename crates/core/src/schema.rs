//! Serialization-free snapshots describing what a dataset contains.
//!
//! Storage writers read a [`DataSetSchema`] to learn which variables, shapes
//! and metadata to persist; the `Committed` event carries the one captured
//! right after a successful commit.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use uuid::Uuid;

use crate::data::DataType;
use crate::dimension::DimensionList;
use crate::metadata::MetadataValue;
use crate::variable::VariableId;

/// Which state of an entity to describe.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    /// State as of the last successful commit.
    Committed,
    /// State including the changes of the open transaction.
    Proposed,
    /// `Proposed` if a transaction is open, otherwise `Committed`.
    #[default]
    Recent,
}

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSchema {
    pub id: VariableId,
    /// Version of the dataset in which this variable last changed.
    pub changeset: u64,
    pub name: String,
    pub data_type: DataType,
    pub dimensions: DimensionList,
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl VariableSchema {
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
}

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetSchema {
    pub id: Uuid,
    pub uri: String,
    pub version: u64,
    pub variables: Vec<VariableSchema>,
    /// Global metadata of the dataset.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl DataSetSchema {
    #[must_use]
    pub fn variable(&self, id: VariableId) -> Option<&VariableSchema> {
        self.variables.iter().find(|v| v.id == id)
    }

    #[must_use]
    pub fn variable_by_name(&self, name: &str) -> Option<&VariableSchema> {
        self.variables.iter().find(|v| v.name == name)
    }
}
