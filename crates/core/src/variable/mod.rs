//! Variables: typed, named multi-dimensional arrays owned by a dataset.
//!
//! A dataset keeps its variables in a table keyed by [`VariableId`]. Three
//! kinds exist:
//!
//! - data variables own a [`VariableStorage`] and buffer writes as pieces;
//! - reference variables mirror a variable of another dataset, addressed by
//!   a weak dataset handle plus the target's ID;
//! - derived variables compute their values from a data variable of the same
//!   dataset and share its dimensions.

pub mod changes;

use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use derive_more::{Display, From};

use self::changes::{DataPiece, VariableChanges};
use crate::data::{Array, DataType};
use crate::dataset::WeakDataSet;
use crate::dimension::DimensionList;
use crate::error::{ConstraintsFailed, Error, Result};
use crate::metadata::{MetadataDictionary, MetadataValue, KEY_NAME};
use crate::schema::{SchemaVersion, VariableSchema};
use crate::storage::VariableStorage;

/// Identifier of a variable, unique within its dataset.
///
/// ID 0 is reserved for the dataset's global metadata.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Display, From, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId(pub u32);

impl VariableId {
    pub const GLOBAL_METADATA: Self = Self(0);
}

/// Value transform of a derived variable.
pub type Transform = Arc<dyn Fn(&Array) -> Result<Array> + Send + Sync>;

/// Location of the variable a reference mirrors.
#[derive(Debug, Clone)]
pub struct RefTarget {
    pub dataset: WeakDataSet,
    pub variable: VariableId,
}

pub(crate) enum VariableKind {
    Data(Box<dyn VariableStorage>),
    Reference(RefTarget),
    Derived { source: VariableId, transform: Transform },
}

impl VariableKind {
    const fn label(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Reference(_) => "reference",
            Self::Derived { .. } => "derived",
        }
    }
}

pub(crate) struct Variable {
    pub id: VariableId,
    pub data_type: DataType,
    /// Committed dimensions.
    pub dimensions: DimensionList,
    pub metadata: MetadataDictionary,
    /// Dataset version in which the variable last changed.
    pub changeset: u64,
    pub kind: VariableKind,
    pub changes: Option<VariableChanges>,
}

impl core::fmt::Debug for Variable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.id)
            .field("kind", &self.kind.label())
            .field("data_type", &self.data_type)
            .field("dimensions", &self.dimensions)
            .field("has_changes", &self.has_changes())
            .finish_non_exhaustive()
    }
}

impl Variable {
    pub fn new(
        id: VariableId,
        name: &str,
        data_type: DataType,
        dimensions: DimensionList,
        kind: VariableKind,
    ) -> Self {
        let mut metadata = MetadataDictionary::new();
        metadata.set(KEY_NAME, name);
        Self {
            id,
            data_type,
            dimensions,
            metadata,
            changeset: 0,
            kind,
            changes: None,
        }
    }

    pub fn name(&self, version: SchemaVersion) -> String {
        self.metadata
            .get(KEY_NAME, version)
            .or_else(|| self.metadata.get(KEY_NAME, SchemaVersion::Proposed))
            .and_then(MetadataValue::as_str)
            .map_or_else(|| format!("var{}", self.id), ToString::to_string)
    }

    pub const fn is_reference(&self) -> bool {
        matches!(self.kind, VariableKind::Reference(_))
    }

    pub const fn is_read_only(&self) -> bool {
        matches!(self.kind, VariableKind::Derived { .. })
    }

    pub fn has_changes(&self) -> bool {
        self.changes.is_some() || self.metadata.has_changes()
    }

    /// Proposed dimensions, or committed ones without pending changes.
    pub fn proposed_dimensions(&self) -> &DimensionList {
        self.changes
            .as_ref()
            .map_or(&self.dimensions, |c| &c.dimensions)
    }

    pub fn dimensions(&self, version: SchemaVersion) -> &DimensionList {
        match version {
            SchemaVersion::Committed => &self.dimensions,
            SchemaVersion::Proposed | SchemaVersion::Recent => self.proposed_dimensions(),
        }
    }

    pub fn schema(&self, version: SchemaVersion) -> VariableSchema {
        VariableSchema {
            id: self.id,
            changeset: self.changeset,
            name: self.name(version),
            data_type: self.data_type,
            dimensions: self.dimensions(version).clone(),
            metadata: self.metadata.entries(version),
        }
    }

    /// Opens the variable's own changes if none are pending.
    pub fn start_changes(&mut self, changeset: u64) -> &mut VariableChanges {
        let changes = match self.changes.take() {
            Some(changes) => changes,
            None => VariableChanges::new(changeset, self.schema(SchemaVersion::Committed)),
        };
        self.changes.insert(changes)
    }

    /// Buffers a write into the variable's changes.
    pub fn push_piece(&mut self, changeset: u64, piece: DataPiece) -> Result<()> {
        if piece.data.data_type() != self.data_type {
            return Err(Error::TypeMismatch {
                expected: self.data_type,
                actual: piece.data.data_type(),
            });
        }
        let had_changes = self.changes.is_some();
        let result = self.start_changes(changeset).push_piece(piece);
        if result.is_err() && !had_changes {
            self.changes = None;
        }
        result
    }

    /// Snapshot of the pending changes with the current metadata proposals.
    pub fn collect_changes(&mut self, changeset: u64) -> Option<VariableChanges> {
        if !self.has_changes() {
            return None;
        }
        let proposed_metadata = self.metadata.changes().clone();
        let changes = self.start_changes(changeset);
        changes.metadata = proposed_metadata;
        Some(changes.clone())
    }

    /// Variable-local constraints on the proposed dimensions.
    pub fn check_constraints(&self, proposed: &DimensionList) -> core::result::Result<(), ConstraintsFailed> {
        let name = self.name(SchemaVersion::Proposed);
        if proposed.len() != self.dimensions.len() {
            return Err(ConstraintsFailed::rule(format!(
                "variable {name} has rank {}, proposed dimensions have rank {}",
                self.dimensions.len(),
                proposed.len()
            )));
        }
        let mut seen = BTreeSet::new();
        for dimension in proposed.iter() {
            if !seen.insert(dimension.name.as_str()) {
                return Err(ConstraintsFailed::rule(format!(
                    "variable {name} depends on dimension {} more than once",
                    dimension.name
                )));
            }
        }
        if let VariableKind::Data(storage) = &self.kind {
            if storage.data_type() != self.data_type {
                return Err(ConstraintsFailed::rule(format!(
                    "variable {name} stores {} but is declared as {}",
                    storage.data_type(),
                    self.data_type
                )));
            }
        }
        Ok(())
    }

    /// Writes the buffered pieces into storage inside a write transaction.
    pub fn precommit(&mut self, changes: &VariableChanges) -> Result<()> {
        let (VariableKind::Data(storage), Some(data)) = (&mut self.kind, &changes.data) else {
            return Ok(());
        };
        storage.begin_write_transaction(data)?;
        for piece in data.pieces() {
            let origin = piece.absolute_origin().ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "variable {} still has an unresolved append at precommit",
                    self.id
                ))
            })?;
            storage.write_data(origin, &piece.data)?;
        }
        Ok(())
    }

    /// Makes precommitted changes the committed state of the variable.
    pub fn final_commit(&mut self, changes: &VariableChanges, version: u64) -> Result<()> {
        if let (VariableKind::Data(storage), Some(data)) = (&mut self.kind, &changes.data) {
            storage.commit_write(data)?;
        }
        self.dimensions = changes.dimensions.clone();
        self.metadata.commit();
        self.changes = None;
        self.changeset = version;
        Ok(())
    }

    /// Drops any storage write transaction opened by precommit.
    pub fn reset_commit_stage(&mut self) {
        if let VariableKind::Data(storage) = &mut self.kind {
            if let Err(e) = storage.rollback_write() {
                tracing::warn!(variable = %self.id, error = %e, "storage rollback failed");
            }
        }
    }

    /// Discards every pending change of the variable.
    pub fn rollback(&mut self) {
        self.reset_commit_stage();
        self.changes = None;
        self.metadata.rollback();
    }

    pub fn read_storage(&self, origin: &[usize], shape: &[usize]) -> Option<Result<Array>> {
        match &self.kind {
            VariableKind::Data(storage) => Some(storage.read_data(origin, shape)),
            _ => None,
        }
    }
}
