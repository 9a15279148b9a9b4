//! Lock-protected state of a dataset and its transaction steps.
//!
//! Everything here runs with the dataset's state lock held. Steps that need
//! to talk to other datasets live in [`crate::link::distributed`] and call
//! into these one dataset at a time.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use uuid::Uuid;

use super::changes::{DataSetChanges, DataSetChangeset, PrecommitOutput};
use super::events::EventHandlers;
use super::options::DataSetOptions;
use crate::constraints::check_shared_dimensions;
use crate::coordinate::{check_coordinate_systems, CoordinateSystem};
use crate::data::Array;
use crate::dimension::DimensionList;
use crate::error::{ConstraintsFailed, Error, Result};
use crate::link::{DataSetLink, DataSetLinkCollection};
use crate::metadata::{MetadataDictionary, MetadataValue, KEY_NAME};
use crate::schema::{DataSetSchema, SchemaVersion};
use crate::variable::{RefTarget, Variable, VariableId, VariableKind};

/// Region of a read: `None` reads the whole committed shape.
pub(crate) type Region = Option<(Vec<usize>, Vec<usize>)>;

/// Outcome of resolving a read under the lock.
pub(crate) enum ReadPlan {
    Local(Array),
    /// The variable is a reference; the read continues in its target dataset
    /// once this lock is released.
    Remote(RefTarget, Region),
}

#[derive(Debug)]
pub(crate) struct State {
    pub id: Uuid,
    pub uri: String,
    pub read_only: bool,
    pub autocommit: bool,
    pub disposed: bool,
    /// Committed version, incremented once per successful commit.
    pub version: u64,
    next_id: u32,
    next_dimension: usize,
    /// Every variable the dataset knows about, committed or newly added.
    pub variables: BTreeMap<VariableId, Variable>,
    /// Committed variable collection.
    pub committed: Arc<Vec<VariableId>>,
    pub coordinate_systems: Arc<Vec<CoordinateSystem>>,
    /// Dimensions resolved by the last successful commit.
    pub dimensions: DimensionList,
    pub metadata: MetadataDictionary,
    pub changes: Option<DataSetChanges>,
    pub links: DataSetLinkCollection,
    /// Committed schema captured after the last commit.
    pub schema: Arc<DataSetSchema>,
}

impl State {
    pub fn new(id: Uuid, options: &DataSetOptions) -> Self {
        let mut state = Self {
            id,
            uri: options.uri.clone(),
            read_only: options.read_only,
            autocommit: options.autocommit,
            disposed: false,
            version: 0,
            next_id: 1,
            next_dimension: 0,
            variables: BTreeMap::new(),
            committed: Arc::default(),
            coordinate_systems: Arc::default(),
            dimensions: DimensionList::default(),
            metadata: MetadataDictionary::new(),
            changes: None,
            links: DataSetLinkCollection::new(),
            schema: Arc::new(DataSetSchema {
                id,
                uri: options.uri.clone(),
                version: 0,
                variables: Vec::new(),
                metadata: BTreeMap::new(),
            }),
        };
        state.schema = Arc::new(state.build_schema(SchemaVersion::Committed));
        state
    }

    pub const fn ensure_alive(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    pub const fn ensure_writable(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    pub const fn has_changes(&self) -> bool {
        self.changes.is_some()
    }

    /// Version the open transaction proposes to become.
    pub const fn changeset(&self) -> u64 {
        self.version + 1
    }

    pub fn variable(&self, id: VariableId) -> Result<&Variable> {
        self.variables.get(&id).ok_or(Error::VariableNotFound(id))
    }

    pub fn variable_mut(&mut self, id: VariableId) -> Result<&mut Variable> {
        self.variables.get_mut(&id).ok_or(Error::VariableNotFound(id))
    }

    pub fn allocate_id(&mut self) -> VariableId {
        let id = VariableId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Fresh dimension names for a variable declared without explicit ones.
    pub fn auto_dimension_names(&mut self, rank: usize) -> Vec<String> {
        (0..rank)
            .map(|_| {
                let name = format!("_d{}", self.next_dimension);
                self.next_dimension += 1;
                name
            })
            .collect()
    }

    /// Opens the dataset transaction if none is open.
    pub fn start_changes(&mut self) -> &mut DataSetChanges {
        let changeset = self.changeset();
        self.changes.get_or_insert_with(|| {
            tracing::trace!(dataset = %self.id, changeset, "transaction started");
            DataSetChanges::new(
                changeset,
                Arc::clone(&self.schema),
                self.committed.to_vec(),
                self.coordinate_systems.to_vec(),
            )
        })
    }

    /// Adds a new variable to the arena and to the proposed collection.
    pub fn insert_variable(&mut self, mut variable: Variable) -> &mut Variable {
        let changeset = self.changeset();
        let id = variable.id;
        variable.start_changes(changeset);
        self.start_changes().variables.push(id);
        self.variables.entry(id).or_insert(variable)
    }

    pub fn variables_in(&self, version: SchemaVersion) -> Vec<VariableId> {
        match (&self.changes, version) {
            (Some(changes), SchemaVersion::Proposed | SchemaVersion::Recent) => {
                changes.variables.clone()
            }
            _ => self.committed.to_vec(),
        }
    }

    pub fn coordinate_systems_in(&self, version: SchemaVersion) -> Vec<CoordinateSystem> {
        match (&self.changes, version) {
            (Some(changes), SchemaVersion::Proposed | SchemaVersion::Recent) => {
                changes.coordinate_systems.clone()
            }
            _ => self.coordinate_systems.to_vec(),
        }
    }

    /// Dimensions of a variable, looking through derived variables to their
    /// source.
    pub fn resolved_dimensions<'a>(
        &'a self,
        variable: &'a Variable,
        version: SchemaVersion,
    ) -> &'a DimensionList {
        if let VariableKind::Derived { source, .. } = &variable.kind {
            if let Some(source) = self.variables.get(source) {
                return source.dimensions(version);
            }
        }
        variable.dimensions(version)
    }

    pub fn build_schema(&self, version: SchemaVersion) -> DataSetSchema {
        let variables = self
            .variables_in(version)
            .into_iter()
            .filter_map(|id| self.variables.get(&id))
            .map(|variable| {
                let mut schema = variable.schema(version);
                schema.dimensions = self.resolved_dimensions(variable, version).clone();
                schema
            })
            .collect();
        DataSetSchema {
            id: self.id,
            uri: self.uri.clone(),
            version: self.version,
            variables,
            metadata: self.metadata.entries(version),
        }
    }

    pub fn dimensions(&self, version: SchemaVersion) -> Result<DimensionList> {
        if matches!(version, SchemaVersion::Committed) || !self.has_changes() {
            return Ok(self.dimensions.clone());
        }
        let variables = self.variables_in(version);
        let proposals = variables
            .iter()
            .filter_map(|id| self.variables.get(id))
            .map(|v| (v.id, self.resolved_dimensions(v, version)));
        Ok(check_shared_dimensions(proposals)?)
    }

    pub fn metadata(&self, id: VariableId, key: &str, version: SchemaVersion) -> Result<Option<MetadataValue>> {
        let dictionary = if id == VariableId::GLOBAL_METADATA {
            &self.metadata
        } else {
            &self.variable(id)?.metadata
        };
        Ok(dictionary.get(key, version).cloned())
    }

    /// Variable a reference reads and writes `key` through. The name of a
    /// reference is its own.
    pub fn metadata_target(&self, id: VariableId, key: &str) -> Option<RefTarget> {
        if key == KEY_NAME {
            return None;
        }
        match &self.variables.get(&id)?.kind {
            VariableKind::Reference(target) => Some(target.clone()),
            _ => None,
        }
    }

    pub fn set_metadata(&mut self, id: VariableId, key: String, value: MetadataValue) -> Result<()> {
        if id == VariableId::GLOBAL_METADATA {
            self.metadata.set(key, value);
        } else {
            self.variable_mut(id)?.metadata.set(key, value);
        }
        Ok(())
    }

    /// Resolves a read of committed data.
    pub fn read_plan(&self, id: VariableId, region: Region) -> Result<ReadPlan> {
        let variable = self.variable(id)?;
        match &variable.kind {
            VariableKind::Data(_) => read_committed(variable, region.as_ref()).map(ReadPlan::Local),
            VariableKind::Derived { source, transform } => {
                let values = read_committed(self.variable(*source)?, region.as_ref())?;
                transform(&values).map(ReadPlan::Local)
            }
            VariableKind::Reference(target) => Ok(ReadPlan::Remote(target.clone(), region)),
        }
    }

    /// Snapshot of the open transaction with every variable's pending
    /// changes collected into it.
    fn pull_changes(&mut self) -> Option<DataSetChanges> {
        let changeset = self.changeset();
        let mut changes = self.changes.clone()?;
        changes.variable_changes.clear();
        for id in &changes.variables {
            if let Some(variable_changes) = self
                .variables
                .get_mut(id)
                .and_then(|v| v.collect_changes(changeset))
            {
                changes.variable_changes.insert(*id, variable_changes);
            }
        }
        changes.metadata = self.metadata.changes().clone();
        Some(changes)
    }

    /// Proposed dimensions of `id` as recorded in `changes`.
    fn proposed_in<'a>(
        &'a self,
        changes: &'a DataSetChanges,
        id: VariableId,
    ) -> Option<&'a DimensionList> {
        let variable = self.variables.get(&id)?;
        let owner = match &variable.kind {
            VariableKind::Derived { source, .. } => *source,
            _ => id,
        };
        changes
            .variable_changes
            .get(&owner)
            .map(|c| &c.dimensions)
            .or_else(|| self.variables.get(&owner).map(|v| &v.dimensions))
    }

    /// Runs every variable-local rule, the coordinate-system rules and the
    /// shared-dimension solver over the proposed state.
    pub fn check_constraints(
        &self,
        changes: &DataSetChanges,
    ) -> core::result::Result<DimensionList, ConstraintsFailed> {
        let mut proposals = Vec::with_capacity(changes.variables.len());
        for id in &changes.variables {
            let (Some(variable), Some(dimensions)) =
                (self.variables.get(id), self.proposed_in(changes, *id))
            else {
                return Err(ConstraintsFailed::rule(format!(
                    "variable {id} is proposed but unknown to the dataset"
                )));
            };
            variable.check_constraints(dimensions)?;
            proposals.push((*id, dimensions));
        }
        check_coordinate_systems(&changes.coordinate_systems, &changes.variables)?;
        check_shared_dimensions(proposals)
    }

    /// First commit phase: validates the open transaction and stages every
    /// variable's writes in its storage.
    ///
    /// Returns `Ok(None)` when there is nothing to commit. On failure every
    /// staged write is dropped while the pending changes stay in place.
    pub fn precommit(&mut self, events: &EventHandlers) -> Result<Option<PrecommitOutput>> {
        let Some(mut actual) = self.pull_changes() else {
            return Ok(None);
        };
        match self.stage(&mut actual, events) {
            Ok(updated_dimensions) => Ok(Some(PrecommitOutput {
                actual_changes: actual,
                updated_dimensions,
            })),
            Err(e) => {
                tracing::debug!(dataset = %self.id, error = %e, "precommit failed");
                self.undo_precommit();
                Err(e)
            }
        }
    }

    fn stage(&mut self, actual: &mut DataSetChanges, events: &EventHandlers) -> Result<DimensionList> {
        for changes in actual.variable_changes.values_mut() {
            changes.transform_append_to_put();
        }
        let updated_dimensions = self.check_constraints(actual)?;
        events.committing(self.id, actual)?;
        for (id, changes) in &actual.variable_changes {
            self.variable_mut(*id)?.precommit(changes)?;
        }
        Ok(updated_dimensions)
    }

    /// Drops the writes staged by [`precommit`](Self::precommit). Pending
    /// changes are kept.
    pub fn undo_precommit(&mut self) {
        for variable in self.variables.values_mut() {
            variable.reset_commit_stage();
        }
    }

    /// Second commit phase: makes the staged state the committed state.
    pub fn final_commit(&mut self, output: PrecommitOutput) -> Result<DataSetChangeset> {
        let PrecommitOutput {
            actual_changes: actual,
            updated_dimensions,
        } = output;
        let version = actual.changeset;
        let mut summary = DataSetChangeset {
            changeset: version,
            added: actual.added_variables(),
            metadata_changed: !actual.metadata.is_empty(),
            ..DataSetChangeset::default()
        };

        for (id, changes) in &actual.variable_changes {
            self.variable_mut(*id)?.final_commit(changes, version)?;
            if !summary.added.contains(id) {
                summary.updated.push(*id);
            }
            let affected = changes.affected_rectangle();
            if !affected.is_empty() {
                summary.affected.insert(*id, affected);
            }
        }
        self.sync_derived_dimensions();

        let mut coordinate_systems = actual.coordinate_systems;
        for system in &mut coordinate_systems {
            system.commit();
        }
        self.coordinate_systems = Arc::new(coordinate_systems);
        self.committed = Arc::new(actual.variables);
        self.metadata.commit();
        self.dimensions = updated_dimensions;
        self.links.commit_outgoing();
        self.changes = None;
        self.version = version;
        self.schema = Arc::new(self.build_schema(SchemaVersion::Committed));

        tracing::debug!(
            dataset = %self.id,
            version,
            added = summary.added.len(),
            updated = summary.updated.len(),
            "committed"
        );
        Ok(summary)
    }

    fn sync_derived_dimensions(&mut self) {
        let derived: Vec<(VariableId, VariableId)> = self
            .variables
            .values()
            .filter_map(|v| match &v.kind {
                VariableKind::Derived { source, .. } => Some((v.id, *source)),
                _ => None,
            })
            .collect();
        for (id, source) in derived {
            let Some(dimensions) = self.variables.get(&source).map(|s| s.dimensions.clone()) else {
                continue;
            };
            if let Some(variable) = self.variables.get_mut(&id) {
                variable.dimensions = dimensions;
            }
        }
    }

    /// Discards the open transaction. Returns `None` if there was none,
    /// otherwise the links created by it, which the caller detaches from
    /// their targets.
    pub fn rollback(&mut self) -> Option<Vec<DataSetLink>> {
        let changes = self.changes.take()?;
        for variable in self.variables.values_mut() {
            variable.rollback();
        }
        let committed: BTreeSet<VariableId> = self.committed.iter().copied().collect();
        self.variables.retain(|id, _| committed.contains(id));
        self.metadata.rollback();
        let detached = self.links.remove_uncommitted_outgoing();
        tracing::debug!(
            dataset = %self.id,
            changeset = changes.changeset,
            removed = changes.variables.iter().filter(|id| !committed.contains(id)).count(),
            "rolled back"
        );
        Some(detached)
    }
}

fn read_committed(variable: &Variable, region: Option<&(Vec<usize>, Vec<usize>)>) -> Result<Array> {
    let (origin, shape) = match region {
        Some((origin, shape)) => (origin.clone(), shape.clone()),
        None => (vec![0; variable.dimensions.len()], variable.dimensions.shape()),
    };
    variable.read_storage(&origin, &shape).unwrap_or_else(|| {
        Err(Error::InvalidArgument(format!(
            "variable {} has no storage of its own",
            variable.id
        )))
    })
}
