//! The dataset: a transactional container of variables.
//!
//! A [`DataSet`] is a cheap, clonable handle to shared state. Every mutation
//! opens (or joins) the dataset's transaction; [`DataSet::commit`] validates
//! the proposed state and makes it durable, [`DataSet::rollback`] discards
//! it. When reference variables link datasets together, commit and rollback
//! extend over every dataset with pending changes reachable through links.
//!
//! ```
//! use sdslite_core::{Array, DataSet};
//!
//! let ds = DataSet::in_memory();
//! let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
//! v.put_data(&[0], Array::from_vec(vec![1i32, 2, 3])).unwrap();
//! v.append(0, Array::from_vec(vec![4i32])).unwrap();
//! ds.commit().unwrap();
//! assert_eq!(v.get::<i32>().unwrap(), vec![1, 2, 3, 4]);
//! assert_eq!(ds.version(), 1);
//! ```

pub mod changes;
pub mod events;
mod handle;
pub mod options;
pub(crate) mod transaction;

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::fmt;

use parking_lot::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

pub use self::changes::{DataSetChanges, DataSetChangeset, PrecommitOutput};
use self::events::{
    ChangeAction, ChangingEvent, ChangedEvent, CommittedEvent, CommittingEvent, EventHandlers,
    RolledBackEvent,
};
pub use self::handle::VariableHandle;
pub use self::options::DataSetOptions;
use self::transaction::{ReadPlan, Region, State};
use crate::coordinate::CoordinateSystem;
use crate::data::{Array, DataType, Element};
use crate::dimension::{Dimension, DimensionList};
use crate::error::{Error, Result};
use crate::link::{distributed, DataSetLink, LinkEndpoint};
use crate::metadata::MetadataValue;
use crate::schema::{DataSetSchema, SchemaVersion, VariableSchema};
use crate::storage::{MemoryStorage, VariableStorage};
use crate::variable::changes::DataPiece;
use crate::variable::{RefTarget, Variable, VariableId, VariableKind};

struct Inner {
    id: Uuid,
    state: Mutex<State>,
    events: RwLock<EventHandlers>,
}

/// Shared handle to a dataset.
#[derive(Clone)]
pub struct DataSet {
    inner: Arc<Inner>,
}

/// Non-owning handle to a dataset, held by links and references.
#[derive(Clone, Default)]
pub struct WeakDataSet {
    inner: Weak<Inner>,
}

impl WeakDataSet {
    #[must_use]
    pub fn upgrade(&self) -> Option<DataSet> {
        self.inner.upgrade().map(|inner| DataSet { inner })
    }
}

impl fmt::Debug for WeakDataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.upgrade() {
            Some(inner) => write!(f, "WeakDataSet({})", inner.id),
            None => f.write_str("WeakDataSet(<released>)"),
        }
    }
}

impl fmt::Debug for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSet")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for DataSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for DataSet {}

/// One region to read in [`DataSet::get_multiple_data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub variable: VariableId,
    /// Origin and shape of the region; `None` reads the whole variable.
    pub region: Option<(Vec<usize>, Vec<usize>)>,
}

impl DataRequest {
    #[must_use]
    pub const fn whole(variable: VariableId) -> Self {
        Self {
            variable,
            region: None,
        }
    }

    #[must_use]
    pub const fn region(variable: VariableId, origin: Vec<usize>, shape: Vec<usize>) -> Self {
        Self {
            variable,
            region: Some((origin, shape)),
        }
    }
}

/// Arrays read by [`DataSet::get_multiple_data`], all from one version.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipleData {
    pub version: u64,
    pub data: Vec<Array>,
}

impl Default for DataSet {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl DataSet {
    #[must_use]
    pub fn new(options: DataSetOptions) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(dataset = %id, uri = %options.uri, "dataset created");
        Self {
            inner: Arc::new(Inner {
                id,
                state: Mutex::new(State::new(id, &options)),
                events: RwLock::new(EventHandlers::default()),
            }),
        }
    }

    /// Empty, writable, in-memory dataset.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(DataSetOptions::default())
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakDataSet {
        WeakDataSet {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock()
    }

    fn events(&self) -> EventHandlers {
        self.inner.events.read().clone()
    }

    #[must_use]
    pub fn uri(&self) -> String {
        self.lock().uri.clone()
    }

    /// Committed version; starts at 0 and grows by one per commit.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.lock().has_changes()
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.lock().read_only
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    #[must_use]
    pub fn is_autocommit_enabled(&self) -> bool {
        self.lock().autocommit
    }

    pub fn set_autocommit(&self, enabled: bool) {
        self.replace_autocommit(enabled);
    }

    pub(crate) fn replace_autocommit(&self, enabled: bool) -> bool {
        core::mem::replace(&mut self.lock().autocommit, enabled)
    }

    /// Freezes the dataset.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::CannotPerformAction`] while changes are pending.
    pub fn set_read_only(&self) -> Result<()> {
        let mut state = self.lock();
        state.ensure_alive()?;
        if state.has_changes() {
            return Err(Error::CannotPerformAction(
                "cannot make a dataset with pending changes read only".into(),
            ));
        }
        state.read_only = true;
        Ok(())
    }

    /// Opens a transaction explicitly. Mutations open one on their own.
    ///
    /// # Errors
    ///
    /// Fails if the dataset is read only or disposed.
    pub fn start_changes(&self) -> Result<()> {
        let mut state = self.lock();
        state.ensure_writable()?;
        state.start_changes();
        Ok(())
    }

    /// Fires `Changing`, then applies `apply` to the locked state inside the
    /// transaction. A failed first mutation leaves no transaction behind.
    fn apply<R>(&self, action: &ChangeAction, apply: impl FnOnce(&mut State) -> Result<R>) -> Result<R> {
        self.lock().ensure_writable()?;
        self.events().changing(self.id(), action)?;
        let mut state = self.lock();
        state.ensure_writable()?;
        let had_changes = state.has_changes();
        state.start_changes();
        apply(&mut state).inspect_err(|_| {
            if !had_changes {
                state.changes = None;
            }
        })
    }

    /// Fires `Changed` and commits if autocommit is on.
    fn finish(&self, action: ChangeAction) -> Result<()> {
        self.events().changed(self.id(), action);
        if self.lock().autocommit {
            self.commit()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn handle(&self, id: VariableId) -> VariableHandle {
        VariableHandle::new(self.clone(), id)
    }

    /// Handle to an existing variable.
    ///
    /// # Errors
    ///
    /// [`Error::VariableNotFound`] if the dataset has no such variable.
    pub fn variable(&self, id: VariableId) -> Result<VariableHandle> {
        self.lock().variable(id)?;
        Ok(self.handle(id))
    }

    /// Looks a variable up by its recent name.
    #[must_use]
    pub fn variable_by_name(&self, name: &str) -> Option<VariableHandle> {
        let state = self.lock();
        state
            .variables_in(SchemaVersion::Recent)
            .into_iter()
            .find(|id| {
                state
                    .variables
                    .get(id)
                    .is_some_and(|v| v.name(SchemaVersion::Recent) == name)
            })
            .map(|id| self.handle(id))
    }

    /// Variable IDs of the committed or proposed collection.
    #[must_use]
    pub fn variables(&self, version: SchemaVersion) -> Vec<VariableId> {
        self.lock().variables_in(version)
    }

    /// Adds an in-memory variable of element type `T`.
    ///
    /// # Errors
    ///
    /// Fails if the dataset is read only or disposed, or a `Changing`
    /// subscriber cancels.
    pub fn add_variable<T: Element>(&self, name: &str, dimensions: &[&str]) -> Result<VariableHandle> {
        self.add_variable_of_type(T::DATA_TYPE, name, dimensions)
    }

    /// Adds an in-memory variable of a runtime-chosen element type.
    ///
    /// # Errors
    ///
    /// See [`add_variable`](Self::add_variable).
    pub fn add_variable_of_type(
        &self,
        data_type: DataType,
        name: &str,
        dimensions: &[&str],
    ) -> Result<VariableHandle> {
        let storage = MemoryStorage::new(data_type, dimensions.len());
        self.add_variable_with_storage(name, Some(dimensions), Box::new(storage))
    }

    /// Adds an in-memory variable whose dimensions get fresh names `_d0`,
    /// `_d1`, and so on.
    ///
    /// # Errors
    ///
    /// See [`add_variable`](Self::add_variable).
    pub fn add_variable_with_rank<T: Element>(&self, name: &str, rank: usize) -> Result<VariableHandle> {
        let storage = MemoryStorage::new(T::DATA_TYPE, rank);
        self.add_variable_with_storage(name, None, Box::new(storage))
    }

    /// Adds a variable backed by caller-supplied storage. Existing data in
    /// the storage becomes the variable's initial content.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the number of dimension names differs
    /// from the storage rank, plus the errors of
    /// [`add_variable`](Self::add_variable).
    pub fn add_variable_with_storage(
        &self,
        name: &str,
        dimensions: Option<&[&str]>,
        storage: Box<dyn VariableStorage>,
    ) -> Result<VariableHandle> {
        let shape = storage.shape();
        if let Some(names) = dimensions {
            if names.len() != shape.len() {
                return Err(Error::InvalidArgument(alloc::format!(
                    "{} dimension names given for a rank {} variable",
                    names.len(),
                    shape.len()
                )));
            }
        }
        let action = ChangeAction::AddVariable {
            name: name.to_string(),
        };
        let id = self.apply(&action, |state| {
            let names = match dimensions {
                Some(names) => names.iter().map(ToString::to_string).collect(),
                None => state.auto_dimension_names(shape.len()),
            };
            let dimensions: DimensionList = names
                .into_iter()
                .zip(&shape)
                .map(|(name, length)| Dimension::new(name, *length))
                .collect();
            let id = state.allocate_id();
            let data_type = storage.data_type();
            state.insert_variable(Variable::new(id, name, data_type, dimensions, VariableKind::Data(storage)));
            tracing::debug!(dataset = %state.id, variable = %id, name, %data_type, "variable added");
            Ok(id)
        })?;
        self.finish(action)?;
        Ok(self.handle(id))
    }

    /// Adds a read-only variable computed from a data variable of this
    /// dataset. It shares the source's dimensions.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `source` is not a data variable, plus
    /// the errors of [`add_variable`](Self::add_variable).
    pub fn add_derived(
        &self,
        name: &str,
        source: VariableId,
        data_type: DataType,
        transform: impl Fn(&Array) -> Result<Array> + Send + Sync + 'static,
    ) -> Result<VariableHandle> {
        let action = ChangeAction::AddVariable {
            name: name.to_string(),
        };
        let id = self.apply(&action, |state| {
            let source_variable = state.variable(source)?;
            if !matches!(source_variable.kind, VariableKind::Data(_)) {
                return Err(Error::InvalidArgument(alloc::format!(
                    "derived variable {name} needs a data variable as source"
                )));
            }
            let dimensions = source_variable.proposed_dimensions().clone();
            let id = state.allocate_id();
            let kind = VariableKind::Derived {
                source,
                transform: Arc::new(transform),
            };
            state.insert_variable(Variable::new(id, name, data_type, dimensions, kind));
            Ok(id)
        })?;
        self.finish(action)?;
        Ok(self.handle(id))
    }

    /// Adds a variable that mirrors `target`, a variable of another dataset.
    ///
    /// Writes through the reference go to the target; committing either
    /// side while the link is active commits both.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `target` lives in this dataset, plus
    /// the errors of [`add_variable`](Self::add_variable).
    pub fn add_reference(&self, name: &str, target: &VariableHandle) -> Result<VariableHandle> {
        let target_dataset = target.dataset();
        if target_dataset == self {
            return Err(Error::InvalidArgument(
                "a reference must point into another dataset".into(),
            ));
        }
        let (data_type, dimensions) = target_dataset.describe(target.id())?;
        let action = ChangeAction::AddReference {
            name: name.to_string(),
        };
        let link = self.apply(&action, |state| {
            let id = state.allocate_id();
            let kind = VariableKind::Reference(RefTarget {
                dataset: target_dataset.downgrade(),
                variable: target.id(),
            });
            let committed = DimensionList::zero_length(&dimensions.names());
            let changeset = state.changeset();
            let variable = state.insert_variable(Variable::new(id, name, data_type, committed, kind));
            variable.start_changes(changeset).dimensions = dimensions;
            let link = DataSetLink::new(
                LinkEndpoint {
                    dataset: self.downgrade(),
                    dataset_id: self.id(),
                    variable: id,
                },
                LinkEndpoint {
                    dataset: target_dataset.downgrade(),
                    dataset_id: target_dataset.id(),
                    variable: target.id(),
                },
            );
            state.links.add_outgoing(link.clone());
            Ok(link)
        })?;
        target_dataset.lock().links.add_incoming(link.clone());
        tracing::debug!(
            dataset = %self.id(),
            reference = %link.reference.variable,
            target_dataset = %link.target.dataset_id,
            target = %link.target.variable,
            "reference added"
        );
        self.finish(action)?;
        Ok(self.handle(link.reference.variable))
    }

    /// Proposes a coordinate system over existing variables. Axes are
    /// validated at commit.
    ///
    /// # Errors
    ///
    /// Fails if the dataset is read only or disposed, or a `Changing`
    /// subscriber cancels.
    pub fn add_coordinate_system(&self, name: &str, axes: &[VariableId]) -> Result<()> {
        let action = ChangeAction::AddCoordinateSystem {
            name: name.to_string(),
        };
        self.apply(&action, |state| {
            state
                .start_changes()
                .coordinate_systems
                .push(CoordinateSystem::new(name, axes.to_vec()));
            Ok(())
        })?;
        self.finish(action)
    }

    #[must_use]
    pub fn coordinate_systems(&self, version: SchemaVersion) -> Vec<CoordinateSystem> {
        self.lock().coordinate_systems_in(version)
    }

    /// Data type and recent dimensions of a variable.
    fn describe(&self, id: VariableId) -> Result<(DataType, DimensionList)> {
        let state = self.lock();
        state.ensure_alive()?;
        let variable = state.variable(id)?;
        let dimensions = state.resolved_dimensions(variable, SchemaVersion::Recent).clone();
        Ok((variable.data_type, dimensions))
    }

    fn reference_target(&self, id: VariableId) -> Result<Option<RefTarget>> {
        let state = self.lock();
        state.ensure_alive()?;
        Ok(match &state.variable(id)?.kind {
            VariableKind::Reference(target) => Some(target.clone()),
            _ => None,
        })
    }

    /// Writes `data` at `origin`, growing the variable if needed.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] or [`Error::InvalidArgument`] for data that
    /// does not fit the variable, plus the errors of
    /// [`add_variable`](Self::add_variable).
    pub fn put_data(&self, id: VariableId, origin: &[usize], data: Array) -> Result<()> {
        if let Some(target) = self.reference_target(id)? {
            return target.dataset()?.put_data(target.variable, origin, data);
        }
        let action = ChangeAction::PutData { variable: id };
        self.write_piece(action, id, DataPiece::put(origin.to_vec(), data))
    }

    /// Writes `data` after the current end of `dimension`.
    ///
    /// # Errors
    ///
    /// See [`put_data`](Self::put_data).
    pub fn append(&self, id: VariableId, dimension: usize, data: Array) -> Result<()> {
        if let Some(target) = self.reference_target(id)? {
            return target.dataset()?.append(target.variable, dimension, data);
        }
        let action = ChangeAction::Append {
            variable: id,
            dimension,
        };
        self.write_piece(action, id, DataPiece::append(dimension, data))
    }

    fn write_piece(&self, action: ChangeAction, id: VariableId, piece: DataPiece) -> Result<()> {
        let (dimensions, references) = self.apply(&action, |state| {
            let changeset = state.changeset();
            let variable = state.variable_mut(id)?;
            if variable.is_read_only() {
                return Err(Error::InvalidArgument(alloc::format!(
                    "variable {id} is read only"
                )));
            }
            variable.push_piece(changeset, piece)?;
            let dimensions = variable.proposed_dimensions().clone();
            Ok((dimensions, state.links.references_to(id)))
        })?;
        for reference in references {
            if let Some(dataset) = reference.dataset.upgrade() {
                dataset.mirror_reference(reference.variable, &dimensions);
            }
        }
        self.finish(action)
    }

    /// Marks a reference variable changed with the target's proposed
    /// dimensions. Never fires events nor autocommits. Read-only datasets
    /// keep their committed schema and are left untouched.
    pub(crate) fn mirror_reference(&self, id: VariableId, dimensions: &DimensionList) {
        let mut state = self.lock();
        if state.ensure_writable().is_err()
            || !state.variables.get(&id).is_some_and(Variable::is_reference)
        {
            return;
        }
        let changeset = state.changeset();
        state.start_changes();
        if let Some(variable) = state.variables.get_mut(&id) {
            variable.start_changes(changeset).dimensions = dimensions.clone();
        }
        tracing::trace!(dataset = %state.id, reference = %id, %dimensions, "reference marked changed");
    }

    /// Refreshes every pending reference with its target's proposed
    /// dimensions.
    pub(crate) fn sync_references(&self) {
        let outgoing = self.lock().links.outgoing().to_vec();
        for link in outgoing {
            let Some(target) = link.target.dataset.upgrade() else {
                tracing::warn!(
                    dataset = %self.id(),
                    reference = %link.reference.variable,
                    "reference target has been released"
                );
                continue;
            };
            let Ok((_, dimensions)) = target.describe(link.target.variable) else {
                continue;
            };
            let pending = {
                let state = self.lock();
                state.variables.get(&link.reference.variable).is_some_and(|v| {
                    v.changes.is_some() || v.proposed_dimensions() != &dimensions
                })
            };
            if pending {
                self.mirror_reference(link.reference.variable, &dimensions);
            }
        }
    }

    #[must_use]
    pub(crate) fn links(&self) -> Vec<DataSetLink> {
        self.lock().links.iter().cloned().collect()
    }

    pub(crate) fn variable_has_changes(&self, id: VariableId) -> bool {
        self.lock().variables.get(&id).is_some_and(Variable::has_changes)
    }

    /// Proposes a metadata entry. [`VariableId::GLOBAL_METADATA`] addresses
    /// the dataset's own metadata. On a reference every entry but the name
    /// is written to the target variable.
    ///
    /// # Errors
    ///
    /// [`Error::VariableNotFound`], plus the errors of
    /// [`add_variable`](Self::add_variable).
    pub fn set_metadata(
        &self,
        id: VariableId,
        key: &str,
        value: impl Into<MetadataValue>,
    ) -> Result<()> {
        if let Some(target) = self.metadata_target(id, key)? {
            return target.dataset()?.set_metadata(target.variable, key, value);
        }
        let action = ChangeAction::SetMetadata {
            variable: id,
            key: key.to_string(),
        };
        let value = value.into();
        self.apply(&action, |state| state.set_metadata(id, key.to_string(), value))?;
        self.finish(action)
    }

    /// Looks a metadata entry up. A reference reports its own name and the
    /// target variable's entries for every other key.
    ///
    /// # Errors
    ///
    /// [`Error::VariableNotFound`] or [`Error::Disposed`], and
    /// [`Error::DataSetReleased`] if a reference target is gone.
    pub fn metadata(
        &self,
        id: VariableId,
        key: &str,
        version: SchemaVersion,
    ) -> Result<Option<MetadataValue>> {
        let target = {
            let state = self.lock();
            state.ensure_alive()?;
            match state.metadata_target(id, key) {
                Some(target) => target,
                None => return state.metadata(id, key, version),
            }
        };
        target.dataset()?.metadata(target.variable, key, version)
    }

    fn metadata_target(&self, id: VariableId, key: &str) -> Result<Option<RefTarget>> {
        let state = self.lock();
        state.ensure_alive()?;
        Ok(state.metadata_target(id, key))
    }

    /// Reads a committed region of a variable.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the region lies outside the committed
    /// shape, [`Error::DataSetReleased`] if a reference target is gone.
    pub fn read_data(&self, id: VariableId, origin: &[usize], shape: &[usize]) -> Result<Array> {
        self.read(id, Some((origin.to_vec(), shape.to_vec())))
    }

    /// Reads the whole committed content of a variable.
    ///
    /// # Errors
    ///
    /// See [`read_data`](Self::read_data).
    pub fn get_data(&self, id: VariableId) -> Result<Array> {
        self.read(id, None)
    }

    fn read(&self, id: VariableId, region: Region) -> Result<Array> {
        let plan = {
            let state = self.lock();
            state.ensure_alive()?;
            state.read_plan(id, region)?
        };
        resolve_plan(plan)
    }

    /// Reads several variables as of one committed version.
    ///
    /// Local reads happen under one lock. Reads through references complete
    /// afterwards, and the version is checked again once they are done.
    ///
    /// # Errors
    ///
    /// [`Error::VersionChanged`] if the dataset committed while references
    /// were being read, plus the errors of [`read_data`](Self::read_data).
    pub fn get_multiple_data(&self, requests: &[DataRequest]) -> Result<MultipleData> {
        let (version, plans) = {
            let state = self.lock();
            state.ensure_alive()?;
            let plans = requests
                .iter()
                .map(|request| state.read_plan(request.variable, request.region.clone()))
                .collect::<Result<Vec<_>>>()?;
            (state.version, plans)
        };
        let data = plans.into_iter().map(resolve_plan).collect::<Result<Vec<_>>>()?;
        let actual = self.version();
        if actual != version {
            return Err(Error::VersionChanged {
                expected: version,
                actual,
            });
        }
        Ok(MultipleData { version, data })
    }

    /// Dataset dimensions in the requested state.
    ///
    /// # Errors
    ///
    /// [`Error::ConstraintsFailed`] if the proposed state has conflicting
    /// shared dimensions.
    pub fn dimensions(&self, version: SchemaVersion) -> Result<DimensionList> {
        let state = self.lock();
        state.ensure_alive()?;
        state.dimensions(version)
    }

    /// Schema in the requested state. The committed schema is the one
    /// captured by the last commit.
    #[must_use]
    pub fn schema(&self, version: SchemaVersion) -> Arc<DataSetSchema> {
        let state = self.lock();
        if matches!(version, SchemaVersion::Committed) || !state.has_changes() {
            return Arc::clone(&state.schema);
        }
        Arc::new(state.build_schema(version))
    }

    pub(crate) fn variable_schema(&self, id: VariableId, version: SchemaVersion) -> Result<VariableSchema> {
        let state = self.lock();
        state.ensure_alive()?;
        let variable = state.variable(id)?;
        let mut schema = variable.schema(version);
        schema.dimensions = state.resolved_dimensions(variable, version).clone();
        Ok(schema)
    }

    /// Validates and commits the open transaction together with every
    /// linked dataset that has pending changes.
    ///
    /// # Errors
    ///
    /// [`Error::ConstraintsFailed`] leaves all changes pending.
    /// [`Error::DistributedCommitFailed`] names the linked dataset that
    /// failed. [`Error::CannotPerformAction`] when a `Committing` subscriber
    /// cancels.
    pub fn commit(&self) -> Result<()> {
        {
            let state = self.lock();
            state.ensure_writable()?;
            if !state.has_changes() {
                return Ok(());
            }
        }
        let (closure, _suspended) = distributed::active_closure(self);
        let changeset = if closure.len() > 1 {
            distributed::commit(&closure)?
        } else {
            let events = self.events();
            let mut state = self.lock();
            match state.precommit(&events)? {
                Some(output) => Some(state.final_commit(output)?),
                None => None,
            }
        };
        if let Some(changeset) = changeset {
            self.publish_commit(changeset);
        }
        Ok(())
    }

    /// Like [`commit`](Self::commit) but reports a constraint failure as
    /// `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Every failure of [`commit`](Self::commit) other than a constraint
    /// failure.
    pub fn try_commit(&self) -> Result<bool> {
        match self.commit() {
            Ok(()) => Ok(true),
            Err(e) if e.as_constraints_failed().is_some() => {
                tracing::debug!(dataset = %self.id(), error = %e, "commit rejected by constraints");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn precommit_pending(&self) -> Result<Option<PrecommitOutput>> {
        let events = self.events();
        let mut state = self.lock();
        state.ensure_alive()?;
        if !state.has_changes() {
            return Ok(None);
        }
        state.ensure_writable()?;
        state.precommit(&events)
    }

    pub(crate) fn undo_precommit(&self) {
        self.lock().undo_precommit();
    }

    pub(crate) fn final_commit(&self, output: PrecommitOutput) -> Result<DataSetChangeset> {
        self.lock().final_commit(output)
    }

    /// Fires `Committed` with the schema captured by the commit.
    pub(crate) fn publish_commit(&self, changeset: DataSetChangeset) {
        let schema = Arc::clone(&self.lock().schema);
        let event = CommittedEvent {
            dataset: self.id(),
            changeset,
            schema,
        };
        self.events().committed(&event);
    }

    /// Discards the open transaction together with every linked dataset
    /// that has pending changes. Never fails on a storage error; those are
    /// logged.
    ///
    /// # Errors
    ///
    /// [`Error::ReadOnly`] or [`Error::Disposed`].
    pub fn rollback(&self) -> Result<()> {
        {
            let state = self.lock();
            state.ensure_writable()?;
            if !state.has_changes() {
                return Ok(());
            }
        }
        let (closure, _suspended) = distributed::active_closure(self);
        for dataset in &closure {
            dataset.rollback_local();
        }
        Ok(())
    }

    pub(crate) fn rollback_local(&self) {
        let (detached, version) = {
            let mut state = self.lock();
            let Some(detached) = state.rollback() else {
                return;
            };
            (detached, state.version)
        };
        for link in detached {
            if let Some(target) = link.target.dataset.upgrade() {
                target
                    .lock()
                    .links
                    .remove_incoming(self.id(), link.reference.variable);
            }
        }
        self.events().rolled_back(&RolledBackEvent {
            dataset: self.id(),
            version,
        });
    }

    /// Rolls back pending changes, detaches every link and releases the
    /// dataset. Every later operation fails with [`Error::Disposed`].
    /// Disposing twice is a no-op.
    pub fn dispose(&self) {
        {
            let state = self.lock();
            if state.disposed {
                return;
            }
        }
        if !self.is_read_only() {
            if let Err(e) = self.rollback() {
                tracing::warn!(dataset = %self.id(), error = %e, "rollback on dispose failed");
            }
        }
        let (outgoing, incoming) = {
            let mut state = self.lock();
            state.disposed = true;
            state.links.detach_all()
        };
        for link in outgoing {
            if let Some(target) = link.target.dataset.upgrade() {
                target
                    .lock()
                    .links
                    .remove_incoming(self.id(), link.reference.variable);
            }
        }
        for link in incoming {
            if let Some(reference) = link.reference.dataset.upgrade() {
                reference
                    .lock()
                    .links
                    .remove_outgoing(self.id(), link.target.variable);
            }
        }
        tracing::debug!(dataset = %self.id(), "dataset disposed");
    }

    pub fn on_changing(&self, handler: impl Fn(&mut ChangingEvent) + Send + Sync + 'static) {
        self.inner.events.write().on_changing(handler);
    }

    pub fn on_changed(&self, handler: impl Fn(&ChangedEvent) + Send + Sync + 'static) {
        self.inner.events.write().on_changed(handler);
    }

    /// Subscribes to `Committing`. The handler runs while the dataset is
    /// locked and must not call back into it.
    pub fn on_committing(
        &self,
        handler: impl for<'a> Fn(&mut CommittingEvent<'a>) + Send + Sync + 'static,
    ) {
        self.inner.events.write().on_committing(handler);
    }

    pub fn on_committed(&self, handler: impl Fn(&CommittedEvent) + Send + Sync + 'static) {
        self.inner.events.write().on_committed(handler);
    }

    pub fn on_rolled_back(&self, handler: impl Fn(&RolledBackEvent) + Send + Sync + 'static) {
        self.inner.events.write().on_rolled_back(handler);
    }
}

impl RefTarget {
    /// # Errors
    ///
    /// [`Error::DataSetReleased`] if the target dataset has been dropped.
    pub fn dataset(&self) -> Result<DataSet> {
        self.dataset.upgrade().ok_or(Error::DataSetReleased)
    }
}

fn resolve_plan(plan: ReadPlan) -> Result<Array> {
    match plan {
        ReadPlan::Local(data) => Ok(data),
        ReadPlan::Remote(target, region) => target.dataset()?.read(target.variable, region),
    }
}
