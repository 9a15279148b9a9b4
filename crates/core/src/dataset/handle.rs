use alloc::string::String;
use alloc::vec::Vec;

use super::DataSet;
use crate::data::{Array, DataType, Element};
use crate::dimension::DimensionList;
use crate::error::Result;
use crate::metadata::{MetadataValue, KEY_NAME};
use crate::schema::{SchemaVersion, VariableSchema};
use crate::variable::VariableId;

/// A variable addressed through its dataset.
///
/// Every call goes through the dataset, so a handle stays valid across
/// commits and rollbacks and fails with
/// [`Error::VariableNotFound`](crate::Error::VariableNotFound) once the
/// variable is rolled away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableHandle {
    dataset: DataSet,
    id: VariableId,
}

impl VariableHandle {
    pub(crate) const fn new(dataset: DataSet, id: VariableId) -> Self {
        Self { dataset, id }
    }

    #[must_use]
    pub const fn id(&self) -> VariableId {
        self.id
    }

    #[must_use]
    pub const fn dataset(&self) -> &DataSet {
        &self.dataset
    }

    /// # Errors
    ///
    /// [`Error::VariableNotFound`](crate::Error::VariableNotFound) or
    /// [`Error::Disposed`](crate::Error::Disposed).
    pub fn schema(&self, version: SchemaVersion) -> Result<VariableSchema> {
        self.dataset.variable_schema(self.id, version)
    }

    /// # Errors
    ///
    /// See [`schema`](Self::schema).
    pub fn name(&self) -> Result<String> {
        Ok(self.schema(SchemaVersion::Recent)?.name)
    }

    /// # Errors
    ///
    /// See [`schema`](Self::schema).
    pub fn rename(&self, name: &str) -> Result<()> {
        self.dataset.set_metadata(self.id, KEY_NAME, name)
    }

    /// # Errors
    ///
    /// See [`schema`](Self::schema).
    pub fn data_type(&self) -> Result<DataType> {
        Ok(self.schema(SchemaVersion::Committed)?.data_type)
    }

    /// # Errors
    ///
    /// See [`schema`](Self::schema).
    pub fn dimensions(&self, version: SchemaVersion) -> Result<DimensionList> {
        Ok(self.schema(version)?.dimensions)
    }

    /// # Errors
    ///
    /// See [`schema`](Self::schema).
    pub fn shape(&self, version: SchemaVersion) -> Result<Vec<usize>> {
        Ok(self.dimensions(version)?.shape())
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.dataset.variable_has_changes(self.id)
    }

    /// # Errors
    ///
    /// See [`DataSet::get_data`].
    pub fn get_data(&self) -> Result<Array> {
        self.dataset.get_data(self.id)
    }

    /// Committed content as a flat vector of `T`.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`](crate::Error::TypeMismatch) if `T` is not the
    /// variable's element type, plus the errors of [`DataSet::get_data`].
    pub fn get<T: Element>(&self) -> Result<Vec<T>> {
        self.get_data()?.to_vec()
    }

    /// # Errors
    ///
    /// See [`DataSet::read_data`].
    pub fn read_data(&self, origin: &[usize], shape: &[usize]) -> Result<Array> {
        self.dataset.read_data(self.id, origin, shape)
    }

    /// # Errors
    ///
    /// See [`DataSet::put_data`].
    pub fn put_data(&self, origin: &[usize], data: Array) -> Result<()> {
        self.dataset.put_data(self.id, origin, data)
    }

    /// # Errors
    ///
    /// See [`DataSet::append`].
    pub fn append(&self, dimension: usize, data: Array) -> Result<()> {
        self.dataset.append(self.id, dimension, data)
    }

    /// # Errors
    ///
    /// See [`DataSet::set_metadata`].
    pub fn set_metadata(&self, key: &str, value: impl Into<MetadataValue>) -> Result<()> {
        self.dataset.set_metadata(self.id, key, value)
    }

    /// # Errors
    ///
    /// See [`DataSet::metadata`].
    pub fn metadata(&self, key: &str, version: SchemaVersion) -> Result<Option<MetadataValue>> {
        self.dataset.metadata(self.id, key, version)
    }
}
