use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

use super::VariableStorage;
use crate::data::{Array, DataType};
use crate::error::{Error, Result};
use crate::variable::changes::DataChanges;

/// Keeps variable data in memory. Writes go to a staged copy until
/// [`commit_write`](VariableStorage::commit_write) swaps it in.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    committed: Array,
    staged: Option<Array>,
}

impl MemoryStorage {
    /// Empty storage of the given type and rank.
    #[must_use]
    pub fn new(data_type: DataType, rank: usize) -> Self {
        Self {
            committed: Array::empty(data_type, vec![0; rank]),
            staged: None,
        }
    }

    /// Storage whose committed state is `data`.
    #[must_use]
    pub const fn with_data(data: Array) -> Self {
        Self {
            committed: data,
            staged: None,
        }
    }

    #[must_use]
    pub const fn is_writing(&self) -> bool {
        self.staged.is_some()
    }
}

impl VariableStorage for MemoryStorage {
    fn data_type(&self) -> DataType {
        self.committed.data_type()
    }

    fn shape(&self) -> Vec<usize> {
        self.committed.shape().to_vec()
    }

    fn read_data(&self, origin: &[usize], shape: &[usize]) -> Result<Array> {
        self.committed.slice(origin, shape)
    }

    fn begin_write_transaction(&mut self, changes: &DataChanges) -> Result<()> {
        let mut staged = self.committed.clone();
        staged.resize(changes.shape());
        self.staged = Some(staged);
        Ok(())
    }

    fn write_data(&mut self, origin: &[usize], data: &Array) -> Result<()> {
        let staged = self
            .staged
            .as_mut()
            .ok_or_else(|| Error::Storage("no write transaction is open".to_string()))?;
        staged.write(origin, data)
    }

    fn commit_write(&mut self, _changes: &DataChanges) -> Result<()> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| Error::Storage("no write transaction to commit".to_string()))?;
        self.committed = staged;
        Ok(())
    }

    fn rollback_write(&mut self) -> Result<()> {
        self.staged = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::changes::DataPiece;

    #[test]
    fn staged_writes_are_invisible_until_commit() {
        let mut storage = MemoryStorage::with_data(Array::from_vec(vec![1i32, 2, 3]));
        let mut changes = DataChanges::new(storage.shape());
        changes
            .push(DataPiece::append(0, Array::from_vec(vec![4i32])))
            .unwrap();
        changes.transform_append_to_put();

        storage.begin_write_transaction(&changes).unwrap();
        for piece in changes.pieces() {
            storage
                .write_data(piece.absolute_origin().unwrap(), &piece.data)
                .unwrap();
        }
        assert_eq!(storage.shape(), vec![3]);

        storage.commit_write(&changes).unwrap();
        assert!(!storage.is_writing());
        let all = storage.read_data(&[0], &[4]).unwrap();
        assert_eq!(all.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn rollback_drops_staged_copy() {
        let mut storage = MemoryStorage::new(DataType::Double, 1);
        let changes = DataChanges::new(vec![0]);
        storage.begin_write_transaction(&changes).unwrap();
        storage
            .write_data(&[0], &Array::from_vec(vec![1.0f64]))
            .unwrap();
        storage.rollback_write().unwrap();
        assert_eq!(storage.shape(), vec![0]);
        assert!(storage.write_data(&[0], &Array::from_vec(vec![1.0f64])).is_err());
    }
}
