//! Contract between storage-backed variables and the transaction engine.
//!
//! The engine never writes to storage directly. During precommit it opens a
//! write transaction on each changed variable and hands it the buffered
//! pieces; during final commit it asks the storage to make them durable, and
//! on any failure it asks the storage to drop them.

pub mod memory;

use alloc::vec::Vec;

use crate::data::{Array, DataType};
use crate::error::Result;
use crate::variable::changes::DataChanges;

pub use self::memory::MemoryStorage;

pub trait VariableStorage: Send {
    fn data_type(&self) -> DataType;

    /// Committed shape.
    fn shape(&self) -> Vec<usize>;

    /// Reads the committed region `[origin, origin + shape)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the region is outside the committed shape.
    fn read_data(&self, origin: &[usize], shape: &[usize]) -> Result<Array>;

    /// Opens a write transaction sized for `changes`.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn begin_write_transaction(&mut self, changes: &DataChanges) -> Result<()>;

    /// Writes one piece inside the open write transaction.
    ///
    /// # Errors
    ///
    /// Implementation specific; also returned when no write transaction is open.
    fn write_data(&mut self, origin: &[usize], data: &Array) -> Result<()>;

    /// Makes the open write transaction the committed state.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn commit_write(&mut self, changes: &DataChanges) -> Result<()>;

    /// Discards the open write transaction, if any.
    ///
    /// # Errors
    ///
    /// Implementation specific. Callers log and ignore the error.
    fn rollback_write(&mut self) -> Result<()>;
}
