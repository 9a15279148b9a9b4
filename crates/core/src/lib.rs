//! Transactional multi-dimensional scientific datasets.
//!
//! `sdslite_core` models a dataset as a collection of named, typed,
//! N-dimensional variables that share named dimensions. All modifications
//! are grouped into a transaction:
//!
//! 1. **Mutate** -- adding variables, writing or appending data and setting
//!    metadata open the dataset's transaction and buffer the change.
//! 2. **Precommit** -- appends are rewritten into absolute writes, the
//!    proposed state is checked against the shared-dimension constraints
//!    and every variable stages its writes in storage.
//! 3. **Final commit** -- staged writes become committed, the version grows
//!    by one and the committed schema is captured.
//!
//! A failed check leaves every pending change in place, so the caller can
//! fix the data and commit again, or roll back.
//!
//! Reference variables mirror a variable of another dataset. Datasets tied
//! by references form a link graph; committing or rolling back one of them
//! extends over every linked dataset with pending changes.
//!
//! # Entry point
//!
//! ```rust
//! use sdslite_core::{Array, DataSet};
//!
//! let ds = DataSet::in_memory();
//! let a = ds.add_variable::<i32>("a", &["x"]).unwrap();
//! let b = ds.add_variable::<i32>("b", &["x"]).unwrap();
//! a.put_data(&[0], Array::from_vec(vec![1i32, 2, 3])).unwrap();
//! b.put_data(&[0], Array::from_vec(vec![1i32, 2, 3, 4, 5])).unwrap();
//!
//! // `x` cannot be 3 and 5 at once
//! assert_eq!(ds.try_commit().unwrap(), false);
//! assert!(ds.has_changes());
//! ```
//!
//! # Crate features
//!
//! - **`serde`** -- enables `Serialize`/`Deserialize` derives on schema,
//!   metadata, dimension and error types.

extern crate alloc;

pub mod constraints;
pub mod coordinate;
pub mod data;
pub mod dataset;
pub mod dimension;
pub mod error;
pub mod link;
pub mod metadata;
pub mod rectangle;
pub mod schema;
pub mod storage;
pub mod variable;

pub use coordinate::CoordinateSystem;
pub use data::{Array, DataType, Element};
pub use dataset::events::{
    ChangeAction, ChangedEvent, ChangingEvent, CommittedEvent, CommittingEvent, RolledBackEvent,
};
pub use dataset::{
    DataRequest, DataSet, DataSetChangeset, DataSetOptions, MultipleData, VariableHandle,
    WeakDataSet,
};
pub use dimension::{Dimension, DimensionList};
pub use error::{ConstraintsFailed, Error, Result};
pub use metadata::MetadataValue;
pub use rectangle::Rectangle;
pub use schema::{DataSetSchema, SchemaVersion, VariableSchema};
pub use variable::VariableId;
