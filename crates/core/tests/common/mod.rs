#![allow(dead_code)]

use sdslite_core::{CommittedEvent, DataSet, DataSetOptions};

/// One-dimensional `i32` array.
///
/// ```ignore
/// arr![1, 2, 3]
/// ```
#[macro_export]
macro_rules! arr {
    ($($v:expr),* $(,)?) => {
        sdslite_core::Array::from_vec(vec![$($v as i32),*])
    };
}

/// Records every `Committed` event of a dataset.
pub fn record_commits(dataset: &DataSet) -> std::sync::Arc<parking_lot::Mutex<Vec<CommittedEvent>>> {
    let log = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&log);
    dataset.on_committed(move |event| sink.lock().push(event.clone()));
    log
}

pub fn autocommitting() -> DataSet {
    DataSet::new(DataSetOptions::builder().autocommit(true).build())
}
