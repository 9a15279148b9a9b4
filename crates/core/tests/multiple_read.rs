mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use sdslite_core::storage::{MemoryStorage, VariableStorage};
use sdslite_core::variable::changes::DataChanges;
use sdslite_core::{Array, DataRequest, DataSet, DataType, Error};

/// Memory storage that commits a dataset the first time it is read.
struct CommitOnRead {
    inner: MemoryStorage,
    pending: Arc<Mutex<Option<DataSet>>>,
}

impl VariableStorage for CommitOnRead {
    fn data_type(&self) -> DataType {
        self.inner.data_type()
    }

    fn shape(&self) -> Vec<usize> {
        self.inner.shape()
    }

    fn read_data(&self, origin: &[usize], shape: &[usize]) -> sdslite_core::Result<Array> {
        let pending = self.pending.lock().take();
        if let Some(dataset) = pending {
            dataset.commit()?;
        }
        self.inner.read_data(origin, shape)
    }

    fn begin_write_transaction(&mut self, changes: &DataChanges) -> sdslite_core::Result<()> {
        self.inner.begin_write_transaction(changes)
    }

    fn write_data(&mut self, origin: &[usize], data: &Array) -> sdslite_core::Result<()> {
        self.inner.write_data(origin, data)
    }

    fn commit_write(&mut self, changes: &DataChanges) -> sdslite_core::Result<()> {
        self.inner.commit_write(changes)
    }

    fn rollback_write(&mut self) -> sdslite_core::Result<()> {
        self.inner.rollback_write()
    }
}

#[test]
fn reads_come_from_one_version() {
    let ds = DataSet::in_memory();
    let a = ds.add_variable::<i32>("a", &["x"]).unwrap();
    let b = ds.add_variable::<i32>("b", &["x"]).unwrap();
    a.put_data(&[0], arr![1, 2, 3]).unwrap();
    b.put_data(&[0], arr![4, 5, 6]).unwrap();
    ds.commit().unwrap();

    let result = ds
        .get_multiple_data(&[
            DataRequest::whole(a.id()),
            DataRequest::region(b.id(), vec![1], vec![2]),
        ])
        .unwrap();
    assert_eq!(result.version, 1);
    assert_eq!(result.data[0].to_vec::<i32>().unwrap(), vec![1, 2, 3]);
    assert_eq!(result.data[1].to_vec::<i32>().unwrap(), vec![5, 6]);
}

#[test]
fn out_of_bounds_region_fails_the_whole_request() {
    let ds = DataSet::in_memory();
    let a = ds.add_variable::<i32>("a", &["x"]).unwrap();
    a.put_data(&[0], arr![1]).unwrap();
    ds.commit().unwrap();

    assert!(matches!(
        ds.get_multiple_data(&[
            DataRequest::whole(a.id()),
            DataRequest::region(a.id(), vec![0], vec![5]),
        ]),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn commit_during_a_reference_read_is_reported() {
    let pending = Arc::new(Mutex::new(None));

    // `source` -> `middle` -> `ds`: the source storage is read while only
    // `source` is locked, so it can commit `ds` in the middle of the read
    let source = DataSet::in_memory();
    let v = source
        .add_variable_with_storage(
            "v",
            Some(&["t"]),
            Box::new(CommitOnRead {
                inner: MemoryStorage::new(DataType::Int32, 1),
                pending: Arc::clone(&pending),
            }),
        )
        .unwrap();
    v.put_data(&[0], arr![7, 8]).unwrap();
    source.commit().unwrap();

    let middle = DataSet::in_memory();
    let hop = middle.add_reference("hop", &v).unwrap();
    middle.commit().unwrap();

    let ds = DataSet::in_memory();
    let local = ds.add_variable::<i32>("local", &["s"]).unwrap();
    let rf = ds.add_reference("rf", &hop).unwrap();
    local.put_data(&[0], arr![1]).unwrap();
    ds.commit().unwrap();
    local.append(0, arr![2]).unwrap();

    *pending.lock() = Some(ds.clone());
    let requests = [DataRequest::whole(local.id()), DataRequest::whole(rf.id())];
    assert!(matches!(
        ds.get_multiple_data(&requests),
        Err(Error::VersionChanged {
            expected: 1,
            actual: 2
        })
    ));
    assert!(!ds.has_changes());

    let result = ds.get_multiple_data(&requests).unwrap();
    assert_eq!(result.version, 2);
    assert_eq!(result.data[0].to_vec::<i32>().unwrap(), vec![1, 2]);
    assert_eq!(result.data[1].to_vec::<i32>().unwrap(), vec![7, 8]);
}

#[test]
fn concurrent_commits_never_tear_a_multiple_read() {
    let source = DataSet::in_memory();
    let remote = source.add_variable::<i32>("remote", &["t"]).unwrap();
    source.commit().unwrap();

    let ds = DataSet::in_memory();
    let a = ds.add_variable::<i32>("a", &["t"]).unwrap();
    let b = ds.add_variable::<i32>("b", &["t"]).unwrap();
    let rf = ds.add_reference("rf", &remote).unwrap();
    ds.commit().unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..50 {
                a.append(0, arr![i]).unwrap();
                b.append(0, arr![i]).unwrap();
                remote.append(0, arr![i]).unwrap();
                ds.commit().unwrap();
            }
        });

        let requests = [
            DataRequest::whole(a.id()),
            DataRequest::whole(b.id()),
            DataRequest::whole(rf.id()),
        ];
        for _ in 0..200 {
            match ds.get_multiple_data(&requests) {
                Ok(result) => {
                    assert_eq!(result.data[0], result.data[1]);
                    assert_eq!(result.data[0].len(), result.version as usize - 1);
                }
                Err(Error::VersionChanged { expected, actual }) => assert!(actual > expected),
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
    });

    assert_eq!(ds.version(), 51);
    assert_eq!(rf.get::<i32>().unwrap().len(), 50);
}
