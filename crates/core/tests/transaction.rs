mod common;

use sdslite_core::{
    ChangeAction, DataSet, DataSetOptions, Error, Rectangle, SchemaVersion, VariableId,
};

#[test]
fn commit_increments_version_once() {
    let ds = DataSet::in_memory();
    assert_eq!(ds.version(), 0);
    assert!(!ds.has_changes());

    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    v.put_data(&[0], arr![1, 2, 3]).unwrap();
    assert!(ds.has_changes());
    assert!(v.has_changes());

    ds.commit().unwrap();
    assert_eq!(ds.version(), 1);
    assert!(!ds.has_changes());
    assert_eq!(v.get::<i32>().unwrap(), vec![1, 2, 3]);

    // nothing pending, nothing to do
    ds.commit().unwrap();
    assert_eq!(ds.version(), 1);
}

#[test]
fn uncommitted_data_is_not_visible() {
    let ds = DataSet::in_memory();
    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    v.put_data(&[0], arr![1, 2]).unwrap();
    ds.commit().unwrap();

    v.put_data(&[2], arr![3]).unwrap();
    assert_eq!(v.get::<i32>().unwrap(), vec![1, 2]);
    assert_eq!(v.shape(SchemaVersion::Committed).unwrap(), vec![2]);
    assert_eq!(v.shape(SchemaVersion::Proposed).unwrap(), vec![3]);
}

#[test]
fn mismatched_shared_dimension_keeps_changes_pending() {
    let ds = DataSet::in_memory();
    let a = ds.add_variable::<i32>("a", &["x"]).unwrap();
    let b = ds.add_variable::<i32>("b", &["x"]).unwrap();
    a.put_data(&[0], arr![1, 2, 3]).unwrap();
    b.put_data(&[0], arr![1, 2, 3, 4, 5]).unwrap();

    let err = ds.commit().unwrap_err();
    let failed = err.as_constraints_failed().expect("constraint failure");
    assert_eq!(failed.dimensions, vec!["x".to_string()]);
    assert!(ds.has_changes());
    assert_eq!(ds.version(), 0);

    // fixing the data lets the same transaction through
    a.put_data(&[3], arr![4, 5]).unwrap();
    ds.commit().unwrap();
    assert_eq!(ds.version(), 1);
    assert_eq!(a.get::<i32>().unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(
        ds.dimensions(SchemaVersion::Committed).unwrap().shape(),
        vec![5]
    );
}

#[test]
fn try_commit_reports_constraint_failure_as_false() {
    let ds = DataSet::in_memory();
    let a = ds.add_variable::<i32>("a", &["x"]).unwrap();
    let b = ds.add_variable::<i32>("b", &["x"]).unwrap();
    a.put_data(&[0], arr![1]).unwrap();
    b.put_data(&[0], arr![1, 2]).unwrap();

    assert!(!ds.try_commit().unwrap());
    assert!(ds.has_changes());

    b.dataset().rollback().unwrap();
    let c = ds.add_variable::<i32>("c", &["y"]).unwrap();
    c.put_data(&[0], arr![7]).unwrap();
    assert!(ds.try_commit().unwrap());
}

#[test]
fn rollback_without_changes_is_a_no_op() {
    let ds = DataSet::in_memory();
    ds.rollback().unwrap();
    ds.rollback().unwrap();
    assert_eq!(ds.version(), 0);
    assert!(!ds.has_changes());
}

#[test]
fn rollback_restores_committed_state() {
    let ds = DataSet::in_memory();
    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    v.put_data(&[0], arr![1, 2, 3]).unwrap();
    ds.commit().unwrap();

    v.put_data(&[0], arr![9, 9, 9, 9]).unwrap();
    v.set_metadata("units", "m").unwrap();
    let added = ds.add_variable::<f64>("w", &["y"]).unwrap();

    ds.rollback().unwrap();
    assert!(!ds.has_changes());
    assert_eq!(ds.version(), 1);
    assert_eq!(v.get::<i32>().unwrap(), vec![1, 2, 3]);
    assert_eq!(v.shape(SchemaVersion::Recent).unwrap(), vec![3]);
    assert!(v.metadata("units", SchemaVersion::Recent).unwrap().is_none());
    assert!(matches!(
        added.get_data(),
        Err(Error::VariableNotFound(_))
    ));
    assert_eq!(ds.variables(SchemaVersion::Recent), vec![v.id()]);

    // a second rollback finds nothing to undo
    ds.rollback().unwrap();
    assert_eq!(ds.version(), 1);
}

#[test]
fn read_only_dataset_rejects_writes() {
    let ds = DataSet::new(DataSetOptions::builder().read_only(true).build());
    assert!(matches!(
        ds.add_variable::<i32>("v", &["x"]),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(ds.commit(), Err(Error::ReadOnly)));
    assert!(matches!(ds.rollback(), Err(Error::ReadOnly)));
    assert!(!ds.has_changes());
}

#[test]
fn frozen_dataset_keeps_serving_reads() {
    let ds = DataSet::in_memory();
    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    v.put_data(&[0], arr![4, 5]).unwrap();
    assert!(matches!(
        ds.set_read_only(),
        Err(Error::CannotPerformAction(_))
    ));
    ds.commit().unwrap();
    ds.set_read_only().unwrap();

    assert!(matches!(v.put_data(&[0], arr![1]), Err(Error::ReadOnly)));
    assert_eq!(v.get::<i32>().unwrap(), vec![4, 5]);
}

#[test]
fn disposed_dataset_rejects_everything() {
    let ds = DataSet::in_memory();
    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    v.put_data(&[0], arr![1]).unwrap();

    ds.dispose();
    ds.dispose();
    assert!(ds.is_disposed());
    assert!(!ds.has_changes());
    assert!(matches!(v.get_data(), Err(Error::Disposed)));
    assert!(matches!(
        ds.add_variable::<i32>("w", &["x"]),
        Err(Error::Disposed)
    ));
    assert!(matches!(ds.commit(), Err(Error::Disposed)));
}

#[test]
fn committing_subscriber_can_cancel() {
    let ds = DataSet::in_memory();
    ds.on_committing(|event| {
        if event.changes.variables.len() > 1 {
            event.cancel();
        }
    });
    let a = ds.add_variable::<i32>("a", &["x"]).unwrap();
    ds.commit().unwrap();

    ds.add_variable::<i32>("b", &["y"]).unwrap();
    assert!(matches!(ds.commit(), Err(Error::CannotPerformAction(_))));
    assert!(matches!(ds.try_commit(), Err(Error::CannotPerformAction(_))));
    assert!(ds.has_changes());
    assert_eq!(ds.version(), 1);
    assert_eq!(a.get::<i32>().unwrap(), Vec::<i32>::new());
}

#[test]
fn changing_subscriber_can_veto_a_mutation() {
    let ds = DataSet::in_memory();
    ds.on_changing(|event| {
        if matches!(&event.action, ChangeAction::AddVariable { name } if name == "forbidden") {
            event.cancel();
        }
    });
    assert!(matches!(
        ds.add_variable::<i32>("forbidden", &["x"]),
        Err(Error::CannotPerformAction(_))
    ));
    assert!(!ds.has_changes());
    ds.add_variable::<i32>("allowed", &["x"]).unwrap();
    assert!(ds.has_changes());
}

#[test]
fn changed_fires_after_each_mutation() {
    let ds = DataSet::in_memory();
    let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&seen);
    ds.on_changed(move |event| sink.lock().push(event.action.clone()));

    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    v.append(0, arr![1]).unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(
        seen[1],
        ChangeAction::Append {
            variable: v.id(),
            dimension: 0
        }
    );
}

#[test]
fn committed_event_describes_the_changeset() {
    let ds = DataSet::in_memory();
    let log = common::record_commits(&ds);

    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    v.put_data(&[0], arr![1, 2, 3]).unwrap();
    ds.commit().unwrap();
    v.append(0, arr![4]).unwrap();
    ds.commit().unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 2);

    let first = &log[0];
    assert_eq!(first.dataset, ds.id());
    assert_eq!(first.changeset.changeset, 1);
    assert_eq!(first.changeset.added, vec![v.id()]);
    assert!(first.changeset.updated.is_empty());
    assert_eq!(
        first.changeset.affected.get(&v.id()),
        Some(&Rectangle::new(vec![0], vec![3]))
    );
    assert_eq!(first.schema.version, 1);

    let second = &log[1];
    assert_eq!(second.changeset.updated, vec![v.id()]);
    assert_eq!(
        second.changeset.affected.get(&v.id()),
        Some(&Rectangle::new(vec![3], vec![1]))
    );
    assert_eq!(
        second.schema.variable(v.id()).unwrap().dimensions.shape(),
        vec![4]
    );
}

#[test]
fn rolled_back_event_fires_only_when_something_was_undone() {
    let ds = DataSet::in_memory();
    let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = std::sync::Arc::clone(&count);
    ds.on_rolled_back(move |_| {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });

    ds.rollback().unwrap();
    ds.add_variable::<i32>("v", &["x"]).unwrap();
    ds.rollback().unwrap();
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn autocommit_commits_every_mutation() {
    let ds = common::autocommitting();
    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    assert_eq!(ds.version(), 1);
    assert!(!ds.has_changes());

    v.put_data(&[0], arr![1, 2]).unwrap();
    assert_eq!(ds.version(), 2);
    assert_eq!(v.get::<i32>().unwrap(), vec![1, 2]);

    ds.set_autocommit(false);
    v.append(0, arr![3]).unwrap();
    assert_eq!(ds.version(), 2);
    assert!(ds.has_changes());
}

#[test]
fn metadata_follows_the_transaction() {
    let ds = DataSet::in_memory();
    let v = ds.add_variable::<f64>("temp", &["t"]).unwrap();
    ds.set_metadata(VariableId::GLOBAL_METADATA, "title", "run 1")
        .unwrap();
    ds.commit().unwrap();

    v.rename("temperature").unwrap();
    assert_eq!(
        ds.schema(SchemaVersion::Committed)
            .variable(v.id())
            .unwrap()
            .name,
        "temp"
    );
    assert_eq!(v.name().unwrap(), "temperature");
    assert!(ds.variable_by_name("temperature").is_some());

    ds.commit().unwrap();
    let schema = ds.schema(SchemaVersion::Committed);
    assert_eq!(schema.variable_by_name("temperature").unwrap().id, v.id());
    assert_eq!(
        schema.metadata.get("title").and_then(|m| m.as_str()),
        Some("run 1")
    );
}

#[test]
fn invalid_writes_leave_no_transaction_behind() {
    let ds = DataSet::in_memory();
    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    ds.commit().unwrap();

    assert!(matches!(
        v.put_data(&[0], sdslite_core::Array::from_vec(vec![1.0f64])),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        v.append(1, arr![1]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(!ds.has_changes());
}

#[test]
fn out_of_range_writes_are_argument_errors() {
    let ds = DataSet::in_memory();
    let v = ds.add_variable::<i32>("v", &["x"]).unwrap();
    ds.commit().unwrap();

    assert!(matches!(
        v.put_data(&[usize::MAX], arr![1]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        v.put_data(&[usize::MAX - 1], arr![1]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(!ds.has_changes());

    v.put_data(&[0], arr![1, 2]).unwrap();
    assert!(matches!(
        v.put_data(&[usize::MAX - 1], arr![1, 2]),
        Err(Error::InvalidArgument(_))
    ));
    ds.commit().unwrap();
    assert_eq!(v.get::<i32>().unwrap(), vec![1, 2]);
}
