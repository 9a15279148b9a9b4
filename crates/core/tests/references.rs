mod common;

use sdslite_core::{DataSet, Error, MetadataValue, SchemaVersion};

/// `a` holds `v1 = [1, 2, 3]`, `b` holds a committed reference to it.
fn linked_pair() -> (DataSet, DataSet, sdslite_core::VariableHandle, sdslite_core::VariableHandle) {
    let a = DataSet::in_memory();
    let b = DataSet::in_memory();
    let v1 = a.add_variable::<i32>("v1", &["x"]).unwrap();
    v1.put_data(&[0], arr![1, 2, 3]).unwrap();
    a.commit().unwrap();
    let rf = b.add_reference("rf", &v1).unwrap();
    b.commit().unwrap();
    (a, b, v1, rf)
}

#[test]
fn reference_reads_target_data() {
    let (a, b, v1, rf) = linked_pair();
    assert_eq!(a.version(), 1);
    assert_eq!(b.version(), 1);
    assert_eq!(rf.get_data().unwrap(), v1.get_data().unwrap());
    assert_eq!(rf.shape(SchemaVersion::Committed).unwrap(), vec![3]);
    assert_eq!(rf.name().unwrap(), "rf");
}

#[test]
fn target_change_propagates_and_commits_both() {
    let (a, b, v1, rf) = linked_pair();
    let b_commits = common::record_commits(&b);

    v1.append(0, arr![4]).unwrap();
    assert!(b.has_changes());
    assert_eq!(rf.shape(SchemaVersion::Proposed).unwrap(), vec![4]);

    a.commit().unwrap();
    assert!(!a.has_changes());
    assert!(!b.has_changes());
    assert_eq!(a.version(), 2);
    assert_eq!(b.version(), 2);
    assert_eq!(rf.get_data().unwrap(), v1.get_data().unwrap());
    assert_eq!(rf.get::<i32>().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(rf.shape(SchemaVersion::Committed).unwrap(), vec![4]);
    assert_eq!(b_commits.lock().len(), 1);
}

#[test]
fn writes_through_a_reference_land_in_the_target() {
    let (a, b, v1, rf) = linked_pair();
    rf.put_data(&[0], arr![9]).unwrap();
    assert!(a.has_changes());

    b.commit().unwrap();
    assert!(!a.has_changes());
    assert_eq!(v1.get::<i32>().unwrap(), vec![9, 2, 3]);
    assert_eq!(rf.get::<i32>().unwrap(), vec![9, 2, 3]);
}

#[test]
fn rollback_extends_over_linked_datasets() {
    let (a, b, v1, rf) = linked_pair();
    v1.append(0, arr![4, 5]).unwrap();
    assert!(b.has_changes());

    b.rollback().unwrap();
    assert!(!a.has_changes());
    assert!(!b.has_changes());
    assert_eq!(v1.get::<i32>().unwrap(), vec![1, 2, 3]);
    assert_eq!(rf.shape(SchemaVersion::Recent).unwrap(), vec![3]);
}

#[test]
fn rolled_back_reference_stops_receiving_changes() {
    let (_a, _b, v1, _rf) = linked_pair();
    let c = DataSet::in_memory();
    let dangling = c.add_reference("tmp", &v1).unwrap();
    c.rollback().unwrap();
    assert!(matches!(dangling.get_data(), Err(Error::VariableNotFound(_))));

    v1.put_data(&[0], arr![0]).unwrap();
    assert!(!c.has_changes());
}

#[test]
fn failed_linked_precommit_undoes_the_initiator() {
    let a = DataSet::in_memory();
    let b = DataSet::in_memory();
    let v1 = a.add_variable::<i32>("v1", &["x"]).unwrap();
    v1.put_data(&[0], arr![1, 2, 3]).unwrap();
    a.commit().unwrap();

    // `w` shares `x` with the mirrored `v1`
    let w = b.add_variable::<i32>("w", &["x"]).unwrap();
    w.put_data(&[0], arr![7, 8, 9]).unwrap();
    b.add_reference("rf", &v1).unwrap();
    b.commit().unwrap();

    v1.append(0, arr![4]).unwrap();
    let err = a.commit().unwrap_err();
    match &err {
        Error::DistributedCommitFailed { dataset, source } => {
            assert_eq!(*dataset, b.id());
            assert!(matches!(**source, Error::ConstraintsFailed(_)));
        }
        other => panic!("expected distributed failure, got {other:?}"),
    }
    assert_eq!(
        err.as_constraints_failed().unwrap().dimensions,
        vec!["x".to_string()]
    );
    assert!(a.has_changes());
    assert!(b.has_changes());
    assert_eq!(a.version(), 1);
    assert_eq!(v1.get::<i32>().unwrap(), vec![1, 2, 3]);
    assert!(!a.try_commit().unwrap());

    w.append(0, arr![10]).unwrap();
    a.commit().unwrap();
    assert_eq!(a.version(), 2);
    assert_eq!(b.version(), 2);
    assert_eq!(v1.get::<i32>().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(w.get::<i32>().unwrap(), vec![7, 8, 9, 10]);
}

#[test]
fn released_target_is_reported() {
    let b = DataSet::in_memory();
    let rf = {
        let a = DataSet::in_memory();
        let v1 = a.add_variable::<i32>("v1", &["x"]).unwrap();
        v1.put_data(&[0], arr![1]).unwrap();
        a.commit().unwrap();
        let rf = b.add_reference("rf", &v1).unwrap();
        b.commit().unwrap();
        rf
    };
    assert!(matches!(rf.get_data(), Err(Error::DataSetReleased)));
    assert!(matches!(rf.put_data(&[0], arr![2]), Err(Error::DataSetReleased)));
}

#[test]
fn references_cannot_point_into_their_own_dataset() {
    let a = DataSet::in_memory();
    let v = a.add_variable::<i32>("v", &["x"]).unwrap();
    assert!(matches!(
        a.add_reference("self", &v),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn disposed_reference_holder_leaves_the_link_graph() {
    let (a, b, v1, rf) = linked_pair();
    b.dispose();

    v1.append(0, arr![4]).unwrap();
    assert!(!b.has_changes());
    a.commit().unwrap();
    assert_eq!(a.version(), 2);
    assert_eq!(b.version(), 1);
    assert_eq!(v1.get::<i32>().unwrap(), vec![1, 2, 3, 4]);
    assert!(matches!(rf.get_data(), Err(Error::Disposed)));

    v1.append(0, arr![5]).unwrap();
    a.commit().unwrap();
    assert_eq!(a.version(), 3);
}

#[test]
fn disposed_target_detaches_its_references() {
    let (a, b, v1, rf) = linked_pair();
    a.dispose();
    assert!(matches!(v1.get_data(), Err(Error::Disposed)));
    assert!(matches!(rf.get_data(), Err(Error::Disposed)));

    let w = b.add_variable::<i32>("w", &["y"]).unwrap();
    w.put_data(&[0], arr![1]).unwrap();
    b.commit().unwrap();
    assert_eq!(b.version(), 2);
}

#[test]
fn read_only_reference_holder_keeps_its_committed_schema() {
    let (a, b, v1, rf) = linked_pair();
    b.set_read_only().unwrap();

    v1.append(0, arr![4]).unwrap();
    assert!(!b.has_changes());
    a.commit().unwrap();
    assert_eq!(a.version(), 2);
    assert_eq!(b.version(), 1);
    assert!(!b.has_changes());
    assert_eq!(rf.shape(SchemaVersion::Committed).unwrap(), vec![3]);
    assert_eq!(rf.get::<i32>().unwrap(), vec![1, 2, 3, 4]);

    v1.put_data(&[0], arr![0]).unwrap();
    a.rollback().unwrap();
    assert!(!a.has_changes());
    assert!(!b.has_changes());
}

#[test]
fn reference_mirrors_target_metadata() {
    let a = DataSet::in_memory();
    let b = DataSet::in_memory();
    let v1 = a.add_variable::<i32>("v1", &["x"]).unwrap();
    v1.set_metadata("units", "K").unwrap();
    a.commit().unwrap();
    let rf = b.add_reference("rf", &v1).unwrap();
    b.commit().unwrap();

    assert_eq!(
        rf.metadata("units", SchemaVersion::Committed).unwrap(),
        Some(MetadataValue::from("K"))
    );
    assert_eq!(rf.name().unwrap(), "rf");
    assert_eq!(v1.name().unwrap(), "v1");

    // metadata-only change of the target
    v1.set_metadata("units", "C").unwrap();
    assert_eq!(
        rf.metadata("units", SchemaVersion::Proposed).unwrap(),
        Some(MetadataValue::from("C"))
    );
    assert_eq!(
        rf.metadata("units", SchemaVersion::Committed).unwrap(),
        Some(MetadataValue::from("K"))
    );
    a.commit().unwrap();
    assert_eq!(
        rf.metadata("units", SchemaVersion::Committed).unwrap(),
        Some(MetadataValue::from("C"))
    );

    // writes through the reference land on the target
    rf.set_metadata("long_name", "air temperature").unwrap();
    assert!(a.has_changes());
    a.commit().unwrap();
    assert_eq!(
        v1.metadata("long_name", SchemaVersion::Committed).unwrap(),
        Some(MetadataValue::from("air temperature"))
    );
}
