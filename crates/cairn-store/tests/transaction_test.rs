// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! End-to-end transaction tests.
//!
//! Drive the store the way an interpreter would: objects with variables,
//! shared containers, nested atomic regions, deferred calls and eviction
//! between tasks.

// Test code prioritizes clarity over defensive programming
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

mod common;

use cairn_store::host::mock::SchedulerEvent;
use cairn_store::{StoreError, Value};
use common::{fresh_store, int_array, int_map, int_pairs, ints};

// ============================================================================
// Failed tasks leave no trace
// ============================================================================

#[test]
fn failed_task_rolls_back_everything() {
    let (mut store, ds) = fresh_store(2);
    let inventory = int_map(&mut store, ds, &[(1, 10), (2, 20)]).unwrap();
    store.assign_variable(ds, 0, &inventory).unwrap();
    store.assign_variable(ds, 1, &Value::int(100)).unwrap();
    let before = store.stats();

    let err = store
        .atomic(|store| {
            store.assign_element(&inventory, &Value::int(3), &Value::int(30))?;
            store.assign_element(&inventory, &Value::int(1), &Value::Nil)?;
            store.assign_variable(ds, 1, &Value::int(90))?;
            let scratch = store.create_array(ds, 4)?;
            store.assign_variable(ds, 0, &scratch)?;
            store.release(scratch);
            store.add_deferred_call(ds, 50, &Value::int(1))?;
            Err::<(), _>(StoreError::OutOfRange { index: 9, size: 0 })
        })
        .unwrap_err();
    assert!(err.is_argument_error());

    assert_eq!(store.variable(ds, 0).unwrap(), inventory);
    store.release(inventory);
    assert_eq!(store.variable(ds, 1).unwrap(), Value::int(100));
    assert_eq!(int_pairs(&mut store, &inventory).unwrap(), vec![(1, 10), (2, 20)]);
    assert!(store.deferred_calls(ds).unwrap().is_empty());
    assert!(store.scheduler().events.is_empty());
    assert_eq!(store.stats(), before);
}

#[test]
fn successful_task_publishes_everything() {
    let (mut store, ds) = fresh_store(1);
    let log = int_array(&mut store, ds, &[]).unwrap();
    store.assign_variable(ds, 0, &log).unwrap();

    let handle = store
        .atomic(|store| {
            let entry = int_array(store, ds, &[7])?;
            let grown = store.concat(&log, &entry)?;
            store.release(entry);
            store.assign_variable(ds, 0, &grown)?;
            store.release(grown);
            store.add_deferred_call(ds, 15, &Value::int(0))
        })
        .unwrap();

    let current = store.variable(ds, 0).unwrap();
    assert_eq!(ints(&mut store, &current).unwrap(), vec![7]);
    store.release(current);
    assert_eq!(
        store.scheduler().events,
        vec![SchedulerEvent::Schedule(ds, handle, 15)]
    );

    store.release(log);
    assert!(!store.is_live(&log));
    assert_eq!(store.stats().containers, 1);
}

// ============================================================================
// Nested regions
// ============================================================================

#[test]
fn inner_failure_is_contained() {
    let (mut store, ds) = fresh_store(1);
    let counters = int_map(&mut store, ds, &[(1, 0)]).unwrap();

    store
        .atomic(|store| {
            store.assign_element(&counters, &Value::int(1), &Value::int(1))?;
            let inner = store.atomic(|store| {
                store.assign_element(&counters, &Value::int(1), &Value::int(2))?;
                store.assign_element(&counters, &Value::int(2), &Value::int(2))?;
                Err::<(), _>(StoreError::PlaneActive)
            });
            assert_eq!(inner, Err(StoreError::PlaneActive));
            assert_eq!(store.level(), 1);
            Ok::<_, StoreError>(())
        })
        .unwrap();

    assert_eq!(int_pairs(&mut store, &counters).unwrap(), vec![(1, 1)]);
    assert_eq!(store.refcount(&counters), 1);
    assert_eq!(store.stats().ledger_entries, 0);
}

#[test]
fn shared_container_survives_owner_rollback() {
    let (mut store, owner) = fresh_store(1);
    let reader = store.create_dataspace(1);
    let shared = int_array(&mut store, owner, &[1, 2, 3]).unwrap();
    store.assign_variable(owner, 0, &shared).unwrap();
    store.release(shared);

    let level = store.enter_atomic().unwrap();
    store.assign_variable(reader, 0, &shared).unwrap();
    store.assign_variable(owner, 0, &Value::Nil).unwrap();
    store
        .assign_element(&shared, &Value::int(0), &Value::int(100))
        .unwrap();
    store.commit_atomic(level).unwrap();

    assert_eq!(store.import_count(reader, &shared), 1);
    assert_eq!(store.refcount(&shared), 1);
    assert_eq!(ints(&mut store, &shared).unwrap(), vec![100, 2, 3]);

    let level = store.enter_atomic().unwrap();
    store.assign_variable(reader, 0, &Value::Nil).unwrap();
    store.discard_atomic(level).unwrap();
    assert!(store.is_live(&shared));
    assert_eq!(store.import_count(reader, &shared), 1);
}

// ============================================================================
// Eviction between tasks
// ============================================================================

#[test]
fn evicted_dataspace_is_usable_in_next_task() {
    let (mut store, ds) = fresh_store(1);
    let map = int_map(&mut store, ds, &[(5, 50), (1, 10)]).unwrap();
    store.assign_variable(ds, 0, &map).unwrap();
    store.release(map);

    let report = store.evict_dataspace(ds).unwrap();
    assert_eq!(report.evicted, 1);
    assert!(report.shared.is_empty());

    store
        .atomic(|store| {
            store.assign_element(&map, &Value::int(3), &Value::int(30))?;
            Ok::<_, StoreError>(())
        })
        .unwrap();
    assert_eq!(
        int_pairs(&mut store, &map).unwrap(),
        vec![(1, 10), (3, 30), (5, 50)]
    );
    assert_eq!(
        store.persistence().size_changes,
        vec![map.container_id().unwrap()]
    );
    assert_eq!(store.persistence().loads, 1);
}

#[test]
fn destroyed_objects_vanish_from_containers() {
    let (mut store, ds) = fresh_store(0);
    let gone = store.objects_mut().spawn();
    let stays = store.objects_mut().spawn();
    let map = store.create_map(ds, 0).unwrap();
    store
        .assign_element(&map, &Value::object(gone), &Value::int(1))
        .unwrap();
    store
        .assign_element(&map, &Value::object(stays), &Value::int(2))
        .unwrap();
    let list = store
        .create_array_from(ds, &[Value::object(gone), Value::object(stays)])
        .unwrap();

    store.objects_mut().destroy(gone);
    assert_eq!(store.size(&map).unwrap(), 1);
    assert_eq!(
        store.elements(&list).unwrap(),
        vec![Value::Nil, Value::object(stays)]
    );
    assert_eq!(
        store.index_get(&map, &Value::object(gone)).unwrap(),
        Value::Nil
    );
}
