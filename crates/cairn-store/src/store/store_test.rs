// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for allocation, reference counting and imports.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use alloc::vec;
use alloc::vec::Vec;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::host::mock::MockStore;
use crate::value::{ContainerKind, DataspaceId, Value};

/// A mock store with one dataspace of four variables.
pub(crate) fn setup() -> (MockStore, DataspaceId) {
    let mut store = MockStore::mock();
    let ds = store.create_dataspace(4);
    (store, ds)
}

/// An array of integers owned by `ds`.
pub(crate) fn int_array(store: &mut MockStore, ds: DataspaceId, values: &[i64]) -> Value {
    let values: Vec<Value> = values.iter().copied().map(Value::int).collect();
    store.create_array_from(ds, &values).unwrap()
}

/// The integer elements of an array.
pub(crate) fn ints(store: &mut MockStore, array: &Value) -> Vec<i64> {
    store
        .elements(array)
        .unwrap()
        .into_iter()
        .map(|value| match value {
            Value::Int(n) => n,
            other => panic!("expected int, got {other:?}"),
        })
        .collect()
}

#[test]
fn create_array_is_nil_filled() {
    let (mut store, ds) = setup();
    let array = store.create_array(ds, 3).unwrap();
    assert_eq!(store.elements(&array).unwrap(), vec![Value::Nil; 3]);
    assert_eq!(store.refcount(&array), 1);
    assert_eq!(store.owner(&array).unwrap(), ds);
    assert_eq!(store.home(&array).unwrap(), 0);
}

#[test]
fn create_rejects_unknown_dataspace() {
    let mut store = MockStore::mock();
    let err = store.create_array(DataspaceId::new(9), 1).unwrap_err();
    assert_eq!(err, StoreError::UnknownDataspace(DataspaceId::new(9)));
}

#[test]
fn create_checks_limits_first() {
    let mut store = MockStore::mock_with(
        StoreConfig::new()
            .with_max_container_size(2)
            .with_max_containers(1),
    );
    let ds = store.create_dataspace(0);
    let err = store.create_array(ds, 3).unwrap_err();
    assert!(matches!(err, StoreError::ContainerTooLarge { size: 3, max: 2 }));
    assert!(err.is_resource_error());

    let _first = store.create_map(ds, 0).unwrap();
    let err = store.create_array(ds, 1).unwrap_err();
    assert_eq!(err, StoreError::TooManyContainers { max: 1 });
    assert_eq!(store.stats().containers, 1);
}

#[test]
fn tags_are_distinct_for_fresh_containers() {
    let (mut store, ds) = setup();
    let a = store.create_array(ds, 0).unwrap();
    let b = store.create_array(ds, 0).unwrap();
    assert_ne!(store.tag(&a).unwrap(), store.tag(&b).unwrap());
}

#[test]
fn release_cascades_through_nested_containers() {
    let (mut store, ds) = setup();
    let inner = int_array(&mut store, ds, &[1, 2]);
    let text = store.create_string("leaf");
    let outer = store.create_array_from(ds, &[inner, text]).unwrap();
    store.release(inner);
    store.release(text);
    assert_eq!(store.refcount(&inner), 1);
    assert_eq!(store.stats().containers, 2);
    assert_eq!(store.stats().strings, 1);

    store.release(outer);
    assert_eq!(store.stats().containers, 0);
    assert_eq!(store.stats().strings, 0);
    assert!(store.sweep_list(ds).is_empty());
}

#[test]
fn release_of_deep_nesting_does_not_recurse() {
    let (mut store, ds) = setup();
    let mut current = store.create_array(ds, 0).unwrap();
    for _ in 0..10_000 {
        let next = store.create_array_from(ds, &[current]).unwrap();
        store.release(current);
        current = next;
    }
    assert_eq!(store.stats().containers, 10_001);
    store.release(current);
    assert_eq!(store.stats().containers, 0);
}

#[test]
fn copy_values_substitutes_destroyed_objects() {
    let (mut store, ds) = setup();
    let alive = store.objects_mut().spawn();
    let doomed = store.objects_mut().spawn();
    store.objects_mut().destroy(doomed);

    let record = store.create_record(ds, doomed, 1).unwrap();
    let copies = store.copy_values(&[
        Value::object(alive),
        Value::object(doomed),
        record,
        Value::int(3),
    ]);
    assert_eq!(
        copies,
        vec![Value::object(alive), Value::Nil, Value::Nil, Value::int(3)]
    );
    assert_eq!(store.refcount(&record), 1);
}

#[test]
fn restore_container_keeps_tag_and_sorts_pairs() {
    let (mut store, ds) = setup();
    let map = store
        .restore_container(
            ds,
            ContainerKind::Mapping,
            500,
            &[
                Value::int(3),
                Value::int(30),
                Value::int(1),
                Value::int(10),
                Value::int(3),
                Value::int(33),
            ],
        )
        .unwrap();
    assert_eq!(store.tag(&map).unwrap(), 500);
    assert_eq!(
        store.elements(&map).unwrap(),
        vec![Value::int(1), Value::int(10), Value::int(3), Value::int(33)]
    );

    let next = store.create_array(ds, 0).unwrap();
    assert!(store.tag(&next).unwrap() > 500);
}

#[test]
fn restore_container_rejects_odd_pairs() {
    let (mut store, ds) = setup();
    let err = store
        .restore_container(ds, ContainerKind::Mapping, 1, &[Value::int(1)])
        .unwrap_err();
    assert!(err.is_argument_error());
}

#[test]
fn restore_container_drops_destroyed_keys_and_values() {
    let (mut store, ds) = setup();
    let doomed = store.objects_mut().spawn();
    store.objects_mut().destroy(doomed);

    let map = store
        .restore_container(
            ds,
            ContainerKind::Mapping,
            9,
            &[
                Value::int(1),
                Value::int(10),
                Value::object(doomed),
                Value::int(20),
                Value::int(2),
                Value::object(doomed),
            ],
        )
        .unwrap();
    assert_eq!(
        store.elements(&map).unwrap(),
        vec![Value::int(1), Value::int(10)]
    );
    assert_eq!(store.map_get(&map, &Value::int(1)).unwrap(), Value::int(10));
    assert!(!store.map_contains(&map, &Value::int(2)).unwrap());
    assert_eq!(store.map_size(&map).unwrap(), 1);

    let empty = store
        .restore_container(
            ds,
            ContainerKind::Mapping,
            10,
            &[Value::int(1), Value::object(doomed)],
        )
        .unwrap();
    assert!(!store.map_contains(&empty, &Value::int(1)).unwrap());
    assert_eq!(store.map_size(&empty).unwrap(), 0);
}

#[test]
fn restore_container_later_nil_deletes_earlier_pair() {
    let (mut store, ds) = setup();
    let map = store
        .restore_container(
            ds,
            ContainerKind::Mapping,
            11,
            &[
                Value::int(1),
                Value::int(10),
                Value::int(2),
                Value::int(20),
                Value::int(1),
                Value::Nil,
            ],
        )
        .unwrap();
    assert_eq!(store.map_get(&map, &Value::int(1)).unwrap(), Value::Nil);
    assert_eq!(
        store.elements(&map).unwrap(),
        vec![Value::int(2), Value::int(20)]
    );
}

#[test]
fn restore_container_dedups_keys_sharing_a_tag() {
    let (mut store, ds) = setup();
    let first = store
        .restore_container(ds, ContainerKind::Array, 77, &[Value::int(1)])
        .unwrap();
    let second = store
        .restore_container(ds, ContainerKind::Array, 77, &[Value::int(2)])
        .unwrap();

    let map = store
        .restore_container(
            ds,
            ContainerKind::Mapping,
            12,
            &[first, Value::int(1), second, Value::int(2), first, Value::int(3)],
        )
        .unwrap();
    assert_eq!(store.map_size(&map).unwrap(), 2);
    assert_eq!(store.map_get(&map, &first).unwrap(), Value::int(3));
    assert_eq!(store.map_get(&map, &second).unwrap(), Value::int(2));
    assert_eq!(store.refcount(&first), 2);
}

#[test]
fn sweep_list_tracks_owned_containers() {
    let (mut store, ds) = setup();
    let a = store.create_array(ds, 0).unwrap();
    let b = store.create_map(ds, 0).unwrap();
    let c = store.create_array(ds, 0).unwrap();
    assert_eq!(store.sweep_list(ds), vec![c, b, a]);
    assert_eq!(store.dataspace(ds).unwrap().container_count(), 3);

    store.release(b);
    assert_eq!(store.sweep_list(ds), vec![c, a]);
    store.release(c);
    assert_eq!(store.sweep_list(ds), vec![a]);
}

#[test]
fn foreign_elements_are_import_counted() {
    let (mut store, owner) = setup();
    let other = store.create_dataspace(0);
    let shared = store.create_array(owner, 0).unwrap();

    let holder = store.create_array(other, 2).unwrap();
    store.assign_element(&holder, &Value::int(0), &shared).unwrap();
    store.assign_element(&holder, &Value::int(1), &shared).unwrap();
    assert_eq!(store.import_count(other, &shared), 2);
    assert_eq!(store.import_count(owner, &shared), 0);

    store.assign_element(&holder, &Value::int(0), &Value::Nil).unwrap();
    assert_eq!(store.import_count(other, &shared), 1);

    store.release(holder);
    assert_eq!(store.import_count(other, &shared), 0);
    assert_eq!(store.refcount(&shared), 1);
}

#[test]
fn deep_equal_compares_structure() {
    let (mut store, ds) = setup();
    let a = int_array(&mut store, ds, &[1, 2]);
    let b = int_array(&mut store, ds, &[1, 2]);
    let c = int_array(&mut store, ds, &[1, 3]);
    let x = store.create_string("x");
    let y = store.create_string("x");

    assert!(store.deep_equal(&a, &b));
    assert!(!store.deep_equal(&a, &c));
    assert!(store.deep_equal(&x, &y));

    let outer_a = store.create_array_from(ds, &[a, x]).unwrap();
    let outer_b = store.create_array_from(ds, &[b, y]).unwrap();
    assert!(store.deep_equal(&outer_a, &outer_b));
    assert!(!store.deep_equal(&outer_a, &a));
}

#[test]
fn string_text_and_kind_errors() {
    let (mut store, _) = setup();
    let s = store.create_string("hello");
    assert_eq!(store.string_text(&s).unwrap(), "hello");
    assert!(matches!(
        store.string_text(&Value::int(1)),
        Err(StoreError::WrongKind { expected: "string", .. })
    ));
}
