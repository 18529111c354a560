// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for indexing, ranges and the array combinators.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use alloc::vec;
use alloc::vec::Vec;

use crate::error::StoreError;
use crate::store::store_test::{int_array, ints, setup};
use crate::value::{ContainerKind, Value};

#[test]
fn index_get_and_assign() {
    let (mut store, ds) = setup();
    let array = int_array(&mut store, ds, &[10, 20, 30]);
    assert_eq!(store.index_get(&array, &Value::int(1)).unwrap(), Value::int(20));

    store
        .assign_element(&array, &Value::int(1), &Value::int(21))
        .unwrap();
    assert_eq!(ints(&mut store, &array), vec![10, 21, 30]);
}

#[test]
fn index_out_of_range() {
    let (mut store, ds) = setup();
    let array = int_array(&mut store, ds, &[10, 20]);
    assert_eq!(
        store.index_get(&array, &Value::int(2)).unwrap_err(),
        StoreError::OutOfRange { index: 2, size: 2 }
    );
    assert_eq!(
        store
            .assign_element(&array, &Value::int(-1), &Value::int(0))
            .unwrap_err(),
        StoreError::OutOfRange { index: -1, size: 2 }
    );
    assert!(matches!(
        store.index_get(&array, &Value::float(1.0)),
        Err(StoreError::WrongKind { expected: "int", .. })
    ));
    assert!(matches!(
        store.index_get(&Value::int(3), &Value::int(0)),
        Err(StoreError::WrongKind { .. })
    ));
}

#[test]
fn index_get_retains_result() {
    let (mut store, ds) = setup();
    let inner = store.create_array(ds, 0).unwrap();
    let outer = store.create_array_from(ds, &[inner]).unwrap();
    store.release(inner);

    let got = store.index_get(&outer, &Value::int(0)).unwrap();
    assert_eq!(got, inner);
    assert_eq!(store.refcount(&inner), 2);
    store.release(got);
}

#[test]
fn records_index_like_arrays() {
    let (mut store, ds) = setup();
    let class = store.objects_mut().spawn();
    let record = store.create_record(ds, class, 2).unwrap();
    assert_eq!(store.record_class(&record).unwrap(), class);
    store
        .assign_element(&record, &Value::int(0), &Value::int(7))
        .unwrap();
    assert_eq!(store.index_get(&record, &Value::int(0)).unwrap(), Value::int(7));
}

#[test]
fn destroyed_elements_are_scrubbed_lazily() {
    let (mut store, ds) = setup();
    let obj = store.objects_mut().spawn();
    let array = store
        .create_array_from(ds, &[Value::object(obj), Value::int(1)])
        .unwrap();
    store.objects_mut().destroy(obj);

    assert_eq!(store.index_get(&array, &Value::int(0)).unwrap(), Value::Nil);
    let id = array.container_id().unwrap();
    assert_eq!(store.heap.get(id).values()[0], Value::Nil);
    assert_eq!(
        store.heap.get(id).scrub_epoch,
        crate::ObjectOracle::destruction_epoch(store.objects())
    );
}

#[test]
fn range_boundaries() {
    let (mut store, ds) = setup();
    let array = int_array(&mut store, ds, &[1, 2, 3, 4]);

    let middle = store.range(&array, 1, 2).unwrap();
    assert_eq!(ints(&mut store, &middle), vec![2, 3]);

    let empty = store.range(&array, 4, 3).unwrap();
    assert!(ints(&mut store, &empty).is_empty());

    let whole = store.range(&array, 0, 3).unwrap();
    assert_eq!(ints(&mut store, &whole), vec![1, 2, 3, 4]);

    let err = store.range(&array, -1, 0).unwrap_err();
    assert!(err.is_argument_error());
    assert!(matches!(err, StoreError::BadRange { lo: -1, hi: 0, size: 4 }));
    assert!(store.range(&array, 2, 0).is_err());
    assert!(store.range(&array, 0, 4).is_err());
}

#[test]
fn concat_appends() {
    let (mut store, ds) = setup();
    let a = int_array(&mut store, ds, &[1, 2]);
    let b = int_array(&mut store, ds, &[2, 3]);
    let c = store.concat(&a, &b).unwrap();
    assert_eq!(ints(&mut store, &c), vec![1, 2, 2, 3]);
    assert_ne!(c, a);
}

#[test]
fn subtract_and_intersect_scenario() {
    let (mut store, ds) = setup();
    let a = int_array(&mut store, ds, &[10, 20, 30]);
    let b = int_array(&mut store, ds, &[20]);
    let diff = store.subtract(&a, &b).unwrap();
    assert_eq!(ints(&mut store, &diff), vec![10, 30]);

    let c = int_array(&mut store, ds, &[20, 40]);
    let common = store.intersect(&a, &c).unwrap();
    assert_eq!(ints(&mut store, &common), vec![20]);
}

#[test]
fn subtract_keeps_order_and_duplicates() {
    let (mut store, ds) = setup();
    let a = int_array(&mut store, ds, &[5, 1, 5, 3, 1]);
    let b = int_array(&mut store, ds, &[3]);
    let diff = store.subtract(&a, &b).unwrap();
    assert_eq!(ints(&mut store, &diff), vec![5, 1, 5, 1]);
}

#[test]
fn union_takes_new_elements_once() {
    let (mut store, ds) = setup();
    let a = int_array(&mut store, ds, &[3, 1]);
    let b = int_array(&mut store, ds, &[2, 1, 2, 4]);
    let union = store.union_as_set(&a, &b).unwrap();
    assert_eq!(ints(&mut store, &union), vec![3, 1, 2, 4]);
}

#[test]
fn symmetric_difference_both_sides() {
    let (mut store, ds) = setup();
    let a = int_array(&mut store, ds, &[1, 2, 3]);
    let b = int_array(&mut store, ds, &[3, 4]);
    let sym = store.symmetric_difference(&a, &b).unwrap();
    assert_eq!(ints(&mut store, &sym), vec![1, 2, 4]);
}

#[test]
fn empty_operands() {
    let (mut store, ds) = setup();
    let a = int_array(&mut store, ds, &[1, 2]);
    let empty = int_array(&mut store, ds, &[]);

    let diff = store.subtract(&a, &empty).unwrap();
    assert_eq!(ints(&mut store, &diff), vec![1, 2]);
    let common = store.intersect(&a, &empty).unwrap();
    assert!(ints(&mut store, &common).is_empty());
    let union = store.union_as_set(&empty, &a).unwrap();
    assert_eq!(ints(&mut store, &union), vec![1, 2]);
    let from_empty = store.subtract(&empty, &a).unwrap();
    assert!(ints(&mut store, &from_empty).is_empty());
}

#[test]
fn combinators_separate_tag_collisions() {
    let (mut store, ds) = setup();
    let first = store
        .restore_container(ds, ContainerKind::Array, 77, &[])
        .unwrap();
    let second = store
        .restore_container(ds, ContainerKind::Array, 77, &[])
        .unwrap();
    let third = store
        .restore_container(ds, ContainerKind::Array, 77, &[])
        .unwrap();
    assert_eq!(store.tag(&first).unwrap(), store.tag(&second).unwrap());

    let a = store.create_array_from(ds, &[first, second, third]).unwrap();
    let b = store.create_array_from(ds, &[third, first]).unwrap();

    let diff = store.subtract(&a, &b).unwrap();
    assert_eq!(store.elements(&diff).unwrap(), vec![second]);
    let common = store.intersect(&a, &b).unwrap();
    assert_eq!(store.elements(&common).unwrap(), vec![first, third]);
}

#[test]
fn combinator_results_belong_to_first_operand() {
    let (mut store, ds) = setup();
    let other = store.create_dataspace(0);
    let a = int_array(&mut store, ds, &[1]);
    let b = store.create_array_from(other, &[Value::int(2)]).unwrap();
    let c = store.concat(&a, &b).unwrap();
    assert_eq!(store.owner(&c).unwrap(), ds);
}

#[test]
fn combinators_reject_mappings() {
    let (mut store, ds) = setup();
    let a = int_array(&mut store, ds, &[1]);
    let map = store.create_map(ds, 0).unwrap();
    assert!(matches!(
        store.concat(&a, &map),
        Err(StoreError::WrongKind { expected: "array", .. })
    ));
}

#[test]
fn combinator_size_is_checked_before_allocation() {
    let mut store = crate::host::mock::MockStore::mock_with(
        crate::StoreConfig::new().with_max_container_size(3),
    );
    let ds = store.create_dataspace(0);
    let values: Vec<Value> = (0..3).map(Value::int).collect();
    let a = store.create_array_from(ds, &values).unwrap();
    let before = store.stats();
    assert!(matches!(
        store.concat(&a, &a),
        Err(StoreError::ContainerTooLarge { size: 6, max: 3 })
    ));
    assert_eq!(store.stats(), before);
}
