// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared test infrastructure for integration tests.
//!
//! This module provides:
//! - [`fresh_store`] - A mock store with one dataspace
//! - [`int_array`], [`int_map`] - Builders for integer containers
//! - [`ints`], [`int_pairs`] - Readers back into plain integers
//!
//! # Design
//!
//! This module is **not** a test file, so it must comply with full clippy rules.
//! Test-specific allowances (like `unwrap_used`) are only permitted in `*_test.rs` files.

#![allow(dead_code, reason = "not every test file uses every helper")]

use cairn_store::host::mock::MockStore;
use cairn_store::{DataspaceId, Result, StoreError, Value};

/// Route store logging to the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    // An earlier test may already have installed one.
    let _installed = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .is_ok();
}

/// A mock store with default limits and one dataspace of `nvars` variables.
#[must_use]
pub fn fresh_store(nvars: usize) -> (MockStore, DataspaceId) {
    init_tracing();
    let mut store = MockStore::mock();
    let ds = store.create_dataspace(nvars);
    (store, ds)
}

/// An array of integers owned by `ds`.
pub fn int_array(store: &mut MockStore, ds: DataspaceId, values: &[i64]) -> Result<Value> {
    let values: Vec<Value> = values.iter().copied().map(Value::int).collect();
    store.create_array_from(ds, &values)
}

/// A mapping built by assigning `pairs` one by one.
pub fn int_map(store: &mut MockStore, ds: DataspaceId, pairs: &[(i64, i64)]) -> Result<Value> {
    let map = store.create_map(ds, 0)?;
    for (key, value) in pairs {
        store.assign_element(&map, &Value::int(*key), &Value::int(*value))?;
    }
    Ok(map)
}

/// The integer elements of an array.
pub fn ints(store: &mut MockStore, array: &Value) -> Result<Vec<i64>> {
    store
        .elements(array)?
        .into_iter()
        .map(|value| match value {
            Value::Int(n) => Ok(n),
            other => Err(StoreError::WrongKind {
                expected: "int",
                found: other.type_name(),
            }),
        })
        .collect()
}

/// The integer `key, value` pairs of a mapping, in key order.
pub fn int_pairs(store: &mut MockStore, map: &Value) -> Result<Vec<(i64, i64)>> {
    let flat = ints(store, map)?;
    Ok(flat.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
}
