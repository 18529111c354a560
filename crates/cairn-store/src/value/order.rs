// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Total order, identity and hashing over values.
//!
//! Values order first by kind, then by a kind-specific key: integer value,
//! float bit order, string contents, object table index, container identity
//! tag. Two distinct containers may carry the same tag after being reloaded
//! from storage, so "compares equal" and "is the same value" differ for
//! containers and every search falls back to a short linear probe.

use core::cmp::Ordering;

use crate::heap::Heap;
use crate::value::Value;

/// Compare two values in the total order.
#[must_use]
pub(crate) fn compare(heap: &Heap, a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Nil, Value::Nil) => Ordering::Equal,
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.to_f64().total_cmp(&y.to_f64()),
        (Value::String(x), Value::String(y)) => {
            if x == y {
                Ordering::Equal
            } else {
                heap.strings.text(*x).cmp(heap.strings.text(*y))
            }
        }
        (Value::Object(x), Value::Object(y)) => x.index.cmp(&y.index),
        (Value::Array(x), Value::Array(y))
        | (Value::Mapping(x), Value::Mapping(y))
        | (Value::Record(x), Value::Record(y)) => heap.get(*x).tag.cmp(&heap.get(*y).tag),
        _ => a.kind_rank().cmp(&b.kind_rank()),
    }
}

/// Whether two values are the same value, not merely equal in the order.
#[must_use]
pub(crate) fn same_value(heap: &Heap, a: &Value, b: &Value) -> bool {
    match (a.container_id(), b.container_id()) {
        (Some(x), Some(y)) => x == y && a.kind_rank() == b.kind_rank(),
        (None, None) => match (a, b) {
            (Value::Object(x), Value::Object(y)) => x == y,
            _ => compare(heap, a, b) == Ordering::Equal,
        },
        _ => false,
    }
}

/// Kind-specific hash used by the mapping overlay.
#[must_use]
pub(crate) fn hash_value(heap: &Heap, v: &Value) -> u32 {
    match v {
        Value::Nil => 0,
        Value::Int(n) => fold64(*n as u64),
        Value::Float(x) => fold64(x.bits()).rotate_left(7),
        Value::String(id) => {
            let text = heap.strings.text(*id);
            hash_bytes(text.as_bytes()) ^ text.len() as u32
        }
        Value::Object(obj) => obj.index,
        Value::Array(id) | Value::Mapping(id) | Value::Record(id) => {
            id.as_u32().wrapping_mul(0x9E37_79B1)
        }
    }
}

const fn fold64(bits: u64) -> u32 {
    (bits ^ (bits >> 32)) as u32
}

/// FNV-1a over the string contents.
fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811C_9DC5;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Binary search a sorted run of entries for `key`.
///
/// `elements` holds entries of `stride` values each, ordered by their first
/// value. Returns `Ok(position)` of the matching entry or `Err(position)`
/// where it would be inserted. A hit on an equal-but-not-same container is
/// followed by a linear probe in both directions over the equal run.
#[must_use]
pub(crate) fn find_sorted(
    heap: &Heap,
    elements: &[Value],
    stride: usize,
    key: &Value,
) -> core::result::Result<usize, usize> {
    let entries = elements.len() / stride;
    let mut lo = 0;
    let mut hi = entries;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let probe = &elements[mid * stride];
        match compare(heap, key, probe) {
            Ordering::Less => hi = mid,
            Ordering::Greater => lo = mid + 1,
            Ordering::Equal => return probe_equal_run(heap, elements, stride, key, mid),
        }
    }
    Err(lo)
}

fn probe_equal_run(
    heap: &Heap,
    elements: &[Value],
    stride: usize,
    key: &Value,
    mid: usize,
) -> core::result::Result<usize, usize> {
    if same_value(heap, key, &elements[mid * stride]) {
        return Ok(mid);
    }

    let mut i = mid;
    while i > 0 {
        i -= 1;
        let probe = &elements[i * stride];
        if compare(heap, key, probe) != Ordering::Equal {
            break;
        }
        if same_value(heap, key, probe) {
            return Ok(i);
        }
    }

    let entries = elements.len() / stride;
    let mut i = mid + 1;
    while i < entries {
        let probe = &elements[i * stride];
        if compare(heap, key, probe) != Ordering::Equal {
            break;
        }
        if same_value(heap, key, probe) {
            return Ok(i);
        }
        i += 1;
    }

    Err(mid)
}

/// Sort values in the total order (stable, so equal tags keep their order).
pub(crate) fn sort_values(heap: &Heap, values: &mut [Value]) {
    values.sort_by(|a, b| compare(heap, a, b));
}
