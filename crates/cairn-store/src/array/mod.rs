// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Indexing and the functional array combinators.
//!
//! Two families of operations live here. The combinators (`concat`,
//! `subtract`, `intersect`, `union_as_set`, `symmetric_difference`,
//! `range`) never touch their operands and always allocate a result owned
//! by the first operand's dataspace. [`Store::assign_element`] mutates in
//! place and always goes through the plane protocol first.
//!
//! Membership tests sort a copy of the right operand once and binary search
//! it, so every combinator is `O(n log n)`.

#[cfg(test)]
mod array_test;

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{Result, StoreError};
use crate::host::{ObjectOracle, Persistence, Scheduler};
use crate::store::Store;
use crate::value::order::{find_sorted, sort_values};
use crate::value::{ContainerId, ContainerKind, Value};

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Read an element (arrays and records) or a key (mappings).
    ///
    /// The result is retained; the caller owns it.
    pub fn index_get(&mut self, container: &Value, key: &Value) -> Result<Value> {
        match container {
            Value::Mapping(_) => self.map_get(container, key),
            Value::Array(id) | Value::Record(id) => {
                let id = *id;
                self.scrub_sequence(id);
                let index = self.check_index(id, key)?;
                let value = self.heap.get(id).values()[index];
                self.retain(&value);
                Ok(value)
            }
            _ => Err(StoreError::WrongKind {
                expected: "container",
                found: container.type_name(),
            }),
        }
    }

    /// Overwrite an element or key in place.
    ///
    /// All arguments are checked before anything is backed up or changed.
    /// Assigning nil to a mapping key removes it.
    pub fn assign_element(&mut self, container: &Value, key: &Value, value: &Value) -> Result<()> {
        match container {
            Value::Mapping(id) => self.map_assign(*id, key, value),
            Value::Array(id) | Value::Record(id) => {
                let id = *id;
                self.ensure_resident(id);
                let index = self.check_index(id, key)?;
                self.prepare_mutation(id);
                self.put_element(id, index, value);
                Ok(())
            }
            _ => Err(StoreError::WrongKind {
                expected: "container",
                found: container.type_name(),
            }),
        }
    }

    fn check_index(&self, id: ContainerId, key: &Value) -> Result<usize> {
        let Value::Int(index) = *key else {
            return Err(StoreError::WrongKind {
                expected: "int",
                found: key.type_name(),
            });
        };
        let size = self.heap.get(id).size();
        match usize::try_from(index) {
            Ok(i) if i < size => Ok(i),
            _ => Err(StoreError::OutOfRange { index, size }),
        }
    }

    fn put_element(&mut self, id: ContainerId, index: usize, value: &Value) {
        let owner = self.heap.get(id).owner;
        let value = self.live_or_nil(value);
        self.hold(owner, &value);
        let old = core::mem::replace(&mut self.heap.get_mut(id).values_mut()[index], value);
        self.unhold(owner, vec![old]);
    }

    /// New array with the elements `lo..=hi`.
    ///
    /// Requires `0 <= lo <= hi + 1 <= size`; `lo == hi + 1` yields an
    /// empty array.
    pub fn range(&mut self, container: &Value, lo: i64, hi: i64) -> Result<Value> {
        let (id, values) = self.sequence(container)?;
        let size = values.len();
        let bad = StoreError::BadRange { lo, hi, size };
        let start = usize::try_from(lo).map_err(|_| bad)?;
        let end = hi
            .checked_add(1)
            .and_then(|end| usize::try_from(end).ok())
            .ok_or(bad)?;
        if start > end || end > size {
            return Err(bad);
        }
        self.new_from(id, ContainerKind::Array, &values[start..end])
    }

    /// `a` followed by `b`.
    pub fn concat(&mut self, a: &Value, b: &Value) -> Result<Value> {
        let (id, mut left) = self.sequence(a)?;
        let (_, right) = self.sequence(b)?;
        left.extend_from_slice(&right);
        self.new_from(id, ContainerKind::Array, &left)
    }

    /// Elements of `a` not in `b`, in `a`'s order, duplicates kept.
    pub fn subtract(&mut self, a: &Value, b: &Value) -> Result<Value> {
        let (id, left) = self.sequence(a)?;
        let right = self.sorted_operand(b)?;
        let kept = self.members(&left, &right, false);
        self.new_from(id, ContainerKind::Array, &kept)
    }

    /// Elements of `a` also in `b`, in `a`'s order, duplicates kept.
    pub fn intersect(&mut self, a: &Value, b: &Value) -> Result<Value> {
        let (id, left) = self.sequence(a)?;
        let right = self.sorted_operand(b)?;
        let kept = self.members(&left, &right, true);
        self.new_from(id, ContainerKind::Array, &kept)
    }

    /// `a` followed by each element of `b` that is not in `a`, taken once.
    pub fn union_as_set(&mut self, a: &Value, b: &Value) -> Result<Value> {
        let (id, mut left) = self.sequence(a)?;
        let (_, right) = self.sequence(b)?;
        if !right.is_empty() {
            let extra = self.missing_once(&left, &right);
            left.extend(extra);
        }
        self.new_from(id, ContainerKind::Array, &left)
    }

    /// Elements of `a` not in `b`, followed by elements of `b` not in `a`.
    pub fn symmetric_difference(&mut self, a: &Value, b: &Value) -> Result<Value> {
        let (id, left) = self.sequence(a)?;
        let (_, right) = self.sequence(b)?;
        let mut sorted_left = left.clone();
        sort_values(&self.heap, &mut sorted_left);
        let mut sorted_right = right.clone();
        sort_values(&self.heap, &mut sorted_right);

        let mut out = self.members(&left, &sorted_right, false);
        out.extend(self.members(&right, &sorted_left, false));
        self.new_from(id, ContainerKind::Array, &out)
    }

    /// Elements of `values` whose membership in `sorted` equals `keep`.
    fn members(&self, values: &[Value], sorted: &[Value], keep: bool) -> Vec<Value> {
        if sorted.is_empty() {
            return if keep { Vec::new() } else { values.to_vec() };
        }
        values
            .iter()
            .filter(|value| find_sorted(&self.heap, sorted, 1, value).is_ok() == keep)
            .copied()
            .collect()
    }

    /// Elements of `right` not in `left`, each distinct value once, in
    /// `right`'s order.
    fn missing_once(&self, left: &[Value], right: &[Value]) -> Vec<Value> {
        let mut sorted_left = left.to_vec();
        sort_values(&self.heap, &mut sorted_left);
        let mut sorted_right = right.to_vec();
        sort_values(&self.heap, &mut sorted_right);

        let mut emitted = vec![false; sorted_right.len()];
        let mut out = Vec::new();
        for value in right {
            if !sorted_left.is_empty() && find_sorted(&self.heap, &sorted_left, 1, value).is_ok() {
                continue;
            }
            if let Ok(slot) = find_sorted(&self.heap, &sorted_right, 1, value) {
                if !emitted[slot] {
                    emitted[slot] = true;
                    out.push(*value);
                }
            }
        }
        out
    }

    /// Resolve an array operand and view its scrubbed elements.
    fn sequence(&mut self, value: &Value) -> Result<(ContainerId, Vec<Value>)> {
        let Value::Array(id) = *value else {
            return Err(StoreError::WrongKind {
                expected: "array",
                found: value.type_name(),
            });
        };
        self.scrub_sequence(id);
        Ok((id, self.heap.get(id).values().to_vec()))
    }

    /// Sorted view of an array operand's elements.
    pub(crate) fn sorted_operand(&mut self, value: &Value) -> Result<Vec<Value>> {
        let (_, mut values) = self.sequence(value)?;
        sort_values(&self.heap, &mut values);
        Ok(values)
    }
}
