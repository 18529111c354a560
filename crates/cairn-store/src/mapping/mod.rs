// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mappings: a sorted pair array plus a lazily merged hash overlay.
//!
//! A clean mapping keeps `key, value` pairs sorted by key. Inserting a key
//! that is not in the sorted array creates a [`HashOverlay`] and parks the
//! pair there; the mapping is dirty until [`Store::dehash`] merges the
//! overlay back in. While dirty, updates of keys that are in the sorted
//! array are parked in the overlay too, so the sorted array is only touched
//! by the merge.
//!
//! Every overlay entry owns a reference to its key and its value.


mod overlay;

pub use overlay::{HashOverlay, OverlayEntry};

use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::error::{Result, StoreError, fatal};
use crate::heap::Heap;
use crate::host::{ObjectOracle, Persistence, Scheduler};
use crate::store::Store;
use crate::value::order::{self, find_sorted};
use crate::value::{ContainerId, ContainerKind, Value};

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Resolve a mapping value.
    pub(crate) fn mapping_of(&self, value: &Value) -> Result<ContainerId> {
        match value {
            Value::Mapping(id) => Ok(*id),
            _ => Err(StoreError::WrongKind {
                expected: "mapping",
                found: value.type_name(),
            }),
        }
    }

    /// Value stored under `key`, retained, or nil when absent.
    pub fn map_get(&mut self, map: &Value, key: &Value) -> Result<Value> {
        let id = self.mapping_of(map)?;
        self.ensure_resident(id);
        let found = self.map_lookup(id, key);
        let value = self.live_or_nil(&found);
        self.retain(&value);
        Ok(value)
    }

    /// Whether `key` is present.
    pub fn map_contains(&mut self, map: &Value, key: &Value) -> Result<bool> {
        let id = self.mapping_of(map)?;
        self.ensure_resident(id);
        Ok(!self.map_lookup(id, key).is_nil())
    }

    /// Raw lookup of a resident mapping, overlay first.
    fn map_lookup(&self, id: ContainerId, key: &Value) -> Value {
        let heap = &self.heap;
        let container = heap.get(id);
        if let Some(overlay) = &container.overlay {
            let hash = order::hash_value(heap, key);
            if let Some(index) = overlay.find(heap, hash, key) {
                return overlay.entry(index).value;
            }
        }
        let values = container.values();
        match find_sorted(heap, values, 2, key) {
            Ok(i) => values[2 * i + 1],
            Err(_) => Value::Nil,
        }
    }

    /// Store `value` under `key`. A nil value deletes the key.
    pub(crate) fn map_assign(&mut self, id: ContainerId, key: &Value, value: &Value) -> Result<()> {
        if self.live_or_nil(key).is_nil() {
            return Err(StoreError::WrongKind {
                expected: "live key",
                found: key.type_name(),
            });
        }
        self.ensure_resident(id);
        let value = self.live_or_nil(value);
        let present = !self.map_lookup(id, key).is_nil();
        if value.is_nil() && !present {
            return Ok(());
        }
        if !present {
            let size = self.heap.get(id).size() + 1;
            if size > self.config().max_container_size {
                return Err(StoreError::ContainerTooLarge {
                    size,
                    max: self.config().max_container_size,
                });
            }
        }

        self.prepare_mutation(id);
        if value.is_nil() {
            self.map_delete(id, key);
        } else {
            self.map_insert(id, key, value);
        }
        self.note_size_change(id);
        Ok(())
    }

    fn map_insert(&mut self, id: ContainerId, key: &Value, value: Value) {
        let owner = self.heap.get(id).owner;
        let hash = order::hash_value(&self.heap, key);
        let (overlay_hit, sorted_hit, dirty) = self.locate(id, hash, key);
        self.hold(owner, &value);

        if let Some(index) = overlay_hit {
            let Some(overlay) = self.heap.get_mut(id).overlay.as_mut() else {
                fatal(format_args!("overlay vanished from {id:?}"));
            };
            let old = core::mem::replace(&mut overlay.entry_mut(index).value, value);
            self.unhold(owner, alloc::vec![old]);
            return;
        }

        match sorted_hit {
            Some(i) if !dirty => {
                let slot = &mut self.heap.get_mut(id).values_mut()[2 * i + 1];
                let old = core::mem::replace(slot, value);
                self.unhold(owner, alloc::vec![old]);
            }
            _ => {
                self.hold(owner, key);
                let buckets = self.config().initial_hash_buckets;
                let overlay = self
                    .heap
                    .get_mut(id)
                    .overlay
                    .get_or_insert_with(|| HashOverlay::with_buckets(buckets));
                overlay.insert(hash, sorted_hit.is_none(), *key, value);
            }
        }
    }

    fn map_delete(&mut self, id: ContainerId, key: &Value) {
        let owner = self.heap.get(id).owner;
        let hash = order::hash_value(&self.heap, key);
        let (overlay_hit, sorted_hit, _) = self.locate(id, hash, key);

        if let Some(index) = overlay_hit {
            let Some(overlay) = self.heap.get_mut(id).overlay.as_mut() else {
                fatal(format_args!("overlay vanished from {id:?}"));
            };
            let entry = overlay.remove(index);
            let no_additions = overlay.added() == 0;
            self.unhold(owner, alloc::vec![entry.key, entry.value]);
            if entry.added {
                if no_additions {
                    self.dehash_id(id, false);
                }
                return;
            }
        }

        let Some(i) = sorted_hit else {
            fatal(format_args!("deleting a key of {id:?} that is in neither array nor overlay"));
        };
        let pair: Vec<Value> = self.heap.get_mut(id).values_mut().drain(2 * i..2 * i + 2).collect();
        self.unhold(owner, pair);
    }

    /// Overlay entry, sorted pair index and dirtiness for `key`.
    fn locate(&self, id: ContainerId, hash: u32, key: &Value) -> (Option<u32>, Option<usize>, bool) {
        let heap = &self.heap;
        let container = heap.get(id);
        let overlay_hit = container
            .overlay
            .as_ref()
            .and_then(|overlay| overlay.find(heap, hash, key));
        let sorted_hit = find_sorted(heap, container.values(), 2, key).ok();
        (overlay_hit, sorted_hit, container.overlay.is_some())
    }

    /// Merge the hash overlay into the sorted array.
    ///
    /// With `compact`, pairs whose key or value is a destroyed object are
    /// dropped as well. The scan runs once per destruction epoch, so a
    /// second call without intervening changes does nothing.
    pub fn dehash(&mut self, map: &Value, compact: bool) -> Result<()> {
        let id = self.mapping_of(map)?;
        self.dehash_id(id, compact);
        Ok(())
    }

    pub(crate) fn dehash_id(&mut self, id: ContainerId, compact: bool) {
        self.ensure_resident(id);
        let owner = self.heap.get(id).owner;
        let mut released = Vec::new();

        if let Some(overlay) = self.heap.get_mut(id).overlay.take() {
            let mut added = Vec::with_capacity(overlay.added());
            let mut updates = 0usize;
            for entry in overlay.into_entries() {
                if entry.added {
                    added.push((entry.key, entry.value));
                    continue;
                }
                let Ok(i) = find_sorted(&self.heap, self.heap.get(id).values(), 2, &entry.key) else {
                    fatal(format_args!("pending update of {id:?} has no sorted key"));
                };
                let slot = &mut self.heap.get_mut(id).values_mut()[2 * i + 1];
                released.push(core::mem::replace(slot, entry.value));
                released.push(entry.key);
                updates += 1;
            }

            let heap = &self.heap;
            added.sort_by(|a, b| order::compare(heap, &a.0, &b.0));
            let merged = merge_pairs(heap, heap.get(id).values(), &added);
            tracing::trace!(container = ?id, added = added.len(), updates, "dehashed mapping");
            *self.heap.get_mut(id).values_mut() = merged;
        }

        if compact && self.needs_scrub(id) {
            let values = self.heap.get(id).values();
            let mut kept = Vec::with_capacity(values.len());
            for pair in values.chunks_exact(2) {
                let (key, value) = (pair[0], pair[1]);
                if self.live_or_nil(&key) == key && self.live_or_nil(&value) == value {
                    kept.push(key);
                    kept.push(value);
                } else {
                    released.push(key);
                    released.push(value);
                }
            }
            let epoch = self.objects.destruction_epoch();
            let container = self.heap.get_mut(id);
            container.scrub_epoch = epoch;
            if kept.len() != container.values().len() {
                tracing::trace!(
                    container = ?id,
                    dropped = (container.values().len() - kept.len()) / 2,
                    "compacted destroyed mapping entries"
                );
                *container.values_mut() = kept;
                self.note_size_change(id);
            }
        }

        if !released.is_empty() {
            self.unhold(owner, released);
        }
    }

    /// Number of entries, after compaction.
    pub fn map_size(&mut self, map: &Value) -> Result<usize> {
        let id = self.mapping_of(map)?;
        self.dehash_id(id, true);
        Ok(self.heap.get(id).size())
    }

    /// Sorted, compacted pairs of a mapping, without retaining them.
    fn compact_pairs(&mut self, map: &Value) -> Result<(ContainerId, Vec<Value>)> {
        let id = self.mapping_of(map)?;
        self.dehash_id(id, true);
        Ok((id, self.heap.get(id).values().to_vec()))
    }

    /// Array of the keys in order.
    pub fn map_indices(&mut self, map: &Value) -> Result<Value> {
        let (id, pairs) = self.compact_pairs(map)?;
        let keys: Vec<Value> = pairs.iter().step_by(2).copied().collect();
        self.new_from(id, ContainerKind::Array, &keys)
    }

    /// Array of the values in key order.
    pub fn map_values(&mut self, map: &Value) -> Result<Value> {
        let (id, pairs) = self.compact_pairs(map)?;
        let values: Vec<Value> = pairs.iter().skip(1).step_by(2).copied().collect();
        self.new_from(id, ContainerKind::Array, &values)
    }

    /// Mapping of the entries with `lo <= key <= hi`. A nil bound is open.
    pub fn map_range(&mut self, map: &Value, lo: &Value, hi: &Value) -> Result<Value> {
        let (id, pairs) = self.compact_pairs(map)?;
        let heap = &self.heap;
        let in_range: Vec<Value> = pairs
            .chunks_exact(2)
            .filter(|pair| {
                (lo.is_nil() || order::compare(heap, &pair[0], lo) != Ordering::Less)
                    && (hi.is_nil() || order::compare(heap, &pair[0], hi) != Ordering::Greater)
            })
            .flatten()
            .copied()
            .collect();
        self.new_from(id, ContainerKind::Mapping, &in_range)
    }

    /// Union of two mappings; on duplicate keys the right operand wins.
    pub fn map_concat(&mut self, a: &Value, b: &Value) -> Result<Value> {
        let (id, left) = self.compact_pairs(a)?;
        let (_, right) = self.compact_pairs(b)?;
        if right.is_empty() {
            return self.new_from(id, ContainerKind::Mapping, &left);
        }

        let heap = &self.heap;
        let mut merged: Vec<Value> = left
            .chunks_exact(2)
            .filter(|pair| find_sorted(heap, &right, 2, &pair[0]).is_err())
            .flatten()
            .copied()
            .collect();
        merged.extend_from_slice(&right);
        sort_pairs(heap, &mut merged);
        self.new_from(id, ContainerKind::Mapping, &merged)
    }

    /// Entries whose key is not an element of the array `keys`.
    pub fn map_subtract(&mut self, map: &Value, keys: &Value) -> Result<Value> {
        self.map_filter(map, keys, false)
    }

    /// Entries whose key is an element of the array `keys`.
    pub fn map_intersect(&mut self, map: &Value, keys: &Value) -> Result<Value> {
        self.map_filter(map, keys, true)
    }

    fn map_filter(&mut self, map: &Value, keys: &Value, keep_members: bool) -> Result<Value> {
        let (id, pairs) = self.compact_pairs(map)?;
        let keys = self.sorted_operand(keys)?;
        if keys.is_empty() || pairs.is_empty() {
            let kept = if keep_members { Vec::new() } else { pairs };
            return self.new_from(id, ContainerKind::Mapping, &kept);
        }

        let heap = &self.heap;
        let kept: Vec<Value> = pairs
            .chunks_exact(2)
            .filter(|pair| find_sorted(heap, &keys, 1, &pair[0]).is_ok() == keep_members)
            .flatten()
            .copied()
            .collect();
        self.new_from(id, ContainerKind::Mapping, &kept)
    }

    /// Allocate a container holding retained copies of `values`, owned by
    /// the owner of `source`.
    pub(crate) fn new_from(
        &mut self,
        source: ContainerId,
        kind: ContainerKind,
        values: &[Value],
    ) -> Result<Value> {
        let size = match kind {
            ContainerKind::Mapping => values.len() / 2,
            ContainerKind::Array | ContainerKind::Record(_) => values.len(),
        };
        self.check_alloc(size)?;
        let owner = self.heap.get(source).owner;
        let values = self.copy_values(values);
        Ok(self.alloc_container(owner, kind, values))
    }
}

/// Two-way merge of a sorted pair array with sorted `(key, value)` pairs.
fn merge_pairs(heap: &Heap, sorted: &[Value], added: &[(Value, Value)]) -> Vec<Value> {
    let mut out = Vec::with_capacity(sorted.len() + added.len() * 2);
    let mut left = sorted.chunks_exact(2).peekable();
    let mut right = added.iter().peekable();
    loop {
        match (left.peek(), right.peek()) {
            (Some(pair), Some((key, _))) => {
                if order::compare(heap, key, &pair[0]) == Ordering::Less {
                    if let Some((key, value)) = right.next() {
                        out.extend([*key, *value]);
                    }
                } else if let Some(pair) = left.next() {
                    out.extend_from_slice(pair);
                }
            }
            (Some(_), None) => {
                out.extend(left.flatten());
                break;
            }
            (None, Some(_)) => {
                out.extend(right.flat_map(|(key, value)| [*key, *value]));
                break;
            }
            (None, None) => break,
        }
    }
    out
}

/// Stable sort of a `key, value` pair array by key.
fn sort_pairs(heap: &Heap, values: &mut Vec<Value>) {
    let mut pairs: Vec<(Value, Value)> = values.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
    pairs.sort_by(|a, b| order::compare(heap, &a.0, &b.0));
    values.clear();
    values.extend(pairs.into_iter().flat_map(|(key, value)| [key, value]));
}
