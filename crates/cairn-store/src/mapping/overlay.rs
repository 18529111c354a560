// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Open-chained hash overlay for mapping mutations.
//!
//! Entries live in a slab; buckets hold the head of each chain and entries
//! link to the next entry of their chain. `added` entries are keys missing
//! from the mapping's sorted array; the others carry a new value for a key
//! that is already there.
//!
//! ```text
//! buckets: [ 3 ][ - ][ 0 ][ - ]
//!            │         │
//!            ▼         ▼
//! entries:  [3]──►[1]  [0]
//! ```

use alloc::vec;
use alloc::vec::Vec;

use crate::heap::Heap;
use crate::value::Value;
use crate::value::order::same_value;

/// Smallest bucket count an overlay is created with.
const MIN_BUCKETS: usize = 4;

/// A pending mapping entry.
#[derive(Clone, Copy, Debug)]
pub struct OverlayEntry {
    /// Hash of the key.
    pub hash: u32,
    /// Whether the key is absent from the sorted array.
    pub added: bool,
    /// The key.
    pub key: Value,
    /// The pending value.
    pub value: Value,
    next: Option<u32>,
}

/// Hash table of pending mapping entries.
#[derive(Debug)]
pub struct HashOverlay {
    buckets: Vec<Option<u32>>,
    entries: Vec<Option<OverlayEntry>>,
    free: Vec<u32>,
    len: usize,
    added: usize,
}

impl HashOverlay {
    /// Create an empty overlay with at least `buckets` buckets.
    #[must_use]
    pub fn with_buckets(buckets: usize) -> Self {
        let buckets = buckets.max(MIN_BUCKETS).next_power_of_two();
        Self {
            buckets: vec![None; buckets],
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
            added: 0,
        }
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of `added` entries.
    #[must_use]
    pub const fn added(&self) -> usize {
        self.added
    }

    /// Number of buckets.
    #[must_use]
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Find the entry for `key`.
    #[must_use]
    pub fn find(&self, heap: &Heap, hash: u32, key: &Value) -> Option<u32> {
        let mut cursor = self.buckets[self.bucket(hash)];
        while let Some(index) = cursor {
            let entry = self.entry(index);
            if entry.hash == hash && same_value(heap, &entry.key, key) {
                return Some(index);
            }
            cursor = entry.next;
        }
        None
    }

    /// An entry by slab index.
    #[must_use]
    pub fn entry(&self, index: u32) -> &OverlayEntry {
        match self.entries.get(index as usize) {
            Some(Some(entry)) => entry,
            _ => crate::error::fatal(format_args!("dangling overlay entry {index}")),
        }
    }

    /// An entry by slab index, mutably.
    pub fn entry_mut(&mut self, index: u32) -> &mut OverlayEntry {
        match self.entries.get_mut(index as usize) {
            Some(Some(entry)) => entry,
            _ => crate::error::fatal(format_args!("dangling overlay entry {index}")),
        }
    }

    /// Insert an entry for a key that is not in the overlay yet.
    pub fn insert(&mut self, hash: u32, added: bool, key: Value, value: Value) -> u32 {
        if (self.len + 1) * 4 > self.buckets.len() * 3 {
            self.grow();
        }

        let bucket = self.bucket(hash);
        let entry = OverlayEntry {
            hash,
            added,
            key,
            value,
            next: self.buckets[bucket],
        };
        let index = if let Some(index) = self.free.pop() {
            self.entries[index as usize] = Some(entry);
            index
        } else {
            let index = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
            self.entries.push(Some(entry));
            index
        };
        self.buckets[bucket] = Some(index);
        self.len += 1;
        if added {
            self.added += 1;
        }
        index
    }

    /// Unlink and return an entry.
    pub fn remove(&mut self, index: u32) -> OverlayEntry {
        let entry = *self.entry(index);
        let bucket = self.bucket(entry.hash);

        if self.buckets[bucket] == Some(index) {
            self.buckets[bucket] = entry.next;
        } else {
            let mut cursor = self.buckets[bucket];
            while let Some(prev) = cursor {
                let prev_entry = self.entry_mut(prev);
                if prev_entry.next == Some(index) {
                    prev_entry.next = entry.next;
                    break;
                }
                cursor = prev_entry.next;
            }
        }

        self.entries[index as usize] = None;
        self.free.push(index);
        self.len -= 1;
        if entry.added {
            self.added -= 1;
        }
        entry
    }

    /// Double the bucket count and rehash every chain.
    pub fn grow(&mut self) {
        let buckets = self.buckets.len() * 2;
        tracing::trace!(from = self.buckets.len(), to = buckets, "growing mapping overlay");
        self.buckets = vec![None; buckets];
        for index in 0..self.entries.len() {
            let Some(hash) = self.entries[index].as_ref().map(|entry| entry.hash) else {
                continue;
            };
            let bucket = self.bucket(hash);
            let head = self.buckets[bucket];
            if let Some(entry) = self.entries[index].as_mut() {
                entry.next = head;
            }
            self.buckets[bucket] = Some(index as u32);
        }
    }

    /// Live entries in slab order.
    pub fn iter(&self) -> impl Iterator<Item = &OverlayEntry> {
        self.entries.iter().flatten()
    }

    /// Consume the overlay, yielding its live entries in slab order.
    #[must_use]
    pub fn into_entries(self) -> Vec<OverlayEntry> {
        self.entries.into_iter().flatten().collect()
    }

    fn bucket(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }
}
