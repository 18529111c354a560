// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Eviction of container elements to the persistence layer.
//!
//! Only committed state is ever handed out, so eviction is refused while an
//! atomic region is active. Evicted containers keep their slot, refcount
//! and tag; the next access faults the elements back in.

use alloc::vec::Vec;

use crate::error::{Result, StoreError};
use crate::heap::Elements;
use crate::host::{ObjectOracle, Persistence, Scheduler};
use crate::store::Store;
use crate::value::{ContainerId, DataspaceId, Value};

/// Outcome of [`Store::evict_dataspace`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictReport {
    /// Containers whose elements were handed to persistence.
    pub evicted: usize,
    /// Imported containers whose ownership moved to the evicted dataspace.
    pub rehomed: usize,
    /// Imported containers also referenced from elsewhere, left resident.
    pub shared: Vec<Value>,
}

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Hand a container's elements to the persistence layer.
    ///
    /// Returns whether anything was evicted; an already evicted container is
    /// left alone.
    pub fn evict_container(&mut self, container: &Value) -> Result<bool> {
        let id = self.container_of(container, "container")?;
        if !self.planes.is_empty() {
            return Err(StoreError::PlaneActive);
        }
        Ok(self.evict_id(id))
    }

    fn evict_id(&mut self, id: ContainerId) -> bool {
        if !self.heap.get(id).is_resident() {
            return false;
        }
        if self.heap.get(id).overlay.is_some() {
            self.dehash_id(id, false);
        }

        let container = self.heap.get_mut(id);
        let size = container.size();
        let values = core::mem::take(container.values_mut());
        let len = values.len();
        let descriptor = self.persistence.store_elements(id, values);

        let container = self.heap.get_mut(id);
        container.elements = Elements::Evicted { descriptor, len };
        container.saved_len = Some(size);
        container.size_reported = false;
        tracing::trace!(container = ?id, len, "evicted container");
        true
    }

    /// Evict every container a dataspace owns.
    ///
    /// Imported containers that only this dataspace references are first
    /// transferred to it and evicted along with its own. Shared ones stay
    /// resident and are listed in the report.
    pub fn evict_dataspace(&mut self, ds: DataspaceId) -> Result<EvictReport> {
        self.check_dataspace(ds)?;
        if !self.planes.is_empty() {
            return Err(StoreError::PlaneActive);
        }

        let mut report = EvictReport::default();
        loop {
            let exclusive: Vec<ContainerId> = self.dataspaces[ds.index()]
                .imports
                .iter()
                .filter(|(id, count)| self.heap.get(**id).refcount == **count)
                .map(|(id, _)| *id)
                .collect();
            if exclusive.is_empty() {
                break;
            }
            for id in exclusive {
                self.transfer(id, ds);
                report.rehomed += 1;
            }
        }
        report.shared = self.dataspaces[ds.index()]
            .imports
            .keys()
            .map(|id| Value::container(self.heap.get(*id).kind, *id))
            .collect();

        let mut cursor = self.dataspaces[ds.index()].head;
        while let Some(id) = cursor {
            cursor = self.heap.get(id).next;
            if self.evict_id(id) {
                report.evicted += 1;
            }
        }

        tracing::debug!(
            dataspace = ?ds,
            evicted = report.evicted,
            rehomed = report.rehomed,
            shared = report.shared.len(),
            "evicted dataspace"
        );
        Ok(report)
    }

    /// Move a container to another dataspace's sweep list, moving the
    /// import counts of its elements along.
    fn transfer(&mut self, id: ContainerId, to: DataspaceId) {
        self.ensure_resident(id);
        let container = self.heap.get(id);
        let from = container.owner;
        let mut children = container.values().to_vec();
        if let Some(overlay) = &container.overlay {
            for entry in overlay.iter() {
                children.push(entry.key);
                children.push(entry.value);
            }
        }

        for child in &children {
            self.unimport(from, child);
        }
        self.unlink(id);
        self.link(to, id);
        self.dataspaces[to.index()].imports.remove(&id);
        for child in &children {
            self.import(to, child);
        }
        tracing::trace!(container = ?id, from = ?from, to = ?to, "transferred container");
    }
}
