// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Element residency and lazy scrubbing of destroyed objects.

use alloc::vec::Vec;

use crate::error::fatal;
use crate::heap::Elements;
use crate::host::{ObjectOracle, Persistence, Scheduler};
use crate::store::Store;
use crate::value::{ContainerId, Value};

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Fault a container's elements back in if they were evicted.
    pub(crate) fn ensure_resident(&mut self, id: ContainerId) {
        let (descriptor, len) = match &self.heap.get(id).elements {
            Elements::Evicted { descriptor, len } => (*descriptor, *len),
            Elements::Resident(_) => return,
        };
        let values = self.persistence.load_elements(descriptor);
        if values.len() != len {
            fatal(format_args!(
                "persistence returned {} elements for {id:?}, expected {len}",
                values.len()
            ));
        }
        tracing::trace!(container = ?id, len, "faulted container in");
        self.heap.get_mut(id).elements = Elements::Resident(values);
    }

    /// Whether the container has not been scrubbed since the last
    /// object destruction.
    pub(crate) fn needs_scrub(&self, id: ContainerId) -> bool {
        self.heap.get(id).scrub_epoch != self.objects.destruction_epoch()
    }

    /// Fault an array or record in and replace references to destroyed
    /// objects by nil.
    ///
    /// This is not a mutation in the transactional sense: no backup is
    /// taken, since a discard could only bring back dead references.
    pub(crate) fn scrub_sequence(&mut self, id: ContainerId) {
        self.ensure_resident(id);
        if !self.needs_scrub(id) {
            return;
        }

        let values = self.heap.get(id).values();
        let dead: Vec<(usize, Value)> = values
            .iter()
            .enumerate()
            .filter(|(_, value)| self.live_or_nil(value) != **value)
            .map(|(i, value)| (i, *value))
            .collect();

        let epoch = self.objects.destruction_epoch();
        let container = self.heap.get_mut(id);
        container.scrub_epoch = epoch;
        let owner = container.owner;
        let values = container.values_mut();
        for (i, _) in &dead {
            values[*i] = Value::Nil;
        }

        if !dead.is_empty() {
            tracing::trace!(container = ?id, scrubbed = dead.len(), "scrubbed destroyed objects");
        }
        let mut released = Vec::with_capacity(dead.len());
        for (_, value) in dead {
            self.unimport(owner, &value);
            released.push(value);
        }
        self.release_values(released);
    }

    /// Report a size divergence from the last saved size, once.
    pub(crate) fn note_size_change(&mut self, id: ContainerId) {
        let container = self.heap.get(id);
        let Some(saved) = container.saved_len else {
            return;
        };
        if container.size_reported || container.size() == saved {
            return;
        }
        self.heap.get_mut(id).size_reported = true;
        self.persistence.mark_size_changed(id);
    }
}
