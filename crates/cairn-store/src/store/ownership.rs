// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Reference counting, import counts and sweep lists.
//!
//! Releasing the last reference to a container frees it and releases its
//! contents. That cascade runs on an explicit work list so deeply nested
//! structures cannot exhaust the native stack.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::fatal;
use crate::heap::Elements;
use crate::host::{ObjectOracle, Persistence, Scheduler};
use crate::store::Store;
use crate::value::{ContainerId, ContainerKind, DataspaceId, Value};

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Take an additional reference to a string or container.
    pub fn retain(&mut self, value: &Value) {
        match value {
            Value::String(id) => self.heap.strings.retain(*id),
            Value::Array(id) | Value::Mapping(id) | Value::Record(id) => {
                let container = self.heap.get_mut(*id);
                container.refcount = container.refcount.saturating_add(1);
            }
            _ => {}
        }
    }

    /// Drop a reference, freeing the target when it was the last one.
    pub fn release(&mut self, value: Value) {
        if value.is_counted() {
            self.release_values(vec![value]);
        }
    }

    /// Drop one reference for every value in `work`.
    pub(crate) fn release_values(&mut self, mut work: Vec<Value>) {
        while let Some(value) = work.pop() {
            match value {
                Value::String(id) => {
                    if self.heap.strings.release(id) {
                        for plane in &mut self.planes {
                            plane.strings.remove(&id);
                        }
                    }
                }
                Value::Array(id) | Value::Mapping(id) | Value::Record(id) => {
                    let container = self.heap.get_mut(id);
                    if container.refcount == 0 {
                        fatal(format_args!("releasing container {id:?} with no references"));
                    }
                    container.refcount -= 1;
                    if container.refcount == 0 {
                        let children = self.free_container(id);
                        work.extend(children);
                    }
                }
                _ => {}
            }
        }
    }

    /// Remove a container whose last reference is gone, returning the
    /// values it held. Their references now belong to the caller.
    fn free_container(&mut self, id: ContainerId) -> Vec<Value> {
        self.unlink(id);
        for plane in &mut self.planes {
            plane.containers.remove(&id);
        }

        let container = self.heap.remove(id);
        let owner = container.owner;
        let mut children = match container.elements {
            Elements::Resident(values) => values,
            Elements::Evicted { descriptor, .. } => self.persistence.load_elements(descriptor),
        };
        if let Some(overlay) = container.overlay {
            for entry in overlay.into_entries() {
                children.push(entry.key);
                children.push(entry.value);
            }
        }
        for child in &children {
            self.unimport(owner, child);
        }
        tracing::trace!(container = ?id, children = children.len(), "freed container");
        children
    }

    /// Retained copies of `values`.
    ///
    /// References to destroyed objects, and records of destroyed classes,
    /// are replaced by nil.
    pub fn copy_values(&mut self, values: &[Value]) -> Vec<Value> {
        let copies: Vec<Value> = values.iter().map(|value| self.live_or_nil(value)).collect();
        for value in &copies {
            self.retain(value);
        }
        copies
    }

    /// `value`, or nil when it refers to something destroyed.
    pub(crate) fn live_or_nil(&self, value: &Value) -> Value {
        match value {
            Value::Object(obj) if self.objects.is_destroyed(*obj) => Value::Nil,
            Value::Record(id) => match self.heap.get(*id).kind {
                ContainerKind::Record(class) if self.objects.is_destroyed(class) => Value::Nil,
                _ => *value,
            },
            _ => *value,
        }
    }

    /// Take a reference to `value` on behalf of a slot owned by `ds`.
    pub(crate) fn hold(&mut self, ds: DataspaceId, value: &Value) {
        self.retain(value);
        self.import(ds, value);
    }

    /// Give up references held by slots owned by `ds`.
    pub(crate) fn unhold(&mut self, ds: DataspaceId, values: Vec<Value>) {
        for value in &values {
            self.unimport(ds, value);
        }
        self.release_values(values);
    }

    /// Count `value` as held by `ds` when it is a foreign container.
    pub(crate) fn import(&mut self, ds: DataspaceId, value: &Value) {
        let Some(id) = value.container_id() else {
            return;
        };
        if self.heap.get(id).owner == ds {
            return;
        }
        if let Some(dataspace) = self.dataspaces.get_mut(ds.index()) {
            *dataspace.imports.entry(id).or_insert(0) += 1;
        }
    }

    /// Undo one [`import`](Self::import) of `value` by `ds`.
    pub(crate) fn unimport(&mut self, ds: DataspaceId, value: &Value) {
        let Some(id) = value.container_id() else {
            return;
        };
        if self.heap.get(id).owner == ds {
            return;
        }
        let Some(dataspace) = self.dataspaces.get_mut(ds.index()) else {
            return;
        };
        match dataspace.imports.get_mut(&id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                dataspace.imports.remove(&id);
            }
            None => fatal(format_args!("import count underflow for {id:?} in {ds:?}")),
        }
    }

    /// Number of references `ds` holds to a container owned elsewhere.
    #[must_use]
    pub fn import_count(&self, ds: DataspaceId, container: &Value) -> u32 {
        let (Some(id), Some(dataspace)) = (container.container_id(), self.dataspaces.get(ds.index()))
        else {
            return 0;
        };
        dataspace.imports.get(&id).copied().unwrap_or(0)
    }

    /// Push a container onto the front of its owner's sweep list.
    pub(crate) fn link(&mut self, ds: DataspaceId, id: ContainerId) {
        let Some(dataspace) = self.dataspaces.get_mut(ds.index()) else {
            fatal(format_args!("linking {id:?} into unknown {ds:?}"));
        };
        let head = dataspace.head.replace(id);
        dataspace.containers += 1;

        let container = self.heap.get_mut(id);
        container.owner = ds;
        container.prev = None;
        container.next = head;
        if let Some(head) = head {
            self.heap.get_mut(head).prev = Some(id);
        }
    }

    /// Take a container off its owner's sweep list.
    pub(crate) fn unlink(&mut self, id: ContainerId) {
        let container = self.heap.get_mut(id);
        let (owner, prev, next) = (container.owner, container.prev.take(), container.next.take());

        match prev {
            Some(prev) => self.heap.get_mut(prev).next = next,
            None => {
                if let Some(dataspace) = self.dataspaces.get_mut(owner.index()) {
                    dataspace.head = next;
                }
            }
        }
        if let Some(next) = next {
            self.heap.get_mut(next).prev = prev;
        }
        if let Some(dataspace) = self.dataspaces.get_mut(owner.index()) {
            dataspace.containers -= 1;
        }
    }

    /// Containers on a dataspace's sweep list, most recent first.
    #[must_use]
    pub fn sweep_list(&self, ds: DataspaceId) -> Vec<Value> {
        let mut out = Vec::new();
        let mut cursor = self.dataspaces.get(ds.index()).and_then(|dataspace| dataspace.head);
        while let Some(id) = cursor {
            let container = self.heap.get(id);
            out.push(Value::container(container.kind, id));
            cursor = container.next;
        }
        out
    }
}
