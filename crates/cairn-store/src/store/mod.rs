// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The transaction context.
//!
//! A [`Store`] owns every table the core needs: the container and string
//! heap, the dataspaces, the plane stack and the external collaborators.
//! Nothing is global; an interpreter holds one store and passes it around.
//!
//! Operations are spread over several modules as `impl` blocks:
//! - [`ownership`]: retain, release, imports, sweep lists
//! - [`residency`]: faulting in evicted elements, scrubbing destroyed objects
//! - [`crate::array`]: indexing and the functional combinators
//! - [`crate::mapping`]: the hash overlay and mapping combinators
//! - [`crate::plane`]: atomic regions
//! - [`crate::dataspace`]: variables, deferred calls and eviction

#[cfg(test)]
pub(crate) mod store_test;

mod ownership;
mod residency;

use alloc::vec;
use alloc::vec::Vec;

use crate::config::StoreConfig;
use crate::dataspace::Dataspace;
use crate::error::{Result, StoreError};
use crate::heap::{Container, Heap};
use crate::host::{ObjectOracle, Persistence, Scheduler};
use crate::plane::{Plane, Residence};
use crate::value::order;
use crate::value::{ContainerId, ContainerKind, DataspaceId, ObjectRef, Value};

/// Counters describing the live state of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Live containers.
    pub containers: usize,
    /// Live strings.
    pub strings: usize,
    /// Dataspaces.
    pub dataspaces: usize,
    /// Active atomic regions.
    pub planes: usize,
    /// Backup ledger entries across all planes.
    pub ledger_entries: usize,
}

/// Value storage and transaction context.
pub struct Store<P, O, S> {
    config: StoreConfig,
    pub(crate) heap: Heap,
    pub(crate) dataspaces: Vec<Dataspace>,
    pub(crate) planes: Vec<Plane>,
    pub(crate) persistence: P,
    pub(crate) objects: O,
    pub(crate) scheduler: S,
}

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Create an empty store.
    #[must_use]
    pub const fn new(config: StoreConfig, persistence: P, objects: O, scheduler: S) -> Self {
        Self {
            config,
            heap: Heap::new(),
            dataspaces: Vec::new(),
            planes: Vec::new(),
            persistence,
            objects,
            scheduler,
        }
    }

    /// Configured limits.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The persistence collaborator.
    #[must_use]
    pub const fn persistence(&self) -> &P {
        &self.persistence
    }

    /// The persistence collaborator, mutably.
    pub const fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    /// The object-liveness collaborator.
    #[must_use]
    pub const fn objects(&self) -> &O {
        &self.objects
    }

    /// The object-liveness collaborator, mutably.
    pub const fn objects_mut(&mut self) -> &mut O {
        &mut self.objects
    }

    /// The scheduler collaborator.
    #[must_use]
    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// The scheduler collaborator, mutably.
    pub const fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Level of the current plane (0 outside of atomic regions).
    #[must_use]
    pub fn level(&self) -> u32 {
        u32::try_from(self.planes.len()).unwrap_or(u32::MAX)
    }

    /// Live-state counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            containers: self.heap.live(),
            strings: self.heap.strings.live(),
            dataspaces: self.dataspaces.len(),
            planes: self.planes.len(),
            ledger_entries: self.planes.iter().map(|plane| plane.ledger.len()).sum(),
        }
    }

    // --- Allocation ---

    /// Create an array of `size` nils owned by `ds`.
    pub fn create_array(&mut self, ds: DataspaceId, size: usize) -> Result<Value> {
        self.check_dataspace(ds)?;
        self.check_alloc(size)?;
        Ok(self.alloc_container(ds, ContainerKind::Array, vec![Value::Nil; size]))
    }

    /// Create an empty mapping owned by `ds`, with room for `size` entries.
    pub fn create_map(&mut self, ds: DataspaceId, size: usize) -> Result<Value> {
        self.check_dataspace(ds)?;
        self.check_alloc(size)?;
        Ok(self.alloc_container(
            ds,
            ContainerKind::Mapping,
            Vec::with_capacity(size.saturating_mul(2)),
        ))
    }

    /// Create a lightweight object of `class` with `nvars` nil variables.
    pub fn create_record(&mut self, ds: DataspaceId, class: ObjectRef, nvars: usize) -> Result<Value> {
        self.check_dataspace(ds)?;
        self.check_alloc(nvars)?;
        Ok(self.alloc_container(ds, ContainerKind::Record(class), vec![Value::Nil; nvars]))
    }

    /// Create an array holding retained copies of `values`.
    pub fn create_array_from(&mut self, ds: DataspaceId, values: &[Value]) -> Result<Value> {
        self.check_dataspace(ds)?;
        self.check_alloc(values.len())?;
        let values = self.copy_values(values);
        Ok(self.alloc_container(ds, ContainerKind::Array, values))
    }

    /// Create a string with a reference count of one.
    pub fn create_string(&mut self, text: &str) -> Value {
        let id = self.heap.strings.alloc(text);
        if let Some(plane) = self.planes.last_mut() {
            plane.strings.insert(id);
        }
        Value::String(id)
    }

    /// Recreate a container reloaded from storage.
    ///
    /// Unlike the `create_*` operations the identity tag is given, so two
    /// live containers may end up sharing one. Mapping elements are `key,
    /// value` pairs in any order; they are sorted and later duplicates win,
    /// so a later nil value deletes an earlier pair. Pairs whose key or
    /// value refers to a destroyed object are dropped.
    pub fn restore_container(
        &mut self,
        ds: DataspaceId,
        kind: ContainerKind,
        tag: u64,
        elements: &[Value],
    ) -> Result<Value> {
        self.check_dataspace(ds)?;
        let size = match kind {
            ContainerKind::Mapping => {
                if elements.len() % 2 != 0 {
                    return Err(StoreError::WrongKind {
                        expected: "key/value pairs",
                        found: "odd element count",
                    });
                }
                elements.len() / 2
            }
            ContainerKind::Array | ContainerKind::Record(_) => elements.len(),
        };
        self.check_alloc(size)?;

        let values = match kind {
            ContainerKind::Mapping => self.sorted_pairs(elements),
            ContainerKind::Array | ContainerKind::Record(_) => elements.to_vec(),
        };
        let values = self.copy_values(&values);
        let value = self.alloc_container(ds, kind, values);
        if let Some(id) = value.container_id() {
            self.heap.get_mut(id).tag = tag;
            self.heap.observe_tag(tag);
        }
        Ok(value)
    }

    /// Sort `key, value` pairs by key, keeping the last value of duplicates.
    ///
    /// Destroyed objects read as nil before sorting. A pair whose last
    /// occurrence has a nil key or value is dropped.
    fn sorted_pairs(&self, elements: &[Value]) -> Vec<Value> {
        let mut pairs: Vec<(usize, Value, Value)> = elements
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| (i, self.live_or_nil(&pair[0]), self.live_or_nil(&pair[1])))
            .collect();
        let heap = &self.heap;
        pairs.sort_by(|a, b| order::compare(heap, &a.1, &b.1).then(b.0.cmp(&a.0)));

        // Keys of the current run of order-equal keys; distinct containers
        // may share a tag and interleave.
        let mut run: Vec<Value> = Vec::new();
        let mut out: Vec<Value> = Vec::with_capacity(elements.len());
        for (_, key, value) in pairs {
            if key.is_nil() {
                continue;
            }
            if run
                .last()
                .is_some_and(|last| order::compare(heap, last, &key).is_ne())
            {
                run.clear();
            }
            if run.iter().any(|seen| order::same_value(heap, seen, &key)) {
                continue;
            }
            run.push(key);
            if !value.is_nil() {
                out.push(key);
                out.push(value);
            }
        }
        out
    }

    /// Check that a container of `size` may be allocated right now.
    pub(crate) fn check_alloc(&self, size: usize) -> Result<()> {
        if size > self.config.max_container_size {
            return Err(StoreError::ContainerTooLarge {
                size,
                max: self.config.max_container_size,
            });
        }
        if self.heap.live() >= self.config.max_containers {
            return Err(StoreError::TooManyContainers {
                max: self.config.max_containers,
            });
        }
        Ok(())
    }

    /// Allocate a container around already-retained values.
    ///
    /// Limits and the dataspace were validated by the caller.
    pub(crate) fn alloc_container(
        &mut self,
        owner: DataspaceId,
        kind: ContainerKind,
        values: Vec<Value>,
    ) -> Value {
        for value in &values {
            self.import(owner, value);
        }
        let tag = self.heap.next_tag();
        let epoch = self.objects.destruction_epoch();
        let home = self.level();
        let id = self
            .heap
            .insert(Container::new(kind, values, tag, home, owner, epoch));
        self.link(owner, id);
        if let Some(plane) = self.planes.last_mut() {
            plane.containers.insert(id, Residence::Fresh);
        }
        Value::container(kind, id)
    }

    // --- Inspection ---

    /// Resolve a container value, checking its kind.
    pub(crate) fn container_of(&self, value: &Value, expected: &'static str) -> Result<ContainerId> {
        value.container_id().ok_or(StoreError::WrongKind {
            expected,
            found: value.type_name(),
        })
    }

    /// Reference count of a string or container (0 for scalars).
    #[must_use]
    pub fn refcount(&self, value: &Value) -> u32 {
        match value {
            Value::String(id) => self.heap.strings.refcount(*id),
            Value::Array(id) | Value::Mapping(id) | Value::Record(id) => self.heap.get(*id).refcount,
            _ => 0,
        }
    }

    /// Whether a string or container value still addresses a live slot.
    #[must_use]
    pub fn is_live(&self, value: &Value) -> bool {
        match value {
            Value::String(id) => self.heap.strings.contains(*id),
            Value::Array(id) | Value::Mapping(id) | Value::Record(id) => self.heap.contains(*id),
            _ => true,
        }
    }

    /// Contents of a string value.
    pub fn string_text(&self, value: &Value) -> Result<&str> {
        match value {
            Value::String(id) => Ok(self.heap.strings.text(*id)),
            _ => Err(StoreError::WrongKind {
                expected: "string",
                found: value.type_name(),
            }),
        }
    }

    /// Identity tag of a container.
    pub fn tag(&self, container: &Value) -> Result<u64> {
        let id = self.container_of(container, "container")?;
        Ok(self.heap.get(id).tag)
    }

    /// Home plane level of a container.
    pub fn home(&self, container: &Value) -> Result<u32> {
        let id = self.container_of(container, "container")?;
        Ok(self.heap.get(id).home)
    }

    /// Owning dataspace of a container.
    pub fn owner(&self, container: &Value) -> Result<DataspaceId> {
        let id = self.container_of(container, "container")?;
        Ok(self.heap.get(id).owner)
    }

    /// Class of a lightweight object.
    pub fn record_class(&self, record: &Value) -> Result<ObjectRef> {
        let id = self.container_of(record, "record")?;
        match self.heap.get(id).kind {
            ContainerKind::Record(class) => Ok(class),
            kind => Err(StoreError::WrongKind {
                expected: "record",
                found: kind.name(),
            }),
        }
    }

    /// Logical size of a container.
    ///
    /// For mappings this compacts first, so destroyed entries are not counted.
    pub fn size(&mut self, container: &Value) -> Result<usize> {
        let id = self.container_of(container, "container")?;
        if matches!(container, Value::Mapping(_)) {
            self.dehash(container, true)?;
        }
        Ok(self.heap.get(id).size())
    }

    /// Current elements of a container, without retaining them.
    ///
    /// Mappings are dehashed first and yield `key, value` pairs in key order.
    /// Arrays and records are scrubbed, so destroyed objects read as nil.
    /// The returned handles stay valid only until the next mutation.
    pub fn elements(&mut self, container: &Value) -> Result<Vec<Value>> {
        let id = self.container_of(container, "container")?;
        if matches!(container, Value::Mapping(_)) {
            self.dehash_id(id, false);
        } else {
            self.scrub_sequence(id);
        }
        Ok(self.heap.get(id).values().to_vec())
    }

    /// Structural equality: same scalars and strings, containers of the same
    /// kind with deep-equal contents.
    pub fn deep_equal(&mut self, a: &Value, b: &Value) -> bool {
        let mut work = vec![(*a, *b)];
        let mut seen: Vec<(ContainerId, ContainerId)> = Vec::new();
        while let Some((x, y)) = work.pop() {
            match (x.container_id(), y.container_id()) {
                (Some(cx), Some(cy)) => {
                    if cx == cy || seen.contains(&(cx, cy)) {
                        continue;
                    }
                    if x.kind_rank() != y.kind_rank()
                        || self.heap.get(cx).kind != self.heap.get(cy).kind
                    {
                        return false;
                    }
                    seen.push((cx, cy));
                    let (Ok(xs), Ok(ys)) = (self.elements(&x), self.elements(&y)) else {
                        return false;
                    };
                    if xs.len() != ys.len() {
                        return false;
                    }
                    work.extend(xs.into_iter().zip(ys));
                }
                (None, None) => {
                    if !order::same_value(&self.heap, &x, &y) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }

    pub(crate) fn check_dataspace(&self, ds: DataspaceId) -> Result<()> {
        if ds.index() < self.dataspaces.len() {
            Ok(())
        } else {
            Err(StoreError::UnknownDataspace(ds))
        }
    }
}
