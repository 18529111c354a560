// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Atomic regions as a stack of planes.
//!
//! Each plane is one nesting level. A container is *clean* on the current
//! plane when its home is that plane, and *shadowed* when its home is an
//! ancestor. The first mutation of a shadowed container snapshots its
//! elements into the current plane's backup ledger and re-homes it.
//!
//! ```text
//!   level 2  ledger: [#4 @1]           variables: {ds0.3}
//!   level 1  ledger: [#4 @0, #9 @0]    census: {#4 backed, #12 fresh}
//!   root     (implicit, committed state)
//! ```
//!
//! Committing folds a plane into its parent: snapshots are dropped at the
//! root and otherwise re-filed, unless the parent already holds an older
//! one. Discarding restores every snapshot, every variable and every
//! deferred call the plane touched.


mod patch;

pub use patch::CallPatch;

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::error::{Result, StoreError, fatal};
use crate::heap::Elements;
use crate::host::{CallHandle, ObjectOracle, Persistence, Scheduler};
use crate::store::Store;
use crate::value::{ContainerId, ContainerKind, DataspaceId, StringId, Value};

/// How a container came to be listed in a plane's census.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Residence {
    /// Created on this plane (or adopted from a finished child).
    Fresh,
    /// Backed up on this plane.
    Backed,
}

/// Pre-mutation state of one container.
#[derive(Debug)]
pub(crate) struct Backup {
    pub container: ContainerId,
    pub kind: ContainerKind,
    /// Retained, but not counted as imports of the owner.
    pub elements: Vec<Value>,
    pub size: usize,
    pub home: u32,
    pub scrub_epoch: u64,
}

/// One nesting level of atomic execution.
#[derive(Debug)]
pub(crate) struct Plane {
    pub level: u32,
    pub containers: BTreeMap<ContainerId, Residence>,
    pub strings: BTreeSet<StringId>,
    pub ledger: Vec<Backup>,
    /// First-write values of variables, retained but not import-counted.
    pub variables: BTreeMap<(DataspaceId, u32), Value>,
    pub patches: BTreeMap<(DataspaceId, CallHandle), CallPatch>,
}

impl Plane {
    fn new(level: u32) -> Self {
        Self {
            level,
            containers: BTreeMap::new(),
            strings: BTreeSet::new(),
            ledger: Vec::new(),
            variables: BTreeMap::new(),
            patches: BTreeMap::new(),
        }
    }

    fn is_backed(&self, id: ContainerId) -> bool {
        self.containers.get(&id) == Some(&Residence::Backed)
    }
}

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Push a new plane and return its level.
    pub fn enter_atomic(&mut self) -> Result<u32> {
        let max = self.config().max_planes;
        if self.planes.len() >= max {
            return Err(StoreError::PlaneDepth { max });
        }
        let level = self.level() + 1;
        self.planes.push(Plane::new(level));
        tracing::debug!(level, "entered atomic region");
        Ok(level)
    }

    /// Back up and re-home a container that is shadowed on the current plane.
    pub fn backup_then_rehome(&mut self, container: &Value) -> Result<()> {
        let id = self.container_of(container, "container")?;
        self.prepare_mutation(id);
        Ok(())
    }

    /// Make a container safe to mutate on the current plane.
    pub(crate) fn prepare_mutation(&mut self, id: ContainerId) {
        self.ensure_resident(id);
        let level = self.level();
        let home = self.heap.get(id).home;
        if home == level {
            return;
        }
        if home > level {
            fatal(format_args!("{id:?} is homed on plane {home} above current plane {level}"));
        }

        let kind = self.heap.get(id).kind;
        if kind == ContainerKind::Mapping {
            self.dehash_id(id, false);
        }
        if self.planes.last().is_some_and(|plane| plane.is_backed(id)) {
            fatal(format_args!("{id:?} backed up twice on plane {level}"));
        }

        let container = self.heap.get(id);
        let elements = container.values().to_vec();
        let backup = Backup {
            container: id,
            kind,
            size: container.size(),
            home,
            scrub_epoch: container.scrub_epoch,
            elements,
        };
        for value in &backup.elements {
            self.retain(value);
        }
        self.retain(&Value::container(kind, id));
        self.heap.get_mut(id).home = level;

        tracing::trace!(container = ?id, from = home, to = level, "backed up container");
        if let Some(plane) = self.planes.last_mut() {
            plane.containers.insert(id, Residence::Backed);
            plane.ledger.push(backup);
        }
    }

    fn pop_plane(&mut self, level: u32) -> Result<Plane> {
        let top = self.level();
        if top == 0 {
            return Err(StoreError::NoPlane);
        }
        if level != top {
            return Err(StoreError::PlaneOrder {
                top,
                requested: level,
            });
        }
        self.planes.pop().ok_or(StoreError::NoPlane)
    }

    /// Fold the topmost plane into its parent.
    pub fn commit_atomic(&mut self, level: u32) -> Result<()> {
        let plane = self.pop_plane(level)?;
        let parent_level = plane.level - 1;
        let mut released = Vec::new();
        let ledger_entries = plane.ledger.len();

        for backup in plane.ledger {
            let keep = match self.planes.last() {
                None => false,
                Some(parent) => backup.home != parent_level && !parent.is_backed(backup.container),
            };
            if keep {
                if let Some(parent) = self.planes.last_mut() {
                    parent.containers.insert(backup.container, Residence::Backed);
                    parent.ledger.push(backup);
                }
            } else {
                released.push(Value::container(backup.kind, backup.container));
                released.extend(backup.elements);
            }
        }

        for (id, _) in plane.containers {
            if !self.heap.contains(id) {
                continue;
            }
            let container = self.heap.get_mut(id);
            if container.home == level {
                container.home = parent_level;
            }
            if let Some(parent) = self.planes.last_mut() {
                parent.containers.entry(id).or_insert(Residence::Fresh);
            }
        }
        if let Some(parent) = self.planes.last_mut() {
            parent.strings.extend(plane.strings);
        }

        for (slot, saved) in plane.variables {
            match self.planes.last_mut() {
                Some(parent) if !parent.variables.contains_key(&slot) => {
                    parent.variables.insert(slot, saved);
                }
                _ => released.push(saved),
            }
        }

        for ((ds, handle), patch) in plane.patches {
            self.journal_deferred_call(ds, handle, patch);
        }

        self.release_values(released);
        tracing::debug!(level, ledger_entries, "committed atomic region");
        Ok(())
    }

    /// Throw away the topmost plane, restoring everything it changed.
    pub fn discard_atomic(&mut self, level: u32) -> Result<()> {
        let plane = self.pop_plane(level)?;
        let parent_level = plane.level - 1;
        let ledger_entries = plane.ledger.len();

        for backup in plane.ledger.into_iter().rev() {
            self.restore_backup(backup);
        }

        for ((ds, slot), saved) in plane.variables {
            self.import(ds, &saved);
            let Some(variable) = self
                .dataspaces
                .get_mut(ds.index())
                .and_then(|dataspace| dataspace.variables.get_mut(slot as usize))
            else {
                fatal(format_args!("variable ledger names missing {ds:?} slot {slot}"));
            };
            let current = core::mem::replace(variable, saved);
            self.unhold(ds, alloc::vec![current]);
        }

        for ((ds, handle), patch) in plane.patches {
            self.unwind_patch(ds, handle, patch);
        }

        let mut adopted = 0usize;
        for (id, residence) in plane.containers {
            if residence != Residence::Fresh || !self.heap.contains(id) {
                continue;
            }
            let container = self.heap.get_mut(id);
            if container.home == level {
                container.home = parent_level;
                adopted += 1;
            }
            if let Some(parent) = self.planes.last_mut() {
                parent.containers.entry(id).or_insert(Residence::Fresh);
            }
        }
        let strings: Vec<StringId> = plane
            .strings
            .into_iter()
            .filter(|id| self.heap.strings.contains(*id))
            .collect();
        if let Some(parent) = self.planes.last_mut() {
            parent.strings.extend(strings);
        }

        tracing::debug!(level, ledger_entries, adopted, "discarded atomic region");
        Ok(())
    }

    fn restore_backup(&mut self, backup: Backup) {
        let id = backup.container;
        self.ensure_resident(id);
        let container = self.heap.get_mut(id);
        let owner = container.owner;
        let current = core::mem::replace(&mut container.elements, Elements::Resident(backup.elements));
        let overlay = container.overlay.take();
        container.home = backup.home;
        container.scrub_epoch = backup.scrub_epoch;
        if container.size() != backup.size {
            fatal(format_args!(
                "restored {id:?} has size {} but the backup recorded {}",
                container.size(),
                backup.size
            ));
        }

        let Elements::Resident(mut current) = current else {
            fatal(format_args!("{id:?} evicted during an atomic region"));
        };
        if let Some(overlay) = overlay {
            for entry in overlay.into_entries() {
                current.push(entry.key);
                current.push(entry.value);
            }
        }
        let restored = self.heap.get(id).values().to_vec();
        for value in &restored {
            self.import(owner, value);
        }
        self.unhold(owner, current);
        self.note_size_change(id);
        tracing::trace!(container = ?id, home = backup.home, "restored container");
        self.release(Value::container(backup.kind, id));
    }

    /// Discard planes from the top down to and including `level`.
    pub fn discard_to(&mut self, level: u32) -> Result<()> {
        let top = self.level();
        if level == 0 || level > top {
            return Err(StoreError::PlaneOrder {
                top,
                requested: level,
            });
        }
        while self.level() >= level {
            self.discard_atomic(self.level())?;
        }
        Ok(())
    }

    /// Run `f` inside a fresh atomic region.
    ///
    /// The region is committed when `f` returns `Ok` and discarded when it
    /// returns `Err`. Planes `f` left open are discarded either way; if that
    /// happens on success, the region is discarded too and the call fails.
    pub fn atomic<T, E, F>(&mut self, f: F) -> core::result::Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> core::result::Result<T, E>,
    {
        let level = self.enter_atomic()?;
        let outcome = f(self);
        let top = self.level();
        if top < level {
            return Err(StoreError::PlaneOrder {
                top,
                requested: level,
            }
            .into());
        }
        match outcome {
            Ok(value) if top == level => {
                self.commit_atomic(level)?;
                Ok(value)
            }
            Ok(_) => {
                self.discard_to(level)?;
                Err(StoreError::PlaneOrder {
                    top,
                    requested: level,
                }
                .into())
            }
            Err(err) => {
                self.discard_to(level)?;
                Err(err)
            }
        }
    }
}
