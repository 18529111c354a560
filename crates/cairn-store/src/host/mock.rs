// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock collaborators for testing.
//!
//! In-memory stand-ins for the swap layer, the object table and the
//! deferred-call queue, so that the store can be exercised on the host.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::{CallHandle, DeferredCall, ObjectOracle, Persistence, Scheduler, SwapDescriptor};
use crate::config::StoreConfig;
use crate::store::Store;
use crate::value::{ContainerId, DataspaceId, ObjectRef, Value};

/// A store wired to the mock collaborators.
pub type MockStore = Store<MockPersistence, MockObjects, MockScheduler>;

impl MockStore {
    /// Create a store with default limits and fresh mocks.
    #[must_use]
    pub fn mock() -> Self {
        Self::mock_with(StoreConfig::default())
    }

    /// Create a store with the given limits and fresh mocks.
    #[must_use]
    pub fn mock_with(config: StoreConfig) -> Self {
        Self::new(
            config,
            MockPersistence::new(),
            MockObjects::new(),
            MockScheduler::new(),
        )
    }
}

/// Swap layer backed by a map.
#[derive(Debug, Default)]
pub struct MockPersistence {
    swapped: BTreeMap<SwapDescriptor, Vec<Value>>,
    next: u64,
    /// Containers reported through `mark_size_changed`, in order.
    pub size_changes: Vec<ContainerId>,
    /// Number of `load_elements` calls.
    pub loads: usize,
}

impl MockPersistence {
    /// Create an empty swap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            swapped: BTreeMap::new(),
            next: 0,
            size_changes: Vec::new(),
            loads: 0,
        }
    }

    /// Number of element buffers currently swapped out.
    #[must_use]
    pub fn swapped(&self) -> usize {
        self.swapped.len()
    }
}

impl Persistence for MockPersistence {
    fn store_elements(&mut self, _container: ContainerId, elements: Vec<Value>) -> SwapDescriptor {
        let descriptor = SwapDescriptor(self.next);
        self.next += 1;
        self.swapped.insert(descriptor, elements);
        descriptor
    }

    fn load_elements(&mut self, descriptor: SwapDescriptor) -> Vec<Value> {
        self.loads += 1;
        self.swapped.remove(&descriptor).unwrap_or_default()
    }

    fn mark_size_changed(&mut self, container: ContainerId) {
        self.size_changes.push(container);
    }
}

/// Object table that only tracks slot generations.
#[derive(Debug, Default)]
pub struct MockObjects {
    generations: Vec<u32>,
    epoch: u64,
}

impl MockObjects {
    /// Create an empty object table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generations: Vec::new(),
            epoch: 0,
        }
    }

    /// Create a new object in a fresh slot.
    pub fn spawn(&mut self) -> ObjectRef {
        let index = u32::try_from(self.generations.len()).unwrap_or(u32::MAX);
        self.generations.push(0);
        ObjectRef::new(index, 0)
    }

    /// Destroy an object, invalidating every reference to it.
    pub fn destroy(&mut self, obj: ObjectRef) {
        if let Some(generation) = self.generations.get_mut(obj.index as usize) {
            if *generation == obj.generation {
                *generation += 1;
                self.epoch += 1;
            }
        }
    }

    /// Create a new object in the slot of a destroyed one.
    pub fn reuse(&mut self, index: u32) -> Option<ObjectRef> {
        let generation = *self.generations.get(index as usize)?;
        Some(ObjectRef::new(index, generation))
    }
}

impl ObjectOracle for MockObjects {
    fn is_destroyed(&self, obj: ObjectRef) -> bool {
        self.generations
            .get(obj.index as usize)
            .is_none_or(|generation| *generation != obj.generation)
    }

    fn destruction_epoch(&self) -> u64 {
        self.epoch
    }
}

/// A scheduler event, recorded in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// `schedule` was called.
    Schedule(DataspaceId, CallHandle, u64),
    /// `cancel` was called.
    Cancel(DataspaceId, CallHandle),
}

/// Deferred-call queue that records what it is told.
#[derive(Debug, Default)]
pub struct MockScheduler {
    /// Currently queued calls by due time.
    pub queue: BTreeMap<(DataspaceId, CallHandle), u64>,
    /// Every call made against the scheduler.
    pub events: Vec<SchedulerEvent>,
}

impl MockScheduler {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            events: Vec::new(),
        }
    }
}

impl Scheduler for MockScheduler {
    fn schedule(&mut self, dataspace: DataspaceId, handle: CallHandle, call: &DeferredCall) {
        self.queue.insert((dataspace, handle), call.due);
        self.events
            .push(SchedulerEvent::Schedule(dataspace, handle, call.due));
    }

    fn cancel(&mut self, dataspace: DataspaceId, handle: CallHandle) {
        self.queue.remove(&(dataspace, handle));
        self.events.push(SchedulerEvent::Cancel(dataspace, handle));
    }
}
