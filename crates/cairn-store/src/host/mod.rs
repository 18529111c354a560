// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Collaborators the store calls out to.
//!
//! The store never touches disk, the object table or the timer queue
//! itself. It reaches them through three traits so that it can be tested on
//! the host with the implementations in [`mock`].


#[cfg(any(test, feature = "std"))]
pub mod mock;

use alloc::vec::Vec;

use crate::value::{ContainerId, DataspaceId, ObjectRef, Value};

/// Opaque token for container elements held by the persistence layer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SwapDescriptor(pub u64);

/// Handle of a deferred call within its dataspace.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CallHandle(u32);

impl CallHandle {
    /// Create a call handle from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// A pending deferred call as stored in a dataspace.
///
/// The payload (function name, arguments) is an ordinary value owned by the
/// dataspace's callout table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DeferredCall {
    /// When the call is due, in scheduler ticks.
    pub due: u64,
    /// Call payload.
    pub payload: Value,
}

/// Secondary storage for evicted container elements.
pub trait Persistence {
    /// Take custody of a container's elements.
    ///
    /// The values keep their reference counts while evicted.
    fn store_elements(&mut self, container: ContainerId, elements: Vec<Value>) -> SwapDescriptor;

    /// Fault evicted elements back in, giving up custody.
    fn load_elements(&mut self, descriptor: SwapDescriptor) -> Vec<Value>;

    /// The container's live size diverged from its last saved size.
    fn mark_size_changed(&mut self, container: ContainerId);
}

/// Liveness of entries in the external object table.
pub trait ObjectOracle {
    /// Whether the object this reference was taken from has been destroyed.
    fn is_destroyed(&self, obj: ObjectRef) -> bool;

    /// Counter bumped on every destruction.
    ///
    /// Containers remember the epoch of their last scrub and only rescan
    /// when it changes.
    fn destruction_epoch(&self) -> u64;
}

/// The real deferred-call queue.
///
/// Only ever called with committed state: at the root plane.
pub trait Scheduler {
    /// Enqueue a call.
    fn schedule(&mut self, dataspace: DataspaceId, handle: CallHandle, call: &DeferredCall);

    /// Dequeue a call.
    fn cancel(&mut self, dataspace: DataspaceId, handle: CallHandle);

    /// Replace a queued call.
    fn reschedule(&mut self, dataspace: DataspaceId, handle: CallHandle, call: &DeferredCall) {
        self.cancel(dataspace, handle);
        self.schedule(dataspace, handle, call);
    }
}
