// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Container and string tables.
//!
//! Containers live in a slot table indexed by [`ContainerId`]. Each slot
//! carries the element buffer (resident, or evicted to the persistence
//! layer), the reference count, the identity tag, the home plane, the
//! owning dataspace and that dataspace's sweep-list links.
//!
//! ```text
//! Dataspace.head ──► [c7] ◄──► [c3] ◄──► [c12] ──► None
//!                    owner=ds  owner=ds  owner=ds
//! ```
//!
//! The heap only stores; reference-count policy, backup and release live
//! in [`Store`](crate::Store).


mod strings;

pub use strings::StringTable;

use alloc::vec::Vec;

use crate::error::fatal;
use crate::host::SwapDescriptor;
use crate::mapping::HashOverlay;
use crate::value::{ContainerId, ContainerKind, DataspaceId, Value};

/// Where a container's elements currently are.
pub enum Elements {
    /// In memory.
    Resident(Vec<Value>),
    /// Handed to the persistence layer.
    Evicted {
        /// Descriptor to fault the elements back in with.
        descriptor: SwapDescriptor,
        /// Number of values that were evicted.
        len: usize,
    },
}

impl Elements {
    /// Number of values, resident or not.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Resident(values) => values.len(),
            Self::Evicted { len, .. } => *len,
        }
    }

    /// Whether there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A container slot.
pub struct Container {
    /// Array, mapping or record.
    pub kind: ContainerKind,
    /// Element storage. Mappings store `key, value` pairs.
    pub elements: Elements,
    /// Number of owning references.
    pub refcount: u32,
    /// Identity tag (total-order tiebreaker, not guaranteed unique).
    pub tag: u64,
    /// Level of the plane that owns the live element buffer.
    pub home: u32,
    /// Dataspace whose sweep list holds this container.
    pub owner: DataspaceId,
    /// Previous container in the owner's sweep list.
    pub prev: Option<ContainerId>,
    /// Next container in the owner's sweep list.
    pub next: Option<ContainerId>,
    /// Pending mapping insertions and updates.
    pub overlay: Option<HashOverlay>,
    /// Destruction epoch at which destroyed objects were last scrubbed.
    pub scrub_epoch: u64,
    /// Size recorded when the elements were last handed to persistence.
    pub saved_len: Option<usize>,
    /// Whether a size divergence was already reported.
    pub size_reported: bool,
}

impl Container {
    /// Create a resident, unlinked container.
    #[must_use]
    pub const fn new(
        kind: ContainerKind,
        values: Vec<Value>,
        tag: u64,
        home: u32,
        owner: DataspaceId,
        scrub_epoch: u64,
    ) -> Self {
        Self {
            kind,
            elements: Elements::Resident(values),
            refcount: 1,
            tag,
            home,
            owner,
            prev: None,
            next: None,
            overlay: None,
            scrub_epoch,
            saved_len: None,
            size_reported: false,
        }
    }

    /// Logical size: elements for arrays and records, entries for mappings.
    #[must_use]
    pub fn size(&self) -> usize {
        match self.kind {
            ContainerKind::Mapping => {
                self.elements.len() / 2 + self.overlay.as_ref().map_or(0, HashOverlay::added)
            }
            ContainerKind::Array | ContainerKind::Record(_) => self.elements.len(),
        }
    }

    /// Whether the elements are in memory.
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        matches!(self.elements, Elements::Resident(_))
    }

    /// Resident element buffer.
    ///
    /// Callers fault the container in first; an evicted buffer here is a bug.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        match &self.elements {
            Elements::Resident(values) => values,
            Elements::Evicted { .. } => fatal(format_args!("container elements not resident")),
        }
    }

    /// Mutable resident element buffer.
    pub fn values_mut(&mut self) -> &mut Vec<Value> {
        match &mut self.elements {
            Elements::Resident(values) => values,
            Elements::Evicted { .. } => fatal(format_args!("container elements not resident")),
        }
    }
}

/// Slot table of containers plus the string table.
pub struct Heap {
    containers: Vec<Option<Container>>,
    free: Vec<u32>,
    live: usize,
    next_tag: u64,
    /// String slots.
    pub strings: StringTable,
}

impl Heap {
    /// Create an empty heap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            containers: Vec::new(),
            free: Vec::new(),
            live: 0,
            next_tag: 1,
            strings: StringTable::new(),
        }
    }

    /// Hand out the next identity tag.
    pub const fn next_tag(&mut self) -> u64 {
        let tag = self.next_tag;
        self.next_tag += 1;
        tag
    }

    /// Make sure future tags do not collide with `tag`.
    pub fn observe_tag(&mut self, tag: u64) {
        self.next_tag = self.next_tag.max(tag.saturating_add(1));
    }

    /// Place a container in a free slot.
    pub fn insert(&mut self, container: Container) -> ContainerId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.containers[index as usize] = Some(container);
            ContainerId::new(index)
        } else {
            let index = u32::try_from(self.containers.len()).unwrap_or(u32::MAX);
            self.containers.push(Some(container));
            ContainerId::new(index)
        }
    }

    /// Take a container out of its slot and recycle the slot.
    pub fn remove(&mut self, id: ContainerId) -> Container {
        let Some(container) = self.containers.get_mut(id.index()).and_then(Option::take) else {
            fatal(format_args!("removing dangling container {id:?}"));
        };
        self.free.push(id.as_u32());
        self.live -= 1;
        container
    }

    /// Whether the slot holds a live container.
    #[must_use]
    pub fn contains(&self, id: ContainerId) -> bool {
        matches!(self.containers.get(id.index()), Some(Some(_)))
    }

    /// A live container.
    #[must_use]
    pub fn get(&self, id: ContainerId) -> &Container {
        match self.containers.get(id.index()) {
            Some(Some(container)) => container,
            _ => fatal(format_args!("dangling container handle {id:?}")),
        }
    }

    /// A live container, mutably.
    pub fn get_mut(&mut self, id: ContainerId) -> &mut Container {
        match self.containers.get_mut(id.index()) {
            Some(Some(container)) => container,
            _ => fatal(format_args!("dangling container handle {id:?}")),
        }
    }

    /// Number of live containers.
    #[must_use]
    pub const fn live(&self) -> usize {
        self.live
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
