// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Reference-counted string table.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::fatal;
use crate::value::StringId;

struct StringSlot {
    text: Box<str>,
    refcount: u32,
}

/// Slot table of immutable strings.
///
/// Freed slots are recycled through a free list.
#[derive(Default)]
pub struct StringTable {
    slots: Vec<Option<StringSlot>>,
    free: Vec<u32>,
    live: usize,
}

impl StringTable {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store a string with a reference count of one.
    pub fn alloc(&mut self, text: &str) -> StringId {
        let slot = StringSlot {
            text: text.into(),
            refcount: 1,
        };
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(slot);
            StringId::new(index)
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Some(slot));
            StringId::new(index)
        }
    }

    /// Contents of a live string.
    #[must_use]
    pub fn text(&self, id: StringId) -> &str {
        &self.slot(id).text
    }

    /// Whether the slot holds a live string.
    #[must_use]
    pub fn contains(&self, id: StringId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    /// Current reference count.
    #[must_use]
    pub fn refcount(&self, id: StringId) -> u32 {
        self.slot(id).refcount
    }

    /// Number of live strings.
    #[must_use]
    pub const fn live(&self) -> usize {
        self.live
    }

    /// Increment the reference count.
    pub fn retain(&mut self, id: StringId) {
        let slot = self.slot_mut(id);
        slot.refcount = slot.refcount.saturating_add(1);
    }

    /// Decrement the reference count, freeing the slot at zero.
    ///
    /// Returns `true` if the string was freed.
    pub fn release(&mut self, id: StringId) -> bool {
        let slot = self.slot_mut(id);
        slot.refcount -= 1;
        if slot.refcount > 0 {
            return false;
        }
        self.slots[id.index()] = None;
        self.free.push(id.as_u32());
        self.live -= 1;
        true
    }

    fn slot(&self, id: StringId) -> &StringSlot {
        match self.slots.get(id.index()) {
            Some(Some(slot)) => slot,
            _ => fatal(format_args!("dangling string handle {id:?}")),
        }
    }

    fn slot_mut(&mut self, id: StringId) -> &mut StringSlot {
        match self.slots.get_mut(id.index()) {
            Some(Some(slot)) => slot,
            _ => fatal(format_args!("dangling string handle {id:?}")),
        }
    }
}
