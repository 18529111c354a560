// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Deferred-call journal.
//!
//! A dataspace's callout table always reflects the current plane. What the
//! scheduler sees is the committed state, so changes made inside atomic
//! regions are journaled as one patch per call handle and only replayed
//! once they reach the root.
//!
//! Folding a child patch into the parent's patch for the same handle:
//!
//! | parent      | child       | result      |
//! |-------------|-------------|-------------|
//! | -           | any         | child       |
//! | Add         | Remove      | -           |
//! | Add         | Replace     | Add         |
//! | Remove(a)   | Add         | Replace(a)  |
//! | Replace(a)  | Remove      | Remove(a)   |
//! | Replace(a)  | Replace     | Replace(a)  |

use alloc::vec::Vec;

use crate::error::fatal;
use crate::host::{CallHandle, DeferredCall, ObjectOracle, Persistence, Scheduler};
use crate::store::Store;
use crate::value::DataspaceId;

/// A journaled change to one deferred call.
///
/// `Remove` and `Replace` carry the call as it was before the change; its
/// payload is retained by the patch.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CallPatch {
    /// The call was added.
    Add,
    /// The call was removed.
    Remove(DeferredCall),
    /// The call was replaced.
    Replace(DeferredCall),
}

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Record a change already made to a dataspace's callout table.
    ///
    /// Outside of atomic regions the scheduler is updated at once; inside,
    /// the patch is folded into the current plane's journal. Only the
    /// callout operations and commit call this, so the patch always matches
    /// the table.
    pub(crate) fn journal_deferred_call(&mut self, ds: DataspaceId, handle: CallHandle, patch: CallPatch) {
        let Some(plane) = self.planes.last_mut() else {
            self.replay_patch(ds, handle, patch);
            return;
        };

        let key = (ds, handle);
        let mut released = Vec::new();
        match (plane.patches.remove(&key), patch) {
            (None, patch) => {
                plane.patches.insert(key, patch);
            }
            (Some(CallPatch::Add), CallPatch::Remove(last)) => released.push(last.payload),
            (Some(CallPatch::Add), CallPatch::Replace(last)) => {
                plane.patches.insert(key, CallPatch::Add);
                released.push(last.payload);
            }
            (Some(CallPatch::Remove(original)), CallPatch::Add) => {
                plane.patches.insert(key, CallPatch::Replace(original));
            }
            (Some(CallPatch::Replace(original)), CallPatch::Remove(last)) => {
                plane.patches.insert(key, CallPatch::Remove(original));
                released.push(last.payload);
            }
            (Some(CallPatch::Replace(original)), CallPatch::Replace(last)) => {
                plane.patches.insert(key, CallPatch::Replace(original));
                released.push(last.payload);
            }
            (Some(earlier), later) => fatal(format_args!(
                "cannot fold {later:?} into {earlier:?} for {ds:?} call {handle:?}"
            )),
        }
        self.release_values(released);
    }

    /// Apply a patch to the real scheduler.
    fn replay_patch(&mut self, ds: DataspaceId, handle: CallHandle, patch: CallPatch) {
        let current = self
            .dataspaces
            .get(ds.index())
            .and_then(|dataspace| dataspace.callouts.get(&handle))
            .copied();
        match (patch, current) {
            (CallPatch::Add, Some(call)) => self.scheduler.schedule(ds, handle, &call),
            (CallPatch::Remove(last), None) => {
                self.scheduler.cancel(ds, handle);
                self.release(last.payload);
            }
            (CallPatch::Replace(last), Some(call)) => {
                self.scheduler.reschedule(ds, handle, &call);
                self.release(last.payload);
            }
            (patch, _) => fatal(format_args!(
                "{patch:?} for {ds:?} call {handle:?} does not match the callout table"
            )),
        }
        tracing::trace!(dataspace = ?ds, handle = handle.as_u32(), "replayed deferred call");
    }

    /// Undo a patch against the callout table.
    pub(crate) fn unwind_patch(&mut self, ds: DataspaceId, handle: CallHandle, patch: CallPatch) {
        let Some(dataspace) = self.dataspaces.get_mut(ds.index()) else {
            fatal(format_args!("deferred-call journal names missing {ds:?}"));
        };
        match patch {
            CallPatch::Add => {
                let Some(added) = dataspace.callouts.remove(&handle) else {
                    fatal(format_args!("added call {handle:?} of {ds:?} vanished"));
                };
                self.unhold(ds, alloc::vec![added.payload]);
            }
            CallPatch::Remove(original) => {
                dataspace.callouts.insert(handle, original);
                self.import(ds, &original.payload);
            }
            CallPatch::Replace(original) => {
                let Some(replacement) = dataspace.callouts.insert(handle, original) else {
                    fatal(format_args!("replaced call {handle:?} of {ds:?} vanished"));
                };
                self.import(ds, &original.payload);
                self.unhold(ds, alloc::vec![replacement.payload]);
            }
        }
    }
}
