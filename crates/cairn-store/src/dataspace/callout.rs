// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The callout table: pending deferred calls of a dataspace.

use alloc::vec::Vec;

use crate::error::{Result, StoreError, fatal};
use crate::host::{CallHandle, DeferredCall, ObjectOracle, Persistence, Scheduler};
use crate::plane::CallPatch;
use crate::store::Store;
use crate::value::{DataspaceId, Value};

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Schedule `payload` to run at `due`.
    pub fn add_deferred_call(&mut self, ds: DataspaceId, due: u64, payload: &Value) -> Result<CallHandle> {
        self.check_dataspace(ds)?;
        let payload = self.live_or_nil(payload);
        self.hold(ds, &payload);

        let dataspace = &mut self.dataspaces[ds.index()];
        let handle = CallHandle::new(dataspace.next_handle);
        dataspace.next_handle += 1;
        dataspace.callouts.insert(handle, DeferredCall { due, payload });

        self.journal_deferred_call(ds, handle, CallPatch::Add);
        Ok(handle)
    }

    /// Cancel a pending call, returning when it was due.
    pub fn remove_deferred_call(&mut self, ds: DataspaceId, handle: CallHandle) -> Result<u64> {
        self.check_dataspace(ds)?;
        let Some(old) = self.dataspaces[ds.index()].callouts.remove(&handle) else {
            return Err(StoreError::UnknownCall {
                dataspace: ds,
                handle,
            });
        };
        self.unimport(ds, &old.payload);
        self.journal_deferred_call(ds, handle, CallPatch::Remove(old));
        Ok(old.due)
    }

    /// Give a pending call a new due time and payload.
    pub fn replace_deferred_call(
        &mut self,
        ds: DataspaceId,
        handle: CallHandle,
        due: u64,
        payload: &Value,
    ) -> Result<()> {
        self.check_call(ds, handle)?;
        let payload = self.live_or_nil(payload);
        self.hold(ds, &payload);
        let Some(old) = self.dataspaces[ds.index()]
            .callouts
            .insert(handle, DeferredCall { due, payload })
        else {
            fatal(format_args!("call {handle:?} of {ds:?} vanished during replace"));
        };
        self.unimport(ds, &old.payload);
        self.journal_deferred_call(ds, handle, CallPatch::Replace(old));
        Ok(())
    }

    /// A pending call as seen from the current plane.
    pub fn deferred_call(&self, ds: DataspaceId, handle: CallHandle) -> Result<DeferredCall> {
        self.check_call(ds, handle)?;
        self.dataspaces[ds.index()]
            .callouts
            .get(&handle)
            .copied()
            .ok_or(StoreError::UnknownCall {
                dataspace: ds,
                handle,
            })
    }

    /// All pending calls of a dataspace, by handle.
    pub fn deferred_calls(&self, ds: DataspaceId) -> Result<Vec<(CallHandle, DeferredCall)>> {
        let dataspace = self.dataspace(ds)?;
        Ok(dataspace
            .callouts
            .iter()
            .map(|(handle, call)| (*handle, *call))
            .collect())
    }

    fn check_call(&self, ds: DataspaceId, handle: CallHandle) -> Result<()> {
        if self.dataspace(ds)?.callouts.contains_key(&handle) {
            Ok(())
        } else {
            Err(StoreError::UnknownCall {
                dataspace: ds,
                handle,
            })
        }
    }
}
