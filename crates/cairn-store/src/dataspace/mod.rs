// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Dataspaces: the per-object slice of the store.
//!
//! A dataspace holds an object's variables, the sweep list of containers it
//! owns, the import counts of containers it references but does not own,
//! and its table of pending deferred calls.
//!
//! Import counts are kept for every slot a dataspace owns: variables,
//! elements of its containers and deferred-call payloads. Eviction uses them
//! to tell containers only this dataspace can reach from shared ones.


mod callout;
mod evict;

pub use evict::EvictReport;

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{Result, StoreError};
use crate::host::{CallHandle, DeferredCall, ObjectOracle, Persistence, Scheduler};
use crate::store::Store;
use crate::value::{ContainerId, DataspaceId, Value};

/// Per-object state.
#[derive(Debug, Default)]
pub struct Dataspace {
    pub(crate) variables: Vec<Value>,
    /// Most recently linked container of the sweep list.
    pub(crate) head: Option<ContainerId>,
    /// Length of the sweep list.
    pub(crate) containers: usize,
    pub(crate) imports: BTreeMap<ContainerId, u32>,
    pub(crate) callouts: BTreeMap<CallHandle, DeferredCall>,
    pub(crate) next_handle: u32,
}

impl Dataspace {
    fn new(nvars: usize) -> Self {
        Self {
            variables: vec![Value::Nil; nvars],
            ..Self::default()
        }
    }

    /// Number of variable slots.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of containers this dataspace owns.
    #[must_use]
    pub const fn container_count(&self) -> usize {
        self.containers
    }

    /// Number of distinct foreign containers referenced.
    #[must_use]
    pub fn import_count(&self) -> usize {
        self.imports.len()
    }
}

impl<P: Persistence, O: ObjectOracle, S: Scheduler> Store<P, O, S> {
    /// Create a dataspace with `nvars` nil variables.
    pub fn create_dataspace(&mut self, nvars: usize) -> DataspaceId {
        let id = DataspaceId::new(u32::try_from(self.dataspaces.len()).unwrap_or(u32::MAX));
        self.dataspaces.push(Dataspace::new(nvars));
        tracing::debug!(dataspace = ?id, nvars, "created dataspace");
        id
    }

    /// A dataspace by handle.
    pub fn dataspace(&self, ds: DataspaceId) -> Result<&Dataspace> {
        self.dataspaces
            .get(ds.index())
            .ok_or(StoreError::UnknownDataspace(ds))
    }

    fn check_variable(&self, ds: DataspaceId, slot: u32) -> Result<()> {
        let dataspace = self.dataspace(ds)?;
        if (slot as usize) < dataspace.variables.len() {
            Ok(())
        } else {
            Err(StoreError::BadVariable {
                dataspace: ds,
                slot,
            })
        }
    }

    /// Current value of a variable, retained.
    pub fn variable(&mut self, ds: DataspaceId, slot: u32) -> Result<Value> {
        self.check_variable(ds, slot)?;
        let value = self.live_or_nil(&self.dataspaces[ds.index()].variables[slot as usize]);
        self.retain(&value);
        Ok(value)
    }

    /// Overwrite a variable.
    ///
    /// The first write within an atomic region moves the old value to the
    /// region's variable ledger so a discard can put it back.
    pub fn assign_variable(&mut self, ds: DataspaceId, slot: u32, value: &Value) -> Result<()> {
        self.check_variable(ds, slot)?;
        let value = self.live_or_nil(value);
        self.hold(ds, &value);
        let old = core::mem::replace(&mut self.dataspaces[ds.index()].variables[slot as usize], value);

        let key = (ds, slot);
        let first_write = self
            .planes
            .last()
            .is_some_and(|plane| !plane.variables.contains_key(&key));
        if first_write {
            self.unimport(ds, &old);
            if let Some(plane) = self.planes.last_mut() {
                plane.variables.insert(key, old);
            }
        } else {
            self.unhold(ds, vec![old]);
        }
        Ok(())
    }
}
