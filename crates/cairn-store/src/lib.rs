// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Cairn Store
//!
//! Value storage and transaction core for the Cairn object server.
//!
//! This crate provides:
//! - Reference-counted values and containers (arrays, mappings, records)
//! - Functional container combinators built on sort-merge
//! - A lazily merged hash overlay for mapping insertions
//! - Nested atomic regions ("planes") with backup, commit and discard
//! - Dataspace variables, import accounting, deferred-call journaling
//!   and eviction of container contents to secondary storage
//!
//! The interpreter, object table, scheduler and swap layout live elsewhere
//! and are reached through the traits in [`host`].

#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod array;
pub mod config;
pub mod dataspace;
pub mod error;
pub mod heap;
pub mod host;
pub mod mapping;
pub mod plane;
pub mod store;
pub mod value;

pub use config::StoreConfig;
pub use dataspace::EvictReport;
pub use error::{Result, StoreError};
pub use host::{CallHandle, DeferredCall, ObjectOracle, Persistence, Scheduler, SwapDescriptor};
pub use plane::CallPatch;
pub use store::{Store, StoreStats};
pub use value::{ContainerId, ContainerKind, DataspaceId, Float, ObjectRef, StringId, Value};
