// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Errors reported by the store.
//!
//! Argument and resource errors are returned to the caller and never leave
//! state partially modified. Internal invariant violations are not errors:
//! they go through [`fatal`] and abort the enclosing operation.

use core::fmt;

use crate::host::CallHandle;
use crate::value::DataspaceId;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, StoreError>;

/// An error raised by a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Index outside of `0..size`.
    OutOfRange {
        /// Requested index.
        index: i64,
        /// Container size.
        size: usize,
    },
    /// Subrange that violates `0 <= lo <= hi + 1 <= size`.
    BadRange {
        /// Lower bound (inclusive).
        lo: i64,
        /// Upper bound (inclusive).
        hi: i64,
        /// Container size.
        size: usize,
    },
    /// Operand or key of the wrong kind.
    WrongKind {
        /// What the operation accepts.
        expected: &'static str,
        /// What it was given.
        found: &'static str,
    },
    /// Dataspace handle does not name a live dataspace.
    UnknownDataspace(DataspaceId),
    /// Variable slot outside of the dataspace's variable table.
    BadVariable {
        /// Dataspace that was addressed.
        dataspace: DataspaceId,
        /// Requested slot.
        slot: u32,
    },
    /// No deferred call with this handle.
    UnknownCall {
        /// Dataspace that was addressed.
        dataspace: DataspaceId,
        /// Requested handle.
        handle: CallHandle,
    },
    /// Container would exceed the configured maximum size.
    ContainerTooLarge {
        /// Requested size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Too many live containers.
    TooManyContainers {
        /// Configured maximum.
        max: usize,
    },
    /// Atomic regions nested deeper than allowed.
    PlaneDepth {
        /// Configured maximum.
        max: usize,
    },
    /// No atomic region is active.
    NoPlane,
    /// Only the topmost plane may be committed or discarded.
    PlaneOrder {
        /// Level of the topmost plane.
        top: u32,
        /// Level that was requested.
        requested: u32,
    },
    /// Operation is only allowed outside of atomic regions.
    PlaneActive,
}

impl StoreError {
    /// Whether the caller passed something invalid (safe to retry with other input).
    #[must_use]
    pub const fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Self::OutOfRange { .. }
                | Self::BadRange { .. }
                | Self::WrongKind { .. }
                | Self::UnknownDataspace(_)
                | Self::BadVariable { .. }
                | Self::UnknownCall { .. }
                | Self::NoPlane
                | Self::PlaneOrder { .. }
                | Self::PlaneActive
        )
    }

    /// Whether a configured limit was hit.
    #[must_use]
    pub const fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Self::ContainerTooLarge { .. } | Self::TooManyContainers { .. } | Self::PlaneDepth { .. }
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { index, size } => {
                write!(f, "index {index} out of range for size {size}")
            }
            Self::BadRange { lo, hi, size } => {
                write!(f, "invalid range [{lo}..{hi}] for size {size}")
            }
            Self::WrongKind { expected, found } => write!(f, "expected {expected}, got {found}"),
            Self::UnknownDataspace(ds) => write!(f, "no such dataspace {}", ds.as_u32()),
            Self::BadVariable { dataspace, slot } => {
                write!(f, "no variable {slot} in dataspace {}", dataspace.as_u32())
            }
            Self::UnknownCall { dataspace, handle } => write!(
                f,
                "no deferred call {} in dataspace {}",
                handle.as_u32(),
                dataspace.as_u32()
            ),
            Self::ContainerTooLarge { size, max } => {
                write!(f, "container size {size} exceeds maximum {max}")
            }
            Self::TooManyContainers { max } => write!(f, "too many containers (max {max})"),
            Self::PlaneDepth { max } => write!(f, "atomic regions nested too deeply (max {max})"),
            Self::NoPlane => write!(f, "no atomic region active"),
            Self::PlaneOrder { top, requested } => {
                write!(f, "plane {requested} is not the topmost plane ({top})")
            }
            Self::PlaneActive => write!(f, "not allowed inside an atomic region"),
        }
    }
}

impl core::error::Error for StoreError {}

/// Report an internal invariant violation and abort.
///
/// Ledger or overlay inconsistencies mean the container graph can no longer
/// be trusted, so there is nothing to recover.
#[cold]
#[track_caller]
#[expect(clippy::panic, reason = "invariant violations are fatal by contract")]
pub(crate) fn fatal(args: fmt::Arguments<'_>) -> ! {
    tracing::error!(%args, "store invariant violated");
    panic!("store invariant violated: {args}");
}
