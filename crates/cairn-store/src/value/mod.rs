// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Value representation.
//!
//! Values are small `Copy` handles. Scalars (nil, integers, floats) and
//! object references are stored inline; strings and containers are slots in
//! the store's tables and carry a reference count there. Copying a `Value`
//! does not touch that count: owners call [`Store::retain`] and
//! [`Store::release`] explicitly.
//!
//! [`Store::retain`]: crate::Store::retain
//! [`Store::release`]: crate::Store::release


mod handle;
pub(crate) mod order;

pub use handle::{ContainerId, DataspaceId, Float, ObjectRef, StringId};

use core::fmt;

/// The three container shapes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContainerKind {
    /// Dynamically sized array.
    Array,
    /// Associative map, stored as sorted `key, value` pairs.
    Mapping,
    /// Lightweight object instance: a fixed set of variables and its class.
    Record(ObjectRef),
}

impl ContainerKind {
    /// Name used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Mapping => "mapping",
            Self::Record(_) => "record",
        }
    }
}

/// A value.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Value {
    /// The nil value. Also stands in for references to destroyed objects.
    #[default]
    Nil,
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(Float),
    /// Immutable string (slot in the string table).
    String(StringId),
    /// Reference to an object table entry.
    Object(ObjectRef),
    /// Array container.
    Array(ContainerId),
    /// Mapping container.
    Mapping(ContainerId),
    /// Lightweight object (record container).
    Record(ContainerId),
}

impl Value {
    /// Create a nil value.
    #[inline]
    #[must_use]
    pub const fn nil() -> Self {
        Self::Nil
    }

    /// Create an integer value.
    #[inline]
    #[must_use]
    pub const fn int(n: i64) -> Self {
        Self::Int(n)
    }

    /// Create a float value.
    #[inline]
    #[must_use]
    pub const fn float(x: f64) -> Self {
        Self::Float(Float::from_f64(x))
    }

    /// Create an object reference value.
    #[inline]
    #[must_use]
    pub const fn object(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }

    /// Create a container value of the given kind.
    #[inline]
    #[must_use]
    pub const fn container(kind: ContainerKind, id: ContainerId) -> Self {
        match kind {
            ContainerKind::Array => Self::Array(id),
            ContainerKind::Mapping => Self::Mapping(id),
            ContainerKind::Record(_) => Self::Record(id),
        }
    }

    /// Check if this value is nil.
    #[inline]
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Check if this value addresses a counted slot (string or container).
    #[inline]
    #[must_use]
    pub const fn is_counted(&self) -> bool {
        matches!(
            self,
            Self::String(_) | Self::Array(_) | Self::Mapping(_) | Self::Record(_)
        )
    }

    /// The container this value addresses, if any.
    #[inline]
    #[must_use]
    pub const fn container_id(&self) -> Option<ContainerId> {
        match self {
            Self::Array(id) | Self::Mapping(id) | Self::Record(id) => Some(*id),
            _ => None,
        }
    }

    /// The string this value addresses, if any.
    #[inline]
    #[must_use]
    pub const fn string_id(&self) -> Option<StringId> {
        match self {
            Self::String(id) => Some(*id),
            _ => None,
        }
    }

    /// Position of this value's kind in the total order.
    #[inline]
    #[must_use]
    pub const fn kind_rank(&self) -> u8 {
        match self {
            Self::Nil => 0,
            Self::Int(_) => 1,
            Self::Float(_) => 2,
            Self::String(_) => 3,
            Self::Object(_) => 4,
            Self::Array(_) => 5,
            Self::Mapping(_) => 6,
            Self::Record(_) => 7,
        }
    }

    /// Get the type name of this value for error messages.
    #[inline]
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Mapping(_) => "mapping",
            Self::Record(_) => "record",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "Nil"),
            Self::Int(n) => write!(f, "Int({n})"),
            Self::Float(x) => write!(f, "Float({x:?})"),
            Self::String(id) => write!(f, "String({id:?})"),
            Self::Object(obj) => write!(f, "Object({}/{})", obj.index, obj.generation),
            Self::Array(id) => write!(f, "Array({id:?})"),
            Self::Mapping(id) => write!(f, "Mapping({id:?})"),
            Self::Record(id) => write!(f, "Record({id:?})"),
        }
    }
}
