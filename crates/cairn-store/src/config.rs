// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Store limits.

/// Default maximum number of elements in a single container.
pub const DEFAULT_MAX_CONTAINER_SIZE: usize = 64 * 1024;

/// Default maximum number of simultaneously live containers.
pub const DEFAULT_MAX_CONTAINERS: usize = 1024 * 1024;

/// Default maximum nesting depth of atomic regions.
pub const DEFAULT_MAX_PLANES: usize = 128;

/// Default bucket count of a freshly created mapping hash overlay.
pub const DEFAULT_HASH_BUCKETS: usize = 16;

/// Limits applied by a [`Store`](crate::Store).
///
/// All limits are checked before any mutation begins, so hitting one never
/// leaves a container half-modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum number of elements (mapping entries count once) per container.
    pub max_container_size: usize,
    /// Maximum number of live containers.
    pub max_containers: usize,
    /// Maximum nesting depth of atomic regions.
    pub max_planes: usize,
    /// Initial bucket count of a mapping hash overlay (rounded up to a power of two).
    pub initial_hash_buckets: usize,
}

impl StoreConfig {
    /// Configuration with the default limits.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_container_size: DEFAULT_MAX_CONTAINER_SIZE,
            max_containers: DEFAULT_MAX_CONTAINERS,
            max_planes: DEFAULT_MAX_PLANES,
            initial_hash_buckets: DEFAULT_HASH_BUCKETS,
        }
    }

    /// Set the maximum container size.
    #[must_use]
    pub const fn with_max_container_size(mut self, max: usize) -> Self {
        self.max_container_size = max;
        self
    }

    /// Set the maximum number of live containers.
    #[must_use]
    pub const fn with_max_containers(mut self, max: usize) -> Self {
        self.max_containers = max;
        self
    }

    /// Set the maximum atomic nesting depth.
    #[must_use]
    pub const fn with_max_planes(mut self, max: usize) -> Self {
        self.max_planes = max;
        self
    }

    /// Set the initial overlay bucket count.
    #[must_use]
    pub const fn with_initial_hash_buckets(mut self, buckets: usize) -> Self {
        self.initial_hash_buckets = buckets;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
