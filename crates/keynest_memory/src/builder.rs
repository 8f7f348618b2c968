// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory stores.
//!
//! The builder abstracts the underlying moka configuration, providing a stable API surface
//! without exposing moka's types.

use std::time::Duration;

use crate::store::InMemoryStore;

/// Builder for configuring an `InMemoryStore`.
///
/// # Examples
///
/// ```
/// use keynest_memory::InMemoryStore;
/// use std::time::Duration;
///
/// let store = InMemoryStore::builder()
///     .max_capacity(1000)
///     .time_to_live(Duration::from_secs(300))
///     .time_to_idle(Duration::from_secs(60))
///     .initial_capacity(100)
///     .name("sessions")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) time_to_live: Option<Duration>,
    pub(crate) time_to_idle: Option<Duration>,
    pub(crate) name: Option<String>,
}

impl InMemoryStoreBuilder {
    /// Creates a new builder with default settings.
    ///
    /// The default configuration creates an unbounded store with `TinyLFU`
    /// eviction policy and no store-wide expiration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries.
    ///
    /// Once reached, entries are evicted to make room using the `TinyLFU` policy. Version
    /// counters are entries like any other; an evicted counter restarts at the default
    /// version, which is why capacity should leave generous headroom.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets the initial capacity (pre-allocation hint).
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Sets a store-wide time-to-live.
    ///
    /// Entries expire this long after their last write. A per-write
    /// [`expires_in`](keynest_store::CacheOptions::expires_in) is applied on top; the
    /// shorter of the two wins.
    #[must_use]
    pub fn time_to_live(mut self, duration: Duration) -> Self {
        self.time_to_live = Some(duration);
        self
    }

    /// Sets a store-wide time-to-idle.
    ///
    /// Entries expire after this long without a read or write.
    #[must_use]
    pub fn time_to_idle(mut self, duration: Duration) -> Self {
        self.time_to_idle = Some(duration);
        self
    }

    /// Sets a name that may appear in moka's debugging output.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured `InMemoryStore`.
    #[must_use]
    pub fn build(self) -> InMemoryStore {
        InMemoryStore::from_builder(&self)
    }
}
