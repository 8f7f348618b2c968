// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory store implementation using moka.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use keynest_store::{CacheOptions, Error, Store, counter};
use moka::Expiry;
use moka::future::Cache;

use crate::builder::InMemoryStoreBuilder;

/// Payload plus the expiry it was written with.
#[derive(Clone, Debug)]
struct StoredValue {
    payload: Bytes,
    expires_in: Option<Duration>,
}

impl StoredValue {
    fn new(payload: Bytes, options: &CacheOptions) -> Self {
        Self {
            payload,
            expires_in: options.expires_in_value(),
        }
    }

    fn permanent(payload: Bytes) -> Self {
        Self { payload, expires_in: None }
    }
}

/// Applies the per-write `expires_in` on every create and update.
#[derive(Debug)]
struct PerEntryExpiry;

impl Expiry<String, StoredValue> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &StoredValue, _created_at: Instant) -> Option<Duration> {
        value.expires_in
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.expires_in
    }
}

/// An in-process [`Store`] backed by moka.
///
/// Clones share the same underlying storage.
///
/// # Examples
///
/// ```
/// use keynest_memory::InMemoryStore;
/// use keynest_store::Store;
/// # futures::executor::block_on(async {
///
/// let store = InMemoryStore::new();
///
/// assert_eq!(store.increment("ROOT/users/_version", 1).await.unwrap(), 2);
/// assert_eq!(store.increment("ROOT/users/_version", 1).await.unwrap(), 3);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    inner: Arc<Cache<String, StoredValue>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new unbounded in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new in-memory store holding at most `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a new builder for configuring an in-memory store.
    #[must_use]
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::new()
    }

    pub(crate) fn from_builder(builder: &InMemoryStoreBuilder) -> Self {
        let mut moka_builder = Cache::<String, StoredValue>::builder().expire_after(PerEntryExpiry);

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(capacity) = builder.initial_capacity {
            moka_builder = moka_builder.initial_capacity(capacity);
        }

        if let Some(ttl) = builder.time_to_live {
            moka_builder = moka_builder.time_to_live(ttl);
        }

        if let Some(tti) = builder.time_to_idle {
            moka_builder = moka_builder.time_to_idle(tti);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: Arc::new(moka_builder.build()),
        }
    }

    /// Returns the approximate number of entries.
    ///
    /// moka updates its count lazily; call [`sync`](Self::sync) first for an exact figure.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Applies pending evictions, expirations and count updates.
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Removes every entry, including group version counters.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

impl Store for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        Ok(self.inner.get(key).await.map(|stored| stored.payload))
    }

    async fn set(&self, key: &str, value: Bytes, options: &CacheOptions) -> Result<(), Error> {
        let stored = StoredValue::new(value, options);
        if options.is_unless_exist() {
            self.inner.entry_by_ref(key).or_insert_with(async move { stored }).await;
        } else {
            self.inner.insert(key.to_owned(), stored).await;
        }
        Ok(())
    }

    async fn delete(&self, key: &str, _options: &CacheOptions) -> Result<(), Error> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    async fn increment(&self, key: &str, initial: u64) -> Result<u64, Error> {
        let entry = self
            .inner
            .entry_by_ref(key)
            .and_upsert_with(|existing| {
                let next = match existing {
                    None => StoredValue::permanent(counter::encode(initial.saturating_add(1))),
                    Some(entry) => {
                        let current = entry.into_value();
                        // A payload that is not a counter is left as is and reported below.
                        match counter::decode(&current.payload) {
                            Ok(value) => StoredValue {
                                payload: counter::encode(value.saturating_add(1)),
                                expires_in: current.expires_in,
                            },
                            Err(_) => current,
                        }
                    }
                };
                std::future::ready(next)
            })
            .await;

        counter::decode(&entry.into_value().payload)
    }

    async fn fetch_or_insert_with<F>(&self, key: &str, default: F) -> Result<Bytes, Error>
    where
        F: FnOnce() -> Bytes + Send,
    {
        let entry = self
            .inner
            .entry_by_ref(key)
            .or_insert_with(async move { StoredValue::permanent(default()) })
            .await;
        Ok(entry.into_value().payload)
    }
}
