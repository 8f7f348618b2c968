// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Named caches: typed values stored under a group's path.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keynest_store::{CacheOptions, Store};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec;
use crate::error::{Error, Result};
use crate::group::{CacheSlot, Group};
use crate::key::CompositeKey;
use crate::telemetry::{CacheActivity, CacheOperation};

/// A typed cache whose entries live at `<group path>/<cache name>`.
///
/// Values are serialized with postcard. Invalidating the owning group, or any group above it,
/// moves every entry of the cache to a fresh namespace; the old entries are never read again
/// and expire according to the store's policy.
///
/// Every value operation accepts per-call [`CacheOptions`] through its `_with` variant; they
/// are layered over the options the cache was registered with. The `_with_parent` variants
/// also take the owning group's parent path when the caller already resolved it, so only the
/// group's own version is read.
///
/// # Examples
///
/// ```
/// use keynest::{CompositeKey, Config, InMemoryStore, Registry};
/// # futures::executor::block_on(async {
///
/// let registry = Registry::new();
/// registry.configure(Config::builder(InMemoryStore::new()).build())?;
/// let users = registry.register_group("users", "user_id")?;
/// let names = users.register_cache::<String>("display_name")?;
///
/// let key = CompositeKey::new().with("user_id", 10);
/// let name = names.fetch(&key, || async { "Ada".to_string() }).await?;
/// assert_eq!(name, "Ada");
///
/// // Served from the store now.
/// let name = names.fetch(&key, || async { "ignored".to_string() }).await?;
/// assert_eq!(name, "Ada");
///
/// users.invalidate_cache_group(None).await?;
/// assert_eq!(names.read(&key).await?, None);
/// # Ok::<(), keynest::Error>(())
/// # });
/// ```
pub struct NamedCache<V, S> {
    group: Group<S>,
    slot: Arc<CacheSlot>,
    _value: PhantomData<fn() -> V>,
}

impl<V, S> Clone for NamedCache<V, S> {
    fn clone(&self) -> Self {
        Self {
            group: self.group.clone(),
            slot: Arc::clone(&self.slot),
            _value: PhantomData,
        }
    }
}

impl<V, S> fmt::Debug for NamedCache<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedCache")
            .field("name", &self.slot.name)
            .field("group", &self.group.name())
            .field("options", &self.slot.options)
            .finish()
    }
}

impl<V, S> NamedCache<V, S> {
    pub(crate) fn new(group: Group<S>, slot: Arc<CacheSlot>) -> Self {
        Self {
            group,
            slot,
            _value: PhantomData,
        }
    }

    /// Returns the cache name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// Returns the group this cache belongs to.
    #[must_use]
    pub fn group(&self) -> &Group<S> {
        &self.group
    }

    /// Returns the registered options: the group's defaults with the cache's own on top.
    #[must_use]
    pub fn options(&self) -> &CacheOptions {
        &self.slot.options
    }

    fn record(&self, operation: CacheOperation, activity: CacheActivity, path: Option<&str>, duration: Duration) {
        self.group
            .config()
            .telemetry()
            .record(&self.slot.name, operation, activity, path, duration);
    }
}

impl<V, S> NamedCache<V, S>
where
    V: Serialize + DeserializeOwned,
    S: Store,
{
    /// Returns the store key of the entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns a missing-key error if `key` lacks a field of the group's schema, and a store
    /// error if a version could not be read.
    pub async fn path(&self, key: &CompositeKey) -> Result<String> {
        self.path_with_parent(key, None).await
    }

    /// Returns the store key of the entry for `key`, starting from the resolved parent path
    /// of the owning group.
    ///
    /// # Errors
    ///
    /// As for [`path`](Self::path).
    pub async fn path_with_parent(&self, key: &CompositeKey, parent_path: Option<&str>) -> Result<String> {
        let group_path = self.group.path_with_parent(key, parent_path).await?;
        Ok(self.slot.path(&group_path))
    }

    async fn resolve(
        &self,
        key: &CompositeKey,
        parent_path: Option<&str>,
        operation: CacheOperation,
        started: Instant,
    ) -> Result<String> {
        self.path_with_parent(key, parent_path)
            .await
            .inspect_err(|_| self.record(operation, CacheActivity::Error, None, started.elapsed()))
    }

    /// Returns the cached value for `key`, producing and storing it on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the path can't be resolved, the store fails, or a stored payload
    /// doesn't decode as `V`.
    pub async fn fetch<Fut>(&self, key: &CompositeKey, producer: impl FnOnce() -> Fut + Send) -> Result<V>
    where
        Fut: Future<Output = V> + Send,
    {
        self.fetch_with(key, &CacheOptions::default(), producer).await
    }

    /// Like [`fetch`](Self::fetch), with per-call options.
    ///
    /// With [`force`](CacheOptions::force) set the stored value is ignored: the producer runs
    /// and its value overwrites the entry.
    ///
    /// # Errors
    ///
    /// As for [`fetch`](Self::fetch).
    pub async fn fetch_with<Fut>(
        &self,
        key: &CompositeKey,
        options: &CacheOptions,
        producer: impl FnOnce() -> Fut + Send,
    ) -> Result<V>
    where
        Fut: Future<Output = V> + Send,
    {
        self.fetch_with_parent(key, None, options, producer).await
    }

    /// Like [`fetch_with`](Self::fetch_with), starting from the resolved parent path of the
    /// owning group.
    ///
    /// # Errors
    ///
    /// As for [`fetch`](Self::fetch).
    pub async fn fetch_with_parent<Fut>(
        &self,
        key: &CompositeKey,
        parent_path: Option<&str>,
        options: &CacheOptions,
        producer: impl FnOnce() -> Fut + Send,
    ) -> Result<V>
    where
        Fut: Future<Output = V> + Send,
    {
        self.try_fetch_with_parent(key, parent_path, options, move || async move {
            Ok::<V, Infallible>(producer().await)
        })
        .await
    }

    /// Like [`fetch`](Self::fetch), but the producer may fail.
    ///
    /// A failed producer stores nothing.
    ///
    /// # Errors
    ///
    /// As for [`fetch`](Self::fetch), plus a producer error carrying the producer's error as
    /// its source.
    pub async fn try_fetch<E, Fut>(&self, key: &CompositeKey, producer: impl FnOnce() -> Fut + Send) -> Result<V>
    where
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send,
    {
        self.try_fetch_with(key, &CacheOptions::default(), producer).await
    }

    /// Like [`try_fetch`](Self::try_fetch), with per-call options.
    ///
    /// # Errors
    ///
    /// As for [`try_fetch`](Self::try_fetch).
    pub async fn try_fetch_with<E, Fut>(
        &self,
        key: &CompositeKey,
        options: &CacheOptions,
        producer: impl FnOnce() -> Fut + Send,
    ) -> Result<V>
    where
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send,
    {
        self.try_fetch_with_parent(key, None, options, producer).await
    }

    /// Like [`try_fetch_with`](Self::try_fetch_with), starting from the resolved parent path
    /// of the owning group.
    ///
    /// # Errors
    ///
    /// As for [`try_fetch`](Self::try_fetch).
    pub async fn try_fetch_with_parent<E, Fut>(
        &self,
        key: &CompositeKey,
        parent_path: Option<&str>,
        options: &CacheOptions,
        producer: impl FnOnce() -> Fut + Send,
    ) -> Result<V>
    where
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send,
    {
        let started = Instant::now();
        let path = self.resolve(key, parent_path, CacheOperation::Fetch, started).await?;
        let options = self.slot.options.merge(options);

        let outcome = self.fetch_at(&path, &options, producer).await;
        let activity = match &outcome {
            Ok((_, true)) => CacheActivity::Hit,
            Ok((_, false)) => CacheActivity::Computed,
            Err(_) => CacheActivity::Error,
        };
        self.record(CacheOperation::Fetch, activity, Some(&path), started.elapsed());

        outcome.map(|(value, _)| value)
    }

    /// Returns the value and whether it came from the store.
    async fn fetch_at<E, Fut>(&self, path: &str, options: &CacheOptions, producer: impl FnOnce() -> Fut) -> Result<(V, bool)>
    where
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        let store = self.group.config().store();

        if !options.is_force()
            && let Some(payload) = store.get_with(path, options).await?
        {
            return Ok((codec::decode(&payload)?, true));
        }

        let value = producer().await.map_err(Error::producer)?;
        store.set(path, codec::encode(&value)?, options).await?;
        Ok((value, false))
    }

    /// Returns the cached value for `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the path can't be resolved, the store fails, or the payload
    /// doesn't decode as `V`.
    pub async fn read(&self, key: &CompositeKey) -> Result<Option<V>> {
        self.read_with(key, &CacheOptions::default()).await
    }

    /// Like [`read`](Self::read), with per-call options.
    ///
    /// The merged options reach the store through [`Store::get_with`].
    ///
    /// # Errors
    ///
    /// As for [`read`](Self::read).
    pub async fn read_with(&self, key: &CompositeKey, options: &CacheOptions) -> Result<Option<V>> {
        self.read_with_parent(key, None, options).await
    }

    /// Like [`read_with`](Self::read_with), starting from the resolved parent path of the
    /// owning group.
    ///
    /// # Errors
    ///
    /// As for [`read`](Self::read).
    pub async fn read_with_parent(
        &self,
        key: &CompositeKey,
        parent_path: Option<&str>,
        options: &CacheOptions,
    ) -> Result<Option<V>> {
        let started = Instant::now();
        let path = self.resolve(key, parent_path, CacheOperation::Read, started).await?;
        let options = self.slot.options.merge(options);

        let outcome = self.group.config().store().get_with(&path, &options).await;
        let activity = match &outcome {
            Ok(Some(_)) => CacheActivity::Hit,
            Ok(None) => CacheActivity::Miss,
            Err(_) => CacheActivity::Error,
        };
        self.record(CacheOperation::Read, activity, Some(&path), started.elapsed());

        outcome?.map(|payload| codec::decode(&payload)).transpose()
    }

    /// Stores `value` for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path can't be resolved, `value` can't be encoded, or the store
    /// fails.
    pub async fn write(&self, key: &CompositeKey, value: &V) -> Result<()> {
        self.write_with(key, value, &CacheOptions::default()).await
    }

    /// Like [`write`](Self::write), with per-call options.
    ///
    /// # Errors
    ///
    /// As for [`write`](Self::write).
    pub async fn write_with(&self, key: &CompositeKey, value: &V, options: &CacheOptions) -> Result<()> {
        self.write_with_parent(key, None, value, options).await
    }

    /// Like [`write_with`](Self::write_with), starting from the resolved parent path of the
    /// owning group.
    ///
    /// # Errors
    ///
    /// As for [`write`](Self::write).
    pub async fn write_with_parent(
        &self,
        key: &CompositeKey,
        parent_path: Option<&str>,
        value: &V,
        options: &CacheOptions,
    ) -> Result<()> {
        let started = Instant::now();
        let path = self.resolve(key, parent_path, CacheOperation::Write, started).await?;
        let options = self.slot.options.merge(options);

        let outcome = match codec::encode(value) {
            Ok(payload) => self
                .group
                .config()
                .store()
                .set(&path, payload, &options)
                .await
                .map_err(Error::from),
            Err(e) => Err(e),
        };
        let activity = if outcome.is_ok() {
            CacheActivity::Written
        } else {
            CacheActivity::Error
        };
        self.record(CacheOperation::Write, activity, Some(&path), started.elapsed());

        outcome
    }

    /// Removes the entry for `key`. Removing an absent entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the path can't be resolved or the store fails.
    pub async fn delete(&self, key: &CompositeKey) -> Result<()> {
        self.delete_with(key, &CacheOptions::default()).await
    }

    /// Like [`delete`](Self::delete), with per-call options.
    ///
    /// # Errors
    ///
    /// As for [`delete`](Self::delete).
    pub async fn delete_with(&self, key: &CompositeKey, options: &CacheOptions) -> Result<()> {
        self.delete_with_parent(key, None, options).await
    }

    /// Like [`delete_with`](Self::delete_with), starting from the resolved parent path of the
    /// owning group.
    ///
    /// # Errors
    ///
    /// As for [`delete`](Self::delete).
    pub async fn delete_with_parent(
        &self,
        key: &CompositeKey,
        parent_path: Option<&str>,
        options: &CacheOptions,
    ) -> Result<()> {
        let started = Instant::now();
        let path = self.resolve(key, parent_path, CacheOperation::Delete, started).await?;
        let options = self.slot.options.merge(options);

        let outcome = self.group.config().store().delete(&path, &options).await;
        let activity = if outcome.is_ok() {
            CacheActivity::Deleted
        } else {
            CacheActivity::Error
        };
        self.record(CacheOperation::Delete, activity, Some(&path), started.elapsed());

        outcome.map_err(Error::from)
    }

    /// Reads the values for many keys, resolving all paths in batches.
    ///
    /// Keys without a stored value are absent from the result. An empty slice returns an
    /// empty map without touching the store.
    ///
    /// # Errors
    ///
    /// Returns an error if any path can't be resolved, the store fails, or a payload doesn't
    /// decode as `V`.
    pub async fn read_multi(&self, keys: &[CompositeKey]) -> Result<HashMap<CompositeKey, V>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let started = Instant::now();
        let outcome = self.read_entries(keys).await;
        let activity = if outcome.is_ok() {
            CacheActivity::Ok
        } else {
            CacheActivity::Error
        };
        self.record(CacheOperation::ReadMulti, activity, None, started.elapsed());

        outcome
    }

    async fn read_entries(&self, keys: &[CompositeKey]) -> Result<HashMap<CompositeKey, V>> {
        let group_paths = self.group.path_multi(keys).await?;

        // Keys differing only in fields outside the schema share a path.
        let mut by_path: HashMap<String, Vec<CompositeKey>> = HashMap::with_capacity(group_paths.len());
        for (key, group_path) in group_paths {
            by_path.entry(self.slot.path(&group_path)).or_default().push(key);
        }

        let mut paths: Vec<String> = by_path.keys().cloned().collect();
        paths.sort_unstable();

        let found = self.group.config().store().get_multi(&paths).await?;

        let mut values = HashMap::with_capacity(keys.len());
        for (path, payload) in found {
            for key in by_path.remove(&path).unwrap_or_default() {
                values.insert(key, codec::decode(&payload)?);
            }
        }
        Ok(values)
    }

    /// Stores many values, resolving all paths in batches and writing with one `set_multi`.
    ///
    /// Writing nothing is a no-op that doesn't touch the store. If a key appears twice, the
    /// last value wins.
    ///
    /// # Errors
    ///
    /// Returns an error if any path can't be resolved, a value can't be encoded, or the store
    /// fails. Writes are not atomic; a store failure may leave some entries written.
    pub async fn write_multi<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (CompositeKey, V)>,
    {
        self.write_multi_with(entries, &CacheOptions::default()).await
    }

    /// Like [`write_multi`](Self::write_multi), with per-call options.
    ///
    /// # Errors
    ///
    /// As for [`write_multi`](Self::write_multi).
    pub async fn write_multi_with<I>(&self, entries: I, options: &CacheOptions) -> Result<()>
    where
        I: IntoIterator<Item = (CompositeKey, V)>,
    {
        let entries: Vec<(CompositeKey, V)> = entries.into_iter().collect();
        if entries.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let options = self.slot.options.merge(options);
        let outcome = self.write_entries(entries, &options).await;
        let activity = if outcome.is_ok() {
            CacheActivity::Written
        } else {
            CacheActivity::Error
        };
        self.record(CacheOperation::WriteMulti, activity, None, started.elapsed());

        outcome
    }

    async fn write_entries(&self, entries: Vec<(CompositeKey, V)>, options: &CacheOptions) -> Result<()> {
        let keys: Vec<CompositeKey> = entries.iter().map(|(key, _)| key.clone()).collect();
        let group_paths = self.group.path_multi(&keys).await?;

        let mut payloads: HashMap<String, bytes::Bytes> = HashMap::with_capacity(entries.len());
        for (key, value) in &entries {
            if let Some(group_path) = group_paths.get(key) {
                payloads.insert(self.slot.path(group_path), codec::encode(value)?);
            }
        }

        let mut payloads: Vec<(String, bytes::Bytes)> = payloads.into_iter().collect();
        payloads.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        Ok(self.group.config().store().set_multi(payloads, options).await?)
    }
}
