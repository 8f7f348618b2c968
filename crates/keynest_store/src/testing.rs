// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock store implementation for testing.
//!
//! This module provides `MockStore`, an in-memory store that records every operation and
//! supports failure injection, so tests can assert exactly which round trips a caller made.

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{CacheOptions, Error, Store, counter};

/// Recorded store operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A get was performed for the given key.
    Get(String),
    /// A get carrying call options was performed.
    GetWith {
        /// The key read.
        key: String,
        /// The options the read carried.
        options: CacheOptions,
    },
    /// A set was performed.
    Set {
        /// The key written.
        key: String,
        /// The payload written.
        value: Bytes,
        /// The options the write carried.
        options: CacheOptions,
    },
    /// A delete was performed for the given key.
    Delete(String),
    /// An increment was performed for the given key.
    Increment(String),
    /// A fetch-or-insert was performed for the given key.
    FetchOrInsert(String),
    /// A batched get was performed for the given keys.
    GetMulti(Vec<String>),
    /// A batched set was performed for the given keys.
    SetMulti(Vec<String>),
}

impl StoreOp {
    /// Returns `true` if this operation touched a key ending in `/_version`.
    #[must_use]
    pub fn touches_version_key(&self) -> bool {
        let is_version = |key: &String| key.ends_with("/_version");
        match self {
            Self::Get(key)
            | Self::GetWith { key, .. }
            | Self::Delete(key)
            | Self::Increment(key)
            | Self::FetchOrInsert(key)
            | Self::Set { key, .. } => is_version(key),
            Self::GetMulti(keys) | Self::SetMulti(keys) => keys.iter().any(is_version),
        }
    }
}

type FailPredicate = Box<dyn Fn(&StoreOp) -> bool + Send + Sync>;

/// A configurable mock store for testing.
///
/// Stores payloads in memory, records all operations, and can be told to fail
/// operations matching a predicate. Clones share state.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use keynest_store::{CacheOptions, Store, testing::{MockStore, StoreOp}};
///
/// # futures::executor::block_on(async {
/// let store = MockStore::new();
///
/// store.set("a", Bytes::from_static(b"1"), &CacheOptions::new()).await.unwrap();
/// assert_eq!(store.get("a").await.unwrap(), Some(Bytes::from_static(b"1")));
///
/// assert_eq!(store.operations()[1], StoreOp::Get("a".to_string()));
/// # });
/// ```
///
/// # Failure Injection
///
/// ```
/// use keynest_store::{Store, testing::{MockStore, StoreOp}};
///
/// # futures::executor::block_on(async {
/// let store = MockStore::new();
/// store.fail_when(|op| matches!(op, StoreOp::Increment(_)));
///
/// assert!(store.increment("counter", 1).await.is_err());
/// assert!(store.get("counter").await.is_ok());
/// # });
/// ```
pub struct MockStore {
    data: Arc<Mutex<HashMap<String, Bytes>>>,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl Clone for MockStore {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    /// Creates a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_data(HashMap::new())
    }

    /// Creates a mock store with pre-populated data.
    #[must_use]
    pub fn with_data(data: HashMap<String, Bytes>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if a payload is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Returns a snapshot of the stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.data.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Sets a predicate that determines which operations fail.
    ///
    /// A failing operation is still recorded but leaves the data untouched.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: StoreOp) -> Result<(), Error> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let message = format!("mock: {op:?} failed");
        self.operations.lock().push(op);
        if fail { Err(Error::caused_by(message)) } else { Ok(()) }
    }
}

impl Store for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        self.record(StoreOp::Get(key.to_owned()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn get_with(&self, key: &str, options: &CacheOptions) -> Result<Option<Bytes>, Error> {
        self.record(StoreOp::GetWith {
            key: key.to_owned(),
            options: options.clone(),
        })?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes, options: &CacheOptions) -> Result<(), Error> {
        self.record(StoreOp::Set {
            key: key.to_owned(),
            value: value.clone(),
            options: options.clone(),
        })?;
        let mut data = self.data.lock();
        if !(options.is_unless_exist() && data.contains_key(key)) {
            data.insert(key.to_owned(), value);
        }
        Ok(())
    }

    async fn delete(&self, key: &str, _options: &CacheOptions) -> Result<(), Error> {
        self.record(StoreOp::Delete(key.to_owned()))?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, initial: u64) -> Result<u64, Error> {
        self.record(StoreOp::Increment(key.to_owned()))?;
        let mut data = self.data.lock();
        let current = data.get(key).map(counter::decode).transpose()?.unwrap_or(initial);
        let next = current.saturating_add(1);
        data.insert(key.to_owned(), counter::encode(next));
        Ok(next)
    }

    async fn fetch_or_insert_with<F>(&self, key: &str, default: F) -> Result<Bytes, Error>
    where
        F: FnOnce() -> Bytes + Send,
    {
        self.record(StoreOp::FetchOrInsert(key.to_owned()))?;
        Ok(self.data.lock().entry(key.to_owned()).or_insert_with(default).clone())
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>, Error> {
        self.record(StoreOp::GetMulti(keys.to_vec()))?;
        let data = self.data.lock();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn set_multi(&self, entries: Vec<(String, Bytes)>, options: &CacheOptions) -> Result<(), Error> {
        self.record(StoreOp::SetMulti(entries.iter().map(|(key, _)| key.clone()).collect()))?;
        let mut data = self.data.lock();
        for (key, value) in entries {
            if !(options.is_unless_exist() && data.contains_key(&key)) {
                data.insert(key, value);
            }
        }
        Ok(())
    }
}
