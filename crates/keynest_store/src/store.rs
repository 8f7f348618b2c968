// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for key-value store backends.
//!
//! [`Store`] defines the operations `keynest` needs from the external cache store: plain
//! reads and writes of raw payloads, batched reads and writes, and two counter primitives used
//! for group versions.

use std::collections::HashMap;

use bytes::Bytes;

use crate::{CacheOptions, Error};

/// Trait for key-value store implementations.
///
/// Implement this trait to plug a cache server or an in-process map into `keynest`.
///
/// Five methods are required: `get`, `set`, `delete`, `increment` and `fetch_or_insert_with`.
/// `get_with` defaults to `get`. The batched methods have default implementations that issue
/// one call per key:
/// - `get_multi`: loops over `get`, omitting absent keys
/// - `set_multi`: loops over `set`
///
/// Stores that can batch natively (`MGET`, `get_multi` in memcached clients) should override
/// them; `keynest` relies on `get_multi` to resolve many group versions in one round trip.
pub trait Store: Send + Sync {
    /// Reads the payload stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send;

    /// Reads the payload stored under `key` on behalf of a call that carries options.
    ///
    /// The default ignores `options` and calls [`get`](Self::get). Stores that act on read
    /// settings, such as treating [`CacheOptions::is_force`] as a miss, override it.
    fn get_with(&self, key: &str, options: &CacheOptions) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send {
        let _ = options;
        self.get(key)
    }

    /// Writes `value` under `key`.
    ///
    /// Implementations honour [`CacheOptions::expires_in_value`] and
    /// [`CacheOptions::is_unless_exist`] where they can.
    fn set(&self, key: &str, value: Bytes, options: &CacheOptions) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes the payload stored under `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str, options: &CacheOptions) -> impl Future<Output = Result<(), Error>> + Send;

    /// Atomically increments the counter under `key` by one and returns the new value.
    ///
    /// An absent key is treated as holding `initial`, so the first call returns `initial + 1`.
    /// The stored payload uses the [`counter`](crate::counter) encoding.
    fn increment(&self, key: &str, initial: u64) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Atomically returns the payload under `key`, storing `default()` first if it is absent.
    ///
    /// Concurrent callers racing on an absent key must all observe the same payload.
    fn fetch_or_insert_with<F>(&self, key: &str, default: F) -> impl Future<Output = Result<Bytes, Error>> + Send
    where
        F: FnOnce() -> Bytes + Send;

    /// Reads many keys at once. Absent keys are omitted from the result.
    fn get_multi(&self, keys: &[String]) -> impl Future<Output = Result<HashMap<String, Bytes>, Error>> + Send {
        async move {
            let mut found = HashMap::with_capacity(keys.len());
            for key in keys {
                if let Some(value) = self.get(key).await? {
                    found.insert(key.clone(), value);
                }
            }
            Ok(found)
        }
    }

    /// Writes many entries at once. Not atomic: a failure may leave earlier entries written.
    fn set_multi(&self, entries: Vec<(String, Bytes)>, options: &CacheOptions) -> impl Future<Output = Result<(), Error>> + Send {
        async move {
            for (key, value) in entries {
                self.set(&key, value, options).await?;
            }
            Ok(())
        }
    }
}
