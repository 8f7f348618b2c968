// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Key-value store contract for hierarchical cache namespacing.
//!
//! This crate defines the [`Store`] trait that `keynest` resolves paths against and writes values
//! through, along with [`CacheOptions`] for per-operation settings and the opaque [`Error`] type
//! that store implementations return.
//!
//! # Overview
//!
//! A store maps string keys to raw byte payloads. Beyond plain reads and writes it must offer two
//! counter primitives that `keynest` builds its group versions on:
//!
//! - [`Store::fetch_or_insert_with`]: atomically return the existing payload or store a default.
//! - [`Store::increment`]: atomically bump an ASCII decimal counter.
//!
//! Counters are stored raw, see [`counter`].
//!
//! # Implementing a Store
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Mutex;
//!
//! use bytes::Bytes;
//! use keynest_store::{CacheOptions, Error, Store, counter};
//!
//! #[derive(Default)]
//! struct SimpleStore(Mutex<HashMap<String, Bytes>>);
//!
//! impl Store for SimpleStore {
//!     async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
//!         Ok(self.0.lock().unwrap().get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &str, value: Bytes, _options: &CacheOptions) -> Result<(), Error> {
//!         self.0.lock().unwrap().insert(key.to_owned(), value);
//!         Ok(())
//!     }
//!
//!     async fn delete(&self, key: &str, _options: &CacheOptions) -> Result<(), Error> {
//!         self.0.lock().unwrap().remove(key);
//!         Ok(())
//!     }
//!
//!     async fn increment(&self, key: &str, initial: u64) -> Result<u64, Error> {
//!         let mut map = self.0.lock().unwrap();
//!         let current = map.get(key).map(counter::decode).transpose()?.unwrap_or(initial);
//!         map.insert(key.to_owned(), counter::encode(current + 1));
//!         Ok(current + 1)
//!     }
//!
//!     async fn fetch_or_insert_with<F>(&self, key: &str, default: F) -> Result<Bytes, Error>
//!     where
//!         F: FnOnce() -> Bytes + Send,
//!     {
//!         Ok(self.0.lock().unwrap().entry(key.to_owned()).or_insert_with(default).clone())
//!     }
//! }
//! ```

pub mod counter;
pub mod error;
mod options;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
pub(crate) mod store;

#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use options::CacheOptions;
#[doc(inline)]
pub use store::Store;
