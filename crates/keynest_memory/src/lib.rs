// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-process key-value store backed by moka.
//!
//! This crate provides [`InMemoryStore`], a concurrent implementation of
//! [`keynest_store::Store`] for single-process deployments and tests. Use
//! [`InMemoryStoreBuilder`] to configure capacity and expiry without exposing moka types.
//!
//! # Quick Start
//!
//! ```
//! use bytes::Bytes;
//! use keynest_memory::InMemoryStoreBuilder;
//! use keynest_store::{CacheOptions, Store};
//! use std::time::Duration;
//!
//! # futures::executor::block_on(async {
//! let store = InMemoryStoreBuilder::new()
//!     .max_capacity(10_000)
//!     .time_to_live(Duration::from_secs(3600))
//!     .build();
//!
//! store.set("greeting", Bytes::from_static(b"hello"), &CacheOptions::new()).await.unwrap();
//! assert_eq!(store.get("greeting").await.unwrap(), Some(Bytes::from_static(b"hello")));
//! # });
//! ```
//!
//! # Features
//!
//! - **Atomic counters**: `increment` and `fetch_or_insert_with` run under moka's per-key
//!   entry lock, so racing callers observe a single consistent value
//! - **Per-entry expiry**: honours [`CacheOptions::expires_in`](keynest_store::CacheOptions::expires_in)
//! - **Capacity limits**: maximum entry count with `TinyLFU` eviction

pub mod builder;
pub mod store;

#[doc(inline)]
pub use builder::InMemoryStoreBuilder;
#[doc(inline)]
pub use store::InMemoryStore;
