// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Hierarchical, version-based cache key namespacing and invalidation.
//!
//! Cached values are addressed by deterministic paths built from a tree of cache groups.
//! Each group path segment carries a version read from the store, so invalidating a group for
//! one entity is a single counter increment: every key below it moves to a fresh namespace and
//! the old entries are simply never read again.
//!
//! - [`Registry`] holds the [`Config`] (the [`Store`] to talk to) and the root groups.
//! - [`Group`] is a versioned namespace keyed by one field of a [`CompositeKey`]; groups nest.
//! - [`NamedCache`] stores typed values at `<group path>/<cache name>`.
//!
//! # Examples
//!
//! ```
//! use keynest::{CompositeKey, Config, InMemoryStore, Registry};
//! # futures::executor::block_on(async {
//!
//! let registry = Registry::new();
//! registry.configure(Config::builder(InMemoryStore::new()).build())?;
//!
//! let users = registry.register_group("users", "user_id")?;
//! let posts = users.register_child_group("posts", "post_id")?;
//! let titles = posts.register_cache::<String>("title")?;
//!
//! let key = CompositeKey::new().with("user_id", 10).with("post_id", 77);
//! assert_eq!(titles.path(&key).await?, "ROOT/users/1/1/10/posts/1/1/77/title");
//!
//! titles.write(&key, &"Hello".to_string()).await?;
//! assert_eq!(titles.read(&key).await?.as_deref(), Some("Hello"));
//!
//! // Drop every post cached for user 10 in one increment.
//! posts.invalidate_cache_group(Some(&key)).await?;
//! assert_eq!(titles.path(&key).await?, "ROOT/users/1/1/10/posts/1/2/77/title");
//! assert_eq!(titles.read(&key).await?, None);
//! # Ok::<(), keynest::Error>(())
//! # });
//! ```
//!
//! # Batching
//!
//! [`Group::path_multi`], [`NamedCache::read_multi`] and [`NamedCache::write_multi`] resolve
//! the versions of many keys level by level with one `get_multi` per group, so the number of
//! round trips depends on the depth of the tree rather than the number of keys.
//!
//! # Features
//!
//! - `memory` (default): re-exports [`InMemoryStore`], a moka-backed store.
//! - `metrics`: records operation counts and durations through OpenTelemetry, see
//!   [`ConfigBuilder::metrics`].
//! - `test-util`: re-exports `MockStore`, a recording store with failure injection.

mod batch;
pub mod builder;
pub mod cache;
mod codec;
pub mod config;
pub mod error;
pub mod group;
pub mod key;
pub mod registry;
mod telemetry;

#[doc(inline)]
pub use builder::{CacheBuilder, GroupBuilder};
#[doc(inline)]
pub use cache::NamedCache;
#[doc(inline)]
pub use config::{Config, ConfigBuilder, DEFAULT_ROOT};
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use group::{DEFAULT_REVISION, Group, INITIAL_VERSION, VersionMode};
#[doc(inline)]
pub use key::{CompositeKey, KeySchema};
#[cfg(feature = "memory")]
#[doc(inline)]
pub use keynest_memory::{InMemoryStore, InMemoryStoreBuilder};
#[cfg(feature = "test-util")]
#[doc(inline)]
pub use keynest_store::testing::{MockStore, StoreOp};
#[doc(inline)]
pub use keynest_store::{CacheOptions, Store};
#[doc(inline)]
pub use registry::Registry;
#[doc(inline)]
pub use telemetry::CacheTelemetry;
