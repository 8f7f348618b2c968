// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Batched path resolution.
//!
//! Resolving paths for many keys walks the group chain once per level. At each level the
//! distinct parent paths are collected, their version keys read with a single `get_multi`,
//! and only the counters that were absent are initialized one by one.

use std::collections::HashMap;
use std::sync::Arc;

use keynest_store::{Store, counter};

use crate::error::Result;
use crate::group::{Group, GroupNode, INITIAL_VERSION, VersionMode};
use crate::key::CompositeKey;

impl<S: Store> GroupNode<S> {
    pub(crate) async fn version_multi(&self, parent_paths: &[String]) -> Result<HashMap<String, u64>> {
        if let VersionMode::Static(version) = self.version_mode() {
            return Ok(parent_paths.iter().map(|parent| (parent.clone(), version)).collect());
        }

        if parent_paths.is_empty() {
            return Ok(HashMap::new());
        }

        let version_keys: Vec<String> = parent_paths.iter().map(|parent| self.version_key(parent)).collect();
        let found = self.config.store().get_multi(&version_keys).await?;

        let mut versions = HashMap::with_capacity(parent_paths.len());
        for (parent, version_key) in parent_paths.iter().zip(&version_keys) {
            let version = match found.get(version_key) {
                Some(payload) => counter::decode(payload)?,
                None => {
                    let payload = self
                        .config
                        .store()
                        .fetch_or_insert_with(version_key, || counter::encode(INITIAL_VERSION))
                        .await?;
                    counter::decode(&payload)?
                }
            };
            versions.insert(parent.clone(), version);
        }

        Ok(versions)
    }
}

/// Resolves the paths of all `keys` through `chain`, starting from `root`.
///
/// Every key is checked against every level before the store is touched.
pub(crate) async fn resolve_multi<S: Store>(
    chain: &[Arc<GroupNode<S>>],
    keys: &[CompositeKey],
    root: &str,
) -> Result<HashMap<CompositeKey, String>> {
    for key in keys {
        for node in chain {
            key.require(&node.key_name, &node.name)?;
        }
    }

    let mut paths: HashMap<CompositeKey, String> = keys.iter().map(|key| (key.clone(), root.to_owned())).collect();

    for node in chain {
        let mut parents: Vec<String> = paths.values().cloned().collect();
        parents.sort_unstable();
        parents.dedup();

        let versions = node.version_multi(&parents).await?;

        for (key, path) in &mut paths {
            let value = key.require(&node.key_name, &node.name)?;
            let version = match versions.get(path.as_str()) {
                Some(version) => *version,
                None => node.version(path).await?,
            };
            *path = node.compose(path, version, value);
        }
    }

    Ok(paths)
}

impl<S: Store> Group<S> {
    /// Resolves the paths of many keys with as few store round trips as possible.
    ///
    /// Duplicate keys collapse into one entry. An empty slice resolves to an empty map without
    /// touching the store, and so does any set of keys when every group on the way is
    /// statically versioned.
    ///
    /// # Errors
    ///
    /// Returns a missing-key error if any key lacks a field of the group's schema, and a store
    /// error if versions could not be read.
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
    ///
    /// let keys = [CompositeKey::new().with("user_id", 1), CompositeKey::new().with("user_id", 2)];
    /// let paths = users.path_multi(&keys).await?;
    ///
    /// assert_eq!(paths[&keys[0]], "ROOT/users/1/1/1");
    /// assert_eq!(paths[&keys[1]], "ROOT/users/1/1/2");
    /// # Ok::<(), keynest::Error>(())
    /// # });
    /// ```
    pub async fn path_multi(&self, keys: &[CompositeKey]) -> Result<HashMap<CompositeKey, String>> {
        resolve_multi(&self.node.lineage()?, keys, self.node.config.root()).await
    }

    /// Resolves the parent group's paths for many keys; every key maps to the root token for
    /// root groups.
    ///
    /// # Errors
    ///
    /// As for [`path_multi`](Self::path_multi).
    pub async fn parent_path_multi(&self, keys: &[CompositeKey]) -> Result<HashMap<CompositeKey, String>> {
        resolve_multi(&self.node.ancestors()?, keys, self.node.config.root()).await
    }

    /// Returns this group's version under each of `parent_paths`.
    ///
    /// Dynamic groups read all counters with one `get_multi` and initialize only the absent
    /// ones.
    ///
    /// # Errors
    ///
    /// Returns a store error if a counter could not be read or decoded.
    pub async fn version_multi(&self, parent_paths: &[String]) -> Result<HashMap<String, u64>> {
        self.node.version_multi(parent_paths).await
    }
}

#[cfg(test)]
mod tests {
    use keynest_store::testing::{MockStore, StoreOp};

    use super::*;
    use crate::{Config, Registry};

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    fn registry(store: &MockStore) -> Registry<MockStore> {
        Registry::with_config(Config::builder(store.clone()).build()).expect("configure failed")
    }

    #[test]
    fn version_multi_batches_reads_and_initializes_misses() {
        let store = MockStore::new();
        let registry = registry(&store);
        let group = registry.register_group("g", "id").expect("register failed");
        block_on(group.invalidate_cache_group(None)).expect("invalidate failed");
        store.clear_operations();

        let parents = vec!["ROOT".to_string(), "OTHER".to_string()];
        let versions = block_on(group.version_multi(&parents)).expect("version_multi failed");

        assert_eq!(versions["ROOT"], 2);
        assert_eq!(versions["OTHER"], INITIAL_VERSION);
        assert_eq!(
            store.operations(),
            vec![
                StoreOp::GetMulti(vec!["ROOT/g/_version".to_string(), "OTHER/g/_version".to_string()]),
                StoreOp::FetchOrInsert("OTHER/g/_version".to_string()),
            ]
        );
    }

    #[test]
    fn version_multi_of_nothing_touches_nothing() {
        let store = MockStore::new();
        let registry = registry(&store);
        let group = registry.register_group("g", "id").expect("register failed");

        assert!(block_on(group.version_multi(&[])).expect("version_multi failed").is_empty());
        assert!(store.operations().is_empty());
    }

    #[test]
    fn distinct_parents_are_read_once() {
        let store = MockStore::new();
        let registry = registry(&store);
        let parent = registry.register_group("parent", "parentid").expect("register failed");
        let child = parent.register_child_group("child", "childid").expect("register failed");

        let keys: Vec<CompositeKey> = (1..=3)
            .map(|i| CompositeKey::from([("parentid", 7), ("childid", i)]))
            .collect();
        block_on(child.path_multi(&keys)).expect("path_multi failed");

        let batched: Vec<StoreOp> = store
            .operations()
            .into_iter()
            .filter(|op| matches!(op, StoreOp::GetMulti(_)))
            .collect();
        assert_eq!(
            batched,
            vec![
                StoreOp::GetMulti(vec!["ROOT/parent/_version".to_string()]),
                StoreOp::GetMulti(vec!["ROOT/parent/1/1/7/child/_version".to_string()]),
            ]
        );
    }

    #[test]
    fn missing_field_in_any_key_fails_before_store_access() {
        let store = MockStore::new();
        let registry = registry(&store);
        let group = registry.register_group("g", "id").expect("register failed");

        let keys = [CompositeKey::new().with("id", 1), CompositeKey::new().with("other", 2)];
        let err = block_on(group.path_multi(&keys)).unwrap_err();

        assert!(err.is_missing_key());
        assert!(store.operations().is_empty());
    }
}
