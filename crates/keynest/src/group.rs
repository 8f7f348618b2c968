// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache groups: versioned namespaces that nest into a tree.
//!
//! A group's path for an entity is built from its parent's path for the same entity, the
//! group's name, its revision, its current version, and the entity's key value:
//!
//! ```text
//! ROOT/users/1/3/10/posts/1/1/77
//! ^^^^ ^^^^^ ^ ^ ^^
//! root name  | | key value of `user_id`
//!            | version of `users` under ROOT
//!            revision
//! ```
//!
//! Dynamic versions live in the store under `<parent path>/<name>/_version`. Incrementing that
//! counter orphans every key below it in one write.

use std::fmt::{self, Display};
use std::sync::{Arc, Weak};
use std::time::Instant;

use keynest_store::{CacheOptions, Store, counter};
use parking_lot::RwLock;

use crate::builder::{CacheBuilder, GroupBuilder};
use crate::cache::NamedCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::key::{CompositeKey, KeySchema};
use crate::telemetry::{CacheActivity, CacheOperation};

/// The version a dynamic group starts at, and the value an absent counter is read as.
pub const INITIAL_VERSION: u64 = 1;

/// The revision tag groups carry unless registered with another.
pub const DEFAULT_REVISION: u32 = 1;

/// How a group obtains the version segment of its paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VersionMode {
    /// The version is a counter in the store, per parent path. Invalidation increments it.
    #[default]
    Dynamic,
    /// The version is fixed. Resolving it never touches the store, and the group can't be
    /// invalidated.
    Static(u64),
}

/// A named cache slot registered on a group; the value type lives in [`NamedCache`].
#[derive(Debug)]
pub(crate) struct CacheSlot {
    pub(crate) name: String,
    pub(crate) options: CacheOptions,
}

impl CacheSlot {
    pub(crate) fn path(&self, group_path: &str) -> String {
        format!("{group_path}/{}", self.name)
    }
}

/// Settings a new group is created from.
#[derive(Debug)]
pub(crate) struct GroupSettings {
    pub(crate) name: String,
    pub(crate) key_name: String,
    pub(crate) default_options: CacheOptions,
    pub(crate) version_mode: VersionMode,
    pub(crate) revision: u32,
}

pub(crate) struct GroupNode<S> {
    pub(crate) config: Arc<Config<S>>,
    pub(crate) name: String,
    pub(crate) key_name: String,
    schema: KeySchema,
    default_options: CacheOptions,
    version_mode: VersionMode,
    revision: u32,
    parent: Option<Weak<Self>>,
    children: RwLock<Vec<Arc<Self>>>,
    caches: RwLock<Vec<Arc<CacheSlot>>>,
}

impl<S> GroupNode<S> {
    /// Creates a group below `parent`, or a root group when there is none.
    ///
    /// Options and the key schema are inherited from the parent here, once.
    pub(crate) fn new(config: Arc<Config<S>>, parent: Option<&Arc<Self>>, settings: GroupSettings) -> Result<Arc<Self>> {
        let (schema, default_options) = match parent {
            Some(parent) => {
                if parent.schema.contains(&settings.key_name) {
                    return Err(Error::configuration(format!(
                        "key field '{}' of cache group '{}' is already used by an ancestor",
                        settings.key_name, settings.name
                    )));
                }
                (
                    parent.schema.extend(&settings.key_name),
                    parent.default_options.merge(&settings.default_options),
                )
            }
            None => (KeySchema::default().extend(&settings.key_name), settings.default_options),
        };

        Ok(Arc::new(Self {
            config,
            name: settings.name,
            key_name: settings.key_name,
            schema,
            default_options,
            version_mode: settings.version_mode,
            revision: settings.revision,
            parent: parent.map(Arc::downgrade),
            children: RwLock::new(Vec::new()),
            caches: RwLock::new(Vec::new()),
        }))
    }

    pub(crate) fn version_mode(&self) -> VersionMode {
        self.version_mode
    }

    pub(crate) fn is_static(&self) -> bool {
        matches!(self.version_mode, VersionMode::Static(_))
    }

    pub(crate) fn version_key(&self, parent_path: &str) -> String {
        format!("{parent_path}/{}/_version", self.name)
    }

    pub(crate) fn compose(&self, parent_path: &str, version: u64, value: &str) -> String {
        format!("{parent_path}/{}/{}/{version}/{value}", self.name, self.revision)
    }

    fn parent(&self) -> Result<Option<Arc<Self>>> {
        match &self.parent {
            None => Ok(None),
            Some(parent) => parent.upgrade().map(Some).ok_or_else(|| {
                Error::configuration(format!(
                    "the parent of cache group '{}' has been dropped along with its registry",
                    self.name
                ))
            }),
        }
    }

    /// Returns the ancestors of this group, root first.
    pub(crate) fn ancestors(&self) -> Result<Vec<Arc<Self>>> {
        let mut chain = Vec::new();
        let mut next = self.parent()?;
        while let Some(node) = next {
            next = node.parent()?;
            chain.push(node);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Returns the ancestors of this group followed by the group itself.
    pub(crate) fn lineage(self: &Arc<Self>) -> Result<Vec<Arc<Self>>> {
        let mut chain = self.ancestors()?;
        chain.push(Arc::clone(self));
        Ok(chain)
    }
}

impl<S: Store> GroupNode<S> {
    pub(crate) async fn version(&self, parent_path: &str) -> Result<u64> {
        match self.version_mode {
            VersionMode::Static(version) => Ok(version),
            VersionMode::Dynamic => {
                let payload = self
                    .config
                    .store()
                    .fetch_or_insert_with(&self.version_key(parent_path), || counter::encode(INITIAL_VERSION))
                    .await?;
                Ok(counter::decode(&payload)?)
            }
        }
    }

    pub(crate) async fn increment_version(&self, parent_path: &str) -> Result<(String, u64)> {
        let version_key = self.version_key(parent_path);
        let version = self.config.store().increment(&version_key, INITIAL_VERSION).await?;
        Ok((version_key, version))
    }
}

/// Resolves the path of `key` through `chain`, starting from `path`.
///
/// Every field is checked before the store is touched.
pub(crate) async fn resolve<S: Store>(chain: &[Arc<GroupNode<S>>], key: &CompositeKey, mut path: String) -> Result<String> {
    for node in chain {
        key.require(&node.key_name, &node.name)?;
    }

    for node in chain {
        let value = key.require(&node.key_name, &node.name)?;
        let version = node.version(&path).await?;
        path = node.compose(&path, version, value);
    }

    Ok(path)
}

/// Attaches `node` to `siblings`, refusing a second group of the same name.
pub(crate) fn attach<S>(siblings: &RwLock<Vec<Arc<GroupNode<S>>>>, node: Arc<GroupNode<S>>, owner: &str) -> Result<Group<S>> {
    let mut siblings = siblings.write();
    if siblings.iter().any(|sibling| sibling.name == node.name) {
        return Err(Error::configuration(format!(
            "a cache group named '{}' is already registered {owner}",
            node.name
        )));
    }
    siblings.push(Arc::clone(&node));
    Ok(Group { node })
}

/// A versioned namespace of cache keys.
///
/// Groups are cheap handles; clones refer to the same group. They're created through
/// [`Registry::group`](crate::Registry::group) for roots and [`Group::child_group`] below
/// those, and live as long as the registry.
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
/// let key = CompositeKey::new().with("user_id", 10);
/// assert_eq!(users.path(&key).await?, "ROOT/users/1/1/10");
///
/// users.invalidate_cache_group(None).await?;
/// assert_eq!(users.path(&key).await?, "ROOT/users/1/2/10");
/// # Ok::<(), keynest::Error>(())
/// # });
/// ```
pub struct Group<S> {
    pub(crate) node: Arc<GroupNode<S>>,
}

impl<S> Clone for Group<S> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<S> fmt::Debug for Group<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.node.name)
            .field("key_name", &self.node.key_name)
            .field("version_mode", &self.node.version_mode)
            .field("revision", &self.node.revision)
            .finish_non_exhaustive()
    }
}

impl<S> Group<S> {
    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Returns the key field this group adds to its parent's schema.
    #[must_use]
    pub fn key_name(&self) -> &str {
        &self.node.key_name
    }

    /// Returns every key field this group's keys need, outermost ancestor first.
    #[must_use]
    pub fn key_schema(&self) -> &KeySchema {
        &self.node.schema
    }

    /// Returns the options caches of this group start from.
    #[must_use]
    pub fn default_options(&self) -> &CacheOptions {
        &self.node.default_options
    }

    /// Returns how the group's version is obtained.
    #[must_use]
    pub fn version_mode(&self) -> VersionMode {
        self.node.version_mode
    }

    /// Returns the revision tag.
    #[must_use]
    pub fn revision(&self) -> u32 {
        self.node.revision
    }

    /// Returns `true` if the group has a fixed version.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.node.is_static()
    }

    /// Returns the configuration the group was created under.
    #[must_use]
    pub fn config(&self) -> &Config<S> {
        &self.node.config
    }

    /// Returns the parent group, or `None` for root groups.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the registry owning the parent is gone.
    pub fn parent(&self) -> Result<Option<Self>> {
        Ok(self.node.parent()?.map(|node| Self { node }))
    }

    /// Returns the child groups in registration order.
    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        self.node
            .children
            .read()
            .iter()
            .map(|node| Self { node: Arc::clone(node) })
            .collect()
    }

    /// Returns the child group named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<Self> {
        self.node
            .children
            .read()
            .iter()
            .find(|node| node.name == name)
            .map(|node| Self { node: Arc::clone(node) })
    }

    /// Returns the names of the caches registered on this group.
    #[must_use]
    pub fn cache_names(&self) -> Vec<String> {
        self.node.caches.read().iter().map(|slot| slot.name.clone()).collect()
    }

    /// Builds a composite key from values given in [`key_schema`](Self::key_schema) order.
    ///
    /// # Errors
    ///
    /// Returns a missing-key error if there are fewer values than fields, and a configuration
    /// error if there are more.
    ///
    /// # Examples
    ///
    /// ```
    /// use keynest::{Config, InMemoryStore, Registry};
    ///
    /// let registry = Registry::new();
    /// registry.configure(Config::builder(InMemoryStore::new()).build())?;
    /// let posts = registry
    ///     .register_group("users", "user_id")?
    ///     .register_child_group("posts", "post_id")?;
    ///
    /// let key = posts.key([10, 77])?;
    /// assert_eq!(key.get("user_id"), Some("10"));
    /// assert_eq!(key.get("post_id"), Some("77"));
    /// # Ok::<(), keynest::Error>(())
    /// ```
    pub fn key<I>(&self, values: I) -> Result<CompositeKey>
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let mut values = values.into_iter();
        let mut key = CompositeKey::new();

        for field in self.node.schema.fields() {
            let value = values.next().ok_or_else(|| Error::missing_key(field, &self.node.name))?;
            key.insert(field.as_str(), value);
        }

        if values.next().is_some() {
            return Err(Error::configuration(format!(
                "cache group '{}' takes {} key values",
                self.node.name,
                self.node.schema.len()
            )));
        }

        Ok(key)
    }

    /// Starts registering a child group.
    #[must_use]
    pub fn child_group(&self, name: impl Into<String>, key_name: impl Into<String>) -> GroupBuilder<'_, S> {
        GroupBuilder::for_group(self, name.into(), key_name.into())
    }

    /// Registers a dynamically versioned child group with default settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name or key field is malformed, a sibling already
    /// uses the name, or an ancestor already uses the key field.
    pub fn register_child_group(&self, name: impl Into<String>, key_name: impl Into<String>) -> Result<Self> {
        self.child_group(name, key_name).register()
    }

    pub(crate) fn attach_child(&self, settings: GroupSettings) -> Result<Self> {
        let node = GroupNode::new(Arc::clone(&self.node.config), Some(&self.node), settings)?;
        attach(&self.node.children, node, &format!("under cache group '{}'", self.node.name))
    }

    /// Starts registering a named cache holding values of type `V`.
    #[must_use]
    pub fn cache<V>(&self, name: impl Into<String>) -> CacheBuilder<'_, V, S> {
        CacheBuilder::new(self, name.into())
    }

    /// Registers a named cache with the group's default options.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is malformed or already used on this group.
    pub fn register_cache<V>(&self, name: impl Into<String>) -> Result<NamedCache<V, S>> {
        self.cache(name).register()
    }

    pub(crate) fn attach_cache(&self, name: String, options: &CacheOptions) -> Result<Arc<CacheSlot>> {
        crate::key::validate_segment("cache name", &name)?;

        let mut caches = self.node.caches.write();
        if caches.iter().any(|slot| slot.name == name) {
            return Err(Error::configuration(format!(
                "a cache named '{name}' is already registered on cache group '{}'",
                self.node.name
            )));
        }

        let slot = Arc::new(CacheSlot {
            name,
            options: self.node.default_options.merge(options),
        });
        caches.push(Arc::clone(&slot));
        Ok(slot)
    }

    fn static_child(&self) -> Option<Arc<GroupNode<S>>> {
        self.node.children.read().iter().find(|node| node.is_static()).cloned()
    }
}

impl<S: Store> Group<S> {
    /// Resolves the namespace prefix for `key`, consulting ancestor groups as needed.
    ///
    /// # Errors
    ///
    /// Returns a missing-key error if `key` lacks a field of [`key_schema`](Self::key_schema),
    /// and a store error if a version could not be read.
    pub async fn path(&self, key: &CompositeKey) -> Result<String> {
        self.path_with_parent(key, None).await
    }

    /// Resolves the namespace prefix for `key`, starting from an already resolved parent path.
    ///
    /// With `Some(parent_path)` only this group's own version is read. Pass the path the
    /// parent group resolved for the same entity; any other value produces keys no one reads.
    ///
    /// # Errors
    ///
    /// As for [`path`](Self::path).
    pub async fn path_with_parent(&self, key: &CompositeKey, parent_path: Option<&str>) -> Result<String> {
        match parent_path {
            Some(parent_path) => resolve(std::slice::from_ref(&self.node), key, parent_path.to_owned()).await,
            None => resolve(&self.node.lineage()?, key, self.root()).await,
        }
    }

    /// Resolves the parent group's path for `key`, or the root token for root groups.
    ///
    /// # Errors
    ///
    /// As for [`path`](Self::path).
    pub async fn parent_path(&self, key: &CompositeKey) -> Result<String> {
        resolve(&self.node.ancestors()?, key, self.root()).await
    }

    /// Returns this group's version under `parent_path`.
    ///
    /// Static groups return their fixed version. Dynamic groups read their counter, storing
    /// [`INITIAL_VERSION`] first if it is absent.
    ///
    /// # Errors
    ///
    /// Returns a store error if the counter could not be read or decoded.
    pub async fn version(&self, parent_path: &str) -> Result<u64> {
        self.node.version(parent_path).await
    }

    /// Moves every key of this group under one parent entity to a fresh namespace.
    ///
    /// Root groups take `None`. Child groups take the key of the parent entity, and only that
    /// entity's keys move; other entities and the parent's own keys are untouched. Returns the
    /// new version.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for statically versioned groups, a missing-key error if
    /// the parent key is absent or incomplete, and a store error if the counter could not be
    /// incremented.
    pub async fn invalidate_cache_group(&self, parent_key: Option<&CompositeKey>) -> Result<u64> {
        let started = Instant::now();
        let outcome = self.invalidate(parent_key).await;

        let (activity, path) = match &outcome {
            Ok((version_key, _)) => (CacheActivity::Invalidated, Some(version_key.as_str())),
            Err(_) => (CacheActivity::Error, None),
        };
        self.node
            .config
            .telemetry()
            .record(&self.node.name, CacheOperation::Invalidate, activity, path, started.elapsed());

        outcome.map(|(_, version)| version)
    }

    async fn invalidate(&self, parent_key: Option<&CompositeKey>) -> Result<(String, u64)> {
        if self.is_static() {
            return Err(Error::configuration(format!(
                "cache group '{}' has a static version and cannot be invalidated",
                self.node.name
            )));
        }

        let ancestors = self.node.ancestors()?;
        let parent_path = match (ancestors.last(), parent_key) {
            (None, _) => self.root(),
            (Some(parent), None) => return Err(Error::missing_key(&parent.key_name, &parent.name)),
            (Some(_), Some(key)) => resolve(&ancestors, key, self.root()).await?,
        };

        self.node.increment_version(&parent_path).await
    }

    /// Removes everything cached under `key` in this group.
    ///
    /// Each named cache's entry for `key` is deleted, and every child group is invalidated
    /// for `key`, which orphans the whole subtree below. The group's own version is left
    /// alone, so sibling entities keep their entries. Pass the parent's resolved path as
    /// `parent_path` to skip resolving ancestors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, before anything is deleted, if a child group has a
    /// static version. Otherwise as for [`path`](Self::path), plus store errors from the
    /// deletes and increments, which stop at the first failure.
    pub async fn delete_all(&self, key: &CompositeKey, parent_path: Option<&str>) -> Result<()> {
        let started = Instant::now();
        let outcome = self.delete_entries(key, parent_path).await;

        let (activity, path) = match &outcome {
            Ok(group_path) => (CacheActivity::Deleted, Some(group_path.as_str())),
            Err(_) => (CacheActivity::Error, None),
        };
        self.node
            .config
            .telemetry()
            .record(&self.node.name, CacheOperation::DeleteAll, activity, path, started.elapsed());

        outcome.map(|_| ())
    }

    async fn delete_entries(&self, key: &CompositeKey, parent_path: Option<&str>) -> Result<String> {
        if let Some(child) = self.static_child() {
            return Err(Error::configuration(format!(
                "cache group '{}' has statically versioned child '{}' and cannot be deleted",
                self.node.name, child.name
            )));
        }

        let group_path = self.path_with_parent(key, parent_path).await?;

        let caches = self.node.caches.read().clone();
        for slot in &caches {
            self.node.config.store().delete(&slot.path(&group_path), &slot.options).await?;
        }

        let children = self.node.children.read().clone();
        for child in &children {
            child.increment_version(&group_path).await?;
        }

        Ok(group_path)
    }

    pub(crate) fn root(&self) -> String {
        self.node.config.root().to_owned()
    }
}
