// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builders for registering groups and named caches.

use std::marker::PhantomData;

use keynest_store::CacheOptions;

use crate::cache::NamedCache;
use crate::error::Result;
use crate::group::{DEFAULT_REVISION, Group, GroupSettings, VersionMode};
use crate::key::validate_segment;
use crate::registry::Registry;

#[derive(Debug)]
enum Owner<'a, S> {
    Registry(&'a Registry<S>),
    Group(&'a Group<S>),
}

/// Builder for a cache group.
///
/// Obtained from [`Registry::group`] for root groups and [`Group::child_group`] for children.
/// Nothing is registered until [`register`](Self::register) is called.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use keynest::{CacheOptions, Config, InMemoryStore, Registry};
///
/// let registry = Registry::new();
/// registry.configure(Config::builder(InMemoryStore::new()).build())?;
///
/// let countries = registry
///     .group("countries", "code")
///     .static_version(3)
///     .revision(2)
///     .default_options(CacheOptions::new().expires_in(Duration::from_secs(3600)))
///     .register()?;
///
/// assert!(countries.is_static());
/// # Ok::<(), keynest::Error>(())
/// ```
#[derive(Debug)]
pub struct GroupBuilder<'a, S> {
    owner: Owner<'a, S>,
    settings: GroupSettings,
}

impl<'a, S> GroupBuilder<'a, S> {
    fn new(owner: Owner<'a, S>, name: String, key_name: String) -> Self {
        Self {
            owner,
            settings: GroupSettings {
                name,
                key_name,
                default_options: CacheOptions::default(),
                version_mode: VersionMode::Dynamic,
                revision: DEFAULT_REVISION,
            },
        }
    }

    pub(crate) fn for_registry(registry: &'a Registry<S>, name: String, key_name: String) -> Self {
        Self::new(Owner::Registry(registry), name, key_name)
    }

    pub(crate) fn for_group(group: &'a Group<S>, name: String, key_name: String) -> Self {
        Self::new(Owner::Group(group), name, key_name)
    }

    /// Sets options every cache of this group and of its descendants starts from.
    ///
    /// A child's defaults are layered over its parent's.
    #[must_use]
    pub fn default_options(mut self, options: CacheOptions) -> Self {
        self.settings.default_options = options;
        self
    }

    /// Fixes the group's version.
    ///
    /// Static groups never read or write a version counter, and can't be invalidated; neither
    /// can a group with a static child be cleared with [`Group::delete_all`].
    #[must_use]
    pub fn static_version(mut self, version: u64) -> Self {
        self.settings.version_mode = VersionMode::Static(version);
        self
    }

    /// Sets how the version segment is obtained.
    #[must_use]
    pub fn version_mode(mut self, mode: VersionMode) -> Self {
        self.settings.version_mode = mode;
        self
    }

    /// Sets the revision tag that precedes the version in every path.
    ///
    /// Bumping the revision in code retires all keys of the group written by earlier
    /// deployments, typically when the shape of cached values changes.
    #[must_use]
    pub fn revision(mut self, revision: u32) -> Self {
        self.settings.revision = revision;
        self
    }

    /// Registers the group.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the registry is not configured, the name or key field
    /// is empty or contains `/`, a sibling already uses the name, or an ancestor already uses
    /// the key field.
    pub fn register(self) -> Result<Group<S>> {
        validate_segment("cache group name", &self.settings.name)?;
        validate_segment("key field", &self.settings.key_name)?;

        match self.owner {
            Owner::Registry(registry) => registry.attach_root(self.settings),
            Owner::Group(parent) => parent.attach_child(self.settings),
        }
    }
}

/// Builder for a named cache.
///
/// Obtained from [`Group::cache`].
///
/// # Examples
///
/// ```
/// use keynest::{CacheOptions, Config, InMemoryStore, Registry};
///
/// let registry = Registry::new();
/// registry.configure(Config::builder(InMemoryStore::new()).build())?;
/// let users = registry.register_group("users", "user_id")?;
///
/// let names = users
///     .cache::<String>("display_name")
///     .options(CacheOptions::new().unless_exist(true))
///     .register()?;
///
/// assert!(names.options().is_unless_exist());
/// # Ok::<(), keynest::Error>(())
/// ```
#[derive(Debug)]
pub struct CacheBuilder<'a, V, S> {
    group: &'a Group<S>,
    name: String,
    options: CacheOptions,
    _value: PhantomData<fn() -> V>,
}

impl<'a, V, S> CacheBuilder<'a, V, S> {
    pub(crate) fn new(group: &'a Group<S>, name: String) -> Self {
        Self {
            group,
            name,
            options: CacheOptions::default(),
            _value: PhantomData,
        }
    }

    /// Sets options layered over the group's defaults.
    #[must_use]
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Registers the cache on the group.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty, contains `/`, or is already used
    /// by another cache of the group.
    pub fn register(self) -> Result<NamedCache<V, S>> {
        let slot = self.group.attach_cache(self.name, &self.options)?;
        Ok(NamedCache::new(self.group.clone(), slot))
    }
}
