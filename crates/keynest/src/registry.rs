// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The registry: one configuration and the root groups created under it.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::builder::GroupBuilder;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::group::{Group, GroupNode, GroupSettings, attach};

/// Owns the configuration and every root group of an application.
///
/// A registry is configured exactly once, then hands out groups. Create one per process and
/// keep it for the process lifetime, usually in a `static` or an application state struct;
/// groups of a dropped registry lose their parents.
///
/// # Examples
///
/// ```
/// use keynest::{Config, InMemoryStore, Registry};
///
/// let registry = Registry::new();
/// assert!(!registry.is_configured());
///
/// registry.configure(Config::builder(InMemoryStore::new()).build())?;
/// let users = registry.register_group("users", "user_id")?;
///
/// assert_eq!(registry.roots().len(), 1);
/// assert_eq!(registry.root_group("users").map(|g| g.key_name().to_owned()), Some(users.key_name().to_owned()));
/// # Ok::<(), keynest::Error>(())
/// ```
pub struct Registry<S> {
    config: OnceLock<Arc<Config<S>>>,
    roots: RwLock<Vec<Arc<GroupNode<S>>>>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roots: Vec<String> = self.roots.read().iter().map(|node| node.name.clone()).collect();
        f.debug_struct("Registry")
            .field("configured", &self.is_configured())
            .field("roots", &roots)
            .finish_non_exhaustive()
    }
}

impl<S> Registry<S> {
    /// Creates an unconfigured registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: OnceLock::new(),
            roots: RwLock::new(Vec::new()),
        }
    }

    /// Creates a registry configured with `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the root token is malformed.
    pub fn with_config(config: Config<S>) -> Result<Self> {
        let registry = Self::new();
        registry.configure(config)?;
        Ok(registry)
    }

    /// Installs the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the registry is already configured or the root token
    /// is malformed.
    pub fn configure(&self, config: Config<S>) -> Result<()> {
        config.validate()?;
        self.config
            .set(Arc::new(config))
            .map_err(|_| Error::configuration("the registry is already configured"))
    }

    /// Installs the configuration built by `init` unless one is already installed.
    ///
    /// Hosts call this from their startup path so that libraries may configure the registry
    /// earlier without tripping the configure-once rule. `init` runs only if needed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the built root token is malformed.
    pub fn ensure_configured<F>(&self, init: F) -> Result<()>
    where
        F: FnOnce() -> Config<S>,
    {
        if self.is_configured() {
            return Ok(());
        }

        let config = init();
        config.validate()?;
        // A concurrent initializer may have won; its configuration stays.
        self.config.get_or_init(|| Arc::new(config));
        Ok(())
    }

    /// Returns `true` once a configuration is installed.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.get().is_some()
    }

    /// Returns the installed configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the registry is not configured yet.
    pub fn config(&self) -> Result<&Config<S>> {
        self.shared_config().map(|config| &**config)
    }

    fn shared_config(&self) -> Result<&Arc<Config<S>>> {
        self.config
            .get()
            .ok_or_else(|| Error::configuration("the registry must be configured before cache groups are registered"))
    }

    /// Starts registering a root group.
    #[must_use]
    pub fn group(&self, name: impl Into<String>, key_name: impl Into<String>) -> GroupBuilder<'_, S> {
        GroupBuilder::for_registry(self, name.into(), key_name.into())
    }

    /// Registers a dynamically versioned root group with default settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the registry is not configured, the name or key field
    /// is malformed, or another root group already uses the name.
    pub fn register_group(&self, name: impl Into<String>, key_name: impl Into<String>) -> Result<Group<S>> {
        self.group(name, key_name).register()
    }

    pub(crate) fn attach_root(&self, settings: GroupSettings) -> Result<Group<S>> {
        let config = Arc::clone(self.shared_config()?);
        let node = GroupNode::new(config, None, settings)?;
        attach(&self.roots, node, "at the root")
    }

    /// Returns the root groups in registration order.
    #[must_use]
    pub fn roots(&self) -> Vec<Group<S>> {
        self.roots
            .read()
            .iter()
            .map(|node| Group { node: Arc::clone(node) })
            .collect()
    }

    /// Returns the root group named `name`.
    #[must_use]
    pub fn root_group(&self, name: &str) -> Option<Group<S>> {
        self.roots
            .read()
            .iter()
            .find(|node| node.name == name)
            .map(|node| Group { node: Arc::clone(node) })
    }
}

#[cfg(test)]
mod tests {
    use keynest_store::testing::MockStore;

    use super::*;

    fn config() -> Config<MockStore> {
        Config::builder(MockStore::new()).build()
    }

    #[test]
    fn configure_twice_fails() {
        let registry = Registry::new();
        registry.configure(config()).expect("first configure failed");

        let err = registry.configure(config()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("already configured"));
    }

    #[test]
    fn ensure_configured_runs_init_once() {
        let registry = Registry::new();
        let mut calls = 0;

        registry
            .ensure_configured(|| {
                calls += 1;
                config()
            })
            .expect("ensure failed");
        registry
            .ensure_configured(|| {
                calls += 1;
                config()
            })
            .expect("ensure failed");

        assert_eq!(calls, 1);
        assert!(registry.is_configured());
    }

    #[test]
    fn ensure_configured_keeps_explicit_configuration() {
        let registry = Registry::new();
        registry
            .configure(Config::builder(MockStore::new()).root("explicit").build())
            .expect("configure failed");

        registry
            .ensure_configured(|| Config::builder(MockStore::new()).root("host").build())
            .expect("ensure failed");

        assert_eq!(registry.config().expect("configured").root(), "explicit");
    }

    #[test]
    fn malformed_root_is_rejected_and_leaves_registry_unconfigured() {
        let registry = Registry::new();
        let err = registry
            .configure(Config::builder(MockStore::new()).root("a/b").build())
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(!registry.is_configured());
    }

    #[test]
    fn registering_before_configure_fails() {
        let registry: Registry<MockStore> = Registry::new();
        let err = registry.register_group("users", "id").unwrap_err();
        assert!(err.is_configuration());
        assert!(registry.config().is_err());
    }

    #[test]
    fn duplicate_root_names_fail() {
        let registry = Registry::with_config(config()).expect("configure failed");
        registry.register_group("users", "id").expect("register failed");

        let err = registry.register_group("users", "other").unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(registry.roots().len(), 1);
    }

    #[test]
    fn debug_lists_roots() {
        let registry = Registry::with_config(config()).expect("configure failed");
        registry.register_group("users", "id").expect("register failed");

        let rendered = format!("{registry:?}");
        assert!(rendered.contains("configured: true"));
        assert!(rendered.contains("users"));
    }
}
