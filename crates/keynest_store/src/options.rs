// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Per-operation settings passed down to the store.
///
/// Every field is optional. Options are layered: a group's defaults, then a cache's own
/// settings, then the settings given to a single call. [`merge`](Self::merge) combines two
/// layers field by field, with the overlay winning wherever it sets a value.
///
/// # Examples
///
/// ```
/// use keynest_store::CacheOptions;
/// use std::time::Duration;
///
/// let group = CacheOptions::new().expires_in(Duration::from_secs(3600));
/// let cache = CacheOptions::new().unless_exist(true);
///
/// let merged = group.merge(&cache);
/// assert_eq!(merged.expires_in_value(), Some(Duration::from_secs(3600)));
/// assert!(merged.is_unless_exist());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CacheOptions {
    expires_in: Option<Duration>,
    unless_exist: Option<bool>,
    force: Option<bool>,
}

impl CacheOptions {
    /// Creates an empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long a written value stays readable.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }

    /// Only write when no value is stored under the key yet.
    #[must_use]
    pub fn unless_exist(mut self, unless_exist: bool) -> Self {
        self.unless_exist = Some(unless_exist);
        self
    }

    /// Makes `fetch` skip the read and always recompute the value.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    /// Returns the configured expiry, if any.
    #[must_use]
    pub fn expires_in_value(&self) -> Option<Duration> {
        self.expires_in
    }

    /// Returns `true` if writes must not replace an existing value.
    #[must_use]
    pub fn is_unless_exist(&self) -> bool {
        self.unless_exist.unwrap_or(false)
    }

    /// Returns `true` if `fetch` must ignore any stored value.
    #[must_use]
    pub fn is_force(&self) -> bool {
        self.force.unwrap_or(false)
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Layers `overlay` on top of `self`.
    ///
    /// Fields set in `overlay` replace the ones in `self`; unset fields fall through.
    #[must_use]
    pub fn merge(&self, overlay: &Self) -> Self {
        Self {
            expires_in: overlay.expires_in.or(self.expires_in),
            unless_exist: overlay.unless_exist.or(self.unless_exist),
            force: overlay.force.or(self.force),
        }
    }
}
