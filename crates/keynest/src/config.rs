// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Registry configuration: the store and how telemetry is recorded.

use std::fmt::Debug;

#[cfg(any(feature = "metrics", test))]
use opentelemetry::metrics::{Meter, MeterProvider};

use crate::key::validate_segment;
use crate::telemetry::CacheTelemetry;

/// The root token of every path unless [`ConfigBuilder::root`] says otherwise.
pub const DEFAULT_ROOT: &str = "ROOT";

/// Configuration of a [`Registry`](crate::Registry).
///
/// Holds the store every group and cache of the registry talks to, the root path token, and
/// telemetry settings.
///
/// # Examples
///
/// ```
/// use keynest::{Config, InMemoryStore};
///
/// let config = Config::builder(InMemoryStore::new())
///     .root("myapp")
///     .logs(true)
///     .build();
///
/// assert_eq!(config.root(), "myapp");
/// ```
#[derive(Debug)]
pub struct Config<S> {
    store: S,
    root: String,
    telemetry: CacheTelemetry,
}

impl<S> Config<S> {
    /// Starts a configuration around `store`.
    #[must_use]
    pub fn builder(store: S) -> ConfigBuilder<S> {
        ConfigBuilder {
            store,
            root: DEFAULT_ROOT.to_owned(),
            logs: false,
            #[cfg(any(feature = "metrics", test))]
            meter: None,
        }
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the token every path starts with.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the telemetry recorder.
    #[must_use]
    pub fn telemetry(&self) -> &CacheTelemetry {
        &self.telemetry
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        validate_segment("root token", &self.root)
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder<S> {
    store: S,
    root: String,
    logs: bool,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<Meter>,
}

impl<S: Debug> Debug for ConfigBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("store", &self.store)
            .field("root", &self.root)
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}

impl<S> ConfigBuilder<S> {
    /// Sets the root token, `ROOT` by default.
    ///
    /// Registries sharing a store but using different roots never see each other's entries.
    /// The token must be non-empty and contain no `/`; this is checked when the configuration
    /// is handed to a registry.
    #[must_use]
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// Enables or disables `tracing` events for cache and group operations.
    ///
    /// Off by default.
    #[must_use]
    pub fn logs(mut self, enabled: bool) -> Self {
        self.logs = enabled;
        self
    }

    /// Records operation counts and durations through `meter_provider`.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn metrics(mut self, meter_provider: &dyn MeterProvider) -> Self {
        self.meter = Some(crate::telemetry::metrics::create_meter(meter_provider));
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config<S> {
        #[cfg(any(feature = "metrics", test))]
        let telemetry = match &self.meter {
            Some(meter) => CacheTelemetry::with_meter(self.logs, meter),
            None => CacheTelemetry::new(self.logs),
        };
        #[cfg(not(any(feature = "metrics", test)))]
        let telemetry = CacheTelemetry::new(self.logs);

        Config {
            store: self.store,
            root: self.root,
            telemetry,
        }
    }
}
