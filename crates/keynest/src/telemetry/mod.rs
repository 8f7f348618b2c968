// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Telemetry for cache and group operations.
//!
//! Every named cache operation and every invalidation is recorded as a structured `tracing`
//! event when logging is enabled. With the `metrics` feature, the same events also feed an
//! OpenTelemetry counter and duration histogram.

use std::sync::Arc;
use std::time::Duration;

use tracing::Level;

pub(crate) mod attributes;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Records cache events as logs and, with the `metrics` feature, as metrics.
///
/// Built by [`ConfigBuilder`](crate::ConfigBuilder) and shared by every group and cache of a
/// configured registry.
#[derive(Clone, Debug, Default)]
pub struct CacheTelemetry {
    inner: Arc<TelemetryInner>,
}

#[derive(Debug, Default)]
struct TelemetryInner {
    logging_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<metrics::Instruments>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Fetch,
    Read,
    Write,
    Delete,
    ReadMulti,
    WriteMulti,
    Invalidate,
    DeleteAll,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "cache.fetch",
            Self::Read => "cache.read",
            Self::Write => "cache.write",
            Self::Delete => "cache.delete",
            Self::ReadMulti => "cache.read_multi",
            Self::WriteMulti => "cache.write_multi",
            Self::Invalidate => "cache.invalidate",
            Self::DeleteAll => "cache.delete_all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Computed,
    Written,
    Deleted,
    Invalidated,
    Ok,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Computed => "cache.computed",
            Self::Written => "cache.written",
            Self::Deleted => "cache.deleted",
            Self::Invalidated => "cache.invalidated",
            Self::Ok => "cache.ok",
            Self::Error => "cache.error",
        }
    }

    pub fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::Computed | Self::Written | Self::Ok => Level::DEBUG,
            Self::Deleted | Self::Invalidated => Level::INFO,
            Self::Error => Level::ERROR,
        }
    }
}

impl CacheTelemetry {
    pub(crate) fn new(logging_enabled: bool) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                logging_enabled,
                #[cfg(any(feature = "metrics", test))]
                instruments: None,
            }),
        }
    }

    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn with_meter(logging_enabled: bool, meter: &opentelemetry::metrics::Meter) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                logging_enabled,
                instruments: Some(metrics::Instruments::new(meter)),
            }),
        }
    }

    /// Returns `true` if events are logged through `tracing`.
    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.inner.logging_enabled
    }

    /// Records one operation outcome.
    ///
    /// `name` is the cache name for cache operations and the group name for group operations.
    /// `path` is the resolved key when one was reached.
    pub(crate) fn record(
        &self,
        name: &str,
        operation: CacheOperation,
        activity: CacheActivity,
        path: Option<&str>,
        duration: Duration,
    ) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.inner.instruments {
            instruments.record(name, operation, activity, duration);
        }

        if self.inner.logging_enabled {
            Self::emit(name, operation, activity, path, duration);
        }
    }

    fn emit(name: &str, operation: CacheOperation, activity: CacheActivity, path: Option<&str>, duration: Duration) {
        let op = operation.as_str();
        let ev = activity.as_str();
        let path = path.unwrap_or_default();
        let duration_ns = duration.as_nanos();

        // Field names must match attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = name,
                    cache.operation = op,
                    cache.activity = ev,
                    cache.path = path,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        let level = activity.level();
        if level == Level::ERROR {
            emit_event!(error);
        } else if level == Level::INFO {
            emit_event!(info);
        } else {
            emit_event!(debug);
        }
    }
}
