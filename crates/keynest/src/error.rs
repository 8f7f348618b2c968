// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for namespacing and cache access.

use std::fmt;

/// What went wrong in a keynest operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The registry or group tree is used in a way it was not set up for: configuring twice,
    /// registering on an unconfigured registry, invalidating a statically versioned group,
    /// duplicate or malformed names. Never transient.
    Configuration(String),
    /// A composite key lacks a field the group's schema requires.
    MissingKey {
        /// The missing field.
        field: String,
        /// The group that requires it.
        group: String,
    },
    /// The store failed; the store error is the cause.
    Store,
    /// A value could not be encoded, or a stored payload could not be decoded.
    Codec,
    /// The producer given to [`try_fetch`](crate::NamedCache::try_fetch) failed; its error is
    /// the cause.
    Producer,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::MissingKey { field, group } => write!(f, "missing required key '{field}' for cache group '{group}'"),
            Self::Store => f.write_str("store operation failed"),
            Self::Codec => f.write_str("cached value could not be encoded or decoded"),
            Self::Producer => f.write_str("value producer failed"),
        }
    }
}

/// An error from a keynest operation.
///
/// Inspect [`kind`](Self::kind) to tell caller mistakes (configuration, missing key) from
/// store failures. Store failures carry the original [`keynest_store::Error`] as their source.
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
/// let err = users.path(&CompositeKey::new()).await.unwrap_err();
/// assert!(err.is_missing_key());
/// assert!(err.to_string().contains("user_id"));
/// # Ok::<(), keynest::Error>(())
/// # });
/// ```
#[ohno::error]
#[display("{kind}")]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration(message.into()))
    }

    pub(crate) fn missing_key(field: &str, group: &str) -> Self {
        Self::new(ErrorKind::MissingKey {
            field: field.to_owned(),
            group: group.to_owned(),
        })
    }

    pub(crate) fn codec(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Codec, cause)
    }

    pub(crate) fn producer(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::caused_by(ErrorKind::Producer, cause)
    }

    /// Returns what went wrong.
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns `true` for configuration errors.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, ErrorKind::Configuration(_))
    }

    /// Returns `true` if a composite key lacked a required field.
    #[must_use]
    pub fn is_missing_key(&self) -> bool {
        matches!(self.kind, ErrorKind::MissingKey { .. })
    }

    /// Returns `true` if the store failed.
    #[must_use]
    pub fn is_store(&self) -> bool {
        matches!(self.kind, ErrorKind::Store)
    }

    /// Returns `true` for encoding and decoding failures.
    #[must_use]
    pub fn is_codec(&self) -> bool {
        matches!(self.kind, ErrorKind::Codec)
    }
}

impl From<keynest_store::Error> for Error {
    fn from(error: keynest_store::Error) -> Self {
        Self::caused_by(ErrorKind::Store, error)
    }
}

/// A specialized [`Result`] type for keynest operations.
pub type Result<T> = std::result::Result<T, Error>;
