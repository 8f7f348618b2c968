// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for store operations.

use bytes::Bytes;

/// An error from a store operation.
///
/// Opaque on purpose: backends differ in how they fail (a dropped connection, a timeout, a
/// corrupt counter), and `keynest` only needs to know that the round trip failed. The backend's
/// own error is kept as the [`source`](std::error::Error::source).
///
/// # Example
///
/// ```
/// use keynest_store::Error;
///
/// let error = Error::from_message("connection refused");
/// assert!(error.to_string().contains("connection refused"));
/// ```
#[ohno::error]
pub struct Error {}

impl Error {
    /// Wraps a backend failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use keynest_store::Error;
    ///
    /// let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
    /// let error = Error::from_message(io);
    /// ```
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }

    /// Reports a payload found where a version counter was expected.
    ///
    /// Stores implementing [`Store::increment`](crate::Store::increment) natively return this
    /// when the server refuses to increment a non-numeric value.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use keynest_store::Error;
    ///
    /// let error = Error::not_a_counter(&Bytes::from_static(b"hello"));
    /// assert!(error.to_string().contains("hello"));
    /// ```
    #[must_use]
    pub fn not_a_counter(payload: &Bytes) -> Self {
        Self::caused_by(format!(
            "stored value is not a counter: {}",
            String::from_utf8_lossy(payload).escape_debug()
        ))
    }
}

/// A specialized [`Result`] type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_is_the_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer went away");
        let error = Error::from_message(io);

        let source = std::error::Error::source(&error).expect("cause is kept");
        assert!(source.to_string().contains("peer went away"));
    }

    #[test]
    fn not_a_counter_shows_the_payload() {
        let error = Error::not_a_counter(&Bytes::from_static(b"v1\n"));
        let display = error.to_string();
        assert!(display.contains("not a counter"), "got: {display}");
        assert!(display.contains("v1\\n"), "got: {display}");
    }

    #[test]
    fn not_a_counter_survives_binary_payloads() {
        let error = Error::not_a_counter(&Bytes::from_static(&[0xff, 0x00]));
        assert!(error.to_string().contains("not a counter"));
    }
}
