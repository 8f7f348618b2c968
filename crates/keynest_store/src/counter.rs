// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Raw counter encoding.
//!
//! Group versions live in the store next to cached values. They are stored as ASCII decimal
//! strings, the representation memcached and Redis use for their native increment commands, so
//! a store backed by either can implement [`Store::increment`](crate::Store::increment) with a
//! single server-side call.

use bytes::Bytes;

use crate::Error;

/// Encodes a counter value as an ASCII decimal payload.
///
/// # Examples
///
/// ```
/// use keynest_store::counter;
///
/// assert_eq!(&counter::encode(42)[..], b"42");
/// ```
#[must_use]
pub fn encode(value: u64) -> Bytes {
    Bytes::from(value.to_string())
}

/// Decodes an ASCII decimal payload into a counter value.
///
/// # Errors
///
/// Returns an error if the payload is not a decimal `u64`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use keynest_store::counter;
///
/// assert_eq!(counter::decode(&Bytes::from_static(b"7")).unwrap(), 7);
/// assert!(counter::decode(&Bytes::from_static(b"seven")).is_err());
/// ```
pub fn decode(payload: &Bytes) -> Result<u64, Error> {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .ok_or_else(|| Error::not_a_counter(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_keeps_value() {
        assert_eq!(decode(&encode(0)).expect("decode failed"), 0);
        assert_eq!(decode(&encode(u64::MAX)).expect("decode failed"), u64::MAX);
    }

    #[test]
    fn decode_tolerates_surrounding_whitespace() {
        assert_eq!(decode(&Bytes::from_static(b" 12\r\n")).expect("decode failed"), 12);
    }

    #[test]
    fn decode_rejects_negative_and_binary_payloads() {
        assert!(decode(&Bytes::from_static(b"-1")).is_err());
        assert!(decode(&Bytes::from_static(&[0xff, 0xfe])).is_err());
        assert!(decode(&Bytes::new()).is_err());
    }
}
