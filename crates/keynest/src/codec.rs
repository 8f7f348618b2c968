// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Value serialization for named caches.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub(crate) fn encode<V: Serialize>(value: &V) -> Result<Bytes> {
    postcard::to_allocvec(value).map(Bytes::from).map_err(Error::codec)
}

pub(crate) fn decode<V: DeserializeOwned>(payload: &Bytes) -> Result<V> {
    postcard::from_bytes(payload).map_err(Error::codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_values_survive() {
        let value = (42_u32, "name".to_string(), vec![1_u8, 2, 3]);
        let payload = encode(&value).expect("encode failed");
        let back: (u32, String, Vec<u8>) = decode(&payload).expect("decode failed");
        assert_eq!(back, value);
    }

    #[test]
    fn truncated_payload_is_a_codec_error() {
        let payload = encode(&"a longer string".to_string()).expect("encode failed");
        let err = decode::<String>(&payload.slice(..3)).unwrap_err();
        assert!(err.is_codec());
    }
}
