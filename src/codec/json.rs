//! JSON codec using `serde_json`.

use crate::error::Result;

/// JSON codec for dump records.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value as pretty-printed JSON.
    ///
    /// Resource payloads come out as arrays of byte values.
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    /// Encode a value as compact JSON bytes.
    #[inline]
    pub fn encode_compact<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Decode JSON into a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
