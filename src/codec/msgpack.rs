//! MessagePack export of dump records.
//!
//! A thin wrapper over `rmp-serde` that pins one format choice: records are
//! written as maps keyed by field name (`to_vec_named`), so a reader in
//! another language does not depend on struct field order. Resource
//! payloads are written as msgpack `bin` values.

use crate::error::Result;

/// MessagePack codec for dump records.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Pack records (or a whole [`ParseOutcome`](crate::ParseOutcome)) as
    /// named maps.
    ///
    /// Fails with [`MsgPackEncode`](crate::RscDumpError::MsgPackEncode),
    /// which for dump records only happens on a failing custom `Serialize`.
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Read records back from an export.
    ///
    /// Fails with [`MsgPackDecode`](crate::RscDumpError::MsgPackDecode) on
    /// truncated input or a shape that does not match `T`.
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::{InfoSegment, MenuRecord, ResourceSegment};
    use bytes::Bytes;

    fn menu_record() -> MenuRecord {
        MenuRecord {
            segment_type: 0x1000,
            segment_name: "QP".into(),
            index1_name: "QPN".into(),
            index2_name: String::new(),
            index1: Default::default(),
            index2: Default::default(),
            num_of_obj1: Default::default(),
            num_of_obj2: Default::default(),
        }
    }

    #[test]
    fn test_menu_roundtrip() {
        let menu = vec![menu_record(), menu_record()];
        let encoded = MsgPackCodec::encode(&menu).unwrap();
        let decoded: Vec<MenuRecord> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, menu);
    }

    #[test]
    fn test_payload_is_binary() {
        let record = ResourceSegment {
            segment_type: 1,
            index1: 0,
            index2: 0,
            payload: Bytes::from_static(b"\x01\x02\x03"),
        };
        let encoded = MsgPackCodec::encode(&record).unwrap();
        // bin8 marker, length 3, then the raw bytes
        let tail = &encoded[encoded.len() - 5..];
        assert_eq!(tail, &[0xC4, 0x03, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_records_are_keyed_by_field_name() {
        let info = InfoSegment {
            dump_version: 1,
            hw_version: 2,
            fw_version: 3,
        };
        let encoded = MsgPackCodec::encode(&info).unwrap();

        // fixmap of three entries, first key "dump_version"
        assert_eq!(encoded[0], 0x83);
        assert_eq!(encoded[1], 0xA0 | 12);
        assert_eq!(&encoded[2..14], b"dump_version");
    }

    #[test]
    fn test_truncated_export_is_decode_error() {
        let encoded = MsgPackCodec::encode(&menu_record()).unwrap();
        let result: Result<MenuRecord> = MsgPackCodec::decode(&encoded[..encoded.len() / 2]);
        assert!(matches!(result, Err(crate::RscDumpError::MsgPackDecode(_))));
    }
}
