//! Codec module - export of decoded dump records.
//!
//! - [`JsonCodec`] - human-readable JSON using `serde_json`
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (struct-as-map)
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so the export format is picked at compile time. Any `Serialize` value
//! works; in practice that is a [`DumpRecord`](crate::dump::DumpRecord)
//! list, a [`ParseOutcome`](crate::dump::ParseOutcome) or the menu.
//!
//! # Example
//!
//! ```
//! use mlx5_rscdump::codec::{JsonCodec, MsgPackCodec};
//! use mlx5_rscdump::dump::{DumpRecord, InfoSegment};
//!
//! let records = vec![DumpRecord::Info(InfoSegment {
//!     dump_version: 1,
//!     hw_version: 2,
//!     fw_version: 3,
//! })];
//!
//! let json = JsonCodec::encode(&records).unwrap();
//! assert!(json.contains("dump_version"));
//!
//! let packed = MsgPackCodec::encode(&records).unwrap();
//! let back: Vec<DumpRecord> = MsgPackCodec::decode(&packed).unwrap();
//! assert_eq!(back, records);
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;
