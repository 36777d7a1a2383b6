//! Typed records decoded out of dump segments.
//!
//! Every segment starts with the same one-word header:
//!
//! ```text
//! ┌──────────────────┬──────────────────┐
//! │ length_dw (16)   │ segment_type (16)│
//! └──────────────────┴──────────────────┘
//! ```
//!
//! `length_dw` counts 32-bit words and includes the header itself.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::layout::prm::{
    command_segment as cmd, info_segment as info, menu_record as rec, menu_segment as menu,
    reference_segment as refseg, resource_segment as res, segment_header as hdr,
    segment_type as code, syndrome_segment as syn,
};
use crate::layout::{self, addr_of, element};

/// Segment type, dispatched on by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    Notice,
    Command,
    Error,
    Terminate,
    Info,
    Reference,
    Menu,
    /// A resource segment; the code names the resource.
    Resource(u16),
    /// Reserved code the parser skips.
    Unknown(u16),
}

impl From<u16> for SegmentType {
    fn from(value: u16) -> Self {
        match value {
            code::NOTICE => SegmentType::Notice,
            code::COMMAND => SegmentType::Command,
            code::ERROR => SegmentType::Error,
            code::TERMINATE => SegmentType::Terminate,
            code::INFO => SegmentType::Info,
            code::REFERENCE => SegmentType::Reference,
            code::MENU => SegmentType::Menu,
            v if v <= code::RESOURCE_MAX => SegmentType::Resource(v),
            v => SegmentType::Unknown(v),
        }
    }
}

impl From<SegmentType> for u16 {
    fn from(value: SegmentType) -> Self {
        match value {
            SegmentType::Notice => code::NOTICE,
            SegmentType::Command => code::COMMAND,
            SegmentType::Error => code::ERROR,
            SegmentType::Terminate => code::TERMINATE,
            SegmentType::Info => code::INFO,
            SegmentType::Reference => code::REFERENCE,
            SegmentType::Menu => code::MENU,
            SegmentType::Resource(v) | SegmentType::Unknown(v) => v,
        }
    }
}

impl SegmentType {
    /// Size of the fixed part of this segment type, header included.
    pub fn min_len(self) -> usize {
        match self {
            SegmentType::Info => info::LAYOUT.size_bytes(),
            SegmentType::Command => cmd::LAYOUT.size_bytes(),
            SegmentType::Error | SegmentType::Notice => syn::LAYOUT.size_bytes(),
            SegmentType::Reference => refseg::LAYOUT.size_bytes(),
            SegmentType::Menu => menu::LAYOUT.size_bytes(),
            SegmentType::Resource(_) => res::LAYOUT.size_bytes(),
            SegmentType::Terminate | SegmentType::Unknown(_) => hdr::LAYOUT.size_bytes(),
        }
    }
}

/// Decoded segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub length_dw: u16,
    pub segment_type: u16,
}

impl SegmentHeader {
    pub const SIZE: usize = hdr::LAYOUT.size_bytes();

    /// Decode the header at the start of `buf` (at least [`Self::SIZE`] bytes).
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            length_dw: layout::get(&hdr::LAYOUT, &hdr::LENGTH_DW, buf) as u16,
            segment_type: layout::get(&hdr::LAYOUT, &hdr::SEGMENT_TYPE, buf) as u16,
        }
    }

    /// Segment length in bytes.
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.length_dw as usize * 4
    }
}

/// Dump format and device versions, first segment of every dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoSegment {
    pub dump_version: u8,
    pub hw_version: u32,
    pub fw_version: u32,
}

impl InfoSegment {
    pub(crate) fn decode(seg: &[u8]) -> Self {
        Self {
            dump_version: layout::get(&info::LAYOUT, &info::DUMP_VERSION, seg) as u8,
            hw_version: layout::get(&info::LAYOUT, &info::HW_VERSION, seg) as u32,
            fw_version: layout::get(&info::LAYOUT, &info::FW_VERSION, seg) as u32,
        }
    }
}

/// Echo of the request the dump answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSegment {
    pub segment_called: u16,
    pub vhca_id: u16,
    pub index1: u32,
    pub index2: u32,
    pub num_of_obj1: u16,
    pub num_of_obj2: u16,
}

impl CommandSegment {
    pub(crate) fn decode(seg: &[u8]) -> Self {
        Self {
            segment_called: layout::get(&cmd::LAYOUT, &cmd::SEGMENT_CALLED, seg) as u16,
            vhca_id: layout::get(&cmd::LAYOUT, &cmd::VHCA_ID, seg) as u16,
            index1: layout::get(&cmd::LAYOUT, &cmd::INDEX1, seg) as u32,
            index2: layout::get(&cmd::LAYOUT, &cmd::INDEX2, seg) as u32,
            num_of_obj1: layout::get(&cmd::LAYOUT, &cmd::NUM_OF_OBJ1, seg) as u16,
            num_of_obj2: layout::get(&cmd::LAYOUT, &cmd::NUM_OF_OBJ2, seg) as u16,
        }
    }
}

/// Body shared by Error and Notice segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyndromeSegment {
    pub syndrome_id: u16,
    pub message: String,
}

impl SyndromeSegment {
    pub(crate) fn decode(seg: &[u8]) -> Self {
        Self {
            syndrome_id: layout::get(&syn::LAYOUT, &syn::SYNDROME_ID, seg) as u16,
            message: fixed_string(addr_of(&syn::LAYOUT, &syn::MESSAGE, seg)),
        }
    }
}

/// Pointer to another dumpable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSegment {
    pub segment_type: u16,
    pub index1: u32,
    pub index2: u32,
    pub num_of_obj1: u16,
    pub num_of_obj2: u16,
}

impl ReferenceSegment {
    pub(crate) fn decode(seg: &[u8]) -> Self {
        Self {
            segment_type: layout::get(&refseg::LAYOUT, &refseg::REFERENCE_SEGMENT_TYPE, seg) as u16,
            index1: layout::get(&refseg::LAYOUT, &refseg::INDEX1, seg) as u32,
            index2: layout::get(&refseg::LAYOUT, &refseg::INDEX2, seg) as u32,
            num_of_obj1: layout::get(&refseg::LAYOUT, &refseg::NUM_OF_OBJ1, seg) as u16,
            num_of_obj2: layout::get(&refseg::LAYOUT, &refseg::NUM_OF_OBJ2, seg) as u16,
        }
    }
}

/// Which selectors a dumpable segment type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectorSupport {
    pub supported: bool,
    pub required: bool,
}

/// Object-count selector capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectCountSupport {
    pub supported: bool,
    pub required: bool,
    /// Accepts "all objects".
    pub all: bool,
    /// Accepts "active objects".
    pub active: bool,
}

/// One dumpable segment type, as listed by the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuRecord {
    pub segment_type: u16,
    pub segment_name: String,
    pub index1_name: String,
    pub index2_name: String,
    pub index1: SelectorSupport,
    pub index2: SelectorSupport,
    pub num_of_obj1: ObjectCountSupport,
    pub num_of_obj2: ObjectCountSupport,
}

impl MenuRecord {
    pub const SIZE: usize = rec::LAYOUT.size_bytes();

    fn flag(record: &[u8], field: &layout::Field) -> bool {
        layout::get(&rec::LAYOUT, field, record) != 0
    }

    pub(crate) fn decode(record: &[u8]) -> Self {
        Self {
            segment_type: layout::get(&rec::LAYOUT, &rec::SEGMENT_TYPE, record) as u16,
            segment_name: fixed_string(addr_of(&rec::LAYOUT, &rec::SEGMENT_NAME, record)),
            index1_name: fixed_string(addr_of(&rec::LAYOUT, &rec::INDEX1_NAME, record)),
            index2_name: fixed_string(addr_of(&rec::LAYOUT, &rec::INDEX2_NAME, record)),
            index1: SelectorSupport {
                supported: Self::flag(record, &rec::SUPPORT_INDEX1),
                required: Self::flag(record, &rec::MUST_HAVE_INDEX1),
            },
            index2: SelectorSupport {
                supported: Self::flag(record, &rec::SUPPORT_INDEX2),
                required: Self::flag(record, &rec::MUST_HAVE_INDEX2),
            },
            num_of_obj1: ObjectCountSupport {
                supported: Self::flag(record, &rec::SUPPORT_NUM_OF_OBJ1),
                required: Self::flag(record, &rec::MUST_HAVE_NUM_OF_OBJ1),
                all: Self::flag(record, &rec::NUM_OF_OBJ1_SUPPORTS_ALL),
                active: Self::flag(record, &rec::NUM_OF_OBJ1_SUPPORTS_ACTIVE),
            },
            num_of_obj2: ObjectCountSupport {
                supported: Self::flag(record, &rec::SUPPORT_NUM_OF_OBJ2),
                required: Self::flag(record, &rec::MUST_HAVE_NUM_OF_OBJ2),
                all: Self::flag(record, &rec::NUM_OF_OBJ2_SUPPORTS_ALL),
                active: Self::flag(record, &rec::NUM_OF_OBJ2_SUPPORTS_ACTIVE),
            },
        }
    }
}

/// Number of records a menu segment declares.
pub(crate) fn menu_record_count(seg: &[u8]) -> usize {
    layout::get(&menu::LAYOUT, &menu::NUM_OF_RECORDS, seg) as usize
}

/// Decode the first `count` records of a menu segment.
///
/// The caller has checked that `count` records fit in `seg`.
pub(crate) fn menu_records(seg: &[u8], count: usize) -> Vec<MenuRecord> {
    (0..count)
        .map(|i| MenuRecord::decode(element(&menu::LAYOUT, &menu::RECORD, seg, i)))
        .collect()
}

/// Raw contents of one dumped object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSegment {
    pub segment_type: u16,
    pub index1: u32,
    pub index2: u32,
    /// Bytes after the resource header; shares the collected buffer.
    pub payload: Bytes,
}

impl ResourceSegment {
    /// Decode a resource segment; `seg` is a slice of the collected buffer.
    pub(crate) fn decode(segment_type: u16, seg: &Bytes) -> Self {
        Self {
            segment_type,
            index1: layout::get(&res::LAYOUT, &res::INDEX1, seg) as u32,
            index2: layout::get(&res::LAYOUT, &res::INDEX2, seg) as u32,
            payload: seg.slice(res::PAYLOAD.byte_offset()..),
        }
    }
}

/// One decoded dump record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpRecord {
    Info(InfoSegment),
    Command(CommandSegment),
    Menu(Vec<MenuRecord>),
    Notice(SyndromeSegment),
    Reference(ReferenceSegment),
    Resource(ResourceSegment),
}

/// Decode a fixed-size, NUL-padded string field.
pub(crate) fn fixed_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
