//! PRM layouts used by resource dump collection and parsing.
//!
//! Offsets and widths are in bits, written in hex as the PRM tables are.
//! Each structure lives in its own module: one `const Field` per field and
//! a `LAYOUT` tying them together.

use std::sync::OnceLock;

use super::{Field, StructLayout};
use crate::error::SchemaError;

/// Firmware command carrying register payloads.
pub const MLX5_CMD_OP_ACCESS_REG: u16 = 0x805;

/// Register id of RESOURCE_DUMP.
pub const MLX5_REG_RESOURCE_DUMP: u16 = 0xC000;

/// Segment type codes.
pub mod segment_type {
    pub const NOTICE: u16 = 0xFFF9;
    pub const COMMAND: u16 = 0xFFFA;
    pub const ERROR: u16 = 0xFFFB;
    pub const TERMINATE: u16 = 0xFFFC;
    pub const INFO: u16 = 0xFFFD;
    pub const REFERENCE: u16 = 0xFFFE;
    pub const MENU: u16 = 0xFFFF;
    /// Highest segment type carrying a resource.
    pub const RESOURCE_MAX: u16 = 0xFEFF;
}

/// One opaque 32-bit word, the element of payload arrays.
pub mod dword {
    use super::*;

    pub const DATA: Field = Field::scalar("data", 0x0, 0x20);

    pub const LAYOUT: StructLayout = StructLayout::new("dword", 0x20, &[DATA]);
}

pub mod access_register_in {
    use super::*;

    pub const OPCODE: Field = Field::scalar("opcode", 0x0, 0x10);
    pub const UID: Field = Field::scalar("uid", 0x10, 0x10);
    pub const RESERVED_AT_20: Field = Field::scalar("reserved_at_20", 0x20, 0x10);
    pub const OP_MOD: Field = Field::scalar("op_mod", 0x30, 0x10);
    pub const RESERVED_AT_40: Field = Field::scalar("reserved_at_40", 0x40, 0x10);
    pub const REGISTER_ID: Field = Field::scalar("register_id", 0x50, 0x10);
    pub const ARGUMENT: Field = Field::scalar("argument", 0x60, 0x20);
    pub const REGISTER_DATA: Field = Field::array("register_data", 0x80, &dword::LAYOUT, 0);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "access_register_in",
        0x80,
        &[
            OPCODE,
            UID,
            RESERVED_AT_20,
            OP_MOD,
            RESERVED_AT_40,
            REGISTER_ID,
            ARGUMENT,
            REGISTER_DATA,
        ],
    );
}

pub mod access_register_out {
    use super::*;

    pub const STATUS: Field = Field::scalar("status", 0x0, 0x8);
    pub const RESERVED_AT_8: Field = Field::scalar("reserved_at_8", 0x8, 0x18);
    pub const SYNDROME: Field = Field::scalar("syndrome", 0x20, 0x20);
    pub const RESERVED_AT_40: Field = Field::bytes("reserved_at_40", 0x40, 0x40);
    pub const REGISTER_DATA: Field = Field::array("register_data", 0x80, &dword::LAYOUT, 0);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "access_register_out",
        0x80,
        &[STATUS, RESERVED_AT_8, SYNDROME, RESERVED_AT_40, REGISTER_DATA],
    );
}

/// The RESOURCE_DUMP access register.
pub mod resource_dump {
    use super::*;

    pub const MORE_DUMP: Field = Field::scalar("more_dump", 0x0, 0x1);
    pub const INLINE_DUMP: Field = Field::scalar("inline_dump", 0x1, 0x1);
    pub const RESERVED_AT_2: Field = Field::scalar("reserved_at_2", 0x2, 0xa);
    pub const SEQ_NUM: Field = Field::scalar("seq_num", 0xc, 0x4);
    pub const SEGMENT_TYPE: Field = Field::scalar("segment_type", 0x10, 0x10);
    pub const RESERVED_AT_20: Field = Field::scalar("reserved_at_20", 0x20, 0x10);
    pub const VHCA_ID: Field = Field::scalar("vhca_id", 0x30, 0x10);
    pub const INDEX1: Field = Field::scalar("index1", 0x40, 0x20);
    pub const INDEX2: Field = Field::scalar("index2", 0x60, 0x20);
    pub const NUM_OF_OBJ1: Field = Field::scalar("num_of_obj1", 0x80, 0x10);
    pub const NUM_OF_OBJ2: Field = Field::scalar("num_of_obj2", 0x90, 0x10);
    pub const RESERVED_AT_A0: Field = Field::scalar("reserved_at_a0", 0xa0, 0x20);
    pub const DEVICE_OPAQUE: Field = Field::scalar("device_opaque", 0xc0, 0x40);
    pub const MKEY: Field = Field::scalar("mkey", 0x100, 0x20);
    pub const SIZE: Field = Field::scalar("size", 0x120, 0x20);
    pub const ADDRESS: Field = Field::scalar("address", 0x140, 0x40);
    pub const INLINE_DATA: Field = Field::bytes("inline_data", 0x180, 52 * 0x20);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "resource_dump",
        0x800,
        &[
            MORE_DUMP,
            INLINE_DUMP,
            RESERVED_AT_2,
            SEQ_NUM,
            SEGMENT_TYPE,
            RESERVED_AT_20,
            VHCA_ID,
            INDEX1,
            INDEX2,
            NUM_OF_OBJ1,
            NUM_OF_OBJ2,
            RESERVED_AT_A0,
            DEVICE_OPAQUE,
            MKEY,
            SIZE,
            ADDRESS,
            INLINE_DATA,
        ],
    );

    /// Bytes of payload one inline round can carry.
    pub const INLINE_CAPACITY: usize = INLINE_DATA.bit_width / 8;
}

pub mod segment_header {
    use super::*;

    pub const LENGTH_DW: Field = Field::scalar("length_dw", 0x0, 0x10);
    pub const SEGMENT_TYPE: Field = Field::scalar("segment_type", 0x10, 0x10);

    pub const LAYOUT: StructLayout =
        StructLayout::new("resource_dump_segment_header", 0x20, &[LENGTH_DW, SEGMENT_TYPE]);
}

pub mod info_segment {
    use super::*;

    pub const SEGMENT_HEADER: Field = Field::nested("segment_header", 0x0, &segment_header::LAYOUT);
    pub const RESERVED_AT_20: Field = Field::scalar("reserved_at_20", 0x20, 0x18);
    pub const DUMP_VERSION: Field = Field::scalar("dump_version", 0x38, 0x8);
    pub const HW_VERSION: Field = Field::scalar("hw_version", 0x40, 0x20);
    pub const FW_VERSION: Field = Field::scalar("fw_version", 0x60, 0x20);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "resource_dump_info_segment",
        0x80,
        &[SEGMENT_HEADER, RESERVED_AT_20, DUMP_VERSION, HW_VERSION, FW_VERSION],
    );
}

pub mod command_segment {
    use super::*;

    pub const SEGMENT_HEADER: Field = Field::nested("segment_header", 0x0, &segment_header::LAYOUT);
    pub const SEGMENT_CALLED: Field = Field::scalar("segment_called", 0x20, 0x10);
    pub const VHCA_ID: Field = Field::scalar("vhca_id", 0x30, 0x10);
    pub const INDEX1: Field = Field::scalar("index1", 0x40, 0x20);
    pub const INDEX2: Field = Field::scalar("index2", 0x60, 0x20);
    pub const NUM_OF_OBJ1: Field = Field::scalar("num_of_obj1", 0x80, 0x10);
    pub const NUM_OF_OBJ2: Field = Field::scalar("num_of_obj2", 0x90, 0x10);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "resource_dump_command_segment",
        0xa0,
        &[
            SEGMENT_HEADER,
            SEGMENT_CALLED,
            VHCA_ID,
            INDEX1,
            INDEX2,
            NUM_OF_OBJ1,
            NUM_OF_OBJ2,
        ],
    );
}

/// Shared shape of the Error and Notice segments.
pub mod syndrome_segment {
    use super::*;

    pub const SEGMENT_HEADER: Field = Field::nested("segment_header", 0x0, &segment_header::LAYOUT);
    pub const RESERVED_AT_20: Field = Field::scalar("reserved_at_20", 0x20, 0x10);
    pub const SYNDROME_ID: Field = Field::scalar("syndrome_id", 0x30, 0x10);
    pub const RESERVED_AT_40: Field = Field::bytes("reserved_at_40", 0x40, 0x40);
    pub const MESSAGE: Field = Field::bytes("message", 0x80, 8 * 0x20);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "resource_dump_syndrome_segment",
        0x180,
        &[SEGMENT_HEADER, RESERVED_AT_20, SYNDROME_ID, RESERVED_AT_40, MESSAGE],
    );
}

pub mod reference_segment {
    use super::*;

    pub const SEGMENT_HEADER: Field = Field::nested("segment_header", 0x0, &segment_header::LAYOUT);
    pub const RESERVED_AT_20: Field = Field::scalar("reserved_at_20", 0x20, 0x10);
    pub const REFERENCE_SEGMENT_TYPE: Field = Field::scalar("reference_segment_type", 0x30, 0x10);
    pub const INDEX1: Field = Field::scalar("index1", 0x40, 0x20);
    pub const INDEX2: Field = Field::scalar("index2", 0x60, 0x20);
    pub const NUM_OF_OBJ1: Field = Field::scalar("num_of_obj1", 0x80, 0x10);
    pub const NUM_OF_OBJ2: Field = Field::scalar("num_of_obj2", 0x90, 0x10);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "resource_dump_reference_segment",
        0xa0,
        &[
            SEGMENT_HEADER,
            RESERVED_AT_20,
            REFERENCE_SEGMENT_TYPE,
            INDEX1,
            INDEX2,
            NUM_OF_OBJ1,
            NUM_OF_OBJ2,
        ],
    );
}

pub mod menu_record {
    use super::*;

    pub const RESERVED_AT_0: Field = Field::scalar("reserved_at_0", 0x0, 0x4);
    pub const NUM_OF_OBJ2_SUPPORTS_ACTIVE: Field =
        Field::scalar("num_of_obj2_supports_active", 0x4, 0x1);
    pub const NUM_OF_OBJ2_SUPPORTS_ALL: Field = Field::scalar("num_of_obj2_supports_all", 0x5, 0x1);
    pub const MUST_HAVE_NUM_OF_OBJ2: Field = Field::scalar("must_have_num_of_obj2", 0x6, 0x1);
    pub const SUPPORT_NUM_OF_OBJ2: Field = Field::scalar("support_num_of_obj2", 0x7, 0x1);
    pub const NUM_OF_OBJ1_SUPPORTS_ACTIVE: Field =
        Field::scalar("num_of_obj1_supports_active", 0x8, 0x1);
    pub const NUM_OF_OBJ1_SUPPORTS_ALL: Field = Field::scalar("num_of_obj1_supports_all", 0x9, 0x1);
    pub const MUST_HAVE_NUM_OF_OBJ1: Field = Field::scalar("must_have_num_of_obj1", 0xa, 0x1);
    pub const SUPPORT_NUM_OF_OBJ1: Field = Field::scalar("support_num_of_obj1", 0xb, 0x1);
    pub const MUST_HAVE_INDEX2: Field = Field::scalar("must_have_index2", 0xc, 0x1);
    pub const SUPPORT_INDEX2: Field = Field::scalar("support_index2", 0xd, 0x1);
    pub const MUST_HAVE_INDEX1: Field = Field::scalar("must_have_index1", 0xe, 0x1);
    pub const SUPPORT_INDEX1: Field = Field::scalar("support_index1", 0xf, 0x1);
    pub const SEGMENT_TYPE: Field = Field::scalar("segment_type", 0x10, 0x10);
    pub const SEGMENT_NAME: Field = Field::bytes("segment_name", 0x20, 4 * 0x20);
    pub const INDEX1_NAME: Field = Field::bytes("index1_name", 0xa0, 4 * 0x20);
    pub const INDEX2_NAME: Field = Field::bytes("index2_name", 0x120, 4 * 0x20);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "resource_dump_menu_record",
        0x1a0,
        &[
            RESERVED_AT_0,
            NUM_OF_OBJ2_SUPPORTS_ACTIVE,
            NUM_OF_OBJ2_SUPPORTS_ALL,
            MUST_HAVE_NUM_OF_OBJ2,
            SUPPORT_NUM_OF_OBJ2,
            NUM_OF_OBJ1_SUPPORTS_ACTIVE,
            NUM_OF_OBJ1_SUPPORTS_ALL,
            MUST_HAVE_NUM_OF_OBJ1,
            SUPPORT_NUM_OF_OBJ1,
            MUST_HAVE_INDEX2,
            SUPPORT_INDEX2,
            MUST_HAVE_INDEX1,
            SUPPORT_INDEX1,
            SEGMENT_TYPE,
            SEGMENT_NAME,
            INDEX1_NAME,
            INDEX2_NAME,
        ],
    );
}

pub mod menu_segment {
    use super::*;

    pub const SEGMENT_HEADER: Field = Field::nested("segment_header", 0x0, &segment_header::LAYOUT);
    pub const RESERVED_AT_20: Field = Field::scalar("reserved_at_20", 0x20, 0x10);
    pub const NUM_OF_RECORDS: Field = Field::scalar("num_of_records", 0x30, 0x10);
    pub const RECORD: Field = Field::array("record", 0x40, &menu_record::LAYOUT, 0);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "resource_dump_menu_segment",
        0x40,
        &[SEGMENT_HEADER, RESERVED_AT_20, NUM_OF_RECORDS, RECORD],
    );
}

pub mod resource_segment {
    use super::*;

    pub const SEGMENT_HEADER: Field = Field::nested("segment_header", 0x0, &segment_header::LAYOUT);
    pub const RESERVED_AT_20: Field = Field::scalar("reserved_at_20", 0x20, 0x20);
    pub const INDEX1: Field = Field::scalar("index1", 0x40, 0x20);
    pub const INDEX2: Field = Field::scalar("index2", 0x60, 0x20);
    pub const PAYLOAD: Field = Field::array("payload", 0x80, &dword::LAYOUT, 0);

    pub const LAYOUT: StructLayout = StructLayout::new(
        "resource_dump_resource_segment",
        0x80,
        &[SEGMENT_HEADER, RESERVED_AT_20, INDEX1, INDEX2, PAYLOAD],
    );
}

pub mod terminate_segment {
    use super::*;

    pub const SEGMENT_HEADER: Field = Field::nested("segment_header", 0x0, &segment_header::LAYOUT);

    pub const LAYOUT: StructLayout =
        StructLayout::new("resource_dump_terminate_segment", 0x20, &[SEGMENT_HEADER]);
}

/// Every table the crate reads or writes.
pub const ALL_LAYOUTS: &[&StructLayout] = &[
    &dword::LAYOUT,
    &access_register_in::LAYOUT,
    &access_register_out::LAYOUT,
    &resource_dump::LAYOUT,
    &segment_header::LAYOUT,
    &info_segment::LAYOUT,
    &command_segment::LAYOUT,
    &syndrome_segment::LAYOUT,
    &reference_segment::LAYOUT,
    &menu_record::LAYOUT,
    &menu_segment::LAYOUT,
    &resource_segment::LAYOUT,
    &terminate_segment::LAYOUT,
];

static VALIDATED: OnceLock<Result<(), SchemaError>> = OnceLock::new();

/// Validate every PRM table once per process.
///
/// Later calls return the cached verdict.
pub fn ensure_valid() -> Result<(), SchemaError> {
    VALIDATED
        .get_or_init(|| {
            let verdict = ALL_LAYOUTS.iter().try_for_each(|layout| layout.validate());
            if let Err(e) = &verdict {
                tracing::error!("PRM schema rejected: {}", e);
            }
            verdict
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tables_validate() {
        for layout in ALL_LAYOUTS {
            assert!(layout.validate().is_ok(), "{} failed validation", layout.name);
        }
        assert!(ensure_valid().is_ok());
    }

    #[test]
    fn test_structure_sizes() {
        assert_eq!(resource_dump::LAYOUT.size_bytes(), 256);
        assert_eq!(resource_dump::INLINE_CAPACITY, 208);
        assert_eq!(resource_dump::INLINE_DATA.byte_offset(), 48);
        assert_eq!(segment_header::LAYOUT.size_bytes(), 4);
        assert_eq!(info_segment::LAYOUT.size_bytes(), 16);
        assert_eq!(command_segment::LAYOUT.size_bytes(), 20);
        assert_eq!(syndrome_segment::LAYOUT.size_bytes(), 48);
        assert_eq!(reference_segment::LAYOUT.size_bytes(), 20);
        assert_eq!(menu_record::LAYOUT.size_bytes(), 52);
        assert_eq!(menu_segment::LAYOUT.size_bytes(), 8);
        assert_eq!(resource_segment::LAYOUT.size_bytes(), 16);
        assert_eq!(terminate_segment::LAYOUT.size_bytes(), 4);
        assert_eq!(access_register_in::LAYOUT.size_bytes(), 16);
        assert_eq!(access_register_out::LAYOUT.size_bytes(), 16);
    }

    #[test]
    fn test_segment_type_ranges() {
        assert!(segment_type::RESOURCE_MAX < segment_type::NOTICE);
        assert_eq!(segment_type::MENU, 0xFFFF);
    }
}
