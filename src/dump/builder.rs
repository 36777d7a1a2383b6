//! Segment stream encoder.
//!
//! Produces dumps in the layout firmware emits. Firmware emulators use it
//! to answer RESOURCE_DUMP requests; tests use it to feed the parser.
//!
//! # Example
//!
//! ```
//! use mlx5_rscdump::dump::{parse, DumpBuilder, DumpRecord, DumpSelector};
//!
//! let dump = DumpBuilder::new()
//!     .info(1, 0x10, 0x2000)
//!     .command(&DumpSelector::new(0x42))
//!     .resource(0x42, 7, 0, b"abcd")
//!     .terminate()
//!     .finish();
//!
//! let outcome = parse(&dump);
//! assert!(outcome.terminated);
//! assert!(matches!(outcome.records[2], DumpRecord::Resource(_)));
//! ```

use bytes::Bytes;

use super::request::DumpSelector;
use super::segment::MenuRecord;
use crate::layout::prm::{
    command_segment as cmd, info_segment as info, menu_record as rec, menu_segment as menu,
    reference_segment as refseg, resource_segment as res, segment_header as hdr,
    segment_type as code, syndrome_segment as syn,
};
use crate::layout::{self, addr_of_mut, element_mut, StructLayout};

/// Appends segments to a dump buffer.
#[derive(Debug, Default, Clone)]
pub struct DumpBuilder {
    buf: Vec<u8>,
}

impl DumpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a segment of `layout` plus `extra` trailing bytes, padded to
    /// whole words, and return its bytes.
    fn segment(&mut self, layout: &StructLayout, segment_type: u16, extra: usize) -> &mut [u8] {
        let len = (layout.size_bytes() + extra).div_ceil(4) * 4;
        let start = self.buf.len();
        self.buf.resize(start + len, 0);
        let seg = &mut self.buf[start..];
        layout::set(&hdr::LAYOUT, &hdr::LENGTH_DW, seg, (len / 4) as u64);
        layout::set(&hdr::LAYOUT, &hdr::SEGMENT_TYPE, seg, segment_type as u64);
        seg
    }

    pub fn info(mut self, dump_version: u8, hw_version: u32, fw_version: u32) -> Self {
        let seg = self.segment(&info::LAYOUT, code::INFO, 0);
        layout::set(&info::LAYOUT, &info::DUMP_VERSION, seg, dump_version as u64);
        layout::set(&info::LAYOUT, &info::HW_VERSION, seg, hw_version as u64);
        layout::set(&info::LAYOUT, &info::FW_VERSION, seg, fw_version as u64);
        self
    }

    /// Echo of the request being answered.
    pub fn command(mut self, selector: &DumpSelector) -> Self {
        let seg = self.segment(&cmd::LAYOUT, code::COMMAND, 0);
        layout::set(&cmd::LAYOUT, &cmd::SEGMENT_CALLED, seg, selector.segment_type as u64);
        layout::set(&cmd::LAYOUT, &cmd::VHCA_ID, seg, selector.vhca_id as u64);
        layout::set(&cmd::LAYOUT, &cmd::INDEX1, seg, selector.index1 as u64);
        layout::set(&cmd::LAYOUT, &cmd::INDEX2, seg, selector.index2 as u64);
        layout::set(&cmd::LAYOUT, &cmd::NUM_OF_OBJ1, seg, selector.num_of_obj1 as u64);
        layout::set(&cmd::LAYOUT, &cmd::NUM_OF_OBJ2, seg, selector.num_of_obj2 as u64);
        self
    }

    /// Resource segment; `payload` is zero-padded to a whole word.
    pub fn resource(mut self, segment_type: u16, index1: u32, index2: u32, payload: &[u8]) -> Self {
        let seg = self.segment(&res::LAYOUT, segment_type, payload.len());
        layout::set(&res::LAYOUT, &res::INDEX1, seg, index1 as u64);
        layout::set(&res::LAYOUT, &res::INDEX2, seg, index2 as u64);
        addr_of_mut(&res::LAYOUT, &res::PAYLOAD, seg)[..payload.len()].copy_from_slice(payload);
        self
    }

    pub fn notice(self, syndrome_id: u16, message: &str) -> Self {
        self.syndrome(code::NOTICE, syndrome_id, message)
    }

    pub fn error(self, syndrome_id: u16, message: &str) -> Self {
        self.syndrome(code::ERROR, syndrome_id, message)
    }

    fn syndrome(mut self, segment_type: u16, syndrome_id: u16, message: &str) -> Self {
        let seg = self.segment(&syn::LAYOUT, segment_type, 0);
        layout::set(&syn::LAYOUT, &syn::SYNDROME_ID, seg, syndrome_id as u64);
        write_fixed(addr_of_mut(&syn::LAYOUT, &syn::MESSAGE, seg), message);
        self
    }

    /// Reference to another dumpable object.
    pub fn reference(mut self, target: &DumpSelector) -> Self {
        let seg = self.segment(&refseg::LAYOUT, code::REFERENCE, 0);
        layout::set(
            &refseg::LAYOUT,
            &refseg::REFERENCE_SEGMENT_TYPE,
            seg,
            target.segment_type as u64,
        );
        layout::set(&refseg::LAYOUT, &refseg::INDEX1, seg, target.index1 as u64);
        layout::set(&refseg::LAYOUT, &refseg::INDEX2, seg, target.index2 as u64);
        layout::set(&refseg::LAYOUT, &refseg::NUM_OF_OBJ1, seg, target.num_of_obj1 as u64);
        layout::set(&refseg::LAYOUT, &refseg::NUM_OF_OBJ2, seg, target.num_of_obj2 as u64);
        self
    }

    pub fn menu(mut self, records: &[MenuRecord]) -> Self {
        let seg = self.segment(&menu::LAYOUT, code::MENU, records.len() * MenuRecord::SIZE);
        layout::set(&menu::LAYOUT, &menu::NUM_OF_RECORDS, seg, records.len() as u64);
        for (i, record) in records.iter().enumerate() {
            encode_menu_record(record, element_mut(&menu::LAYOUT, &menu::RECORD, seg, i));
        }
        self
    }

    /// Segment of any type with an opaque body after the header.
    pub fn raw(mut self, segment_type: u16, body: &[u8]) -> Self {
        let seg = self.segment(&hdr::LAYOUT, segment_type, body.len());
        seg[hdr::LAYOUT.size_bytes()..][..body.len()].copy_from_slice(body);
        self
    }

    pub fn terminate(mut self) -> Self {
        self.segment(&hdr::LAYOUT, code::TERMINATE, 0);
        self
    }

    /// Bytes encoded so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn finish(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

fn encode_menu_record(record: &MenuRecord, out: &mut [u8]) {
    let flags = [
        (&rec::SUPPORT_INDEX1, record.index1.supported),
        (&rec::MUST_HAVE_INDEX1, record.index1.required),
        (&rec::SUPPORT_INDEX2, record.index2.supported),
        (&rec::MUST_HAVE_INDEX2, record.index2.required),
        (&rec::SUPPORT_NUM_OF_OBJ1, record.num_of_obj1.supported),
        (&rec::MUST_HAVE_NUM_OF_OBJ1, record.num_of_obj1.required),
        (&rec::NUM_OF_OBJ1_SUPPORTS_ALL, record.num_of_obj1.all),
        (&rec::NUM_OF_OBJ1_SUPPORTS_ACTIVE, record.num_of_obj1.active),
        (&rec::SUPPORT_NUM_OF_OBJ2, record.num_of_obj2.supported),
        (&rec::MUST_HAVE_NUM_OF_OBJ2, record.num_of_obj2.required),
        (&rec::NUM_OF_OBJ2_SUPPORTS_ALL, record.num_of_obj2.all),
        (&rec::NUM_OF_OBJ2_SUPPORTS_ACTIVE, record.num_of_obj2.active),
    ];
    for (field, on) in flags {
        layout::set(&rec::LAYOUT, field, out, on as u64);
    }
    layout::set(&rec::LAYOUT, &rec::SEGMENT_TYPE, out, record.segment_type as u64);
    write_fixed(addr_of_mut(&rec::LAYOUT, &rec::SEGMENT_NAME, out), &record.segment_name);
    write_fixed(addr_of_mut(&rec::LAYOUT, &rec::INDEX1_NAME, out), &record.index1_name);
    write_fixed(addr_of_mut(&rec::LAYOUT, &rec::INDEX2_NAME, out), &record.index2_name);
}

/// Copy `text` into a fixed field, truncating and NUL padding.
fn write_fixed(out: &mut [u8], text: &str) {
    let n = text.len().min(out.len());
    out[..n].copy_from_slice(&text.as_bytes()[..n]);
    out[n..].fill(0);
}
