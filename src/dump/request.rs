//! RESOURCE_DUMP register: selectors, continuation state and reply header.
//!
//! ```text
//! ┌─┬─┬──────────┬─────┬──────────────┐
//! │M│I│ reserved │ seq │ segment_type │   M = more_dump, I = inline_dump
//! ├─┴─┴──────────┴─────┼──────────────┤
//! │ reserved           │ vhca_id      │
//! ├────────────────────┴──────────────┤
//! │ index1                            │
//! │ index2                            │
//! ├────────────────────┬──────────────┤
//! │ num_of_obj1        │ num_of_obj2  │
//! ├────────────────────┴──────────────┤
//! │ reserved                          │
//! │ device_opaque (64)                │
//! │ mkey                              │
//! │ size                              │
//! │ address (64)                      │
//! │ inline_data (52 dwords)           │
//! └───────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::layout::prm::{resource_dump as rd, segment_type};
use crate::layout::{self, addr_of};

/// Size of the RESOURCE_DUMP register in bytes.
pub const REGISTER_SIZE: usize = rd::LAYOUT.size_bytes();

/// What to dump.
///
/// `segment_type` picks the resource (or `0xFFFF` for the menu); the
/// index/object selectors narrow it down as the menu record allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DumpSelector {
    pub segment_type: u16,
    pub index1: u32,
    pub index2: u32,
    pub num_of_obj1: u16,
    pub num_of_obj2: u16,
    pub vhca_id: u16,
}

impl DumpSelector {
    /// Select a segment type with every other selector zero.
    pub fn new(segment_type: u16) -> Self {
        Self {
            segment_type,
            ..Self::default()
        }
    }

    /// Selector for the dump menu.
    pub fn menu() -> Self {
        Self::new(segment_type::MENU)
    }

    pub fn index1(mut self, index1: u32) -> Self {
        self.index1 = index1;
        self
    }

    pub fn index2(mut self, index2: u32) -> Self {
        self.index2 = index2;
        self
    }

    pub fn num_of_obj1(mut self, n: u16) -> Self {
        self.num_of_obj1 = n;
        self
    }

    pub fn num_of_obj2(mut self, n: u16) -> Self {
        self.num_of_obj2 = n;
        self
    }

    pub fn vhca_id(mut self, vhca_id: u16) -> Self {
        self.vhca_id = vhca_id;
        self
    }

    /// Encode the first request of a collection.
    pub fn encode(&self) -> [u8; REGISTER_SIZE] {
        let mut reg = [0u8; REGISTER_SIZE];
        layout::set(&rd::LAYOUT, &rd::SEGMENT_TYPE, &mut reg, self.segment_type as u64);
        layout::set(&rd::LAYOUT, &rd::VHCA_ID, &mut reg, self.vhca_id as u64);
        layout::set(&rd::LAYOUT, &rd::INDEX1, &mut reg, self.index1 as u64);
        layout::set(&rd::LAYOUT, &rd::INDEX2, &mut reg, self.index2 as u64);
        layout::set(&rd::LAYOUT, &rd::NUM_OF_OBJ1, &mut reg, self.num_of_obj1 as u64);
        layout::set(&rd::LAYOUT, &rd::NUM_OF_OBJ2, &mut reg, self.num_of_obj2 as u64);
        reg
    }
}

/// Fields firmware hands back to continue a dump.
///
/// Read out of every reply and written verbatim into the next request.
/// `segment_type` is deliberately absent: it stays as first requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContinuationState {
    pub seq_num: u32,
    pub index1: u32,
    pub index2: u32,
    pub num_of_obj1: u32,
    pub num_of_obj2: u32,
    pub device_opaque: u64,
    pub more_dump: bool,
}

impl ContinuationState {
    /// Read the continuation fields of a register.
    pub fn read(reg: &[u8]) -> Self {
        Self {
            seq_num: layout::get(&rd::LAYOUT, &rd::SEQ_NUM, reg) as u32,
            index1: layout::get(&rd::LAYOUT, &rd::INDEX1, reg) as u32,
            index2: layout::get(&rd::LAYOUT, &rd::INDEX2, reg) as u32,
            num_of_obj1: layout::get(&rd::LAYOUT, &rd::NUM_OF_OBJ1, reg) as u32,
            num_of_obj2: layout::get(&rd::LAYOUT, &rd::NUM_OF_OBJ2, reg) as u32,
            device_opaque: layout::get(&rd::LAYOUT, &rd::DEVICE_OPAQUE, reg),
            more_dump: layout::get(&rd::LAYOUT, &rd::MORE_DUMP, reg) != 0,
        }
    }

    /// Write the continuation fields into a request register.
    pub fn apply(&self, reg: &mut [u8]) {
        layout::set(&rd::LAYOUT, &rd::SEQ_NUM, reg, self.seq_num as u64);
        layout::set(&rd::LAYOUT, &rd::INDEX1, reg, self.index1 as u64);
        layout::set(&rd::LAYOUT, &rd::INDEX2, reg, self.index2 as u64);
        layout::set(&rd::LAYOUT, &rd::NUM_OF_OBJ1, reg, self.num_of_obj1 as u64);
        layout::set(&rd::LAYOUT, &rd::NUM_OF_OBJ2, reg, self.num_of_obj2 as u64);
        layout::set(&rd::LAYOUT, &rd::DEVICE_OPAQUE, reg, self.device_opaque);
        layout::set(&rd::LAYOUT, &rd::MORE_DUMP, reg, self.more_dump as u64);
    }
}

/// Per-round header of a RESOURCE_DUMP reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpReply {
    pub seq_num: u32,
    pub more_dump: bool,
    /// Payload bytes delivered this round.
    pub size: usize,
}

impl DumpReply {
    pub fn decode(reg: &[u8]) -> Self {
        Self {
            seq_num: layout::get(&rd::LAYOUT, &rd::SEQ_NUM, reg) as u32,
            more_dump: layout::get(&rd::LAYOUT, &rd::MORE_DUMP, reg) != 0,
            size: layout::get(&rd::LAYOUT, &rd::SIZE, reg) as usize,
        }
    }
}

/// Mark a request for inline delivery.
pub fn set_inline(reg: &mut [u8]) {
    layout::set(&rd::LAYOUT, &rd::INLINE_DUMP, reg, 1);
}

/// Point a request at a registered window.
pub fn set_direct(reg: &mut [u8], mkey: u32, address: u64, size: u32) {
    layout::set(&rd::LAYOUT, &rd::INLINE_DUMP, reg, 0);
    layout::set(&rd::LAYOUT, &rd::MKEY, reg, mkey as u64);
    layout::set(&rd::LAYOUT, &rd::ADDRESS, reg, address);
    layout::set(&rd::LAYOUT, &rd::SIZE, reg, size as u64);
}

/// The inline payload area of a reply register.
pub fn inline_data(reg: &[u8]) -> &[u8] {
    addr_of(&rd::LAYOUT, &rd::INLINE_DATA, reg)
}
