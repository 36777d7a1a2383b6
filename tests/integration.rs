//! Integration tests for mlx5-rscdump.
//!
//! A small firmware emulator answers RESOURCE_DUMP requests from canned
//! segment streams, so collection, reassembly and parsing run end to end.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;
use mlx5_rscdump::codec::{JsonCodec, MsgPackCodec};
use mlx5_rscdump::dump::{
    DumpBuilder, DumpRecord, MenuRecord, ObjectCountSupport, SegmentParser, SegmentType,
    SelectorSupport,
};
use mlx5_rscdump::error::{ParseError, TransportError};
use mlx5_rscdump::layout::{self, prm::resource_dump as rd, prm::MLX5_REG_RESOURCE_DUMP};
use mlx5_rscdump::transport::access::{build_outbox, InboxView};
use mlx5_rscdump::{
    Collector, CollectorBuilder, Delivery, DirectRegion, DumpSelector, MemoryRegistrar,
    RscDumpError, Transport,
};

const WINDOW_BASE: u64 = 0x7f00_0000_0000;

/// Serves canned dumps, keeping its read cursor in `device_opaque`.
struct Firmware {
    dumps: HashMap<u16, Bytes>,
    /// Largest chunk handed out per round.
    chunk: usize,
    rounds: usize,
    /// Round on which the sequence number jumps ahead.
    skip_seq_on_round: Option<usize>,
    window: Rc<RefCell<Vec<u8>>>,
}

impl Firmware {
    fn new(chunk: usize) -> Self {
        Self {
            dumps: HashMap::new(),
            chunk,
            rounds: 0,
            skip_seq_on_round: None,
            window: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn serve(mut self, segment_type: u16, dump: Bytes) -> Self {
        self.dumps.insert(segment_type, dump);
        self
    }
}

impl Transport for Firmware {
    fn rpc(&mut self, request: &[u8], response_capacity: usize) -> Result<Vec<u8>, TransportError> {
        let view = InboxView::decode(request).expect("inbox too short");
        assert_eq!(view.opcode, 0x805);
        assert_eq!(view.register_id, MLX5_REG_RESOURCE_DUMP);
        self.rounds += 1;

        let mut reg = view.register_data.to_vec();
        let segment_type = layout::get(&rd::LAYOUT, &rd::SEGMENT_TYPE, &reg) as u16;
        let Some(dump) = self.dumps.get(&segment_type) else {
            return Ok(build_outbox(0x03, 0xBAD, &reg));
        };

        let offset = layout::get(&rd::LAYOUT, &rd::DEVICE_OPAQUE, &reg) as usize;
        let inline = layout::get(&rd::LAYOUT, &rd::INLINE_DUMP, &reg) == 1;
        let limit = if inline {
            rd::INLINE_CAPACITY
        } else {
            layout::get(&rd::LAYOUT, &rd::SIZE, &reg) as usize
        };
        let n = self.chunk.min(limit).min(dump.len() - offset);
        let piece = &dump[offset..offset + n];

        if inline {
            layout::addr_of_mut(&rd::LAYOUT, &rd::INLINE_DATA, &mut reg)[..n].copy_from_slice(piece);
        } else {
            let at = (layout::get(&rd::LAYOUT, &rd::ADDRESS, &reg) - WINDOW_BASE) as usize;
            self.window.borrow_mut()[at..at + n].copy_from_slice(piece);
        }

        let seq_in = layout::get(&rd::LAYOUT, &rd::SEQ_NUM, &reg);
        let seq_out = if self.skip_seq_on_round == Some(self.rounds) {
            seq_in + 2
        } else {
            seq_in + 1
        };
        layout::set(&rd::LAYOUT, &rd::SEQ_NUM, &mut reg, seq_out);
        layout::set(&rd::LAYOUT, &rd::SIZE, &mut reg, n as u64);
        layout::set(&rd::LAYOUT, &rd::DEVICE_OPAQUE, &mut reg, (offset + n) as u64);
        layout::set(&rd::LAYOUT, &rd::MORE_DUMP, &mut reg, (offset + n < dump.len()) as u64);

        let out = build_outbox(0, 0, &reg);
        assert!(out.len() <= response_capacity);
        Ok(out)
    }
}

struct Window {
    mem: Rc<RefCell<Vec<u8>>>,
}

impl DirectRegion for Window {
    fn mkey(&self) -> u32 {
        0x1234
    }

    fn address(&self) -> u64 {
        WINDOW_BASE
    }

    fn len(&self) -> usize {
        self.mem.borrow().len()
    }

    fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<(), TransportError> {
        let mem = self.mem.borrow();
        let src = mem
            .get(offset..offset + dst.len())
            .ok_or_else(|| TransportError::Region(format!("read past window at {}", offset)))?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Hands out the emulator's window.
struct Registrar {
    mem: Rc<RefCell<Vec<u8>>>,
    live: usize,
}

impl MemoryRegistrar for Registrar {
    type Region = Window;

    fn register(&mut self, len: usize) -> Result<Window, TransportError> {
        self.live += 1;
        *self.mem.borrow_mut() = vec![0; len];
        Ok(Window {
            mem: self.mem.clone(),
        })
    }

    fn unregister(&mut self, _region: Window) -> Result<(), TransportError> {
        self.live -= 1;
        Ok(())
    }
}

/// A dump of `count` resources with distinct payloads.
fn resource_dump(segment_type: u16, count: u32) -> Bytes {
    let selector = DumpSelector::new(segment_type).num_of_obj1(count as u16);
    let mut builder = DumpBuilder::new().info(1, 0x1015, 0x1c_0000).command(&selector);
    for i in 0..count {
        let payload: Vec<u8> = (0..64).map(|b| (b as u32 * 7 + i) as u8).collect();
        builder = builder.resource(segment_type, i, 0, &payload);
    }
    builder.terminate().finish()
}

#[test]
fn test_inline_collection_reassembles_exact_stream() {
    let dump = resource_dump(0x1000, 12);
    let firmware = Firmware::new(usize::MAX).serve(0x1000, dump.clone());
    let mut collector = CollectorBuilder::new()
        .initial_capacity(16)
        .build(firmware)
        .unwrap();

    let collected = collector
        .collect(&DumpSelector::new(0x1000), Delivery::Inline)
        .unwrap();

    assert_eq!(collected.data, dump);
    assert_eq!(collected.rounds, dump.len().div_ceil(208));
    assert_eq!(collector.transport().rounds, collected.rounds);

    let outcome = collected.parse();
    assert!(outcome.terminated);
    assert!(outcome.error.is_none());
    let resources: Vec<_> = outcome.resources().collect();
    assert_eq!(resources.len(), 12);
    for (i, res) in resources.iter().enumerate() {
        assert_eq!(res.index1, i as u32);
        assert_eq!(res.payload.len(), 64);
        assert_eq!(res.payload[1], (7 + i) as u8);
    }
}

#[test]
fn test_sequence_wraps_after_sixteen_rounds() {
    let dump = resource_dump(0x20, 8);
    let firmware = Firmware::new(32).serve(0x20, dump.clone());
    let mut collector = Collector::new(firmware).unwrap();

    let collected = collector
        .collect(&DumpSelector::new(0x20), Delivery::Inline)
        .unwrap();
    assert!(collected.rounds > 16);
    assert_eq!(collected.data, dump);
}

#[test]
fn test_sequence_jump_aborts_before_next_round() {
    let mut firmware = Firmware::new(40).serve(0x20, resource_dump(0x20, 4));
    firmware.skip_seq_on_round = Some(2);
    let mut collector = Collector::new(firmware).unwrap();

    let err = collector
        .collect(&DumpSelector::new(0x20), Delivery::Inline)
        .unwrap_err();
    assert!(matches!(
        err,
        RscDumpError::Sequence {
            round: 2,
            expected: 2,
            actual: 3
        }
    ));
    assert_eq!(collector.transport().rounds, 2);
}

#[test]
fn test_direct_collection_through_registered_window() {
    let dump = resource_dump(0x300, 5);
    let firmware = Firmware::new(100).serve(0x300, dump.clone());
    let mut registrar = Registrar {
        mem: firmware.window.clone(),
        live: 0,
    };
    let mut collector = Collector::new(firmware).unwrap();

    let collected = collector
        .collect_direct(&mut registrar, dump.len(), &DumpSelector::new(0x300))
        .unwrap();

    assert_eq!(collected.data, dump);
    assert_eq!(collected.rounds, dump.len().div_ceil(100));
    assert_eq!(registrar.live, 0);
    assert_eq!(collected.parse().resources().count(), 5);
}

#[test]
fn test_direct_collection_into_caller_window() {
    let dump = resource_dump(0x300, 2);
    let firmware = Firmware::new(usize::MAX).serve(0x300, dump.clone());
    let window = Window {
        mem: firmware.window.clone(),
    };
    *window.mem.borrow_mut() = vec![0; 4096];
    let mut collector = Collector::new(firmware).unwrap();

    let collected = collector
        .collect(&DumpSelector::new(0x300), Delivery::Direct(&window))
        .unwrap();
    assert_eq!(collected.rounds, 1);
    assert_eq!(collected.data, dump);
}

#[test]
fn test_unknown_segment_type_is_firmware_error() {
    let mut collector = Collector::new(Firmware::new(usize::MAX)).unwrap();
    let err = collector
        .collect(&DumpSelector::new(0x999), Delivery::Inline)
        .unwrap_err();
    match err {
        RscDumpError::Transport(TransportError::Firmware { status, syndrome }) => {
            assert_eq!(status, 0x03);
            assert_eq!(syndrome, 0xBAD);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_menu_lists_dumpable_segments() {
    let qp = MenuRecord {
        segment_type: 0x1000,
        segment_name: "QP".into(),
        index1_name: "QPN".into(),
        index2_name: String::new(),
        index1: SelectorSupport {
            supported: true,
            required: true,
        },
        index2: SelectorSupport::default(),
        num_of_obj1: ObjectCountSupport {
            supported: true,
            required: false,
            all: true,
            active: false,
        },
        num_of_obj2: ObjectCountSupport::default(),
    };
    let cq = MenuRecord {
        segment_type: 0x1001,
        segment_name: "CQ".into(),
        index1_name: "CQN".into(),
        ..qp.clone()
    };
    let menu = DumpBuilder::new()
        .info(1, 0, 0)
        .command(&DumpSelector::menu())
        .menu(&[qp.clone(), cq.clone()])
        .terminate()
        .finish();
    let mut collector = Collector::new(Firmware::new(usize::MAX).serve(0xFFFF, menu)).unwrap();

    let records = collector.menu().unwrap();
    assert_eq!(records, vec![qp, cq]);
}

#[test]
fn test_dump_keeps_records_before_error_segment() {
    let dump = DumpBuilder::new()
        .info(1, 0, 0)
        .command(&DumpSelector::new(0x40))
        .resource(0x40, 0, 0, b"first")
        .error(0x12, "object busy")
        .resource(0x40, 1, 0, b"never")
        .terminate()
        .finish();
    let mut collector = Collector::new(Firmware::new(usize::MAX).serve(0x40, dump)).unwrap();

    let outcome = collector
        .dump(&DumpSelector::new(0x40), Delivery::Inline)
        .unwrap();

    assert!(!outcome.terminated);
    assert_eq!(outcome.records.len(), 3);
    assert!(matches!(outcome.records[0], DumpRecord::Info(_)));
    assert!(matches!(outcome.records[1], DumpRecord::Command(_)));
    let resources: Vec<_> = outcome.resources().collect();
    assert_eq!(resources.len(), 1);
    assert_eq!(&resources[0].payload[..], b"first");
    match outcome.error {
        Some(ParseError::ErrorSegment {
            syndrome, message, ..
        }) => {
            assert_eq!(syndrome, 0x12);
            assert_eq!(message, "object busy");
        }
        other => panic!("unexpected outcome error: {other:?}"),
    }
}

#[test]
fn test_menu_reports_error_segment() {
    let menu = DumpBuilder::new()
        .info(1, 0, 0)
        .command(&DumpSelector::menu())
        .error(0x7, "menu unavailable")
        .terminate()
        .finish();
    let mut collector = Collector::new(Firmware::new(usize::MAX).serve(0xFFFF, menu)).unwrap();

    let err = collector.menu().unwrap_err();
    assert!(matches!(
        err,
        RscDumpError::Parse(ParseError::ErrorSegment { syndrome: 0x7, .. })
    ));
}

#[test]
fn test_inspection_sees_every_segment_in_order() {
    let dump = DumpBuilder::new()
        .info(1, 0, 0)
        .command(&DumpSelector::new(0x40))
        .reference(&DumpSelector::new(0x41).index1(3))
        .raw(0xFF80, &[0; 4])
        .resource(0x40, 0, 0, b"abcd")
        .terminate()
        .finish();

    let kinds: Vec<SegmentType> = SegmentParser::new(&dump)
        .map(|segment| segment.unwrap().segment_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            SegmentType::Info,
            SegmentType::Command,
            SegmentType::Reference,
            SegmentType::Unknown(0xFF80),
            SegmentType::Resource(0x40),
            SegmentType::Terminate,
        ]
    );
}

#[test]
fn test_truncated_collection_reports_overflow() {
    let full = resource_dump(0x10, 2);
    let cut = full.slice(..full.len() - 20);
    let mut collector = Collector::new(Firmware::new(usize::MAX).serve(0x10, cut)).unwrap();

    let collected = collector
        .collect(&DumpSelector::new(0x10), Delivery::Inline)
        .unwrap();
    let outcome = collected.parse();
    assert_eq!(outcome.resources().count(), 1);
    assert!(matches!(outcome.error, Some(ParseError::Overflow { .. })));
}

#[test]
fn test_records_export() {
    let mut collector =
        Collector::new(Firmware::new(usize::MAX).serve(0x10, resource_dump(0x10, 3))).unwrap();
    let outcome = collector
        .dump(&DumpSelector::new(0x10), Delivery::Inline)
        .unwrap();
    assert!(outcome.error.is_none());
    let records = outcome.records;

    let packed = MsgPackCodec::encode(&records).unwrap();
    let unpacked: Vec<DumpRecord> = MsgPackCodec::decode(&packed).unwrap();
    assert_eq!(unpacked, records);

    let json = JsonCodec::encode(&records).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value.as_array().map(Vec::len), Some(5));
    assert_eq!(value[0]["info"]["hw_version"], 0x1015);
}
