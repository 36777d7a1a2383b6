//! Forward-only walker over a collected segment stream.
//!
//! A dump is a fixed prefix (Info, then Command) followed by any number of
//! segments up to a Terminate:
//!
//! ```text
//! ┌──────┬─────────┬──────────┬──────────┬─────┬───────────┐
//! │ Info │ Command │ segment  │ segment  │ ... │ Terminate │
//! └──────┴─────────┴──────────┴──────────┴─────┴───────────┘
//! ```
//!
//! [`SegmentParser`] yields one [`Segment`] per step so callers can watch
//! records (with their offsets) as they are decoded; [`parse`] drains it
//! into a [`ParseOutcome`].

use std::iter::FusedIterator;

use bytes::Bytes;
use serde::Serialize;

use super::segment::{
    menu_record_count, menu_records, CommandSegment, DumpRecord, InfoSegment, MenuRecord,
    ReferenceSegment, ResourceSegment, SegmentHeader, SegmentType, SyndromeSegment,
};
use crate::error::ParseError;
use crate::layout::prm;

/// Smallest stream worth parsing: Info + Command + Terminate.
pub const MIN_DUMP_SIZE: usize = prm::info_segment::LAYOUT.size_bytes()
    + prm::command_segment::LAYOUT.size_bytes()
    + prm::terminate_segment::LAYOUT.size_bytes();

/// One segment walked by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Byte offset of the segment header in the dump.
    pub offset: usize,
    /// Segment length in bytes, header included.
    pub length: usize,
    pub segment_type: SegmentType,
    /// `None` for Terminate and skipped segment types.
    pub record: Option<DumpRecord>,
}

#[derive(Debug)]
enum Stage {
    Info,
    Command,
    Body,
    /// Schema validation failed; reported on the first step.
    Rejected(ParseError),
    Done,
}

/// Iterator over the segments of a dump.
///
/// Stops after Terminate, or after yielding the first error.
#[derive(Debug)]
pub struct SegmentParser {
    buf: Bytes,
    cursor: usize,
    stage: Stage,
    terminated: bool,
}

impl SegmentParser {
    pub fn new(buf: &Bytes) -> Self {
        let stage = match prm::ensure_valid() {
            Err(e) => Stage::Rejected(e.into()),
            Ok(()) if buf.len() < MIN_DUMP_SIZE => {
                tracing::debug!("dump of {} bytes has no segments to parse", buf.len());
                Stage::Done
            }
            Ok(()) => Stage::Info,
        };
        Self {
            buf: buf.clone(),
            cursor: 0,
            stage,
            terminated: false,
        }
    }

    /// Offset of the next segment.
    pub fn offset(&self) -> usize {
        self.cursor
    }

    /// Whether a Terminate segment has been reached.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn step(&mut self) -> Result<Option<Segment>, ParseError> {
        let (expected, next_stage) = match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Done => return Ok(None),
            Stage::Rejected(e) => return Err(e),
            Stage::Info => (Some(SegmentType::Info), Stage::Command),
            Stage::Command => (Some(SegmentType::Command), Stage::Body),
            Stage::Body => (None, Stage::Body),
        };

        let offset = self.cursor;
        let buffer_len = self.buf.len();
        if offset == buffer_len {
            return Err(ParseError::MissingTerminate { offset });
        }
        if buffer_len - offset < SegmentHeader::SIZE {
            return Err(ParseError::TruncatedHeader {
                offset,
                remaining: buffer_len - offset,
            });
        }

        let header = SegmentHeader::decode(&self.buf[offset..]);
        let segment_type = SegmentType::from(header.segment_type);
        let length = header.len_bytes();
        let malformed = |reason: String| ParseError::Malformed {
            offset,
            segment_type: header.segment_type,
            reason,
        };

        if header.length_dw == 0 {
            return Err(malformed("zero length".into()));
        }
        if length > buffer_len - offset {
            return Err(ParseError::Overflow {
                offset,
                segment_type: header.segment_type,
                length,
                buffer_len,
            });
        }
        if let Some(expected) = expected {
            if segment_type != expected {
                return Err(malformed(format!("expected {:?} segment", expected)));
            }
        }
        if length < segment_type.min_len() {
            return Err(malformed(format!(
                "length {} shorter than fixed part {}",
                length,
                segment_type.min_len()
            )));
        }

        let seg = self.buf.slice(offset..offset + length);
        self.cursor += length;
        self.stage = next_stage;

        let record = match segment_type {
            SegmentType::Terminate => {
                self.terminated = true;
                self.stage = Stage::Done;
                None
            }
            SegmentType::Error => {
                let error = SyndromeSegment::decode(&seg);
                tracing::error!(
                    "dump error segment at offset {}: syndrome {:#x} {}",
                    offset,
                    error.syndrome_id,
                    error.message
                );
                return Err(ParseError::ErrorSegment {
                    offset,
                    syndrome: error.syndrome_id,
                    message: error.message,
                });
            }
            SegmentType::Notice => Some(DumpRecord::Notice(SyndromeSegment::decode(&seg))),
            SegmentType::Info => Some(DumpRecord::Info(InfoSegment::decode(&seg))),
            SegmentType::Command => Some(DumpRecord::Command(CommandSegment::decode(&seg))),
            SegmentType::Reference => Some(DumpRecord::Reference(ReferenceSegment::decode(&seg))),
            SegmentType::Menu => {
                let count = menu_record_count(&seg);
                let room = (length - segment_type.min_len()) / MenuRecord::SIZE;
                if count > room {
                    return Err(malformed(format!(
                        "{} menu records do not fit, room for {}",
                        count, room
                    )));
                }
                Some(DumpRecord::Menu(menu_records(&seg, count)))
            }
            SegmentType::Resource(code) => {
                Some(DumpRecord::Resource(ResourceSegment::decode(code, &seg)))
            }
            SegmentType::Unknown(code) => {
                tracing::warn!("skipping unrecognized segment {:#06x} at offset {}", code, offset);
                None
            }
        };

        tracing::debug!(
            "segment {:?} at offset {} ({} bytes)",
            segment_type,
            offset,
            length
        );

        Ok(Some(Segment {
            offset,
            length,
            segment_type,
            record,
        }))
    }
}

impl Iterator for SegmentParser {
    type Item = Result<Segment, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(segment)) => Some(Ok(segment)),
            Ok(None) => None,
            Err(e) => {
                self.stage = Stage::Done;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for SegmentParser {}

/// Everything decoded from one dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseOutcome {
    /// Records in stream order, up to the first error.
    pub records: Vec<DumpRecord>,
    /// Why parsing stopped early, if it did.
    #[serde(skip)]
    pub error: Option<ParseError>,
    /// Whether the stream ended with Terminate.
    pub terminated: bool,
}

impl ParseOutcome {
    /// Records if parsing finished cleanly, the error otherwise.
    pub fn into_result(self) -> Result<Vec<DumpRecord>, ParseError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.records),
        }
    }

    /// Resource segments only.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceSegment> {
        self.records.iter().filter_map(|r| match r {
            DumpRecord::Resource(res) => Some(res),
            _ => None,
        })
    }

    /// Records of the first Menu segment, if any.
    pub fn menu(&self) -> Option<&[MenuRecord]> {
        self.records.iter().find_map(|r| match r {
            DumpRecord::Menu(records) => Some(records.as_slice()),
            _ => None,
        })
    }
}

/// Parse a whole dump.
pub fn parse(buf: &Bytes) -> ParseOutcome {
    let mut parser = SegmentParser::new(buf);
    let mut outcome = ParseOutcome::default();
    for item in parser.by_ref() {
        match item {
            Ok(segment) => outcome.records.extend(segment.record),
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        }
    }
    outcome.terminated = parser.is_terminated();
    outcome
}
