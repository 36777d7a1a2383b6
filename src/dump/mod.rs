//! Dump module - resource dump collection and parsing.
//!
//! - [`collector`] drives the RESOURCE_DUMP register round by round and
//!   reassembles the stream
//! - [`parser`] walks the reassembled stream into typed [`DumpRecord`]s
//!
//! The remaining modules hold the pieces both sides share: the register
//! view ([`request`]), the growable [`AccumulationBuffer`], segment records
//! ([`segment`]) and an encoder for synthetic dumps ([`builder`]).

pub mod buffer;
pub mod builder;
pub mod collector;
pub mod parser;
pub mod request;
pub mod segment;

pub use buffer::AccumulationBuffer;
pub use builder::DumpBuilder;
pub use collector::{CollectedDump, Collector, CollectorBuilder, CollectorConfig, Delivery};
pub use parser::{parse, ParseOutcome, Segment, SegmentParser};
pub use request::{ContinuationState, DumpSelector};
pub use segment::{
    CommandSegment, DumpRecord, InfoSegment, MenuRecord, ObjectCountSupport, ReferenceSegment,
    ResourceSegment, SegmentType, SelectorSupport, SyndromeSegment,
};
