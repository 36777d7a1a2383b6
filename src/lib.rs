//! # mlx5-rscdump
//!
//! Resource dump collection for mlx5 devices.
//!
//! Firmware exposes diagnostic dumps through the RESOURCE_DUMP access
//! register. A dump is usually larger than one firmware command can carry,
//! so it is fetched in rounds and reassembled before being parsed into
//! typed segment records.
//!
//! ## Architecture
//!
//! - **Layout** ([`layout`]): PRM bit layouts and the generic field codec
//! - **Transport** ([`transport`]): the firmware RPC channel supplied by the
//!   caller, plus the ACCESS_REG envelope
//! - **Dump** ([`dump`]): the round-by-round [`Collector`] and the segment
//!   [`parse`]r
//! - **Codec** ([`codec`]): JSON / MessagePack export of decoded records
//!
//! ## Example
//!
//! ```ignore
//! use mlx5_rscdump::{Collector, Delivery, DumpSelector};
//!
//! let mut collector = Collector::new(transport)?;
//!
//! for record in collector.menu()? {
//!     println!("{:#06x} {}", record.segment_type, record.segment_name);
//! }
//!
//! let outcome = collector.dump(&DumpSelector::new(0x1000).index1(7), Delivery::Inline)?;
//! for resource in outcome.resources() {
//!     println!("{:#06x}/{} {} bytes", resource.segment_type, resource.index1, resource.payload.len());
//! }
//! if let Some(e) = outcome.error {
//!     eprintln!("dump ended early: {}", e);
//! }
//! ```

pub mod codec;
pub mod dump;
pub mod error;
pub mod layout;
pub mod transport;

pub use dump::{
    parse, CollectedDump, Collector, CollectorBuilder, CollectorConfig, Delivery, DumpRecord,
    DumpSelector, ParseOutcome,
};
pub use error::{Result, RscDumpError};
pub use transport::{DirectRegion, MemoryRegistrar, Transport};
