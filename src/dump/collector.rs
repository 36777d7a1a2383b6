//! Segmented dump collection over the RESOURCE_DUMP register.
//!
//! One dump may be far larger than a single RPC can carry. The collector
//! keeps calling the register, copying the continuation fields of every
//! reply into the next request, until firmware clears `more_dump`:
//!
//! ```text
//! request ──► ACCESS_REG ──► reply ──► check seq ──► append payload
//!    ▲                                                    │
//!    └──────────── copy continuation (more_dump) ◄────────┘
//! ```
//!
//! Payload arrives either inline in the reply register (up to 208 bytes per
//! round) or directly in a registered memory window. Both modes share the
//! same round loop; only the [`PayloadSource`] differs.
//!
//! # Example
//!
//! ```ignore
//! use mlx5_rscdump::{CollectorBuilder, Delivery, DumpSelector};
//!
//! let mut collector = CollectorBuilder::new()
//!     .initial_capacity(16 * 1024)
//!     .build(transport)?;
//!
//! let dump = collector.collect(&DumpSelector::new(0x1000), Delivery::Inline)?;
//! for record in dump.parse().records {
//!     println!("{:?}", record);
//! }
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::buffer::{AccumulationBuffer, DEFAULT_INITIAL_CAPACITY};
use super::parser::{parse, ParseOutcome};
use super::request::{self, ContinuationState, DumpReply, DumpSelector};
use super::segment::{DumpRecord, MenuRecord};
use crate::error::{Result, RscDumpError};
use crate::layout::prm::{self, resource_dump as rd, MLX5_REG_RESOURCE_DUMP};
use crate::layout::{self, describe};
use crate::transport::{
    access_register, page_align, DirectRegion, MemoryRegistrar, RegisterOp, Transport,
};

/// Default cap on the size of one dump: 64 MiB.
pub const DEFAULT_MAX_DUMP_SIZE: usize = 64 * 1024 * 1024;

/// Collector settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Starting size of the accumulation buffer for inline dumps.
    pub initial_capacity: usize,
    /// A dump growing past this many bytes is abandoned.
    pub max_dump_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_dump_size: DEFAULT_MAX_DUMP_SIZE,
        }
    }
}

/// How firmware hands over payload bytes.
#[derive(Clone, Copy)]
pub enum Delivery<'a> {
    /// Payload embedded in the reply register.
    Inline,
    /// Payload written into a registered window.
    Direct(&'a dyn DirectRegion),
}

impl std::fmt::Debug for Delivery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Inline => f.write_str("Inline"),
            Delivery::Direct(region) => f
                .debug_struct("Direct")
                .field("mkey", &region.mkey())
                .field("address", &format_args!("{:#x}", region.address()))
                .field("len", &region.len())
                .finish(),
        }
    }
}

/// A finished collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedDump {
    /// The reassembled segment stream.
    pub data: Bytes,
    /// Number of RPC rounds it took.
    pub rounds: usize,
}

impl CollectedDump {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Walk the collected segments.
    pub fn parse(&self) -> ParseOutcome {
        parse(&self.data)
    }
}

/// Where each round's payload comes from.
trait PayloadSource {
    /// Buffer size to start with.
    fn initial_capacity(&self, configured: usize) -> usize;

    /// Fill in the delivery fields of the next request.
    fn prepare(&self, request: &mut [u8], collected: usize) -> Result<()>;

    /// Append the `size` bytes delivered by `reply`.
    fn fetch(
        &self,
        reply: &[u8],
        size: usize,
        buffer: &mut AccumulationBuffer,
    ) -> Result<()>;
}

struct InlineSource;

impl PayloadSource for InlineSource {
    fn initial_capacity(&self, configured: usize) -> usize {
        configured
    }

    fn prepare(&self, request: &mut [u8], _collected: usize) -> Result<()> {
        request::set_inline(request);
        Ok(())
    }

    fn fetch(&self, reply: &[u8], size: usize, buffer: &mut AccumulationBuffer) -> Result<()> {
        let inline = request::inline_data(reply);
        if size > inline.len() {
            return Err(RscDumpError::Protocol(format!(
                "Inline payload of {} bytes exceeds inline capacity {}",
                size,
                inline.len()
            )));
        }
        buffer.append(&inline[..size])
    }
}

struct DirectSource<'a> {
    region: &'a dyn DirectRegion,
}

impl PayloadSource for DirectSource<'_> {
    fn initial_capacity(&self, _configured: usize) -> usize {
        self.region.len()
    }

    fn prepare(&self, request: &mut [u8], collected: usize) -> Result<()> {
        let remaining = self.region.len().saturating_sub(collected);
        if remaining == 0 {
            return Err(RscDumpError::Protocol(format!(
                "Direct region of {} bytes exhausted while firmware has more data",
                self.region.len()
            )));
        }
        let address = u64::try_from(collected)
            .ok()
            .and_then(|offset| self.region.address().checked_add(offset))
            .ok_or_else(|| {
                RscDumpError::Protocol(format!(
                    "Direct region at {:#x} cannot address offset {}",
                    self.region.address(),
                    collected
                ))
            })?;
        let size = u32::try_from(remaining).unwrap_or(u32::MAX);
        request::set_direct(request, self.region.mkey(), address, size);
        Ok(())
    }

    fn fetch(&self, _reply: &[u8], size: usize, buffer: &mut AccumulationBuffer) -> Result<()> {
        let collected = buffer.len();
        let remaining = self.region.len().saturating_sub(collected);
        if size > remaining {
            return Err(RscDumpError::Protocol(format!(
                "Direct payload of {} bytes exceeds the {} bytes left in the region",
                size, remaining
            )));
        }
        buffer.append_with(size, |dst| Ok(self.region.copy_out(collected, dst)?))
    }
}

/// Builder for a [`Collector`].
#[derive(Debug, Clone, Default)]
pub struct CollectorBuilder {
    config: CollectorConfig,
}

impl CollectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the starting buffer size for inline dumps.
    ///
    /// Default: 4096
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Set the largest dump accepted.
    ///
    /// Default: 64 MiB
    pub fn max_dump_size(mut self, max: usize) -> Self {
        self.config.max_dump_size = max;
        self
    }

    /// Build the collector around `transport`.
    pub fn build<T: Transport>(self, transport: T) -> Result<Collector<T>> {
        Collector::with_config(transport, self.config)
    }
}

/// Collects resource dumps through a firmware [`Transport`].
///
/// Every call borrows the transport exclusively for all of its rounds.
/// When a round fails, whatever was gathered so far is dropped.
pub struct Collector<T: Transport> {
    transport: T,
    config: CollectorConfig,
}

impl<T: Transport> Collector<T> {
    /// Collector with the default configuration.
    pub fn new(transport: T) -> Result<Self> {
        Self::with_config(transport, CollectorConfig::default())
    }

    pub fn with_config(transport: T, config: CollectorConfig) -> Result<Self> {
        prm::ensure_valid()?;
        Ok(Self { transport, config })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Collect one dump.
    pub fn collect(&mut self, selector: &DumpSelector, delivery: Delivery<'_>) -> Result<CollectedDump> {
        tracing::debug!(
            "collecting segment type {:#06x} ({:?})",
            selector.segment_type,
            delivery
        );
        match delivery {
            Delivery::Inline => self.run(selector, &InlineSource),
            Delivery::Direct(region) => self.run(selector, &DirectSource { region }),
        }
    }

    /// Collect into a window registered for this call only.
    ///
    /// The window is `window_len` rounded up to whole pages. It is released
    /// whether or not the collection succeeds.
    pub fn collect_direct<R: MemoryRegistrar>(
        &mut self,
        registrar: &mut R,
        window_len: usize,
        selector: &DumpSelector,
    ) -> Result<CollectedDump> {
        let region = registrar.register(page_align(window_len))?;
        let collected = self.collect(selector, Delivery::Direct(&region));
        let released = registrar.unregister(region);

        match (collected, released) {
            (Ok(dump), Ok(())) => Ok(dump),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                tracing::warn!("failed to release dump window: {}", release_err);
                Err(e)
            }
        }
    }

    /// Collect and parse one dump.
    ///
    /// Collection failures are errors. A parse failure is not: the records
    /// decoded before it come back in the outcome next to
    /// [`ParseOutcome::error`].
    pub fn dump(&mut self, selector: &DumpSelector, delivery: Delivery<'_>) -> Result<ParseOutcome> {
        let collected = self.collect(selector, delivery)?;
        let outcome = collected.parse();
        if let Some(e) = &outcome.error {
            tracing::warn!(
                "dump of segment type {:#06x} stopped after {} records: {}",
                selector.segment_type,
                outcome.records.len(),
                e
            );
        }
        Ok(outcome)
    }

    /// List the segment types this device can dump.
    pub fn menu(&mut self) -> Result<Vec<MenuRecord>> {
        let outcome = self.dump(&DumpSelector::menu(), Delivery::Inline)?;
        let error = outcome.error;
        outcome
            .records
            .into_iter()
            .find_map(|record| match record {
                DumpRecord::Menu(menu) => Some(menu),
                _ => None,
            })
            .ok_or_else(|| match error {
                Some(e) => e.into(),
                None => RscDumpError::Protocol("Menu dump carried no menu segment".into()),
            })
    }

    fn run<S: PayloadSource>(&mut self, selector: &DumpSelector, source: &S) -> Result<CollectedDump> {
        let mut buffer =
            AccumulationBuffer::with_capacity(source.initial_capacity(self.config.initial_capacity))
                .with_max_size(self.config.max_dump_size);
        let mut request = selector.encode();
        let mut round = 0;

        loop {
            round += 1;
            source.prepare(&mut request, buffer.len())?;
            let seq_in = layout::get(&rd::LAYOUT, &rd::SEQ_NUM, &request) as u32;
            if tracing::enabled!(tracing::Level::TRACE) {
                tracing::trace!("round {} request: {:?}", round, describe(&rd::LAYOUT, &request));
            }

            let reply = access_register(
                &mut self.transport,
                RegisterOp::Read,
                MLX5_REG_RESOURCE_DUMP,
                0,
                &request,
            )
            .map_err(|e| {
                tracing::error!("resource dump round {} failed: {}", round, e);
                e
            })?;
            if tracing::enabled!(tracing::Level::TRACE) {
                tracing::trace!("round {} reply: {:?}", round, describe(&rd::LAYOUT, &reply));
            }

            let header = DumpReply::decode(&reply);
            if round > 1 && header.seq_num != 0 && header.seq_num != seq_in + 1 {
                tracing::error!(
                    "resource dump round {}: sequence {} does not follow {}",
                    round,
                    header.seq_num,
                    seq_in
                );
                return Err(RscDumpError::Sequence {
                    round,
                    expected: seq_in + 1,
                    actual: header.seq_num,
                });
            }

            tracing::debug!(
                "round {}: seq {} size {} more_dump {}",
                round,
                header.seq_num,
                header.size,
                header.more_dump
            );

            source.fetch(&reply, header.size, &mut buffer)?;

            if !header.more_dump {
                break;
            }
            if header.size == 0 {
                return Err(RscDumpError::Protocol(format!(
                    "Round {} delivered no data but more_dump is set",
                    round
                )));
            }
            ContinuationState::read(&reply).apply(&mut request);
        }

        tracing::debug!("collected {} bytes in {} rounds", buffer.len(), round);
        Ok(CollectedDump {
            data: buffer.freeze(),
            rounds: round,
        })
    }
}

impl<T: Transport> std::fmt::Debug for Collector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
