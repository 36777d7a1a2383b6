//! Transport module - the bounded firmware RPC channel and memory windows.
//!
//! The crate never opens a device itself. Callers hand in:
//! - a [`Transport`] issuing one command RPC at a time
//! - for direct delivery, a [`DirectRegion`] the firmware can write into,
//!   usually obtained from a [`MemoryRegistrar`]
//!
//! [`access`] wraps register payloads in the ACCESS_REG command envelope.

pub mod access;

use crate::error::TransportError;

pub use access::{access_register, RegisterOp};

/// Maximum firmware RPC buffer size: 512 blocks of 512 bytes.
pub const MAX_RPC_SIZE: usize = 512 * 512;

/// Registered windows are whole pages.
pub const UMEM_PAGE_SIZE: usize = 4096;

/// A synchronous command channel to device firmware.
///
/// Implementations block until the firmware answers (or their own timeout
/// fires). The crate issues one call at a time and never retries.
pub trait Transport {
    /// Execute one command.
    ///
    /// `request` is the full command inbox; the returned outbox must be at
    /// most `response_capacity` bytes.
    fn rpc(&mut self, request: &[u8], response_capacity: usize) -> Result<Vec<u8>, TransportError>;

    /// Largest inbox or outbox accepted by this channel.
    fn max_rpc_size(&self) -> usize {
        MAX_RPC_SIZE
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn rpc(&mut self, request: &[u8], response_capacity: usize) -> Result<Vec<u8>, TransportError> {
        (**self).rpc(request, response_capacity)
    }

    fn max_rpc_size(&self) -> usize {
        (**self).max_rpc_size()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn rpc(&mut self, request: &[u8], response_capacity: usize) -> Result<Vec<u8>, TransportError> {
        (**self).rpc(request, response_capacity)
    }

    fn max_rpc_size(&self) -> usize {
        (**self).max_rpc_size()
    }
}

/// A registered memory window the firmware writes dump data into.
pub trait DirectRegion {
    /// Memory key the firmware uses to address the window.
    fn mkey(&self) -> u32;

    /// Device-visible start address of the window.
    fn address(&self) -> u64;

    /// Window size in bytes.
    fn len(&self) -> usize;

    /// Whether the window is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `dst.len()` bytes starting at `offset` out of the window.
    ///
    /// Only called after the RPC that filled the range has returned.
    fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<(), TransportError>;
}

/// Registers and releases [`DirectRegion`]s.
pub trait MemoryRegistrar {
    type Region: DirectRegion;

    /// Register a window of at least `len` bytes.
    fn register(&mut self, len: usize) -> Result<Self::Region, TransportError>;

    /// Release a window obtained from [`register`](Self::register).
    fn unregister(&mut self, region: Self::Region) -> Result<(), TransportError>;
}

/// Round a window length up to whole pages.
#[inline]
pub fn page_align(len: usize) -> usize {
    len.div_ceil(UMEM_PAGE_SIZE) * UMEM_PAGE_SIZE
}
