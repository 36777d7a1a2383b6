//! Growable accumulation buffer for dump payloads.
//!
//! Capacity doubles until an append fits. Growth goes through
//! `try_reserve_exact`, so an allocation failure is reported as
//! [`RscDumpError::Allocation`] instead of aborting the process.
//!
//! # Example
//!
//! ```
//! use mlx5_rscdump::dump::AccumulationBuffer;
//!
//! let mut buffer = AccumulationBuffer::with_capacity(4);
//! buffer.append(b"abcdef").unwrap();
//! assert_eq!(buffer.capacity(), 8);
//! assert_eq!(&buffer.freeze()[..], b"abcdef");
//! ```

use bytes::Bytes;

use crate::error::{Result, RscDumpError};

/// Default starting capacity when the caller declares none.
pub const DEFAULT_INITIAL_CAPACITY: usize = 4096;

/// Bytes collected so far in one dump.
#[derive(Debug)]
pub struct AccumulationBuffer {
    data: Vec<u8>,
    /// Logical capacity; doubles on overflow.
    capacity: usize,
    max_size: Option<usize>,
}

impl AccumulationBuffer {
    /// Buffer with the default starting capacity and no size cap.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    /// Buffer starting at `capacity` bytes (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity: capacity.max(1),
            max_size: None,
        }
    }

    /// Refuse to hold more than `max_size` bytes.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Append `bytes`, doubling the capacity as many times as needed.
    ///
    /// On error the buffer is left as it was.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Append `len` bytes produced by `fill`.
    ///
    /// `fill` writes directly into the buffer tail; if it fails the tail is
    /// dropped again.
    pub fn append_with<F>(&mut self, len: usize, fill: F) -> Result<()>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        self.reserve(len)?;
        let start = self.data.len();
        self.data.resize(start + len, 0);
        if let Err(e) = fill(&mut self.data[start..]) {
            self.data.truncate(start);
            return Err(e);
        }
        Ok(())
    }

    /// Make room for `additional` more bytes.
    fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .data
            .len()
            .checked_add(additional)
            .ok_or(RscDumpError::Allocation {
                requested: usize::MAX,
            })?;

        if let Some(max) = self.max_size {
            if needed > max {
                return Err(RscDumpError::Protocol(format!(
                    "Dump size {} exceeds maximum {}",
                    needed, max
                )));
            }
        }

        let mut capacity = self.capacity;
        while capacity < needed {
            capacity = capacity
                .checked_mul(2)
                .ok_or(RscDumpError::Allocation { requested: needed })?;
        }

        if self.data.capacity() < capacity {
            self.data
                .try_reserve_exact(capacity - self.data.len())
                .map_err(|_| RscDumpError::Allocation {
                    requested: capacity,
                })?;
        }
        if capacity != self.capacity {
            tracing::debug!("dump buffer grew from {} to {} bytes", self.capacity, capacity);
            self.capacity = capacity;
        }
        Ok(())
    }

    /// Number of bytes collected.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current logical capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// View of the bytes collected so far.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Finish the collection and hand out the bytes.
    pub fn freeze(self) -> Bytes {
        Bytes::from(self.data)
    }
}

impl Default for AccumulationBuffer {
    fn default() -> Self {
        Self::new()
    }
}
