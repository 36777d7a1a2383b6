//! Error types for mlx5-rscdump.

use thiserror::Error;

/// Main error type for all resource dump operations.
#[derive(Debug, Error)]
pub enum RscDumpError {
    /// Invalid field layout in the PRM tables (configuration bug).
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// RPC channel or firmware command failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Firmware echoed a sequence number that does not continue the previous round.
    #[error("Sequence error in round {round}: expected seq_num {expected}, got {actual}")]
    Sequence {
        round: usize,
        expected: u32,
        actual: u32,
    },

    /// Accumulation buffer growth failed.
    #[error("Failed to allocate {requested} bytes for dump buffer")]
    Allocation { requested: usize },

    /// Malformed response (size beyond what the delivery can hold, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Segment stream could not be parsed to completion.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// JSON export error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack export error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack import error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

/// A field layout that the bit codec cannot serve.
///
/// Raised once when the schema is validated, never per access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{layout}: size of {size_bits} bits is not a whole number of 32-bit words")]
    LayoutSize {
        layout: &'static str,
        size_bits: usize,
    },

    #[error("{layout}.{field}: unsupported width {width} (1..=32 or 64 only)")]
    UnsupportedWidth {
        layout: &'static str,
        field: &'static str,
        width: usize,
    },

    #[error("{layout}.{field}: {width}-bit field at bit {offset} straddles a word boundary")]
    StraddlesWord {
        layout: &'static str,
        field: &'static str,
        offset: usize,
        width: usize,
    },

    #[error("{layout}.{field}: 64-bit field at bit {offset} is not 64-bit aligned")]
    Misaligned64 {
        layout: &'static str,
        field: &'static str,
        offset: usize,
    },

    #[error("{layout}.{field}: field at bit {offset} must be {required}-bit aligned")]
    Misaligned {
        layout: &'static str,
        field: &'static str,
        offset: usize,
        required: usize,
    },

    #[error("{layout}.{field}: field ends at bit {end}, past layout size {size_bits}")]
    OutOfBounds {
        layout: &'static str,
        field: &'static str,
        end: usize,
        size_bits: usize,
    },

    #[error("{layout}.{field}: width {width} does not match nested layout size {expected}")]
    NestedSize {
        layout: &'static str,
        field: &'static str,
        width: usize,
        expected: usize,
    },
}

/// Failure of a single RPC round.
#[derive(Debug, Error)]
pub enum TransportError {
    /// OS-level failure issuing the RPC.
    #[error("RPC I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Firmware executed the command and reported a bad status.
    #[error("Firmware command failed: status {status:#x} ({}), syndrome {syndrome:#x}", status_label(.status))]
    Firmware { status: u8, syndrome: u32 },

    /// Response shorter than the command's output layout.
    #[error("Short RPC response: expected {expected} bytes, got {actual}")]
    ShortResponse { expected: usize, actual: usize },

    /// Request or response would not fit in one RPC.
    #[error("RPC size {len} exceeds channel maximum {max}")]
    Oversize { len: usize, max: usize },

    /// Memory region registration or access failed.
    #[error("Memory region error: {0}")]
    Region(String),
}

impl TransportError {
    /// OS error code, when the failure came from the OS.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            TransportError::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

fn status_label(status: &u8) -> &'static str {
    status_name(*status)
}

/// Human-readable name of a firmware command status.
pub fn status_name(status: u8) -> &'static str {
    match status {
        0x00 => "OK",
        0x01 => "INTERNAL_ERR",
        0x02 => "BAD_OP",
        0x03 => "BAD_PARAM",
        0x04 => "BAD_SYS_STATE",
        0x05 => "BAD_RES",
        0x06 => "RES_BUSY",
        0x08 => "LIM",
        0x09 => "BAD_RES_STATE",
        0x0a => "IX",
        0x0f => "NO_RESOURCES",
        0x30 => "BAD_PKT",
        0x40 => "BAD_SIZE",
        0x50 => "BAD_INP_LEN",
        0x51 => "BAD_OUTP_LEN",
        _ => "UNKNOWN",
    }
}

/// Segment-level failure while walking a collected dump.
///
/// Records decoded before the failure stay valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Firmware placed an Error segment in the stream.
    #[error("Error segment at offset {offset}: syndrome {syndrome:#x}: {message}")]
    ErrorSegment {
        offset: usize,
        syndrome: u16,
        message: String,
    },

    /// A segment's length runs past the end of the buffer.
    #[error("Segment {segment_type:#06x} at offset {offset} spans {length} bytes, buffer has {buffer_len}")]
    Overflow {
        offset: usize,
        segment_type: u16,
        length: usize,
        buffer_len: usize,
    },

    /// Fewer bytes remain than a segment header needs.
    #[error("Truncated segment header at offset {offset}: {remaining} bytes left")]
    TruncatedHeader { offset: usize, remaining: usize },

    /// Segment content contradicts its own layout.
    #[error("Malformed segment {segment_type:#06x} at offset {offset}: {reason}")]
    Malformed {
        offset: usize,
        segment_type: u16,
        reason: String,
    },

    /// The stream ended without a Terminate segment.
    #[error("Dump ended at offset {offset} without a terminate segment")]
    MissingTerminate { offset: usize },

    /// Segment tables failed validation; nothing was parsed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Result type alias using RscDumpError.
pub type Result<T> = std::result::Result<T, RscDumpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_error_names_status() {
        let err = TransportError::Firmware {
            status: 0x03,
            syndrome: 0x1234,
        };
        let text = err.to_string();
        assert!(text.contains("BAD_PARAM"));
        assert!(text.contains("0x1234"));
    }

    #[test]
    fn test_os_code_from_io() {
        let err = TransportError::Io(std::io::Error::from_raw_os_error(5));
        assert_eq!(err.os_code(), Some(5));
        assert_eq!(TransportError::Region("x".into()).os_code(), None);
    }

    #[test]
    fn test_sequence_error_context() {
        let err = RscDumpError::Sequence {
            round: 2,
            expected: 2,
            actual: 5,
        };
        assert!(err.to_string().contains("round 2"));
        assert!(err.to_string().contains("got 5"));
    }
}
