//! Wire format constants and type markers.
//!
//! Every frame on the wire is laid out as:
//! ```text
//! ┌──────────────┬───────────┬─────────────┬───────────────────┐
//! │ START_MARKER │ LENGTH    │ TYPE_MARKER │ PAYLOAD           │
//! │ 1 byte 0x01  │ 4B u32 BE │ 1 byte      │ LENGTH - 1 bytes  │
//! └──────────────┴───────────┴─────────────┴───────────────────┘
//! ```
//!
//! `LENGTH` counts the type marker plus the payload, so a heartbeat frame
//! (no payload) carries `LENGTH = 1`. All multi-byte integers are Big
//! Endian.

use crate::error::{FramelinkError, Result};

/// Marks the start of every frame.
pub const START_MARKER: u8 = 0x01;

/// Size of the LENGTH field in bytes.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Fixed bytes surrounding a payload: start marker + length + type marker.
pub const FRAME_OVERHEAD: usize = 1 + LENGTH_FIELD_SIZE + 1;

/// Size of the length prefix carried inside string and byte-array payloads.
pub const INNER_LENGTH_PREFIX: usize = 4;

/// Logical type of a frame's payload, identified by a single wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeMarker {
    /// Liveness signal, empty payload.
    Heartbeat = 0x00,
    /// UTF-8 string, `[len:4][bytes]`.
    Str = 0x01,
    /// Big-endian i32.
    Int = 0x02,
    /// Big-endian f32.
    Float = 0x03,
    /// Big-endian f64.
    Double = 0x04,
    /// UTF-16 code unit, 2 bytes.
    Char = 0x05,
    /// Raw bytes, `[len:4][bytes]`.
    Bytes = 0x06,
}

impl TypeMarker {
    /// Parse a wire byte into a marker.
    ///
    /// Unknown bytes are a protocol violation naming the offending value.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::Heartbeat),
            0x01 => Ok(Self::Str),
            0x02 => Ok(Self::Int),
            0x03 => Ok(Self::Float),
            0x04 => Ok(Self::Double),
            0x05 => Ok(Self::Char),
            0x06 => Ok(Self::Bytes),
            other => Err(FramelinkError::Violation(format!(
                "unknown type marker 0x{other:02X}"
            ))),
        }
    }

    /// The wire byte for this marker.
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}
