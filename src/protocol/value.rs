//! Typed frame payloads.

use bytes::{BufMut, Bytes, BytesMut};

use super::wire::{TypeMarker, INNER_LENGTH_PREFIX};

/// A decoded frame payload, or a value to be encoded into one.
///
/// Length-prefixed variants (`Str`, `Bytes`) carry their own 4-byte length
/// inside the payload; fixed-width variants are written big-endian.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameValue {
    /// Liveness signal; carries no data.
    Heartbeat,
    /// UTF-8 string.
    Str(String),
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// UTF-16 code unit. Any value in `0x0000..=0xFFFF` is valid on the
    /// wire, surrogates included.
    Char(u16),
    /// Raw byte array.
    Bytes(Bytes),
}

impl FrameValue {
    /// The type marker this value is framed with.
    pub fn marker(&self) -> TypeMarker {
        match self {
            Self::Heartbeat => TypeMarker::Heartbeat,
            Self::Str(_) => TypeMarker::Str,
            Self::Int(_) => TypeMarker::Int,
            Self::Float(_) => TypeMarker::Float,
            Self::Double(_) => TypeMarker::Double,
            Self::Char(_) => TypeMarker::Char,
            Self::Bytes(_) => TypeMarker::Bytes,
        }
    }

    /// Encoded payload size in bytes, excluding the frame overhead.
    pub fn payload_size(&self) -> usize {
        match self {
            Self::Heartbeat => 0,
            Self::Str(s) => INNER_LENGTH_PREFIX + s.len(),
            Self::Int(_) | Self::Float(_) => 4,
            Self::Double(_) => 8,
            Self::Char(_) => 2,
            Self::Bytes(b) => INNER_LENGTH_PREFIX + b.len(),
        }
    }

    /// Write this value's payload bytes into `dst`.
    pub fn write_payload(&self, dst: &mut BytesMut) {
        match self {
            Self::Heartbeat => {}
            Self::Str(s) => {
                dst.put_u32(s.len() as u32);
                dst.put_slice(s.as_bytes());
            }
            Self::Int(v) => dst.put_i32(*v),
            Self::Float(v) => dst.put_f32(*v),
            Self::Double(v) => dst.put_f64(*v),
            Self::Char(v) => dst.put_u16(*v),
            Self::Bytes(b) => {
                dst.put_u32(b.len() as u32);
                dst.put_slice(b);
            }
        }
    }
}

impl From<&str> for FrameValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<i32> for FrameValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for FrameValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for FrameValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}
