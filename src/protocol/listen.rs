//! Payload interpreter: type marker + payload bytes to a typed value.
//!
//! Pure mapping with no I/O and no state. Failures come in two shapes:
//! a [`Violation`](crate::error::FramelinkError::Violation) for lengths
//! that cannot be satisfied by the frame, and an
//! [`Incomplete`](crate::error::FramelinkError::Incomplete) when a
//! fixed-width field or an inner length prefix is cut short.

use bytes::{Buf, Bytes};

use super::value::FrameValue;
use super::wire::{TypeMarker, INNER_LENGTH_PREFIX};
use crate::error::{FramelinkError, Result};

/// Interpret a frame's payload according to its type marker.
pub fn interpret(marker: u8, payload: Bytes) -> Result<FrameValue> {
    match TypeMarker::from_byte(marker)? {
        TypeMarker::Heartbeat => Ok(FrameValue::Heartbeat),
        TypeMarker::Str => {
            let bytes = read_length_prefixed(payload)?;
            let s = String::from_utf8(bytes.to_vec())
                .map_err(|e| FramelinkError::Violation(format!("invalid UTF-8 string: {e}")))?;
            Ok(FrameValue::Str(s))
        }
        TypeMarker::Int => {
            let mut payload = require(payload, 4, "int payload")?;
            Ok(FrameValue::Int(payload.get_i32()))
        }
        TypeMarker::Float => {
            let mut payload = require(payload, 4, "float payload")?;
            Ok(FrameValue::Float(payload.get_f32()))
        }
        TypeMarker::Double => {
            let mut payload = require(payload, 8, "double payload")?;
            Ok(FrameValue::Double(payload.get_f64()))
        }
        TypeMarker::Char => {
            let mut payload = require(payload, 2, "char payload")?;
            Ok(FrameValue::Char(payload.get_u16()))
        }
        TypeMarker::Bytes => {
            let bytes = read_length_prefixed(payload)?;
            Ok(FrameValue::Bytes(bytes))
        }
    }
}

fn require(payload: Bytes, needed: usize, what: &'static str) -> Result<Bytes> {
    if payload.len() < needed {
        return Err(FramelinkError::Incomplete(what));
    }
    Ok(payload)
}

/// Read a `[len:4][bytes]` payload, validating the declared length against
/// the bytes actually present.
fn read_length_prefixed(mut payload: Bytes) -> Result<Bytes> {
    if payload.len() < INNER_LENGTH_PREFIX {
        return Err(FramelinkError::Incomplete("length prefix"));
    }
    let declared = payload.get_i32();
    if declared < 0 || declared as usize > payload.remaining() {
        return Err(FramelinkError::Violation(format!(
            "declared length {declared} exceeds remaining {} bytes",
            payload.remaining()
        )));
    }
    Ok(payload.split_to(declared as usize))
}
