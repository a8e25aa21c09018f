//! Protocol module - wire format, frame reassembly, and typed payloads.
//!
//! This module implements the length-prefixed binary protocol:
//! - Frame layout constants and type markers
//! - Typed payload values and their codec
//! - Per-connection reassembly buffer (partial reads, resynchronization)
//! - The engine-wide frame decoder

mod decoder;
mod listen;
mod reassembly;
mod value;
mod wire;

pub use decoder::{ConnectionId, FrameDecoder};
pub use listen::interpret;
pub use reassembly::{ReassemblyBuffer, ScanOutcome};
pub use value::FrameValue;
pub use wire::{TypeMarker, FRAME_OVERHEAD, LENGTH_FIELD_SIZE, START_MARKER};
