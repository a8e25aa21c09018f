//! Per-connection reassembly buffer.
//!
//! Accumulates raw read chunks and extracts complete frames. A state
//! machine tracks how far into the current frame the stream has advanced:
//! - `Scanning`: looking for the start marker, discarding garbage
//! - `AwaitLength`: marker consumed, need the 4-byte LENGTH field
//! - `AwaitPayload`: LENGTH validated, need that many more bytes
//!
//! Keeping the parse position in the state (instead of re-scanning from the
//! marker) makes frame extraction invariant under how the stream is split
//! across reads.

use bytes::{Buf, BytesMut};

use super::wire::{FRAME_OVERHEAD, LENGTH_FIELD_SIZE, START_MARKER};
use crate::error::{FramelinkError, Result};

/// Result of one frame-extraction attempt.
///
/// "Not enough bytes yet" is an expected, frequent outcome, so it is a
/// status value rather than an error.
#[derive(Debug)]
pub enum ScanOutcome {
    /// More data is needed before anything can be extracted.
    Incomplete,
    /// A complete frame: its type marker and zero-copy payload view.
    Frame { marker: u8, payload: bytes::Bytes },
    /// The stream is unrecoverable for this connection.
    Invalid(String),
}

#[derive(Debug, Clone, Copy)]
enum State {
    /// Looking for the start marker.
    Scanning,
    /// Start marker consumed; waiting for the LENGTH field.
    AwaitLength,
    /// LENGTH validated; waiting for marker + payload bytes.
    AwaitPayload { frame_length: usize },
}

/// Growable byte region holding bytes received but not yet forming a
/// complete frame.
pub struct ReassemblyBuffer {
    buffer: BytesMut,
    state: State,
    max_frame_length: usize,
    garbage_tolerance: usize,
    /// Garbage consumed during the current decode pass.
    scanned_this_pass: usize,
}

impl ReassemblyBuffer {
    /// Create a buffer with the given initial capacity and frame cap.
    pub fn new(initial_capacity: usize, max_frame_length: usize, garbage_tolerance: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(initial_capacity.min(max_frame_length)),
            state: State::Scanning,
            max_frame_length,
            garbage_tolerance,
            scanned_this_pass: 0,
        }
    }

    /// Upper bound on buffered content: a maximal legal frame plus its
    /// header must fit even when it arrives in a single chunk.
    fn content_cap(&self) -> usize {
        self.max_frame_length + FRAME_OVERHEAD
    }

    /// Append newly read bytes, growing by doubling up to the frame cap.
    ///
    /// Also opens a new decode pass: the garbage tolerance window resets.
    pub fn extend(&mut self, data: &[u8]) -> Result<()> {
        let needed = self.buffer.len() + data.len();
        if needed > self.content_cap() {
            return Err(FramelinkError::FrameTooLarge {
                size: needed,
                max: self.max_frame_length,
            });
        }

        if self.buffer.capacity() < needed {
            let target = (self.buffer.capacity() * 2).max(needed).min(self.content_cap());
            self.buffer.reserve(target - self.buffer.len());
        }

        self.buffer.extend_from_slice(data);
        self.scanned_this_pass = 0;
        Ok(())
    }

    /// Attempt to extract the next complete frame.
    ///
    /// Call repeatedly until it returns [`ScanOutcome::Incomplete`];
    /// [`ScanOutcome::Invalid`] means the connection must be torn down.
    pub fn next_frame(&mut self) -> ScanOutcome {
        loop {
            match self.state {
                State::Scanning => {
                    if !self.skip_to_start_marker() {
                        return ScanOutcome::Incomplete;
                    }
                    self.state = State::AwaitLength;
                }
                State::AwaitLength => {
                    if self.buffer.len() < LENGTH_FIELD_SIZE {
                        return ScanOutcome::Incomplete;
                    }
                    let declared = self.buffer.get_i32();
                    if declared <= 0 || declared as usize > self.max_frame_length {
                        return ScanOutcome::Invalid(format!(
                            "invalid frame length {declared}, max allowed {}",
                            self.max_frame_length
                        ));
                    }
                    self.state = State::AwaitPayload {
                        frame_length: declared as usize,
                    };
                }
                State::AwaitPayload { frame_length } => {
                    if self.buffer.len() < frame_length {
                        return ScanOutcome::Incomplete;
                    }
                    let marker = self.buffer.get_u8();
                    let payload = self.buffer.split_to(frame_length - 1).freeze();
                    self.state = State::Scanning;
                    return ScanOutcome::Frame { marker, payload };
                }
            }
        }
    }

    /// Scan forward for the start marker, consuming garbage strictly
    /// within the per-pass tolerance. Returns true when the marker was
    /// found and consumed.
    fn skip_to_start_marker(&mut self) -> bool {
        let tolerance_left = self.garbage_tolerance.saturating_sub(self.scanned_this_pass);
        let window = self.buffer.len().min(tolerance_left);

        match self.buffer[..window]
            .iter()
            .position(|&b| b == START_MARKER)
        {
            Some(i) => {
                self.scanned_this_pass += i;
                self.buffer.advance(i + 1);
                true
            }
            None => {
                // No marker within the window: drop the scanned garbage and
                // stall until more data arrives.
                self.scanned_this_pass += window;
                self.buffer.advance(window);
                false
            }
        }
    }

    /// Number of buffered, unconsumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer holds no unconsumed bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::Scanning => "Scanning",
            State::AwaitLength => "AwaitLength",
            State::AwaitPayload { .. } => "AwaitPayload",
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;

    const MAX: usize = 64 * 1024;
    const TOLERANCE: usize = 8 * 1024;

    fn buffer() -> ReassemblyBuffer {
        ReassemblyBuffer::new(8 * 1024, MAX, TOLERANCE)
    }

    fn frame_bytes(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut wire = Vec::new();
        wire.push(START_MARKER);
        wire.put_i32(payload.len() as i32 + 1);
        wire.push(marker);
        wire.extend_from_slice(payload);
        wire
    }

    fn collect_frames(buf: &mut ReassemblyBuffer) -> Vec<(u8, Vec<u8>)> {
        let mut frames = Vec::new();
        loop {
            match buf.next_frame() {
                ScanOutcome::Frame { marker, payload } => frames.push((marker, payload.to_vec())),
                ScanOutcome::Incomplete => return frames,
                ScanOutcome::Invalid(reason) => panic!("unexpected invalid frame: {reason}"),
            }
        }
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buf = buffer();
        buf.extend(&frame_bytes(0x02, &42i32.to_be_bytes())).unwrap();

        let frames = collect_frames(&mut buf);
        assert_eq!(frames, vec![(0x02, 42i32.to_be_bytes().to_vec())]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_heartbeat_frame() {
        let mut buf = buffer();
        buf.extend(&frame_bytes(0x00, b"")).unwrap();

        let frames = collect_frames(&mut buf);
        assert_eq!(frames, vec![(0x00, vec![])]);
    }

    #[test]
    fn test_two_frames_in_one_chunk() {
        let mut buf = buffer();
        let mut wire = frame_bytes(0x02, &42i32.to_be_bytes());
        wire.extend_from_slice(&frame_bytes(0x05, &[0x00, 0x61]));
        buf.extend(&wire).unwrap();

        let frames = collect_frames(&mut buf);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, 0x02);
        assert_eq!(frames[1].0, 0x05);
    }

    #[test]
    fn test_fragmentation_invariance() {
        // Splitting the stream at every byte boundary must yield the same
        // frame sequence as one delivery.
        let mut wire = frame_bytes(0x01, &{
            let mut p = Vec::new();
            p.put_i32(5);
            p.extend_from_slice(b"hello");
            p
        });
        wire.extend_from_slice(&frame_bytes(0x02, &7i32.to_be_bytes()));
        wire.extend_from_slice(&frame_bytes(0x00, b""));

        let mut whole = buffer();
        whole.extend(&wire).unwrap();
        let expected = collect_frames(&mut whole);
        assert_eq!(expected.len(), 3);

        for split in 1..wire.len() {
            let mut buf = buffer();
            let mut frames = Vec::new();
            buf.extend(&wire[..split]).unwrap();
            frames.extend(collect_frames(&mut buf));
            buf.extend(&wire[split..]).unwrap();
            frames.extend(collect_frames(&mut buf));
            assert_eq!(frames, expected, "split at {split}");
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let wire = frame_bytes(0x02, &i32::MIN.to_be_bytes());
        let mut buf = buffer();
        let mut frames = Vec::new();

        for byte in &wire {
            buf.extend(&[*byte]).unwrap();
            frames.extend(collect_frames(&mut buf));
        }
        assert_eq!(frames, vec![(0x02, i32::MIN.to_be_bytes().to_vec())]);
    }

    #[test]
    fn test_resynchronization_after_garbage() {
        let mut buf = buffer();
        let mut wire = vec![0x00u8; 100]; // noise without the marker
        wire[50] = 0xFF;
        wire.extend_from_slice(&frame_bytes(0x02, &9i32.to_be_bytes()));
        buf.extend(&wire).unwrap();

        let frames = collect_frames(&mut buf);
        assert_eq!(frames, vec![(0x02, 9i32.to_be_bytes().to_vec())]);
    }

    #[test]
    fn test_garbage_beyond_tolerance_stalls() {
        let mut buf = buffer();
        let garbage = vec![0xEEu8; TOLERANCE + 100];
        buf.extend(&garbage).unwrap();

        assert!(matches!(buf.next_frame(), ScanOutcome::Incomplete));
        // The scanned window is gone, the tail is retained for later.
        assert_eq!(buf.len(), 100);

        // A later pass (new data arrived) resumes scanning and recovers.
        buf.extend(&frame_bytes(0x00, b"")).unwrap();
        let frames = collect_frames(&mut buf);
        assert_eq!(frames, vec![(0x00, vec![])]);
    }

    #[test]
    fn test_marker_just_inside_tolerance_found() {
        let mut buf = ReassemblyBuffer::new(64, MAX, 4);
        let mut wire = vec![0xEEu8; 3];
        wire.extend_from_slice(&frame_bytes(0x02, &1i32.to_be_bytes()));
        buf.extend(&wire).unwrap();

        let frames = collect_frames(&mut buf);
        assert_eq!(frames, vec![(0x02, 1i32.to_be_bytes().to_vec())]);
    }

    #[test]
    fn test_marker_at_tolerance_boundary_stalls() {
        let mut buf = ReassemblyBuffer::new(64, MAX, 4);
        let mut wire = vec![0xEEu8; 4];
        wire.extend_from_slice(&frame_bytes(0x00, b""));
        buf.extend(&wire).unwrap();

        // The marker sits one past the last byte the window inspects.
        assert!(matches!(buf.next_frame(), ScanOutcome::Incomplete));
        assert_eq!(buf.len(), frame_bytes(0x00, b"").len());

        // A later pass resumes at the marker and recovers both frames.
        buf.extend(&frame_bytes(0x00, b"")).unwrap();
        let frames = collect_frames(&mut buf);
        assert_eq!(frames, vec![(0x00, vec![]), (0x00, vec![])]);
    }

    #[test]
    fn test_zero_length_is_invalid() {
        let mut buf = buffer();
        let mut wire = vec![START_MARKER];
        wire.put_i32(0);
        buf.extend(&wire).unwrap();

        assert!(matches!(buf.next_frame(), ScanOutcome::Invalid(_)));
    }

    #[test]
    fn test_negative_length_is_invalid() {
        let mut buf = buffer();
        let mut wire = vec![START_MARKER];
        wire.put_i32(-5);
        buf.extend(&wire).unwrap();

        assert!(matches!(buf.next_frame(), ScanOutcome::Invalid(_)));
    }

    #[test]
    fn test_oversized_length_is_invalid() {
        let mut buf = buffer();
        let mut wire = vec![START_MARKER];
        wire.put_i32(MAX as i32 + 1);
        buf.extend(&wire).unwrap();

        match buf.next_frame() {
            ScanOutcome::Invalid(reason) => assert!(reason.contains("invalid frame length")),
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_length_field_waits() {
        let mut buf = buffer();
        buf.extend(&[START_MARKER, 0x00, 0x00]).unwrap();

        assert!(matches!(buf.next_frame(), ScanOutcome::Incomplete));
        assert_eq!(buf.state_name(), "AwaitLength");

        buf.extend(&[0x00, 0x01, 0x00]).unwrap();
        let frames = collect_frames(&mut buf);
        assert_eq!(frames, vec![(0x00, vec![])]);
    }

    #[test]
    fn test_partial_payload_waits() {
        let mut buf = buffer();
        let wire = frame_bytes(0x01, &[0, 0, 0, 2, b'h', b'i']);
        buf.extend(&wire[..8]).unwrap();

        assert!(matches!(buf.next_frame(), ScanOutcome::Incomplete));
        assert_eq!(buf.state_name(), "AwaitPayload");

        buf.extend(&wire[8..]).unwrap();
        let frames = collect_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1, vec![0, 0, 0, 2, b'h', b'i']);
    }

    #[test]
    fn test_growth_beyond_cap_rejected() {
        let mut buf = ReassemblyBuffer::new(16, 64, TOLERANCE);
        let err = buf.extend(&vec![0u8; 128]).unwrap_err();
        assert!(matches!(err, FramelinkError::FrameTooLarge { .. }));
    }

    #[test]
    fn test_maximal_frame_fits() {
        let max = 1024;
        let mut buf = ReassemblyBuffer::new(16, max, TOLERANCE);
        let payload = vec![0xAB; max - 1];
        buf.extend(&frame_bytes(0x06, &payload)).unwrap();

        match buf.next_frame() {
            ScanOutcome::Frame { marker, payload: p } => {
                assert_eq!(marker, 0x06);
                assert_eq!(p.len(), max - 1);
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }
}
