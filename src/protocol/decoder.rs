//! Engine-wide frame decoder.
//!
//! Owns one [`ReassemblyBuffer`] per connection, keyed by a stable
//! [`ConnectionId`]. Entries are created on a connection's first read and
//! removed on disconnect; a single connection's entry is only touched by
//! that connection's read pump, so there is no intra-connection contention.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::listen::interpret;
use super::reassembly::{ReassemblyBuffer, ScanOutcome};
use super::value::FrameValue;
use crate::config::EngineConfig;
use crate::error::{FramelinkError, Result};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of one connection, used to key per-connection decoder
/// state instead of the live channel object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next process-unique connection id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Stateful frame reassembly across all connections.
pub struct FrameDecoder {
    buffers: DashMap<ConnectionId, ReassemblyBuffer>,
    initial_capacity: usize,
    max_frame_length: usize,
    garbage_tolerance: usize,
}

impl FrameDecoder {
    /// Create a decoder from engine configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            buffers: DashMap::new(),
            initial_capacity: config.initial_reassembly_capacity,
            max_frame_length: config.max_frame_length,
            garbage_tolerance: config.garbage_tolerance,
        }
    }

    /// Feed newly read bytes for one connection and drain every complete
    /// frame into typed values.
    ///
    /// A frame whose payload fails interpretation is logged and skipped;
    /// it never aborts decoding of the frames behind it. A fatal status
    /// (bad length field, reassembly overflow) discards the connection's
    /// buffered state and is returned for the caller to tear the
    /// connection down — alongside the values decoded before the fault,
    /// which were extracted from intact frames and must still be
    /// dispatched.
    pub fn decode(&self, conn: ConnectionId, data: &[u8]) -> (Vec<FrameValue>, Result<()>) {
        let mut entry = self.buffers.entry(conn).or_insert_with(|| {
            ReassemblyBuffer::new(
                self.initial_capacity,
                self.max_frame_length,
                self.garbage_tolerance,
            )
        });

        if let Err(err) = entry.extend(data) {
            drop(entry);
            self.on_disconnect(conn);
            return (Vec::new(), Err(err));
        }

        let mut values = Vec::new();
        loop {
            match entry.next_frame() {
                ScanOutcome::Incomplete => break,
                ScanOutcome::Frame { marker, payload } => {
                    match interpret(marker, payload) {
                        Ok(value) => values.push(value),
                        // Per-frame failure: the frame is dropped, the
                        // stream position is already past it.
                        Err(err) => {
                            tracing::warn!(%conn, marker, %err, "dropping undecodable frame");
                        }
                    }
                }
                ScanOutcome::Invalid(reason) => {
                    drop(entry);
                    self.on_disconnect(conn);
                    return (values, Err(FramelinkError::Violation(reason)));
                }
            }
        }

        (values, Ok(()))
    }

    /// Discard the connection's reassembly state.
    ///
    /// Idempotent; calling it for an unknown connection is a no-op and
    /// other connections are unaffected.
    pub fn on_disconnect(&self, conn: ConnectionId) {
        if self.buffers.remove(&conn).is_some() {
            tracing::debug!(%conn, "removed reassembly buffer");
        }
    }

    /// Number of connections with buffered state.
    pub fn tracked_connections(&self) -> usize {
        self.buffers.len()
    }
}
