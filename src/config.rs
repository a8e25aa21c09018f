//! Engine configuration.
//!
//! One [`EngineConfig`] value is built at process start and handed to
//! [`FramingEngine::new`](crate::connection::FramingEngine::new). There are
//! no global knobs; every tunable travels through this struct.

use std::time::Duration;

use crate::pool::PoolConfig;

/// Default hard cap on a single frame and on reassembly-buffer growth.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Default initial capacity of a connection's reassembly buffer.
pub const DEFAULT_REASSEMBLY_CAPACITY: usize = 8 * 1024;

/// Default number of garbage bytes tolerated per decode pass while
/// scanning for the start marker.
pub const DEFAULT_GARBAGE_TOLERANCE: usize = 8 * 1024;

/// Default read-idle timeout. A peer that sends nothing within this window,
/// not even a heartbeat, is presumed dead.
pub const DEFAULT_READ_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default capacity of the per-connection outbound frame channel.
pub const DEFAULT_WRITER_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a [`FramingEngine`](crate::connection::FramingEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard cap on a single frame's LENGTH field and on how far a
    /// connection's reassembly buffer may grow.
    pub max_frame_length: usize,
    /// Initial reassembly buffer capacity; grows by doubling up to
    /// `max_frame_length`.
    pub initial_reassembly_capacity: usize,
    /// Garbage bytes tolerated per decode pass during resynchronization.
    pub garbage_tolerance: usize,
    /// Read-idle timeout for the read pump.
    pub read_idle_timeout: Duration,
    /// Capacity of the writer task's frame channel.
    pub writer_channel_capacity: usize,
    /// Buffer pool tier sizes and per-tier counts.
    pub pool: PoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            initial_reassembly_capacity: DEFAULT_REASSEMBLY_CAPACITY,
            garbage_tolerance: DEFAULT_GARBAGE_TOLERANCE,
            read_idle_timeout: DEFAULT_READ_IDLE_TIMEOUT,
            writer_channel_capacity: DEFAULT_WRITER_CHANNEL_CAPACITY,
            pool: PoolConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the frame length cap.
    pub fn max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = max;
        self
    }

    /// Set the read-idle timeout.
    pub fn read_idle_timeout(mut self, timeout: Duration) -> Self {
        self.read_idle_timeout = timeout;
        self
    }

    /// Set the garbage tolerance window.
    pub fn garbage_tolerance(mut self, bytes: usize) -> Self {
        self.garbage_tolerance = bytes;
        self
    }

    /// Set the buffer pool configuration.
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}
