//! Error types for framelink.

use thiserror::Error;

/// Main error type for all framing operations.
#[derive(Debug, Error)]
pub enum FramelinkError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fatal protocol violation (bad length field, unknown type marker,
    /// declared length exceeding the actual payload). Always tears down
    /// the offending connection.
    #[error("protocol violation: {0}")]
    Violation(String),

    /// A complete frame declared a field larger than the bytes it carries.
    /// Non-fatal: the frame is dropped, the connection keeps decoding.
    #[error("incomplete payload: {0}")]
    Incomplete(&'static str),

    /// The reassembly buffer would have to grow beyond the configured
    /// frame cap. Treated like a protocol violation.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A buffer larger than the biggest pool tier was requested.
    #[error("requested buffer of {requested} bytes exceeds largest pool tier ({max})")]
    BufferTooLarge { requested: usize, max: usize },

    /// Connection closed before the operation completed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer sent nothing (not even a heartbeat) within the idle window.
    #[error("read idle timeout")]
    IdleTimeout,
}

impl FramelinkError {
    /// Whether this error must terminate the connection it occurred on.
    ///
    /// `Incomplete` resolves by dropping the affected frame and
    /// `BufferTooLarge` only fails the operation that requested the buffer.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Incomplete(_) | Self::BufferTooLarge { .. })
    }
}

/// Result type alias using FramelinkError.
pub type Result<T> = std::result::Result<T, FramelinkError>;
