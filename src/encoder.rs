//! Frame encoder: typed values to wire frames.
//!
//! Stateless per call; acquires a pooled buffer sized for the whole frame,
//! assembles `[START_MARKER][LENGTH][TYPE_MARKER][PAYLOAD]`, and delegates
//! the write to the connection's write pump. If the buffer cannot be
//! acquired the failure surfaces to the caller and nothing is sent.

use bytes::BufMut;

use crate::error::Result;
use crate::pool::BufferPool;
use crate::protocol::{FrameValue, FRAME_OVERHEAD, START_MARKER};
use crate::writer::WriterHandle;

/// Encodes typed values into frames and hands them to the write pump.
#[derive(Clone)]
pub struct FrameEncoder {
    pool: BufferPool,
    writer: WriterHandle,
}

impl FrameEncoder {
    /// Create an encoder backed by the given pool and write pump.
    pub fn new(pool: BufferPool, writer: WriterHandle) -> Self {
        Self { pool, writer }
    }

    /// Encode `value` and send it, resolving when it is fully written.
    ///
    /// Callers that need strict frame ordering should await each send
    /// before issuing the next; the pump itself keeps queued frames in
    /// submission order.
    pub async fn send(&self, value: &FrameValue) -> Result<()> {
        let payload_size = value.payload_size();
        let total = FRAME_OVERHEAD + payload_size;

        let mut buf = self.pool.acquire(total).await?;
        buf.put_u8(START_MARKER);
        buf.put_u32(payload_size as u32 + 1);
        buf.put_u8(value.marker().as_byte());
        value.write_payload(&mut buf);
        debug_assert_eq!(buf.len(), total);

        self.writer.send(buf).await
    }

    /// Send a heartbeat frame (marker `0x00`, no payload).
    pub async fn send_heartbeat(&self) -> Result<()> {
        self.send(&FrameValue::Heartbeat).await
    }

    /// Send a UTF-8 string.
    pub async fn send_str(&self, data: &str) -> Result<()> {
        self.send(&FrameValue::Str(data.to_string())).await
    }

    /// Send a 32-bit integer.
    pub async fn send_int(&self, data: i32) -> Result<()> {
        self.send(&FrameValue::Int(data)).await
    }

    /// Send a 32-bit float.
    pub async fn send_float(&self, data: f32) -> Result<()> {
        self.send(&FrameValue::Float(data)).await
    }

    /// Send a 64-bit float.
    pub async fn send_double(&self, data: f64) -> Result<()> {
        self.send(&FrameValue::Double(data)).await
    }

    /// Send a UTF-16 code unit.
    pub async fn send_char(&self, data: u16) -> Result<()> {
        self.send(&FrameValue::Char(data)).await
    }

    /// Send a byte array.
    pub async fn send_bytes(&self, data: &[u8]) -> Result<()> {
        self.send(&FrameValue::Bytes(bytes::Bytes::copy_from_slice(data)))
            .await
    }
}
