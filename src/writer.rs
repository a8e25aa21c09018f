//! Dedicated write pump per connection.
//!
//! Outbound frames travel through a bounded mpsc channel to a single
//! writer task, so at most one write is in flight per connection and
//! senders never contend on a lock:
//!
//! ```text
//! send()  ─┐
//! send()  ─┼─► mpsc::Sender<Outbound> ─► writer task ─► socket
//! send()  ─┘
//! ```
//!
//! Each [`Outbound`] carries the pooled buffer holding an encoded frame and
//! a oneshot that resolves when the frame is fully on the wire (or failed).
//! The buffer returns to the pool on exactly one terminal path: after a
//! complete write, or when the write fails.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{FramelinkError, Result};
use crate::pool::PooledBuffer;

/// An encoded frame queued for the writer task.
pub struct Outbound {
    /// The pooled buffer holding the complete wire frame.
    pub buffer: PooledBuffer,
    /// Resolved once the frame is written or the write failed.
    pub done: oneshot::Sender<Result<()>>,
}

/// Sending side of a connection's write pump.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Outbound>,
}

impl WriterHandle {
    /// Queue an encoded frame and wait until it is fully written.
    ///
    /// Completes exactly once: `Ok` after the last byte is flushed, `Err`
    /// if the connection failed first.
    pub async fn send(&self, buffer: PooledBuffer) -> Result<()> {
        let (done, done_rx) = oneshot::channel();
        self.tx
            .send(Outbound { buffer, done })
            .await
            .map_err(|_| FramelinkError::ConnectionClosed)?;
        done_rx.await.map_err(|_| FramelinkError::ConnectionClosed)?
    }
}

/// Spawn the write pump for one connection.
///
/// Returns the cloneable sender handle and the task handle. The task ends
/// when every handle is dropped (clean shutdown) or a write fails.
pub fn spawn_write_pump<W>(writer: W, channel_capacity: usize) -> (WriterHandle, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(channel_capacity);
    let task = tokio::spawn(write_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn write_loop<W>(mut rx: mpsc::Receiver<Outbound>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(outbound) = rx.recv().await {
        let result = write_full(&mut writer, &outbound.buffer).await;
        let failed = result.is_err();

        // Terminal path: release the buffer, then complete the send.
        outbound.buffer.release();
        let _ = outbound.done.send(result);

        if failed {
            break;
        }
    }

    // Connection is done for writing; fail any sends still queued.
    rx.close();
    while let Some(outbound) = rx.recv().await {
        outbound.buffer.release();
        let _ = outbound.done.send(Err(FramelinkError::ConnectionClosed));
    }

    let _ = writer.shutdown().await;
}

/// Write the whole buffer, re-issuing writes on partial progress.
///
/// A single write is not guaranteed to consume the full buffer, so the
/// loop advances an offset until nothing remains. A zero-length write is
/// a peer close.
async fn write_full<W>(writer: &mut W, buf: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut offset = 0usize;
    while offset < buf.len() {
        let n = writer.write(&buf[offset..]).await?;
        if n == 0 {
            return Err(FramelinkError::ConnectionClosed);
        }
        offset += n;
    }
    writer.flush().await?;
    Ok(())
}
