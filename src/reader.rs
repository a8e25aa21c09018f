//! Per-connection read pump.
//!
//! Drives the perpetual read loop for one connection: acquire a pooled
//! buffer, read with the idle timeout, feed the decoder, dispatch decoded
//! values, release the buffer, re-arm. Exactly one read is outstanding at
//! any time because the next read is only issued after the previous one
//! has been fully handled.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::{FramelinkError, Result};
use crate::pool::BufferPool;
use crate::protocol::{ConnectionId, FrameDecoder, FrameValue};

/// Spawn the read pump for one connection.
///
/// Decoded values are dispatched into `inbound` in wire order. The task
/// resolves `Ok(())` on graceful EOF and `Err` on timeout, protocol
/// violation, or I/O failure; in every case the connection's decoder state
/// has been purged and all pooled buffers returned before it resolves.
pub fn spawn_read_pump<R>(
    conn: ConnectionId,
    reader: R,
    decoder: Arc<FrameDecoder>,
    pool: BufferPool,
    inbound: mpsc::Sender<FrameValue>,
    idle_timeout: Duration,
) -> JoinHandle<Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let result = read_loop(conn, reader, &decoder, &pool, &inbound, idle_timeout).await;
        decoder.on_disconnect(conn);
        match &result {
            Ok(()) => tracing::debug!(%conn, "peer disconnected"),
            Err(FramelinkError::IdleTimeout) => {
                tracing::warn!(%conn, "peer idle beyond timeout, closing")
            }
            Err(FramelinkError::Io(err)) => {
                tracing::warn!(%conn, %err, "read failed, closing")
            }
            Err(err) => tracing::warn!(%conn, %err, "closing connection"),
        }
        result
    })
}

async fn read_loop<R>(
    conn: ConnectionId,
    mut reader: R,
    decoder: &FrameDecoder,
    pool: &BufferPool,
    inbound: &mpsc::Sender<FrameValue>,
    idle_timeout: Duration,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        // A fresh pooled buffer per read; released on every exit path
        // when the guard drops.
        let mut buf = pool.acquire(pool.max_buffer_size()).await?;

        let n = match timeout(idle_timeout, reader.read_buf(&mut *buf)).await {
            Err(_) => return Err(FramelinkError::IdleTimeout),
            Ok(Err(err)) => return Err(FramelinkError::Io(err)),
            Ok(Ok(0)) => return Ok(()),
            Ok(Ok(n)) => n,
        };

        let (values, status) = decoder.decode(conn, &buf[..n]);
        buf.release();

        // Frames decoded before a fatal fault were intact and are still
        // delivered; the teardown happens after.
        for value in values {
            if inbound.send(value).await.is_err() {
                // Receiver dropped: nobody is listening anymore.
                return Err(FramelinkError::ConnectionClosed);
            }
        }
        status?;
    }
}
