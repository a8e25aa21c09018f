//! Engine assembly and per-connection handles.
//!
//! [`FramingEngine`] owns the shared pieces (buffer pool, frame decoder)
//! and wires any `AsyncRead + AsyncWrite` transport into a [`Connection`]:
//! a read pump feeding an inbound channel and a write pump draining an
//! outbound one. The engine is a plain value; build one per process (or
//! per test) from an [`EngineConfig`] and clone it wherever connections
//! are accepted.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::encoder::FrameEncoder;
use crate::error::{FramelinkError, Result};
use crate::pool::BufferPool;
use crate::protocol::{ConnectionId, FrameDecoder, FrameValue};
use crate::reader::spawn_read_pump;
use crate::writer::spawn_write_pump;

/// Shared framing state: one buffer pool and one decoder for all
/// connections attached through this engine.
#[derive(Clone)]
pub struct FramingEngine {
    config: EngineConfig,
    pool: BufferPool,
    decoder: Arc<FrameDecoder>,
}

impl FramingEngine {
    pub fn new(config: EngineConfig) -> Self {
        let pool = BufferPool::new(&config.pool);
        let decoder = Arc::new(FrameDecoder::new(&config));
        Self {
            config,
            pool,
            decoder,
        }
    }

    /// The engine's buffer pool.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// The engine's shared frame decoder.
    pub fn decoder(&self) -> &Arc<FrameDecoder> {
        &self.decoder
    }

    /// Attach a transport and start its read and write pumps.
    ///
    /// Works with anything that is `AsyncRead + AsyncWrite`: a
    /// `TcpStream`, a Unix socket, or an in-memory duplex in tests.
    pub fn attach<S>(&self, io: S) -> Connection
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let id = ConnectionId::next();

        let (writer, write_task) =
            spawn_write_pump(write_half, self.config.writer_channel_capacity);
        let encoder = FrameEncoder::new(self.pool.clone(), writer);

        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.writer_channel_capacity);
        let read_task = spawn_read_pump(
            id,
            read_half,
            self.decoder.clone(),
            self.pool.clone(),
            inbound_tx,
            self.config.read_idle_timeout,
        );

        tracing::debug!(%id, "connection attached");
        Connection {
            id,
            encoder,
            inbound: inbound_rx,
            decoder: self.decoder.clone(),
            read_task: Some(read_task),
            write_task: Some(write_task),
        }
    }
}

/// One attached transport: typed send surface on one side, a stream of
/// decoded [`FrameValue`]s on the other.
pub struct Connection {
    id: ConnectionId,
    encoder: FrameEncoder,
    inbound: mpsc::Receiver<FrameValue>,
    decoder: Arc<FrameDecoder>,
    read_task: Option<JoinHandle<Result<()>>>,
    write_task: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The typed send surface for this connection. Cloneable; clones keep
    /// the write pump alive until all of them are dropped.
    pub fn encoder(&self) -> &FrameEncoder {
        &self.encoder
    }

    /// Encode and send one value.
    pub async fn send(&self, value: &FrameValue) -> Result<()> {
        self.encoder.send(value).await
    }

    /// Receive the next decoded value, in wire order.
    ///
    /// Returns `None` once the read pump has finished, for any reason;
    /// [`closed`](Self::closed) tells the reasons apart.
    pub async fn recv(&mut self) -> Option<FrameValue> {
        self.inbound.recv().await
    }

    /// Wait for the read pump to finish and return why it did: `Ok(())`
    /// for a graceful EOF, `Err` for timeout, protocol violation, I/O
    /// failure, or a local [`close`](Self::close) that cut the pump off
    /// mid-read. Resolves immediately once the reason has been taken.
    pub async fn closed(&mut self) -> Result<()> {
        match self.read_task.take() {
            Some(task) => task
                .await
                .unwrap_or(Err(FramelinkError::ConnectionClosed)),
            None => Ok(()),
        }
    }

    /// Tear the connection down. Idempotent; a second call is a no-op.
    ///
    /// The pump handles stay in place so [`closed`](Self::closed) can
    /// still report the teardown reason afterwards.
    pub fn close(&mut self) {
        if let Some(task) = &self.read_task {
            task.abort();
            // The pump cannot run its own cleanup once aborted.
            self.decoder.on_disconnect(self.id);
        }
        if let Some(task) = &self.write_task {
            task.abort();
        }
        self.inbound.close();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
