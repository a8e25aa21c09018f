//! # framelink
//!
//! Asynchronous framing engine for connection-oriented byte streams.
//!
//! Outbound values are encoded into delimited frames and pushed through a
//! per-connection write pump; inbound bytes are reassembled across
//! arbitrary fragmentation, validated, and decoded back into typed values.
//! All frame memory comes from a tiered, bounded [`pool::BufferPool`].
//!
//! ## Wire format
//!
//! ```text
//! [START 0x01][LENGTH u32 BE][TYPE u8][PAYLOAD: LENGTH - 1 bytes]
//! ```
//!
//! A corrupted stream resynchronizes by scanning forward to the next
//! start marker; a frame that fails its bounds checks tears the
//! connection down.
//!
//! ## Example
//!
//! ```ignore
//! use framelink::{EngineConfig, FramingEngine, FrameValue};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = FramingEngine::new(EngineConfig::default());
//!     let stream = tokio::net::TcpStream::connect("127.0.0.1:9000")
//!         .await
//!         .unwrap();
//!     let mut conn = engine.attach(stream);
//!
//!     conn.send(&FrameValue::Int(42)).await.unwrap();
//!     while let Some(value) = conn.recv().await {
//!         println!("got {value:?}");
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod encoder;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod reader;
pub mod writer;

pub use config::EngineConfig;
pub use connection::{Connection, FramingEngine};
pub use encoder::FrameEncoder;
pub use error::{FramelinkError, Result};
pub use pool::{BufferPool, PoolConfig, PooledBuffer};
pub use protocol::{ConnectionId, FrameDecoder, FrameValue};
