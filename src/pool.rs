//! Tiered buffer pool with backpressure.
//!
//! Supplies fixed-capacity `BytesMut` buffers without per-operation heap
//! allocation. Three tiers (small/medium/large); `acquire` picks the
//! smallest tier that fits the request and suspends the calling task when
//! that tier is exhausted. Exhaustion is backpressure, not an error — only
//! a request beyond the largest tier fails.
//!
//! # Ownership
//!
//! [`BufferPool::acquire`] hands out a [`PooledBuffer`] guard owning the
//! buffer. Dropping the guard returns the buffer to its tier exactly once,
//! so a buffer is owned by exactly one party at a time: the holder, or the
//! pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tokio::sync::Semaphore;

use crate::error::{FramelinkError, Result};

/// Default buffer count per tier.
pub const DEFAULT_TIER_COUNT: usize = 40;

/// Default small tier capacity.
pub const SMALL_SIZE: usize = 256;

/// Default medium tier capacity.
pub const MEDIUM_SIZE: usize = 4096;

/// Default large tier capacity.
pub const LARGE_SIZE: usize = 64 * 1024;

/// Buffer pool tier sizes and per-tier counts.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Capacity of each tier, ascending. Exactly three tiers.
    pub tier_sizes: [usize; 3],
    /// Number of buffers pre-allocated per tier.
    pub buffers_per_tier: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            tier_sizes: [SMALL_SIZE, MEDIUM_SIZE, LARGE_SIZE],
            buffers_per_tier: DEFAULT_TIER_COUNT,
        }
    }
}

/// One tier: a semaphore gating a free list of equal-capacity buffers.
///
/// The semaphore carries the blocking/backpressure semantics; the mutex
/// only guards the push/pop of the free list.
struct Tier {
    capacity: usize,
    available: Semaphore,
    free: Mutex<Vec<BytesMut>>,
}

impl Tier {
    fn new(capacity: usize, count: usize) -> Self {
        let free = (0..count).map(|_| BytesMut::with_capacity(capacity)).collect();
        Self {
            capacity,
            available: Semaphore::new(count),
            free: Mutex::new(free),
        }
    }
}

struct Shared {
    tiers: [Tier; 3],
    /// Outstanding acquisitions, for leak diagnostics.
    in_flight: AtomicUsize,
}

/// Tiered reusable byte-buffer allocator.
///
/// Cheaply cloneable; all clones share the same tiers.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Shared>,
}

impl BufferPool {
    /// Create a pool from explicit configuration.
    pub fn new(config: &PoolConfig) -> Self {
        let [small, medium, large] = config.tier_sizes;
        debug_assert!(small < medium && medium < large);
        Self {
            inner: Arc::new(Shared {
                tiers: [
                    Tier::new(small, config.buffers_per_tier),
                    Tier::new(medium, config.buffers_per_tier),
                    Tier::new(large, config.buffers_per_tier),
                ],
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Create a pool with default tier sizes and counts.
    pub fn with_defaults() -> Self {
        Self::new(&PoolConfig::default())
    }

    /// Acquire a cleared buffer of the smallest tier that fits `requested`.
    ///
    /// Suspends until a buffer of that tier is available. Requests larger
    /// than the biggest tier fail with [`FramelinkError::BufferTooLarge`].
    pub async fn acquire(&self, requested: usize) -> Result<PooledBuffer> {
        let tier_idx = self.tier_for(requested)?;
        let tier = &self.inner.tiers[tier_idx];

        // The semaphore is never closed, so acquire can only fail if the
        // pool itself is gone, which the Arc prevents.
        let permit = tier
            .available
            .acquire()
            .await
            .map_err(|_| FramelinkError::ConnectionClosed)?;
        permit.forget();

        let mut buf = tier
            .free
            .lock()
            .expect("pool free list poisoned")
            .pop()
            .expect("permit held but free list empty");
        buf.clear();

        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        Ok(PooledBuffer {
            buf: Some(buf),
            tier_idx,
            pool: self.clone(),
        })
    }

    /// Largest buffer size this pool can supply.
    pub fn max_buffer_size(&self) -> usize {
        self.inner.tiers[2].capacity
    }

    /// Number of free buffers currently available in the tier that would
    /// serve a request of `size` bytes.
    pub fn available(&self, size: usize) -> Result<usize> {
        let idx = self.tier_for(size)?;
        Ok(self.inner.tiers[idx].available.available_permits())
    }

    /// Number of buffers currently held by callers across all tiers.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    fn tier_for(&self, requested: usize) -> Result<usize> {
        let tiers = &self.inner.tiers;
        tiers
            .iter()
            .position(|t| requested <= t.capacity)
            .ok_or(FramelinkError::BufferTooLarge {
                requested,
                max: tiers[2].capacity,
            })
    }

    /// Return a buffer to its tier. Called from the guard's drop.
    ///
    /// A buffer whose capacity no longer matches the tier (the holder grew
    /// it past the tier capacity, forcing a reallocation) is not readmitted;
    /// a fresh buffer replaces it so the pool's accounting stays whole.
    fn release_to_tier(&self, tier_idx: usize, buf: BytesMut) {
        let tier = &self.inner.tiers[tier_idx];
        let buf = if buf.capacity() == tier.capacity {
            buf
        } else {
            tracing::warn!(
                capacity = buf.capacity(),
                tier = tier.capacity,
                "released buffer does not match its tier, replacing"
            );
            BytesMut::with_capacity(tier.capacity)
        };

        tier.free.lock().expect("pool free list poisoned").push(buf);
        tier.available.add_permits(1);
        self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// An owning handle to a pooled buffer.
///
/// Dereferences to `BytesMut`. Dropping it releases the buffer back to the
/// pool; there is no way to release twice or to release a buffer the pool
/// did not hand out.
pub struct PooledBuffer {
    buf: Option<BytesMut>,
    tier_idx: usize,
    pool: BufferPool,
}

impl PooledBuffer {
    /// Explicitly release the buffer back to the pool.
    ///
    /// Equivalent to dropping the guard; provided for call sites where the
    /// release is a deliberate step rather than an end of scope.
    pub fn release(self) {
        drop(self);
    }

    /// Capacity of the tier this buffer belongs to.
    pub fn tier_capacity(&self) -> usize {
        self.pool.inner.tiers[self.tier_idx].capacity
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        self.buf.as_ref().expect("buffer already released")
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buf.as_mut().expect("buffer already released")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release_to_tier(self.tier_idx, buf);
        }
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("tier_capacity", &self.tier_capacity())
            .field("len", &self.buf.as_ref().map_or(0, BytesMut::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_acquire_selects_smallest_fitting_tier() {
        let pool = BufferPool::with_defaults();

        let small = pool.acquire(1).await.unwrap();
        assert_eq!(small.tier_capacity(), SMALL_SIZE);

        let boundary = pool.acquire(SMALL_SIZE).await.unwrap();
        assert_eq!(boundary.tier_capacity(), SMALL_SIZE);

        let medium = pool.acquire(SMALL_SIZE + 1).await.unwrap();
        assert_eq!(medium.tier_capacity(), MEDIUM_SIZE);

        let large = pool.acquire(MEDIUM_SIZE + 1).await.unwrap();
        assert_eq!(large.tier_capacity(), LARGE_SIZE);
    }

    #[tokio::test]
    async fn test_oversized_request_rejected() {
        let pool = BufferPool::with_defaults();
        let err = pool.acquire(LARGE_SIZE + 1).await.unwrap_err();
        assert!(matches!(err, FramelinkError::BufferTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_buffers_handed_out_cleared() {
        let pool = BufferPool::with_defaults();

        let mut buf = pool.acquire(16).await.unwrap();
        buf.extend_from_slice(b"leftover");
        buf.release();

        // Drain the whole tier; every buffer must come back empty.
        let mut held = Vec::new();
        for _ in 0..DEFAULT_TIER_COUNT {
            let buf = pool.acquire(16).await.unwrap();
            assert!(buf.is_empty());
            held.push(buf);
        }
    }

    #[tokio::test]
    async fn test_release_restores_availability() {
        let pool = BufferPool::with_defaults();
        assert_eq!(pool.available(1).unwrap(), DEFAULT_TIER_COUNT);

        let buf = pool.acquire(1).await.unwrap();
        assert_eq!(pool.available(1).unwrap(), DEFAULT_TIER_COUNT - 1);
        assert_eq!(pool.in_flight(), 1);

        buf.release();
        assert_eq!(pool.available(1).unwrap(), DEFAULT_TIER_COUNT);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_blocks_until_release() {
        let config = PoolConfig {
            tier_sizes: [8, 16, 32],
            buffers_per_tier: 1,
        };
        let pool = BufferPool::new(&config);

        let held = pool.acquire(8).await.unwrap();

        // Tier exhausted: a second acquire must suspend, not error.
        let pending = tokio::time::timeout(Duration::from_millis(20), pool.acquire(8)).await;
        assert!(pending.is_err(), "acquire should block while tier is empty");

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire(8).await })
        };
        tokio::task::yield_now().await;
        held.release();

        let buf = waiter.await.unwrap().unwrap();
        assert_eq!(buf.tier_capacity(), 8);
    }

    #[tokio::test]
    async fn test_never_blocks_under_capacity() {
        let pool = BufferPool::with_defaults();

        for _ in 0..200 {
            let a = pool.acquire(100).await.unwrap();
            let b = pool.acquire(2000).await.unwrap();
            a.release();
            b.release();
        }
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.available(100).unwrap(), DEFAULT_TIER_COUNT);
        assert_eq!(pool.available(2000).unwrap(), DEFAULT_TIER_COUNT);
    }

    #[tokio::test]
    async fn test_grown_buffer_replaced_on_release() {
        let config = PoolConfig {
            tier_sizes: [8, 16, 32],
            buffers_per_tier: 1,
        };
        let pool = BufferPool::new(&config);

        let mut buf = pool.acquire(8).await.unwrap();
        // Grow past the tier capacity; BytesMut reallocates internally.
        buf.extend_from_slice(&[0u8; 64]);
        buf.release();

        // The tier must still hold exactly one buffer of the tier capacity.
        let buf = pool.acquire(8).await.unwrap();
        assert_eq!(buf.capacity(), 8);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_release() {
        let pool = BufferPool::with_defaults();
        let mut tasks = Vec::new();

        for _ in 0..8 {
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let buf = pool.acquire(512).await.unwrap();
                    tokio::task::yield_now().await;
                    buf.release();
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(pool.in_flight(), 0);
    }
}
