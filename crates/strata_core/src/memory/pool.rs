//! # Chunk Allocator
//!
//! Pooling allocator for fixed-size chunks shared by every archetype of a
//! world.

use std::alloc::Layout;

use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

use super::chunk::{Chunk, CHUNK_ALIGN};

/// Counters describing allocator activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Chunks currently handed out to archetypes.
    pub live: usize,
    /// Chunks sitting in the pool, ready for reuse.
    pub pooled: usize,
    /// Chunks obtained from the system allocator.
    pub fresh_allocations: u64,
    /// Allocations served from the pool.
    pub reuses: u64,
    /// Chunks returned to the pool.
    pub frees: u64,
}

/// A pool of fixed-size chunks.
///
/// Freed chunks are kept on a free list and handed out again, so steady-state
/// spawning and despawning never touches the system allocator.
///
/// # Thread Safety
///
/// This allocator is NOT thread-safe. It is owned by a single world.
///
/// # Example
///
/// ```rust,ignore
/// let mut allocator = ChunkAllocator::new(16 * 1024)?;
///
/// // Allocate - O(1), pooled after the first round
/// let chunk = allocator.allocate()?;
///
/// // Free - O(1), memory stays in the pool
/// allocator.free(chunk);
/// ```
#[derive(Debug)]
pub struct ChunkAllocator {
    /// Layout shared by every chunk.
    layout: Layout,
    /// Free list of chunks available for reuse.
    pool: Vec<Chunk>,
    /// Maximum number of live chunks.
    budget: Option<usize>,
    /// Number of chunks currently handed out.
    live: usize,
    /// Chunks obtained from the system allocator.
    fresh_allocations: u64,
    /// Allocations served from the pool.
    reuses: u64,
    /// Chunks returned to the pool.
    frees: u64,
}

impl ChunkAllocator {
    /// Creates an empty, unbounded allocator for chunks of `chunk_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `chunk_size` is zero or not a
    /// multiple of [`CHUNK_ALIGN`].
    pub fn new(chunk_size: usize) -> EcsResult<Self> {
        if chunk_size == 0 || chunk_size % CHUNK_ALIGN != 0 {
            return Err(EcsError::InvalidConfig(format!(
                "chunk_size must be a non-zero multiple of {CHUNK_ALIGN}, got {chunk_size}"
            )));
        }
        let layout = Layout::from_size_align(chunk_size, CHUNK_ALIGN)
            .map_err(|e| EcsError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            layout,
            pool: Vec::new(),
            budget: None,
            live: 0,
            fresh_allocations: 0,
            reuses: 0,
            frees: 0,
        })
    }

    /// Creates an allocator from a world configuration, applying the chunk
    /// budget and prewarming the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or prewarming fails.
    pub fn with_config(config: &WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        let mut allocator = Self::new(config.chunk_size)?;
        allocator.budget = config.chunk_budget;
        allocator.prewarm(config.prewarm_chunks)?;
        Ok(allocator)
    }

    /// Returns the byte size of every chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.layout.size()
    }

    /// Returns the maximum number of live chunks, if bounded.
    #[inline]
    #[must_use]
    pub const fn budget(&self) -> Option<usize> {
        self.budget
    }

    /// Returns the number of chunks currently handed out.
    #[inline]
    #[must_use]
    pub const fn live(&self) -> usize {
        self.live
    }

    /// Returns the number of chunks waiting in the pool.
    #[inline]
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Hands out a chunk, reusing a pooled one when available.
    ///
    /// This is a **O(1)** operation. The chunk's contents are unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ChunkBudgetExhausted`] when the budget is reached,
    /// or [`EcsError::OutOfMemory`] when the system allocator fails.
    pub fn allocate(&mut self) -> EcsResult<Chunk> {
        if let Some(budget) = self.budget {
            if self.live >= budget {
                tracing::warn!(budget, "chunk budget exhausted");
                return Err(EcsError::ChunkBudgetExhausted { budget });
            }
        }

        let chunk = match self.pool.pop() {
            Some(chunk) => {
                self.reuses += 1;
                chunk
            }
            None => {
                let chunk = self.fresh()?;
                self.fresh_allocations += 1;
                chunk
            }
        };

        self.live += 1;
        tracing::trace!(live = self.live, pooled = self.pool.len(), "chunk allocated");
        Ok(chunk)
    }

    /// Returns a chunk to the pool.
    ///
    /// This is a **O(1)** operation. The memory is kept for reuse.
    pub fn free(&mut self, chunk: Chunk) {
        debug_assert_eq!(chunk.size(), self.layout.size(), "foreign chunk freed");
        debug_assert!(self.live > 0, "more chunks freed than allocated");

        self.live = self.live.saturating_sub(1);
        self.frees += 1;
        self.pool.push(chunk);
        tracing::trace!(live = self.live, pooled = self.pool.len(), "chunk freed");
    }

    /// Allocates `count` chunks straight into the pool.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::OutOfMemory`] if the system allocator fails; chunks
    /// allocated before the failure stay pooled.
    pub fn prewarm(&mut self, count: usize) -> EcsResult<()> {
        self.pool.reserve(count);
        for _ in 0..count {
            let chunk = self.fresh()?;
            self.fresh_allocations += 1;
            self.pool.push(chunk);
        }
        Ok(())
    }

    /// Releases every pooled chunk back to the system allocator.
    ///
    /// Returns the number of chunks released.
    pub fn trim(&mut self) -> usize {
        let released = self.pool.len();
        self.pool.clear();
        self.pool.shrink_to_fit();
        released
    }

    /// Returns a snapshot of the allocator counters.
    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            live: self.live,
            pooled: self.pool.len(),
            fresh_allocations: self.fresh_allocations,
            reuses: self.reuses,
            frees: self.frees,
        }
    }

    /// Obtains a chunk from the system allocator.
    fn fresh(&self) -> EcsResult<Chunk> {
        Chunk::allocate(self.layout).ok_or_else(|| {
            tracing::warn!(chunk_size = self.layout.size(), "system allocator failed");
            EcsError::OutOfMemory {
                chunk_size: self.layout.size(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_free() {
        let mut allocator = ChunkAllocator::new(4096).unwrap();

        let chunk = allocator.allocate().unwrap();
        assert_eq!(chunk.size(), 4096);
        assert_eq!(allocator.live(), 1);

        allocator.free(chunk);
        assert_eq!(allocator.live(), 0);
        assert_eq!(allocator.pooled(), 1);
    }

    #[test]
    fn test_reuse() {
        let mut allocator = ChunkAllocator::new(4096).unwrap();

        let chunk = allocator.allocate().unwrap();
        let first = chunk.as_ptr();
        allocator.free(chunk);

        let chunk = allocator.allocate().unwrap();
        assert_eq!(chunk.as_ptr(), first); // Same block reused
        let stats = allocator.stats();
        assert_eq!(stats.fresh_allocations, 1);
        assert_eq!(stats.reuses, 1);
        allocator.free(chunk);
    }

    #[test]
    fn test_budget() {
        let config = WorldConfig {
            chunk_size: 1024,
            chunk_budget: Some(2),
            prewarm_chunks: 0,
        };
        let mut allocator = ChunkAllocator::with_config(&config).unwrap();

        let a = allocator.allocate().unwrap();
        let b = allocator.allocate().unwrap();
        assert_eq!(
            allocator.allocate().unwrap_err(),
            EcsError::ChunkBudgetExhausted { budget: 2 }
        );

        allocator.free(a);
        let c = allocator.allocate().unwrap();
        allocator.free(b);
        allocator.free(c);
    }

    #[test]
    fn test_prewarm_and_trim() {
        let config = WorldConfig {
            chunk_size: 1024,
            chunk_budget: None,
            prewarm_chunks: 4,
        };
        let mut allocator = ChunkAllocator::with_config(&config).unwrap();
        assert_eq!(allocator.pooled(), 4);

        let chunk = allocator.allocate().unwrap();
        assert_eq!(allocator.stats().reuses, 1);
        allocator.free(chunk);

        assert_eq!(allocator.trim(), 4);
        assert_eq!(allocator.pooled(), 0);
    }

    #[test]
    fn test_invalid_chunk_size() {
        assert!(ChunkAllocator::new(0).is_err());
        assert!(ChunkAllocator::new(100).is_err());
    }
}
