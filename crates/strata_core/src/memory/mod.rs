//! # Memory Management
//!
//! Fixed-size chunks and the pool that recycles them.
//!
//! ## Design Philosophy
//!
//! Archetype storage grows and shrinks one chunk at a time:
//! - Every chunk has the same size and alignment
//! - Freed chunks go back to a pool, not to the system allocator
//! - Allocation failure is reported, never ignored

mod chunk;
mod pool;

pub use chunk::{Chunk, CHUNK_ALIGN};
pub use pool::{AllocatorStats, ChunkAllocator};
