//! # Chunk
//!
//! A fixed-size, cache-line aligned raw byte block.

// SAFETY: This module owns a raw heap allocation.
// All unsafe blocks are documented.
#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, Layout};
use std::fmt;
use std::ptr::NonNull;

/// Alignment of every chunk. Components may not require more than this.
pub const CHUNK_ALIGN: usize = 64;

/// An owned block of `size` bytes aligned to [`CHUNK_ALIGN`].
///
/// The contents are unspecified until an archetype constructs rows into it.
/// Dropping a chunk returns its memory to the system allocator; the
/// [`ChunkAllocator`](super::ChunkAllocator) keeps chunks alive in its pool
/// instead.
pub struct Chunk {
    /// Start of the allocation.
    ptr: NonNull<u8>,
    /// Layout used for the allocation (needed to free it).
    layout: Layout,
}

impl Chunk {
    /// Allocates a new chunk, or returns `None` when the system allocator
    /// fails.
    pub(crate) fn allocate(layout: Layout) -> Option<Self> {
        debug_assert!(layout.size() > 0, "chunk layout must not be zero-sized");
        // SAFETY: the layout has a non-zero size.
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).map(|ptr| Self { ptr, layout })
    }

    /// Returns the byte size of the chunk.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.layout.size()
    }

    /// Returns the start of the chunk's memory.
    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by `alloc` with exactly this layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("ptr", &self.ptr)
            .field("size", &self.layout.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_alignment() {
        let layout = Layout::from_size_align(4096, CHUNK_ALIGN).unwrap();
        let chunk = Chunk::allocate(layout).unwrap();
        assert_eq!(chunk.size(), 4096);
        assert_eq!(chunk.as_ptr() as usize % CHUNK_ALIGN, 0);
    }
}
