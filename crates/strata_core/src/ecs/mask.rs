//! # Component Mask
//!
//! Fixed-size bitset over dense component indices. An archetype is identified
//! by exactly one mask.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor};

use super::registry::ComponentIndex;

/// Number of 64-bit words in a mask.
const MASK_WORDS: usize = 4;

/// Maximum number of component types per world.
pub const MAX_COMPONENTS: usize = MASK_WORDS * 64;

/// Bitset identifying which component types a row carries.
///
/// Two archetypes are the same archetype iff their masks are equal.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask {
    /// 1 = component present. 64 components per word.
    words: [u64; MASK_WORDS],
}

impl ComponentMask {
    /// The empty mask.
    pub const EMPTY: Self = Self {
        words: [0; MASK_WORDS],
    };

    /// Creates a mask from a list of indices.
    #[must_use]
    pub fn from_indices(indices: &[ComponentIndex]) -> Self {
        let mut mask = Self::EMPTY;
        for &index in indices {
            mask.set(index);
        }
        mask
    }

    /// Sets the bit for `index`.
    #[inline]
    pub fn set(&mut self, index: ComponentIndex) {
        let i = index.get();
        self.words[i / 64] |= 1u64 << (i % 64);
    }

    /// Clears the bit for `index`.
    #[inline]
    pub fn unset(&mut self, index: ComponentIndex) {
        let i = index.get();
        self.words[i / 64] &= !(1u64 << (i % 64));
    }

    /// Checks if the bit for `index` is set.
    #[inline]
    #[must_use]
    pub const fn contains(&self, index: ComponentIndex) -> bool {
        let i = index.get();
        (self.words[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Checks if every bit of `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    /// Checks if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns the number of set bits.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates over the set indices in ascending order.
    pub fn iter(&self) -> MaskIter {
        MaskIter {
            words: self.words,
            word_idx: 0,
            current_word: self.words[0],
        }
    }
}

impl BitOr for ComponentMask {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self {
        for (word, other) in self.words.iter_mut().zip(rhs.words) {
            *word |= other;
        }
        self
    }
}

impl BitAnd for ComponentMask {
    type Output = Self;

    fn bitand(mut self, rhs: Self) -> Self {
        for (word, other) in self.words.iter_mut().zip(rhs.words) {
            *word &= other;
        }
        self
    }
}

impl BitXor for ComponentMask {
    type Output = Self;

    fn bitxor(mut self, rhs: Self) -> Self {
        for (word, other) in self.words.iter_mut().zip(rhs.words) {
            *word ^= other;
        }
        self
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(ComponentIndex::get)).finish()
    }
}

/// Iterator over the set indices of a mask.
pub struct MaskIter {
    words: [u64; MASK_WORDS],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for MaskIter {
    type Item = ComponentIndex;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                // Find lowest set bit
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1;
                return Some(ComponentIndex::new(self.word_idx * 64 + bit));
            }

            self.word_idx += 1;
            if self.word_idx >= MASK_WORDS {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}
