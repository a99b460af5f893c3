//! # Views
//!
//! A view is a persistent query: the list of every archetype whose mask
//! contains the view's mask. The list is filled once when the view is made
//! and extended by the world whenever a new archetype appears, so iterating
//! a view never scans archetypes.

use std::fmt;
use std::marker::PhantomData;

use super::archetype::{Archetype, ArchetypeId};
use super::mask::ComponentMask;

/// Typed handle to a view cache owned by a world.
///
/// Handles are cheap to copy and stay valid for the world's lifetime.
pub struct View<S> {
    /// Slot of the cache in the world.
    slot: usize,
    /// Mask the view was created for.
    mask: ComponentMask,
    _marker: PhantomData<fn() -> S>,
}

impl<S> View<S> {
    pub(crate) fn new(slot: usize, mask: ComponentMask) -> Self {
        Self {
            slot,
            mask,
            _marker: PhantomData,
        }
    }

    /// Returns the slot of the cache inside its world.
    #[inline]
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Returns the mask matched by the view.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> &ComponentMask {
        &self.mask
    }
}

impl<S> Clone for View<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for View<S> {}

impl<S> fmt::Debug for View<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("slot", &self.slot)
            .field("mask", &self.mask)
            .finish()
    }
}

/// Append-only list of archetypes matching one mask.
#[derive(Clone, Debug)]
pub struct ViewCache {
    mask: ComponentMask,
    archetypes: Vec<ArchetypeId>,
}

impl ViewCache {
    /// Creates an empty cache for `mask`.
    #[must_use]
    pub fn new(mask: ComponentMask) -> Self {
        Self {
            mask,
            archetypes: Vec::new(),
        }
    }

    /// Returns the mask matched by the cache.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> &ComponentMask {
        &self.mask
    }

    /// Returns the matching archetypes in creation order.
    #[inline]
    #[must_use]
    pub fn archetypes(&self) -> &[ArchetypeId] {
        &self.archetypes
    }

    /// Appends `archetype` if its mask contains the cache's mask.
    ///
    /// Returns `true` if the archetype was appended.
    pub fn offer(&mut self, archetype: &Archetype) -> bool {
        if archetype.mask().is_superset_of(&self.mask) {
            self.archetypes.push(archetype.id());
            true
        } else {
            false
        }
    }
}
