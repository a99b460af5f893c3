//! # Component Sets
//!
//! Tuples of component types used by [`World::register`], [`World::add`],
//! [`World::remove`] and views. Implemented for tuples of one to eight
//! components.
//!
//! [`World::register`]: crate::World::register
//! [`World::add`]: crate::World::add
//! [`World::remove`]: crate::World::remove

// SAFETY: `Fetch` hands out references built from raw column pointers.
// The world only calls it with distinct indices of live rows.
#![allow(unsafe_code)]

use super::archetype::Archetype;
use super::component::Component;
use super::mask::ComponentMask;
use super::registry::{ComponentIndex, ComponentRegistry};

/// A tuple of component types.
pub trait ComponentSet: 'static {
    /// Registers every type of the set, returning the set's mask.
    fn register(registry: &mut ComponentRegistry) -> ComponentMask;

    /// Returns the index of every type, in tuple order.
    ///
    /// # Panics
    ///
    /// Panics if a type has not been registered.
    fn indices(registry: &ComponentRegistry) -> Vec<ComponentIndex>;

    /// Returns the mask of the set.
    ///
    /// # Panics
    ///
    /// Panics if a type has not been registered.
    fn mask(registry: &ComponentRegistry) -> ComponentMask {
        ComponentMask::from_indices(&Self::indices(registry))
    }

    /// Returns the indices of the set, checking that no type repeats.
    ///
    /// # Panics
    ///
    /// Panics if a type is unregistered or appears twice.
    fn unique_indices(registry: &ComponentRegistry) -> Vec<ComponentIndex> {
        let indices = Self::indices(registry);
        assert!(
            ComponentMask::from_indices(&indices).len() == indices.len(),
            "component set `{}` names the same type twice",
            std::any::type_name::<Self>()
        );
        indices
    }
}

/// Component sets that can borrow their columns mutably.
///
/// # Safety
///
/// `columns` must return pointers to the columns named by `indices`, in
/// tuple order. `item` and `slices` must only build references from those
/// pointers.
pub unsafe trait Fetch: ComponentSet {
    /// One mutable reference per component.
    type Item<'a>;
    /// One mutable column slice per component.
    type Slices<'a>;
    /// Raw column starts for one chunk.
    type Columns: Copy;

    /// Resolves the column starts of `chunk`.
    fn columns(archetype: &Archetype, chunk: usize, indices: &[ComponentIndex]) -> Self::Columns;

    /// Builds the references for `slot`.
    ///
    /// # Safety
    ///
    /// `slot` must be a live slot of the chunk, the columns must be distinct,
    /// and no other reference to the slot may exist for `'a`.
    unsafe fn item<'a>(columns: Self::Columns, slot: usize) -> Self::Item<'a>;

    /// Builds the column slices for the first `len` slots.
    ///
    /// # Safety
    ///
    /// The first `len` slots must be live, the columns must be distinct, and
    /// no other reference to them may exist for `'a`.
    unsafe fn slices<'a>(columns: Self::Columns, len: usize) -> Self::Slices<'a>;
}

macro_rules! impl_component_set {
    ($(($name:ident, $idx:tt)),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn register(registry: &mut ComponentRegistry) -> ComponentMask {
                let mut mask = ComponentMask::EMPTY;
                $(mask.set(registry.register::<$name>());)+
                mask
            }

            fn indices(registry: &ComponentRegistry) -> Vec<ComponentIndex> {
                vec![$(registry.expect_index::<$name>()),+]
            }
        }

        unsafe impl<$($name: Component),+> Fetch for ($($name,)+) {
            type Item<'a> = ($(&'a mut $name,)+);
            type Slices<'a> = ($(&'a mut [$name],)+);
            type Columns = ($(*mut $name,)+);

            fn columns(
                archetype: &Archetype,
                chunk: usize,
                indices: &[ComponentIndex],
            ) -> Self::Columns {
                ($(archetype.column_ptr::<$name>(chunk, indices[$idx]),)+)
            }

            unsafe fn item<'a>(columns: Self::Columns, slot: usize) -> Self::Item<'a> {
                ($(&mut *columns.$idx.add(slot),)+)
            }

            unsafe fn slices<'a>(columns: Self::Columns, len: usize) -> Self::Slices<'a> {
                ($(std::slice::from_raw_parts_mut(columns.$idx, len),)+)
            }
        }
    };
}

impl_component_set!((A, 0));
impl_component_set!((A, 0), (B, 1));
impl_component_set!((A, 0), (B, 1), (C, 2));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));
