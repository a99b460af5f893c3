//! # Component Registry
//!
//! Maps component types to dense indices and to the type-erased operation
//! tables archetypes use to construct, move, destruct and swap values.

// SAFETY: This module builds function pointers operating on raw memory.
// Each operation documents the contract its caller must uphold.
#![allow(unsafe_code)]

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::component::Component;
use super::mask::MAX_COMPONENTS;
use crate::memory::CHUNK_ALIGN;

/// Dense index assigned to a component type at registration.
///
/// Indices are handed out in registration order starting at zero and index
/// both [`ComponentMask`](super::ComponentMask) bits and the registry table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentIndex(u16);

impl ComponentIndex {
    /// Creates an index. `index` must be below [`MAX_COMPONENTS`].
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(index: usize) -> Self {
        assert!(index < MAX_COMPONENTS, "component index out of range");
        Self(index as u16)
    }

    /// Returns the index as a `usize`.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// Type-erased description of a component type.
///
/// Holds the memory layout and four operations bound at registration time.
/// Archetypes invoke them through the dense index, never through generics.
#[derive(Clone, Copy)]
pub struct ComponentInfo {
    type_id: TypeId,
    name: &'static str,
    size: usize,
    align: usize,
    construct: unsafe fn(*mut u8),
    move_construct: unsafe fn(*mut u8, *mut u8),
    destruct: unsafe fn(*mut u8),
    swap: unsafe fn(*mut u8, *mut u8),
}

impl ComponentInfo {
    /// Builds the operation table for `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        unsafe fn construct<T: Default>(dst: *mut u8) {
            dst.cast::<T>().write(T::default());
        }

        unsafe fn move_construct<T: Default>(src: *mut u8, dst: *mut u8) {
            // The source keeps a default value so it stays destructible.
            let value = std::mem::take(&mut *src.cast::<T>());
            dst.cast::<T>().write(value);
        }

        unsafe fn destruct<T>(dst: *mut u8) {
            dst.cast::<T>().drop_in_place();
        }

        unsafe fn swap<T>(a: *mut u8, b: *mut u8) {
            std::ptr::swap(a.cast::<T>(), b.cast::<T>());
        }

        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            construct: construct::<T>,
            move_construct: move_construct::<T>,
            destruct: destruct::<T>,
            swap: swap::<T>,
        }
    }

    /// Returns the `TypeId` of the component.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the component.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the size of one value in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns the alignment of the component.
    #[inline]
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// Default-constructs a value at `dst`.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes, aligned, and must not hold a live value.
    #[inline]
    pub unsafe fn construct(&self, dst: *mut u8) {
        (self.construct)(dst);
    }

    /// Moves the value at `src` into `dst`, leaving a default value at `src`.
    ///
    /// # Safety
    ///
    /// `src` must hold a live value, `dst` must be valid for writes and hold
    /// no live value, and the two must not overlap.
    #[inline]
    pub unsafe fn move_construct(&self, src: *mut u8, dst: *mut u8) {
        (self.move_construct)(src, dst);
    }

    /// Drops the value at `dst` in place.
    ///
    /// # Safety
    ///
    /// `dst` must hold a live value, which must not be used afterwards.
    #[inline]
    pub unsafe fn destruct(&self, dst: *mut u8) {
        (self.destruct)(dst);
    }

    /// Swaps the values at `a` and `b`.
    ///
    /// # Safety
    ///
    /// Both pointers must hold live values of this component type.
    #[inline]
    pub unsafe fn swap(&self, a: *mut u8, b: *mut u8) {
        (self.swap)(a, b);
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish_non_exhaustive()
    }
}

/// Registry of every component type known to a world.
///
/// Lookup by dense index is a direct table access; the `TypeId` map is only
/// used when a generic call needs to resolve its type.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// `TypeId` to dense index.
    indices: HashMap<TypeId, ComponentIndex>,
    /// Operation tables, indexed by `ComponentIndex`.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, returning its dense index.
    ///
    /// Registering a known type is a no-op returning the existing index.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_COMPONENTS`] types are registered or if `T`
    /// requires more alignment than a chunk provides.
    pub fn register<T: Component>(&mut self) -> ComponentIndex {
        if let Some(&index) = self.indices.get(&TypeId::of::<T>()) {
            return index;
        }

        let info = ComponentInfo::of::<T>();
        assert!(
            info.align() <= CHUNK_ALIGN,
            "component `{}` requires {}-byte alignment, chunks are {CHUNK_ALIGN}-byte aligned",
            info.name(),
            info.align()
        );
        assert!(
            self.infos.len() < MAX_COMPONENTS,
            "cannot register `{}`: limit of {MAX_COMPONENTS} component types reached",
            info.name()
        );

        let index = ComponentIndex::new(self.infos.len());
        self.indices.insert(info.type_id(), index);
        self.infos.push(info);

        tracing::debug!(
            component = info.name(),
            index = index.get(),
            size = info.size(),
            align = info.align(),
            "component registered"
        );
        index
    }

    /// Returns the index of `T`, if registered.
    #[inline]
    #[must_use]
    pub fn index_of<T: Component>(&self) -> Option<ComponentIndex> {
        self.indices.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the index of `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` has not been registered.
    #[must_use]
    pub fn expect_index<T: Component>(&self) -> ComponentIndex {
        match self.index_of::<T>() {
            Some(index) => index,
            None => panic!("component `{}` is not registered", type_name::<T>()),
        }
    }

    /// Returns the operation table of a registered component.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not handed out by this registry.
    #[inline]
    #[must_use]
    pub fn info(&self, index: ComponentIndex) -> &ComponentInfo {
        &self.infos[index.get()]
    }

    /// Returns the number of registered components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Checks if no component is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
