//! # Archetype Storage
//!
//! An archetype stores every entity that carries exactly one component mask.
//!
//! ## Chunked Structure of Arrays
//!
//! ```text
//! Archetype {Position, Velocity, Health}, 3 rows per chunk:
//!
//! chunk 0: [V0 V1 V2][P0 P1 P2][H0 H1 H2]
//! chunk 1: [V3 V4 V5][P3 P4 P5][H3 H4 H5]
//! chunk 2: [V6 .. ..][P6 .. ..][H6 .. ..]   <- last chunk, partially used
//! ```
//!
//! Columns are ordered by alignment (largest first), so every column starts
//! aligned without padding. Iterating one component walks contiguous memory.
//!
//! ## Density
//!
//! Rows `0..len` are always live. Removal swaps the last row into the hole,
//! and the last chunk is returned to the pool as soon as it becomes empty.

// SAFETY: This module is the only place that addresses raw chunk memory.
// All unsafe blocks are documented; everything exported is safe.
#![allow(unsafe_code)]

use std::any::TypeId;
use std::fmt;
use std::ops::Range;

use super::bundle::Fetch;
use super::component::Component;
use super::entity::EntityId;
use super::mask::ComponentMask;
use super::registry::{ComponentIndex, ComponentInfo, ComponentRegistry};
use crate::error::{EcsError, EcsResult};
use crate::memory::{Chunk, ChunkAllocator};

/// Index of an archetype inside its world. Archetypes are never destroyed
/// before the world, so an id stays valid for the world's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// Creates an id from an arena index.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in 32 bits.
    #[inline]
    #[must_use]
    pub fn new(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(index) => Self(index),
            Err(_) => panic!("archetype index {index} out of range"),
        }
    }

    /// Returns the arena index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One component column of an archetype.
#[derive(Clone, Copy, Debug)]
pub struct Column {
    /// Component stored in the column.
    component: ComponentIndex,
    /// Operation table of the component.
    info: ComponentInfo,
    /// Byte offset of the column inside every chunk.
    offset: usize,
}

impl Column {
    /// Returns the component stored in this column.
    #[inline]
    #[must_use]
    pub const fn component(&self) -> ComponentIndex {
        self.component
    }

    /// Returns the operation table of the component.
    #[inline]
    #[must_use]
    pub const fn info(&self) -> &ComponentInfo {
        &self.info
    }

    /// Returns the byte offset of the column inside every chunk.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// Column layout shared by every chunk of an archetype.
#[derive(Clone, Debug)]
pub struct ArchetypeLayout {
    /// Columns in layout order (alignment descending, index ascending).
    columns: Vec<Column>,
    /// Sum of all component sizes.
    row_size: usize,
    /// Rows that fit in one chunk.
    entity_per_chunk: usize,
    /// Byte size of the chunks the layout was computed for.
    chunk_size: usize,
}

impl ArchetypeLayout {
    /// Computes the column layout for `components` in chunks of `chunk_size`
    /// bytes.
    ///
    /// Components are sorted by alignment (descending, ties broken by index)
    /// and each column gets `size * entity_per_chunk` bytes. Rows made only
    /// of zero-sized components count as one byte wide.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RowTooLarge`] if a single row does not fit.
    pub fn resolve(
        components: impl IntoIterator<Item = (ComponentIndex, ComponentInfo)>,
        chunk_size: usize,
    ) -> EcsResult<Self> {
        let mut columns: Vec<Column> = components
            .into_iter()
            .map(|(component, info)| Column {
                component,
                info,
                offset: 0,
            })
            .collect();

        columns.sort_by(|a, b| {
            b.info
                .align()
                .cmp(&a.info.align())
                .then_with(|| a.component.cmp(&b.component))
        });

        let row_size: usize = columns.iter().map(|c| c.info.size()).sum();
        if row_size > chunk_size {
            return Err(EcsError::RowTooLarge {
                row_size,
                chunk_size,
            });
        }
        let entity_per_chunk = chunk_size / row_size.max(1);

        let mut offset = 0;
        for column in &mut columns {
            column.offset = offset;
            offset += column.info.size() * entity_per_chunk;
        }

        Ok(Self {
            columns,
            row_size,
            entity_per_chunk,
            chunk_size,
        })
    }

    /// Returns the columns in layout order.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the combined size of one row.
    #[inline]
    #[must_use]
    pub const fn row_size(&self) -> usize {
        self.row_size
    }

    /// Returns how many rows fit in one chunk.
    #[inline]
    #[must_use]
    pub const fn entity_per_chunk(&self) -> usize {
        self.entity_per_chunk
    }

    /// Returns the chunk size the layout was computed for.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Result of moving a row into another archetype.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowMove {
    /// Row assigned in the target archetype.
    pub row: usize,
    /// Entity swapped into the vacated source row, if any.
    pub displaced: Option<EntityId>,
}

/// Storage for all entities sharing one component mask.
///
/// Rows are constructed, moved, swapped and destructed exclusively through
/// the type-erased [`ComponentInfo`] tables captured at creation.
pub struct Archetype {
    /// Id of this archetype in its world.
    id: ArchetypeId,
    /// Components carried by every row.
    mask: ComponentMask,
    /// Column layout shared by all chunks.
    layout: ArchetypeLayout,
    /// Component index to position in `layout.columns`.
    lookup: Vec<Option<u16>>,
    /// Backing chunks; the last one may be partially used.
    chunks: Vec<Chunk>,
    /// Entity owning each live row. `entities.len()` is the row count.
    entities: Vec<EntityId>,
}

impl Archetype {
    /// Creates an empty archetype for `mask`, taking operation tables from
    /// `registry`. No chunk is allocated until the first row is added.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RowTooLarge`] if one row does not fit in a chunk.
    ///
    /// # Panics
    ///
    /// Panics if the mask names a component unknown to `registry`.
    pub(crate) fn new(
        id: ArchetypeId,
        mask: ComponentMask,
        registry: &ComponentRegistry,
        chunk_size: usize,
    ) -> EcsResult<Self> {
        let layout = ArchetypeLayout::resolve(
            mask.iter().map(|index| (index, *registry.info(index))),
            chunk_size,
        )?;

        let lookup_len = mask.iter().last().map_or(0, |index| index.get() + 1);
        let mut lookup = vec![None; lookup_len];
        for (position, column) in layout.columns.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let position = position as u16;
            lookup[column.component.get()] = Some(position);
        }

        Ok(Self {
            id,
            mask,
            layout,
            lookup,
            chunks: Vec::new(),
            entities: Vec::new(),
        })
    }

    /// Returns the id of this archetype.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Returns the component mask of this archetype.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> &ComponentMask {
        &self.mask
    }

    /// Returns the column layout.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &ArchetypeLayout {
        &self.layout
    }

    /// Returns the number of live rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns how many rows fit in one chunk.
    #[inline]
    #[must_use]
    pub const fn entity_per_chunk(&self) -> usize {
        self.layout.entity_per_chunk
    }

    /// Returns the number of chunks currently backing the archetype.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the number of rows the current chunks can hold.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.layout.entity_per_chunk
    }

    /// Returns the number of live rows in `chunk`.
    #[inline]
    #[must_use]
    pub fn chunk_rows(&self, chunk: usize) -> usize {
        let epc = self.layout.entity_per_chunk;
        self.len().saturating_sub(chunk * epc).min(epc)
    }

    /// Returns the entity owning every live row, in storage order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Returns the entities whose rows live in `chunk`.
    #[must_use]
    pub fn chunk_entities(&self, chunk: usize) -> &[EntityId] {
        let start = (chunk * self.layout.entity_per_chunk).min(self.len());
        &self.entities[start..start + self.chunk_rows(chunk)]
    }

    /// Checks if rows of this archetype carry `component`.
    #[inline]
    #[must_use]
    pub fn has(&self, component: ComponentIndex) -> bool {
        self.mask.contains(component)
    }

    /// Iterates over the components in layout order.
    pub fn components(&self) -> impl Iterator<Item = ComponentIndex> + '_ {
        self.layout.columns.iter().map(|c| c.component)
    }

    /// Returns the byte offset of `component`'s column inside every chunk.
    #[must_use]
    pub fn offset_of(&self, component: ComponentIndex) -> Option<usize> {
        self.column_for(component).map(|c| c.offset)
    }

    // ========================================================================
    // ROW LIFECYCLE
    // ========================================================================

    /// Adds a row owned by `entity`, default-constructing every component.
    ///
    /// Allocates a chunk first if the current ones are full. Returns the new
    /// row index, which equals the previous row count.
    ///
    /// # Errors
    ///
    /// Returns an allocation error if a needed chunk cannot be obtained; the
    /// archetype is unchanged in that case.
    pub(crate) fn add(&mut self, entity: EntityId, allocator: &mut ChunkAllocator) -> EcsResult<usize> {
        self.reserve_row(allocator)?;

        let row = self.len();
        let (chunk, slot) = self.locate(row);
        for column in &self.layout.columns {
            // SAFETY: `reserve_row` guarantees the slot lies inside a chunk,
            // and rows at or past `len` hold no live value.
            unsafe { column.info.construct(self.slot_ptr(column, chunk, slot)) };
        }

        self.entities.push(entity);
        Ok(row)
    }

    /// Moves row `row` into `target`.
    ///
    /// Components present in both archetypes are move-constructed, components
    /// only in `target` are default-constructed, then the source row is
    /// removed with [`Archetype::remove`].
    ///
    /// # Errors
    ///
    /// Returns an allocation error if `target` needs a chunk that cannot be
    /// obtained; both archetypes are unchanged in that case.
    ///
    /// # Panics
    ///
    /// Panics if `target` is this archetype or `row` is out of range.
    pub(crate) fn move_row(
        &mut self,
        row: usize,
        target: &mut Archetype,
        allocator: &mut ChunkAllocator,
    ) -> EcsResult<RowMove> {
        assert_ne!(self.id, target.id, "cannot move a row into its own archetype");
        assert!(row < self.len(), "row {row} out of range (len {})", self.len());

        target.reserve_row(allocator)?;

        let entity = self.entities[row];
        let target_row = target.len();
        let (src_chunk, src_slot) = self.locate(row);
        let (dst_chunk, dst_slot) = target.locate(target_row);

        for column in &self.layout.columns {
            if let Some(dst_column) = target.column_for(column.component) {
                // SAFETY: the source slot holds a live value, the target slot
                // is reserved and empty, and they live in different chunks.
                unsafe {
                    column.info.move_construct(
                        self.slot_ptr(column, src_chunk, src_slot),
                        target.slot_ptr(dst_column, dst_chunk, dst_slot),
                    );
                }
            }
        }
        for column in &target.layout.columns {
            if !self.mask.contains(column.component) {
                // SAFETY: reserved, empty slot.
                unsafe { column.info.construct(target.slot_ptr(column, dst_chunk, dst_slot)) };
            }
        }
        target.entities.push(entity);

        let displaced = self.remove(row, allocator);
        Ok(RowMove {
            row: target_row,
            displaced,
        })
    }

    /// Removes row `row`, keeping rows dense.
    ///
    /// If `row` is not the last row, the last row is swapped into it first.
    /// The last row is then destructed and the last chunk is returned to the
    /// pool once it holds no row. Returns the entity that now occupies `row`,
    /// if any moved there.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub(crate) fn remove(&mut self, row: usize, allocator: &mut ChunkAllocator) -> Option<EntityId> {
        let len = self.len();
        assert!(row < len, "row {row} out of range (len {len})");

        let last = len - 1;
        if row != last {
            self.swap_rows(row, last);
        }
        // The row stops counting before its values are dropped
        self.entities.swap_remove(row);
        self.destruct_rows(last..len);

        if self.len() % self.layout.entity_per_chunk == 0 {
            if let Some(chunk) = self.chunks.pop() {
                allocator.free(chunk);
            }
        }

        (row != last).then(|| self.entities[row])
    }

    /// Destructs every row and returns all chunks to the pool.
    pub(crate) fn clear(&mut self, allocator: &mut ChunkAllocator) {
        let len = self.len();
        self.entities.clear();
        self.destruct_rows(0..len);

        for chunk in self.chunks.drain(..) {
            allocator.free(chunk);
        }
    }

    // ========================================================================
    // TYPED ACCESS
    // ========================================================================

    /// Gets the `T` value of row `row`.
    ///
    /// Returns `None` if the row is out of range or the archetype does not
    /// carry `component`.
    ///
    /// # Panics
    ///
    /// Panics if `component` is not the index of `T`.
    #[must_use]
    pub fn get<T: Component>(&self, row: usize, component: ComponentIndex) -> Option<&T> {
        if row >= self.len() {
            return None;
        }
        let column = self.typed_column::<T>(component)?;
        let (chunk, slot) = self.locate(row);
        // SAFETY: live row, column type checked.
        Some(unsafe { &*self.slot_ptr(column, chunk, slot).cast::<T>() })
    }

    /// Gets the `T` value of row `row` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `component` is not the index of `T`.
    pub fn get_mut<T: Component>(&mut self, row: usize, component: ComponentIndex) -> Option<&mut T> {
        if row >= self.len() {
            return None;
        }
        let column = self.typed_column::<T>(component)?;
        let (chunk, slot) = self.locate(row);
        // SAFETY: live row, column type checked, `&mut self` is exclusive.
        Some(unsafe { &mut *self.slot_ptr(column, chunk, slot).cast::<T>() })
    }

    /// Returns the live `T` values stored in `chunk` as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `component` is not the index of `T`.
    #[must_use]
    pub fn column<T: Component>(&self, chunk: usize, component: ComponentIndex) -> Option<&[T]> {
        if chunk >= self.chunks.len() {
            return None;
        }
        let column = self.typed_column::<T>(component)?;
        let rows = self.chunk_rows(chunk);
        // SAFETY: the first `rows` slots of the column are live values of T.
        Some(unsafe { std::slice::from_raw_parts(self.slot_ptr(column, chunk, 0).cast::<T>(), rows) })
    }

    /// Returns the live `T` values stored in `chunk` as a mutable slice.
    ///
    /// # Panics
    ///
    /// Panics if `component` is not the index of `T`.
    pub fn column_mut<T: Component>(
        &mut self,
        chunk: usize,
        component: ComponentIndex,
    ) -> Option<&mut [T]> {
        if chunk >= self.chunks.len() {
            return None;
        }
        let column = self.typed_column::<T>(component)?;
        let rows = self.chunk_rows(chunk);
        // SAFETY: as in `column`, and `&mut self` is exclusive.
        Some(unsafe {
            std::slice::from_raw_parts_mut(self.slot_ptr(column, chunk, 0).cast::<T>(), rows)
        })
    }

    /// Returns the start of `component`'s column in `chunk`, typed as `T`.
    ///
    /// # Panics
    ///
    /// Panics if the archetype does not carry `component`, if it is not the
    /// index of `T`, or if `chunk` is out of range.
    pub(crate) fn column_ptr<T: Component>(&self, chunk: usize, component: ComponentIndex) -> *mut T {
        assert!(chunk < self.chunks.len(), "chunk {chunk} out of range");
        match self.typed_column::<T>(component) {
            Some(column) => self.slot_ptr(column, chunk, 0).cast::<T>(),
            None => panic!(
                "archetype {:?} has no `{}` column",
                self.id,
                std::any::type_name::<T>()
            ),
        }
    }

    // ========================================================================
    // ITERATION
    // ========================================================================

    /// Calls `f` for every row, in storage order, with mutable references to
    /// the components of `S`.
    ///
    /// `indices` must be the distinct indices of `S`, in tuple order.
    pub(crate) fn for_each_row<S, F>(&mut self, indices: &[ComponentIndex], f: &mut F)
    where
        S: Fetch,
        F: FnMut(EntityId, S::Item<'_>),
    {
        for chunk in 0..self.chunks.len() {
            let columns = S::columns(self, chunk, indices);
            for (slot, &entity) in self.chunk_entities(chunk).iter().enumerate() {
                // SAFETY: `slot` is live, the indices are distinct and
                // `&mut self` keeps every other reference out.
                f(entity, unsafe { S::item(columns, slot) });
            }
        }
    }

    /// Calls `f` once per chunk with the chunk's entities and one mutable
    /// slice per component of `S`.
    ///
    /// `indices` must be the distinct indices of `S`, in tuple order.
    pub(crate) fn for_each_chunk<S, F>(&mut self, indices: &[ComponentIndex], f: &mut F)
    where
        S: Fetch,
        F: FnMut(&[EntityId], S::Slices<'_>),
    {
        for chunk in 0..self.chunks.len() {
            let columns = S::columns(self, chunk, indices);
            let entities = self.chunk_entities(chunk);
            // SAFETY: as in `for_each_row`, over the chunk's live prefix.
            f(entities, unsafe { S::slices(columns, entities.len()) });
        }
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn column_for(&self, component: ComponentIndex) -> Option<&Column> {
        let position = (*self.lookup.get(component.get())?)?;
        Some(&self.layout.columns[position as usize])
    }

    fn typed_column<T: Component>(&self, component: ComponentIndex) -> Option<&Column> {
        let column = self.column_for(component)?;
        assert!(
            column.info.type_id() == TypeId::of::<T>(),
            "component {} holds `{}`, not `{}`",
            component.get(),
            column.info.name(),
            std::any::type_name::<T>()
        );
        Some(column)
    }

    /// Splits a row index into (chunk, slot within chunk).
    #[inline]
    fn locate(&self, row: usize) -> (usize, usize) {
        let epc = self.layout.entity_per_chunk;
        (row / epc, row % epc)
    }

    /// Address of `column`'s value at `slot` of `chunk`.
    #[inline]
    fn slot_ptr(&self, column: &Column, chunk: usize, slot: usize) -> *mut u8 {
        debug_assert!(slot < self.layout.entity_per_chunk);
        let offset = column.offset + slot * column.info.size();
        // SAFETY: `offset` stays within the chunk: the column spans
        // `size * entity_per_chunk` bytes starting at `column.offset`, and
        // all columns together fit in `chunk_size`.
        unsafe { self.chunks[chunk].as_ptr().add(offset) }
    }

    /// Makes sure a chunk exists for row `len`.
    fn reserve_row(&mut self, allocator: &mut ChunkAllocator) -> EcsResult<()> {
        assert_eq!(
            allocator.chunk_size(),
            self.layout.chunk_size,
            "allocator chunk size does not match the archetype layout"
        );
        if self.len() >= self.capacity() {
            self.chunks.push(allocator.allocate()?);
        }
        Ok(())
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        let (a_chunk, a_slot) = self.locate(a);
        let (b_chunk, b_slot) = self.locate(b);
        for column in &self.layout.columns {
            // SAFETY: both rows are live and distinct.
            unsafe {
                column.info.swap(
                    self.slot_ptr(column, a_chunk, a_slot),
                    self.slot_ptr(column, b_chunk, b_slot),
                );
            }
        }
    }

    /// Drops every value of `rows`.
    ///
    /// Callers remove the rows from `entities` first. If a destructor
    /// panics, the values after it are still dropped while unwinding.
    fn destruct_rows(&self, rows: Range<usize>) {
        struct Unwind<'a> {
            archetype: &'a Archetype,
            row: usize,
            column: usize,
            end: usize,
        }

        impl Drop for Unwind<'_> {
            fn drop(&mut self) {
                // A second panic here aborts, so no value is reached twice
                self.archetype.destruct_columns(self.row, self.column + 1);
                for row in self.row + 1..self.end {
                    self.archetype.destruct_columns(row, 0);
                }
            }
        }

        let mut unwind = Unwind {
            archetype: self,
            row: rows.start,
            column: 0,
            end: rows.end,
        };
        for row in rows {
            unwind.row = row;
            let (chunk, slot) = self.locate(row);
            for (index, column) in self.layout.columns.iter().enumerate() {
                unwind.column = index;
                // SAFETY: the row held live values and no longer counts as
                // live, so each value is dropped exactly once.
                unsafe { column.info.destruct(self.slot_ptr(column, chunk, slot)) };
            }
        }
        std::mem::forget(unwind);
    }

    /// Drops the values of `row` from column position `from` onwards.
    fn destruct_columns(&self, row: usize, from: usize) {
        let (chunk, slot) = self.locate(row);
        for column in &self.layout.columns[from..] {
            // SAFETY: only reached from `destruct_rows`, for values it has
            // not dropped yet.
            unsafe { column.info.destruct(self.slot_ptr(column, chunk, slot)) };
        }
    }
}

impl Drop for Archetype {
    fn drop(&mut self) {
        let len = self.len();
        self.entities.clear();
        self.destruct_rows(0..len);
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("mask", &self.mask)
            .field("len", &self.len())
            .field("chunks", &self.chunks.len())
            .field("entity_per_chunk", &self.layout.entity_per_chunk)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Position, Velocity};
    use std::cell::Cell;
    use std::rc::Rc;

    fn setup(chunk_size: usize) -> (ComponentRegistry, ChunkAllocator) {
        let mut registry = ComponentRegistry::new();
        registry.register::<Position>();
        registry.register::<Velocity>();
        registry.register::<u64>();
        (registry, ChunkAllocator::new(chunk_size).unwrap())
    }

    fn archetype(
        id: usize,
        registry: &ComponentRegistry,
        indices: &[usize],
        chunk_size: usize,
    ) -> Archetype {
        let indices: Vec<ComponentIndex> = indices.iter().map(|&i| ComponentIndex::new(i)).collect();
        Archetype::new(
            ArchetypeId::new(id),
            ComponentMask::from_indices(&indices),
            registry,
            chunk_size,
        )
        .unwrap()
    }

    #[test]
    fn test_layout_capacity() {
        let (registry, _) = setup(4096);
        let table = archetype(0, &registry, &[0, 1], 4096);

        assert_eq!(table.layout().row_size(), 24);
        assert_eq!(table.entity_per_chunk(), 4096 / 24);
        assert_eq!(table.offset_of(ComponentIndex::new(0)), Some(0));
        assert_eq!(table.offset_of(ComponentIndex::new(1)), Some(12 * 170));
    }

    #[test]
    fn test_layout_largest_alignment_first() {
        let (registry, _) = setup(4096);
        let table = archetype(0, &registry, &[0, 2], 4096);

        // u64 (align 8) goes before Position (align 4) despite its higher index
        let order: Vec<usize> = table.components().map(ComponentIndex::get).collect();
        assert_eq!(order, vec![2, 0]);
        assert_eq!(table.offset_of(ComponentIndex::new(2)), Some(0));
        assert_eq!(table.offset_of(ComponentIndex::new(0)), Some(8 * table.entity_per_chunk()));
    }

    #[test]
    fn test_row_too_large() {
        let (registry, _) = setup(64);
        let err = Archetype::new(
            ArchetypeId::new(0),
            ComponentMask::from_indices(&[ComponentIndex::new(0), ComponentIndex::new(1)]),
            &registry,
            16,
        )
        .unwrap_err();
        assert_eq!(
            err,
            EcsError::RowTooLarge {
                row_size: 24,
                chunk_size: 16
            }
        );
    }

    #[test]
    fn test_add_grows_by_chunk() {
        let (registry, mut allocator) = setup(256);
        let mut table = archetype(0, &registry, &[0], 256);
        let epc = table.entity_per_chunk();
        assert_eq!(epc, 256 / 12);

        for i in 0..=epc {
            let row = table.add(EntityId::new(i as u32, 0), &mut allocator).unwrap();
            assert_eq!(row, i);
        }
        assert_eq!(table.len(), epc + 1);
        assert_eq!(table.chunk_count(), 2);
        assert_eq!(table.chunk_rows(0), epc);
        assert_eq!(table.chunk_rows(1), 1);
        assert_eq!(allocator.live(), 2);
    }

    #[test]
    fn test_add_default_constructs() {
        let (registry, mut allocator) = setup(4096);
        let mut table = archetype(0, &registry, &[0, 1], 4096);
        let pos = ComponentIndex::new(0);

        let row = table.add(EntityId::new(0, 0), &mut allocator).unwrap();
        assert_eq!(table.get::<Position>(row, pos), Some(&Position::default()));
    }

    #[test]
    fn test_swap_remove() {
        let (registry, mut allocator) = setup(4096);
        let mut table = archetype(0, &registry, &[0], 4096);
        let pos = ComponentIndex::new(0);

        for i in 0..3u32 {
            let row = table.add(EntityId::new(i, 0), &mut allocator).unwrap();
            *table.get_mut::<Position>(row, pos).unwrap() = Position::new(i as f32, 0.0, 0.0);
        }

        let displaced = table.remove(0, &mut allocator);
        assert_eq!(displaced, Some(EntityId::new(2, 0)));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get::<Position>(0, pos).unwrap().x, 2.0);
        assert_eq!(table.get::<Position>(1, pos).unwrap().x, 1.0);

        // Removing the last row displaces nobody
        assert_eq!(table.remove(1, &mut allocator), None);
        assert_eq!(table.entities(), &[EntityId::new(2, 0)]);
    }

    #[test]
    fn test_remove_frees_last_chunk() {
        let (registry, mut allocator) = setup(256);
        let mut table = archetype(0, &registry, &[0], 256);
        let epc = table.entity_per_chunk();

        for i in 0..=epc {
            table.add(EntityId::new(i as u32, 0), &mut allocator).unwrap();
        }
        assert_eq!(table.chunk_count(), 2);

        table.remove(0, &mut allocator);
        assert_eq!(table.len(), epc);
        assert_eq!(table.chunk_count(), 1);
        assert_eq!(allocator.live(), 1);
        assert_eq!(allocator.pooled(), 1);

        while !table.is_empty() {
            table.remove(0, &mut allocator);
        }
        assert_eq!(table.chunk_count(), 0);
        assert_eq!(allocator.live(), 0);
    }

    #[test]
    fn test_move_row() {
        let (registry, mut allocator) = setup(4096);
        let mut source = archetype(0, &registry, &[0], 4096);
        let mut target = archetype(1, &registry, &[0, 1], 4096);
        let pos = ComponentIndex::new(0);
        let vel = ComponentIndex::new(1);

        for i in 0..2u32 {
            let row = source.add(EntityId::new(i, 0), &mut allocator).unwrap();
            *source.get_mut::<Position>(row, pos).unwrap() = Position::new(1.0 + i as f32, 2.0, 3.0);
        }

        let moved = source.move_row(0, &mut target, &mut allocator).unwrap();
        assert_eq!(moved.row, 0);
        assert_eq!(moved.displaced, Some(EntityId::new(1, 0)));
        assert_eq!(target.entities(), &[EntityId::new(0, 0)]);
        assert_eq!(target.get::<Position>(0, pos), Some(&Position::new(1.0, 2.0, 3.0)));
        assert_eq!(target.get::<Velocity>(0, vel), Some(&Velocity::default()));
        assert_eq!(source.len(), 1);
        assert_eq!(source.get::<Position>(0, pos), Some(&Position::new(2.0, 2.0, 3.0)));
    }

    #[test]
    #[should_panic(expected = "own archetype")]
    fn test_move_into_self_is_rejected() {
        let (registry, mut allocator) = setup(4096);
        let mut a = archetype(0, &registry, &[0], 4096);
        let mut b = archetype(0, &registry, &[0], 4096);
        a.add(EntityId::new(0, 0), &mut allocator).unwrap();
        let _ = a.move_row(0, &mut b, &mut allocator);
    }

    #[test]
    fn test_move_fails_cleanly_on_budget() {
        let (registry, _) = setup(256);
        let mut allocator = ChunkAllocator::with_config(&crate::config::WorldConfig {
            chunk_size: 256,
            chunk_budget: Some(1),
            prewarm_chunks: 0,
        })
        .unwrap();
        let mut source = archetype(0, &registry, &[0], 256);
        let mut target = archetype(1, &registry, &[0, 1], 256);

        source.add(EntityId::new(0, 0), &mut allocator).unwrap();
        let err = source.move_row(0, &mut target, &mut allocator).unwrap_err();
        assert!(err.is_out_of_memory());
        assert_eq!(source.len(), 1);
        assert!(target.is_empty());
    }

    #[test]
    fn test_column_slices() {
        let (registry, mut allocator) = setup(256);
        let mut table = archetype(0, &registry, &[0], 256);
        let pos = ComponentIndex::new(0);
        let epc = table.entity_per_chunk();

        for i in 0..epc + 3 {
            table.add(EntityId::new(i as u32, 0), &mut allocator).unwrap();
        }
        for value in table.column_mut::<Position>(1, pos).unwrap() {
            value.x = 9.0;
        }

        assert_eq!(table.column::<Position>(0, pos).unwrap().len(), epc);
        assert_eq!(table.column::<Position>(1, pos).unwrap().len(), 3);
        assert!(table.column::<Position>(1, pos).unwrap().iter().all(|p| p.x == 9.0));
        assert_eq!(table.chunk_entities(1).len(), 3);
        assert!(table.column::<Position>(2, pos).is_none());
    }

    #[test]
    #[should_panic(expected = "not `")]
    fn test_typed_access_checks_type() {
        let (registry, mut allocator) = setup(4096);
        let mut table = archetype(0, &registry, &[0], 4096);
        table.add(EntityId::new(0, 0), &mut allocator).unwrap();
        let _ = table.get::<Velocity>(0, ComponentIndex::new(0));
    }

    #[derive(Default)]
    struct DropCounter(Option<Rc<Cell<usize>>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            if let Some(counter) = &self.0 {
                counter.set(counter.get() + 1);
            }
        }
    }

    #[test]
    fn test_drops_exactly_once() {
        let mut registry = ComponentRegistry::new();
        let counted = registry.register::<DropCounter>();
        let extra = registry.register::<u32>();
        let mut allocator = ChunkAllocator::new(1024).unwrap();
        let drops = Rc::new(Cell::new(0));

        let mut source = Archetype::new(
            ArchetypeId::new(0),
            ComponentMask::from_indices(&[counted]),
            &registry,
            1024,
        )
        .unwrap();
        let mut target = Archetype::new(
            ArchetypeId::new(1),
            ComponentMask::from_indices(&[counted, extra]),
            &registry,
            1024,
        )
        .unwrap();

        for i in 0..4u32 {
            let row = source.add(EntityId::new(i, 0), &mut allocator).unwrap();
            *source.get_mut::<DropCounter>(row, counted).unwrap() = DropCounter(Some(drops.clone()));
        }

        // Moving must not drop the tracked value
        source.move_row(1, &mut target, &mut allocator).unwrap();
        assert_eq!(drops.get(), 0);

        source.remove(0, &mut allocator);
        assert_eq!(drops.get(), 1);

        target.clear(&mut allocator);
        assert_eq!(drops.get(), 2);

        drop(source);
        assert_eq!(drops.get(), 4);
        assert_eq!(Rc::strong_count(&drops), 1);
    }

    #[test]
    #[should_panic(expected = "does not match the archetype layout")]
    fn test_foreign_allocator_is_rejected() {
        let (registry, _) = setup(4096);
        let mut table = archetype(0, &registry, &[0, 1], 4096);
        let mut small = ChunkAllocator::new(64).unwrap();
        let _ = table.add(EntityId::new(0, 0), &mut small);
    }

    /// Panics the first time an armed value is dropped.
    #[derive(Default)]
    #[repr(align(16))]
    struct Bomb(bool);

    impl Drop for Bomb {
        fn drop(&mut self) {
            if std::mem::take(&mut self.0) {
                panic!("bomb dropped");
            }
        }
    }

    #[test]
    fn test_panicking_drop_does_not_double_drop() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut registry = ComponentRegistry::new();
        let counted = registry.register::<DropCounter>();
        let bomb = registry.register::<Bomb>();
        let mut allocator = ChunkAllocator::new(1024).unwrap();
        let drops = Rc::new(Cell::new(0));

        let mut table = Archetype::new(
            ArchetypeId::new(0),
            ComponentMask::from_indices(&[counted, bomb]),
            &registry,
            1024,
        )
        .unwrap();
        // Bomb has the larger alignment, so its column is dropped first
        assert_eq!(table.components().next(), Some(bomb));

        for i in 0..3u32 {
            let row = table.add(EntityId::new(i, 0), &mut allocator).unwrap();
            *table.get_mut::<DropCounter>(row, counted).unwrap() = DropCounter(Some(drops.clone()));
        }
        table.get_mut::<Bomb>(0, bomb).unwrap().0 = true;

        let result = catch_unwind(AssertUnwindSafe(|| table.clear(&mut allocator)));
        assert!(result.is_err());
        // The rest of the interrupted row and the following rows were dropped
        assert_eq!(drops.get(), 3);
        assert!(table.is_empty());

        drop(table);
        assert_eq!(drops.get(), 3);
        assert_eq!(Rc::strong_count(&drops), 1);
    }

    #[test]
    fn test_panicking_drop_in_remove() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut registry = ComponentRegistry::new();
        let counted = registry.register::<DropCounter>();
        let bomb = registry.register::<Bomb>();
        let mut allocator = ChunkAllocator::new(1024).unwrap();
        let drops = Rc::new(Cell::new(0));

        let mut table = Archetype::new(
            ArchetypeId::new(0),
            ComponentMask::from_indices(&[counted, bomb]),
            &registry,
            1024,
        )
        .unwrap();
        for i in 0..2u32 {
            let row = table.add(EntityId::new(i, 0), &mut allocator).unwrap();
            *table.get_mut::<DropCounter>(row, counted).unwrap() = DropCounter(Some(drops.clone()));
        }
        table.get_mut::<Bomb>(0, bomb).unwrap().0 = true;

        let result = catch_unwind(AssertUnwindSafe(|| table.remove(0, &mut allocator)));
        assert!(result.is_err());
        assert_eq!(drops.get(), 1);
        assert_eq!(table.entities(), &[EntityId::new(1, 0)]);

        drop(table);
        assert_eq!(drops.get(), 2);
    }
}
