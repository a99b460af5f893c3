//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - A slot index into the record table
//! - A generation counter for safe reuse
//!
//! The record table maps each live entity to its current
//! `(archetype, row)` location and is rewritten on every relocation.

use super::archetype::ArchetypeId;

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Slot index in the record table
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the raw 64-bit value.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Null/invalid entity ID. Never handed out by a world.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Where an assigned entity's row currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    /// Archetype holding the row.
    pub archetype: ArchetypeId,
    /// Row index inside the archetype.
    pub row: usize,
}

/// One slot of the record table.
#[derive(Clone, Copy, Debug)]
struct Record {
    /// Generation of the entity currently (or last) using this slot.
    generation: u32,
    /// Whether the slot holds a live entity.
    alive: bool,
    /// `None` while the entity has no component.
    location: Option<EntityLocation>,
}

/// Table of entity records, indexed by slot.
///
/// Fresh slots are handed out in increasing order; slots released by
/// [`EntityRecords::release`] are reused with a bumped generation.
#[derive(Debug, Default)]
pub struct EntityRecords {
    /// All slots ever handed out.
    records: Vec<Record>,
    /// Released slot indices, reused LIFO.
    free_indices: Vec<u32>,
    /// Number of live entities.
    alive_count: usize,
}

impl EntityRecords {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Allocates a record for a new, unassigned entity.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` slots would be needed.
    pub fn allocate(&mut self) -> EntityId {
        let id = if let Some(index) = self.free_indices.pop() {
            let record = &mut self.records[index as usize];
            // Increment generation to invalidate old references
            record.generation = record.generation.wrapping_add(1);
            record.alive = true;
            record.location = None;
            EntityId::new(index, record.generation)
        } else {
            let index = u32::try_from(self.records.len())
                .ok()
                .filter(|&i| i != u32::MAX)
                .unwrap_or_else(|| panic!("entity slot space exhausted"));
            self.records.push(Record {
                generation: 0,
                alive: true,
                location: None,
            });
            EntityId::new(index, 0)
        };

        self.alive_count += 1;
        id
    }

    /// Marks the entity's slot free, returning its last location.
    ///
    /// Returns `None` (and does nothing) if the id is dead or stale.
    pub fn release(&mut self, id: EntityId) -> Option<Option<EntityLocation>> {
        let record = self.record_mut(id)?;
        record.alive = false;
        let location = record.location.take();

        self.free_indices.push(id.index());
        self.alive_count -= 1;
        Some(location)
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.record(id).is_some()
    }

    /// Returns the location of a live entity.
    ///
    /// The outer `Option` is `None` for dead or stale ids, the inner one is
    /// `None` for unassigned entities.
    #[inline]
    #[must_use]
    pub fn location(&self, id: EntityId) -> Option<Option<EntityLocation>> {
        self.record(id).map(|record| record.location)
    }

    /// Binds a live entity to a new location.
    ///
    /// # Panics
    ///
    /// Panics if the id is dead or stale.
    pub fn set_location(&mut self, id: EntityId, location: EntityLocation) {
        match self.record_mut(id) {
            Some(record) => record.location = Some(location),
            None => panic!("entity {id:?} is not alive"),
        }
    }

    /// Updates the row of an assigned entity after it was relocated inside
    /// its archetype.
    ///
    /// # Panics
    ///
    /// Panics if the id is dead, stale or unassigned.
    pub fn set_row(&mut self, id: EntityId, row: usize) {
        match self.record_mut(id).and_then(|r| r.location.as_mut()) {
            Some(location) => location.row = row,
            None => panic!("entity {id:?} has no location to update"),
        }
    }

    /// Releases every live entity.
    #[allow(clippy::cast_possible_truncation)]
    pub fn release_all(&mut self) {
        for (index, record) in self.records.iter_mut().enumerate() {
            if record.alive {
                record.alive = false;
                record.location = None;
                self.free_indices.push(index as u32);
            }
        }
        self.alive_count = 0;
    }

    /// Iterates over every live entity id.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.alive)
            .map(|(index, record)| EntityId::new(index as u32, record.generation))
    }

    fn record(&self, id: EntityId) -> Option<&Record> {
        if id.is_null() {
            return None;
        }
        self.records
            .get(id.index() as usize)
            .filter(|record| record.alive && record.generation == id.generation())
    }

    fn record_mut(&mut self, id: EntityId) -> Option<&mut Record> {
        if id.is_null() {
            return None;
        }
        self.records
            .get_mut(id.index() as usize)
            .filter(|record| record.alive && record.generation == id.generation())
    }
}
