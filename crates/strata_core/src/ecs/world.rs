//! # ECS World
//!
//! The central container: component registry, chunk pool, archetypes,
//! entity records and views.
//!
//! Structural changes (`add`, `remove`, `destroy`) move rows between
//! archetypes and keep every entity record pointing at its current row.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;

use super::archetype::{Archetype, ArchetypeId};
use super::bundle::{ComponentSet, Fetch};
use super::component::Component;
use super::entity::{EntityId, EntityLocation, EntityRecords};
use super::mask::ComponentMask;
use super::registry::ComponentRegistry;
use super::view::{View, ViewCache};
use crate::config::WorldConfig;
use crate::error::EcsResult;
use crate::memory::{AllocatorStats, ChunkAllocator};

/// The ECS World - owner of all entities and component storage.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// world.register::<(Position, Velocity)>();
///
/// let entity = world.create();
/// world.add::<(Position, Velocity)>(entity)?;
///
/// let moving = world.make_view::<(Position, Velocity)>();
/// world.for_each(&moving, |_, (pos, vel)| pos.integrate(*vel, 0.016));
/// ```
pub struct World {
    config: WorldConfig,
    registry: ComponentRegistry,
    allocator: ChunkAllocator,

    // =========================================================================
    // Archetypes - permanent, addressed by ArchetypeId
    // =========================================================================
    archetypes: Vec<Archetype>,
    archetype_index: HashMap<ComponentMask, ArchetypeId>,

    records: EntityRecords,

    // =========================================================================
    // Views - append-only, one cache per distinct mask
    // =========================================================================
    views: Vec<ViewCache>,
    view_index: HashMap<ComponentMask, usize>,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        match Self::with_config(WorldConfig::default()) {
            Ok(world) => world,
            Err(e) => unreachable!("default configuration rejected: {e}"),
        }
    }

    /// Creates a world from `config`, prewarming the chunk pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the pool cannot
    /// be prewarmed.
    pub fn with_config(config: WorldConfig) -> EcsResult<Self> {
        let allocator = ChunkAllocator::with_config(&config)?;

        tracing::debug!(
            chunk_size = config.chunk_size,
            chunk_budget = ?config.chunk_budget,
            prewarm_chunks = config.prewarm_chunks,
            "world created"
        );

        Ok(Self {
            config,
            registry: ComponentRegistry::new(),
            allocator,
            archetypes: Vec::new(),
            archetype_index: HashMap::new(),
            records: EntityRecords::new(),
            views: Vec::new(),
            view_index: HashMap::new(),
        })
    }

    /// Registers every component type of `S`, returning the set's mask.
    ///
    /// Registering a known type again is a no-op.
    pub fn register<S: ComponentSet>(&mut self) -> ComponentMask {
        S::register(&mut self.registry)
    }

    /// Creates a new entity without components.
    ///
    /// Ids of destroyed entities are recycled with a new generation.
    pub fn create(&mut self) -> EntityId {
        let id = self.records.allocate();
        tracing::trace!(entity = id.to_bits(), "entity created");
        id
    }

    /// Destroys an entity, dropping its components.
    ///
    /// Returns `false` if the id is dead or stale.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        let Some(location) = self.records.release(id) else {
            return false;
        };

        if let Some(location) = location {
            let archetype = &mut self.archetypes[location.archetype.index()];
            // The last row fills the hole; its record moves before any value drops
            if let Some(&displaced) = archetype.entities().last() {
                if displaced != id {
                    self.records.set_row(displaced, location.row);
                }
            }
            archetype.remove(location.row, &mut self.allocator);
        }
        tracing::trace!(entity = id.to_bits(), "entity destroyed");
        true
    }

    /// Destroys every entity. Archetypes, views and registrations are kept.
    pub fn clear(&mut self) {
        for archetype in &mut self.archetypes {
            archetype.clear(&mut self.allocator);
        }
        self.records.release_all();
    }

    // =========================================================================
    // Structural Changes
    // =========================================================================

    /// Adds the components of `S` to an entity.
    ///
    /// New components are default-constructed; components the entity
    /// already owns keep their values. Adding only owned components is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an allocation or layout error; the entity is unchanged then.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not alive or a type of `S` is unregistered.
    pub fn add<S: ComponentSet>(&mut self, id: EntityId) -> EcsResult<()> {
        let requested = S::mask(&self.registry);
        let current = self.expect_mask(id);
        self.relocate(id, current | requested)
    }

    /// Removes the components of `S` from an entity, dropping them.
    ///
    /// # Errors
    ///
    /// Returns an allocation error; the entity is unchanged then.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not alive, a type of `S` is unregistered, or
    /// the entity does not own every component of `S`.
    pub fn remove<S: ComponentSet>(&mut self, id: EntityId) -> EcsResult<()> {
        let removed = S::mask(&self.registry);
        let current = self.expect_mask(id);
        assert!(
            current.is_superset_of(&removed),
            "entity {id:?} does not own every component of `{}`",
            type_name::<S>()
        );
        self.relocate(id, current ^ removed)
    }

    /// Adds `T` to an entity if missing, then stores `value` in it.
    ///
    /// # Errors
    ///
    /// Returns an allocation or layout error; the entity is unchanged then.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not alive or `T` is unregistered.
    pub fn insert<T: Component>(&mut self, id: EntityId, value: T) -> EcsResult<()> {
        self.add::<(T,)>(id)?;
        *self.component_mut::<T>(id) = value;
        Ok(())
    }

    // =========================================================================
    // Component Access
    // =========================================================================

    /// Gets a component of an entity.
    ///
    /// Returns `None` if the entity is dead or does not own `T`.
    #[must_use]
    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        let index = self.registry.index_of::<T>()?;
        let location = self.records.location(id)??;
        self.archetypes[location.archetype.index()].get::<T>(location.row, index)
    }

    /// Gets a component of an entity mutably.
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        let index = self.registry.index_of::<T>()?;
        let location = self.records.location(id)??;
        self.archetypes[location.archetype.index()].get_mut::<T>(location.row, index)
    }

    /// Gets a component the entity is known to own.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or does not own `T`.
    #[must_use]
    pub fn component<T: Component>(&self, id: EntityId) -> &T {
        match self.get::<T>(id) {
            Some(value) => value,
            None => panic!("entity {id:?} has no `{}` component", type_name::<T>()),
        }
    }

    /// Gets a component the entity is known to own, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or does not own `T`.
    pub fn component_mut<T: Component>(&mut self, id: EntityId) -> &mut T {
        match self.get_mut::<T>(id) {
            Some(value) => value,
            None => panic!("entity {id:?} has no `{}` component", type_name::<T>()),
        }
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Returns a view over every entity owning all components of `S`.
    ///
    /// Views made for the same set share one cache. The view stays current:
    /// archetypes created later are added to it automatically.
    ///
    /// # Panics
    ///
    /// Panics if a type of `S` is unregistered or appears twice.
    pub fn make_view<S: ComponentSet>(&mut self) -> View<S> {
        let mask = ComponentMask::from_indices(&S::unique_indices(&self.registry));

        let slot = if let Some(&slot) = self.view_index.get(&mask) {
            slot
        } else {
            let mut cache = ViewCache::new(mask);
            for archetype in &self.archetypes {
                cache.offer(archetype);
            }
            let slot = self.views.len();
            tracing::debug!(
                view = slot,
                mask = ?mask,
                archetypes = cache.archetypes().len(),
                "view registered"
            );
            self.views.push(cache);
            self.view_index.insert(mask, slot);
            slot
        };

        View::new(slot, mask)
    }

    /// Returns the archetypes matched by a view, in creation order.
    ///
    /// # Panics
    ///
    /// Panics if the view was made by another world.
    #[must_use]
    pub fn view_archetypes<S>(&self, view: &View<S>) -> &[ArchetypeId] {
        self.view_cache(view).archetypes()
    }

    /// Returns the number of entities matched by a view.
    #[must_use]
    pub fn view_len<S>(&self, view: &View<S>) -> usize {
        self.view_archetypes(view)
            .iter()
            .map(|id| self.archetypes[id.index()].len())
            .sum()
    }

    /// Calls `f` for every entity of a view with mutable references to the
    /// components of `S`.
    ///
    /// Archetypes are visited in creation order, rows in storage order.
    pub fn for_each<S, F>(&mut self, view: &View<S>, mut f: F)
    where
        S: Fetch,
        F: FnMut(EntityId, S::Item<'_>),
    {
        let indices = S::unique_indices(&self.registry);
        let cache = Self::cache_in(&self.views, view);
        for id in cache.archetypes() {
            self.archetypes[id.index()].for_each_row::<S, F>(&indices, &mut f);
        }
    }

    /// Calls `f` once per chunk of a view with the chunk's entities and one
    /// mutable slice per component of `S`.
    pub fn for_each_chunk<S, F>(&mut self, view: &View<S>, mut f: F)
    where
        S: Fetch,
        F: FnMut(&[EntityId], S::Slices<'_>),
    {
        let indices = S::unique_indices(&self.registry);
        let cache = Self::cache_in(&self.views, view);
        for id in cache.archetypes() {
            self.archetypes[id.index()].for_each_chunk::<S, F>(&indices, &mut f);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.records.is_alive(id)
    }

    /// Checks if an entity is alive and owns `T`.
    #[must_use]
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        match (self.registry.index_of::<T>(), self.mask(id)) {
            (Some(index), Some(mask)) => mask.contains(index),
            _ => false,
        }
    }

    /// Returns the component mask of an entity, `None` if it is dead.
    #[must_use]
    pub fn mask(&self, id: EntityId) -> Option<ComponentMask> {
        self.records.location(id).map(|location| {
            location.map_or(ComponentMask::EMPTY, |l| {
                *self.archetypes[l.archetype.index()].mask()
            })
        })
    }

    /// Returns where an entity's row lives, `None` if it is dead or has no
    /// component.
    #[must_use]
    pub fn location(&self, id: EntityId) -> Option<EntityLocation> {
        self.records.location(id).flatten()
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.records.alive_count()
    }

    /// Iterates over every live entity, in slot order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.records.iter_alive()
    }

    /// Returns the number of archetypes created so far.
    #[inline]
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Gets an archetype by id.
    #[must_use]
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    /// Returns every archetype in creation order.
    #[must_use]
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// Returns chunk allocator counters.
    #[must_use]
    pub fn allocator_stats(&self) -> AllocatorStats {
        self.allocator.stats()
    }

    /// Returns the configuration the world was built with.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Returns the component registry.
    #[must_use]
    pub const fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn expect_mask(&self, id: EntityId) -> ComponentMask {
        match self.mask(id) {
            Some(mask) => mask,
            None => panic!("entity {id:?} is not alive"),
        }
    }

    fn view_cache<S>(&self, view: &View<S>) -> &ViewCache {
        Self::cache_in(&self.views, view)
    }

    fn cache_in<'v, S>(views: &'v [ViewCache], view: &View<S>) -> &'v ViewCache {
        match views.get(view.slot()) {
            Some(cache) if cache.mask() == view.mask() => cache,
            _ => panic!("view {view:?} does not belong to this world"),
        }
    }

    /// Moves an entity to the archetype for `target`, creating it if needed.
    fn relocate(&mut self, id: EntityId, target: ComponentMask) -> EcsResult<()> {
        let location = self.location(id);
        let current = self.expect_mask(id);
        if target == current {
            return Ok(());
        }

        let target_id = self.archetype_for(target)?;

        match location {
            None => {
                let row = self.archetypes[target_id.index()].add(id, &mut self.allocator)?;
                self.records.set_location(
                    id,
                    EntityLocation {
                        archetype: target_id,
                        row,
                    },
                );
            }
            Some(location) => {
                let (source, destination) = pair_mut(
                    &mut self.archetypes,
                    location.archetype.index(),
                    target_id.index(),
                );
                let moved = source.move_row(location.row, destination, &mut self.allocator)?;
                self.records.set_location(
                    id,
                    EntityLocation {
                        archetype: target_id,
                        row: moved.row,
                    },
                );
                if let Some(displaced) = moved.displaced {
                    self.records.set_row(displaced, location.row);
                }
            }
        }
        Ok(())
    }

    /// Fetches or creates the archetype for `mask`, offering new archetypes
    /// to every view.
    fn archetype_for(&mut self, mask: ComponentMask) -> EcsResult<ArchetypeId> {
        if let Some(&id) = self.archetype_index.get(&mask) {
            return Ok(id);
        }

        let id = ArchetypeId::new(self.archetypes.len());
        let archetype = Archetype::new(id, mask, &self.registry, self.config.chunk_size)?;

        let mut matched = 0;
        for view in &mut self.views {
            if view.offer(&archetype) {
                matched += 1;
            }
        }
        tracing::debug!(
            archetype = id.index(),
            mask = ?mask,
            entity_per_chunk = archetype.entity_per_chunk(),
            views = matched,
            "archetype created"
        );

        self.archetypes.push(archetype);
        self.archetype_index.insert(mask, id);
        Ok(id)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        // Rows go first so every chunk is back in the pool before it is freed
        for archetype in &mut self.archetypes {
            archetype.clear(&mut self.allocator);
        }
        tracing::debug!(stats = ?self.allocator.stats(), "world dropped");
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.records.alive_count())
            .field("archetypes", &self.archetypes.len())
            .field("views", &self.views.len())
            .field("components", &self.registry.len())
            .field("allocator", &self.allocator.stats())
            .finish()
    }
}

/// Borrows two distinct archetypes mutably.
fn pair_mut(archetypes: &mut [Archetype], a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
    assert_ne!(a, b, "cannot move a row into its own archetype");
    if a < b {
        let (left, right) = archetypes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = archetypes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
