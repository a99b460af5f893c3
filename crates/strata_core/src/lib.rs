//! # STRATA Core
//!
//! Archetype-based entity/component storage:
//! - Entities grouped by their exact set of components
//! - Component values stored column by column in fixed-size chunks
//! - Persistent views that stay current as new archetypes appear
//!
//! ## Architecture Rules
//!
//! 1. **Dense storage** - rows `0..len` of an archetype are always live
//! 2. **Pooled memory** - chunks are recycled, never returned mid-run
//! 3. **Single writer** - every structural change takes `&mut World`
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{World, Position, Velocity};
//!
//! let mut world = World::new();
//! world.register::<(Position, Velocity)>();
//!
//! let entity = world.create();
//! world.insert(entity, Position::new(1.0, 2.0, 3.0))?;
//! world.add::<(Velocity,)>(entity)?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::{WorldConfig, DEFAULT_CHUNK_SIZE};
pub use ecs::{
    Archetype, ArchetypeId, Component, ComponentIndex, ComponentMask, ComponentSet, EntityId,
    EntityLocation, Position, Velocity, View, World,
};
pub use error::{EcsError, EcsResult};
pub use memory::{AllocatorStats, ChunkAllocator, CHUNK_ALIGN};
