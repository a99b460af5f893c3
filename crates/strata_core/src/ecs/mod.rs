//! # Entity Component System
//!
//! Archetype-based storage: every distinct component mask gets one
//! archetype, and each archetype keeps its rows in chunked columns.
//!
//! ## Design Philosophy
//!
//! - Components are registered once and addressed by a dense index
//! - Rows are dense; removal swap-removes and repairs the moved record
//! - Type-specific behavior goes through per-component operation tables
//! - Views cache matching archetypes and are extended as archetypes appear

mod archetype;
mod bundle;
mod component;
mod entity;
mod mask;
mod registry;
mod view;
mod world;

pub use archetype::{Archetype, ArchetypeId, ArchetypeLayout, Column, RowMove};
pub use bundle::{ComponentSet, Fetch};
pub use component::{Component, Position, Velocity};
pub use entity::{EntityId, EntityLocation, EntityRecords};
pub use mask::{ComponentMask, MaskIter, MAX_COMPONENTS};
pub use registry::{ComponentIndex, ComponentInfo, ComponentRegistry};
pub use view::{View, ViewCache};
pub use world::World;
