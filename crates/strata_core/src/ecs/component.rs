//! # Component System
//!
//! Components are plain data stored in archetype columns.
//! Any `Default + 'static` type qualifies; it only has to be registered with
//! the world before an entity uses it.

use bytemuck::{Pod, Zeroable};

/// Marker trait for storable components.
///
/// Components must be:
/// - `Default`: new rows are default-constructed in place
/// - `'static`: identified by `TypeId` at registration
///
/// Moving and dropping are handled through the operation table built at
/// registration, so components may own heap data (`String`, `Vec<T>`, ...).
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Health(u32);
///
/// world.register::<(Health,)>();
/// ```
pub trait Component: Default + 'static {}

impl<T: Default + 'static> Component for T {}

/// Position component for entities.
///
/// Represents a 3D position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    /// X coordinate in world space.
    pub x: f32,
    /// Y coordinate in world space.
    pub y: f32,
    /// Z coordinate in world space.
    pub z: f32,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Advances the position by `velocity` over `delta_time` seconds.
    #[inline]
    pub fn integrate(&mut self, velocity: Velocity, delta_time: f32) {
        self.x += velocity.x * delta_time;
        self.y += velocity.y * delta_time;
        self.z += velocity.z * delta_time;
    }
}

/// Velocity component for entities.
///
/// Represents movement speed in world units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Velocity {
    /// X velocity component.
    pub x: f32,
    /// Y velocity component.
    pub y: f32,
    /// Z velocity component.
    pub z: f32,
}

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate() {
        let mut pos = Position::new(1.0, 1.0, 1.0);
        pos.integrate(Velocity::new(2.0, 0.0, -2.0), 0.5);
        assert_eq!(pos, Position::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_component_sizes() {
        assert_eq!(std::mem::size_of::<Position>(), 12);
        assert_eq!(std::mem::size_of::<Velocity>(), 12);
        assert_eq!(bytemuck::bytes_of(&Position::new(1.0, 2.0, 3.0)).len(), 12);
    }
}
