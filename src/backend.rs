//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement
//! to work with the controller. The movement, wall-run and portal systems
//! only ever touch the simulated body through this trait, so swapping
//! physics engines (or driving the controller from a deterministic test
//! harness) does not touch the gameplay code.

use bevy::prelude::*;

use crate::collision::CollisionData;

/// Trait for physics backend implementations.
///
/// Implement this trait to integrate a physics engine with the controller.
/// The backend handles raycasting, force application and the handful of
/// rigid-body flags the controller toggles (drag, gravity, rotation lock).
///
/// For an example implementation, see the `rapier` module's
/// `Rapier3dBackend`.
pub trait CharacterPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Cast a ray and return the closest hit.
    ///
    /// # Arguments
    /// * `world` - The ECS world for queries
    /// * `origin` - Ray origin in world space
    /// * `direction` - Cast direction (should be normalized)
    /// * `max_distance` - Maximum cast distance
    /// * `exclude_entity` - Body to ignore (usually the caster itself)
    /// * `layer_mask` - Only colliders whose memberships intersect this mask are hit
    ///
    /// Takes `&mut World` because engines such as Rapier expose their query
    /// pipeline through a system parameter that must be initialised first.
    fn raycast(
        world: &mut World,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude_entity: Option<Entity>,
        layer_mask: u32,
    ) -> Option<CollisionData>;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the linear velocity of an entity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Apply an impulse to an entity.
    ///
    /// Impulse is an instantaneous change in momentum.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3);

    /// Apply a force to an entity.
    ///
    /// Force is applied over the physics timestep.
    fn apply_force(world: &mut World, entity: Entity, force: Vec3);

    /// Get the linear drag coefficient of an entity.
    fn get_linear_damping(world: &World, entity: Entity) -> f32;

    /// Set the linear drag coefficient of an entity.
    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32);

    /// Whether world gravity currently affects the entity.
    fn gravity_enabled(world: &World, entity: Entity) -> bool;

    /// Enable or disable world gravity for the entity.
    fn set_gravity_enabled(world: &mut World, entity: Entity, enabled: bool);

    /// Lock or unlock the rotation of the entity.
    fn set_rotation_locked(world: &mut World, entity: Entity, locked: bool);

    /// Get the current position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }
}
