//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::ecs::system::SystemState;
use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::collision::CollisionData;
use crate::movement::MovementController;

/// Rapier3D physics backend for the character controller.
///
/// Forces are accumulated in [`MovementController`] and handed to Rapier's
/// [`ExternalForce`] once per fixed step, so forces added by other systems
/// are never overwritten. Raycasts go through the default Rapier context.
pub struct Rapier3dBackend;

impl CharacterPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn raycast(
        world: &mut World,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude_entity: Option<Entity>,
        layer_mask: u32,
    ) -> Option<CollisionData> {
        let mut state = SystemState::<ReadRapierContext>::new(world);
        let rapier_context = state.get_mut(world);
        let Ok(context) = rapier_context.single() else {
            return None;
        };

        let mut filter = QueryFilter::default()
            .exclude_sensors()
            .groups(CollisionGroups::new(
                Group::ALL,
                Group::from_bits_truncate(layer_mask),
            ));
        if let Some(entity) = exclude_entity {
            filter = filter.exclude_rigid_body(entity);
        }

        context
            .cast_ray_and_get_normal(origin, direction, max_distance, true, filter)
            .map(|(hit_entity, intersection)| {
                CollisionData::new(
                    intersection.time_of_impact,
                    intersection.normal,
                    intersection.point,
                    Some(hit_entity),
                )
            })
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
        } else if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            // Fallback: apply as velocity change if no ExternalImpulse component
            vel.linvel += impulse;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        // Accumulate into MovementController; apply_controller_forces hands it to Rapier.
        if let Some(mut controller) = world.get_mut::<MovementController>(entity) {
            controller.add_force(force);
        }
    }

    fn get_linear_damping(world: &World, entity: Entity) -> f32 {
        world
            .get::<Damping>(entity)
            .map(|d| d.linear_damping)
            .unwrap_or(0.0)
    }

    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32) {
        if let Some(mut d) = world.get_mut::<Damping>(entity) {
            d.linear_damping = damping;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(Damping {
                linear_damping: damping,
                angular_damping: 0.0,
            });
        }
    }

    fn gravity_enabled(world: &World, entity: Entity) -> bool {
        world
            .get::<GravityScale>(entity)
            .map(|g| g.0 != 0.0)
            .unwrap_or(true)
    }

    fn set_gravity_enabled(world: &mut World, entity: Entity, enabled: bool) {
        let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
            return;
        };
        let current = entity_mut.get::<GravityScale>().map_or(1.0, |g| g.0);

        if enabled {
            // Restore whatever scale the body had before it was suspended
            let restored = entity_mut
                .take::<SuspendedGravityScale>()
                .map_or(1.0, |suspended| suspended.0);
            if current == 0.0 {
                entity_mut.insert(GravityScale(restored));
            }
        } else if current != 0.0 {
            entity_mut.insert((SuspendedGravityScale(current), GravityScale(0.0)));
        }
    }

    fn set_rotation_locked(world: &mut World, entity: Entity, locked: bool) {
        let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
            return;
        };
        let mut axes = entity_mut
            .get::<LockedAxes>()
            .copied()
            .unwrap_or_else(LockedAxes::empty);
        axes.set(LockedAxes::ROTATION_LOCKED, locked);
        entity_mut.insert(axes);
    }
}

/// Gravity scale a body had before the controller switched its gravity off.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct SuspendedGravityScale(pub f32);

/// Plugin that sets up Rapier3D-specific systems for the character controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        use crate::ControllerSet;

        app.register_type::<SuspendedGravityScale>();

        // Preparation: remove what we handed to Rapier last step
        app.add_systems(
            FixedUpdate,
            clear_controller_forces.in_set(ControllerSet::Preparation),
        );

        // Final application: hand this step's accumulated forces to Rapier
        app.add_systems(
            FixedUpdate,
            apply_controller_forces.in_set(ControllerSet::FinalApplication),
        );
    }
}

/// Subtract the forces applied last step from [`ExternalForce`].
///
/// This restores `ExternalForce` to the forces added by other systems.
pub fn clear_controller_forces(mut q: Query<(&mut ExternalForce, &mut MovementController)>) {
    for (mut ext_force, mut controller) in &mut q {
        let force_to_subtract = controller.prepare_new_frame();
        ext_force.force -= force_to_subtract;
    }
}

/// Add the forces accumulated this step to [`ExternalForce`].
pub fn apply_controller_forces(mut q: Query<(&mut ExternalForce, &mut MovementController)>) {
    for (mut ext_force, mut controller) in &mut q {
        let force_to_apply = controller.finalize_frame();
        ext_force.force += force_to_apply;
    }
}

/// Bundle for creating a character with Rapier3D physics.
///
/// Provides the rigid body, velocity tracking, external force and impulse
/// components the backend writes to, and locked rotation (the facing is
/// driven by [`CharacterOrientation`](crate::config::CharacterOrientation)).
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use portal_runner::prelude::*;
/// use portal_runner::rapier::Rapier3dCharacterBundle;
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 2.0, 0.0),
///         MovementController::new(),
///         MovementConfig::default(),
///         Rapier3dCharacterBundle::new(),
///         Collider::capsule_y(0.5, 0.5),
///     ));
/// }
/// ```
#[derive(Bundle)]
pub struct Rapier3dCharacterBundle {
    /// The rigid body type. Should typically be [`RigidBody::Dynamic`] for characters.
    pub rigid_body: RigidBody,
    /// Current linear and angular velocity. Updated by Rapier each physics step.
    pub velocity: Velocity,
    /// Forces handed to Rapier by the controller each step.
    pub external_force: ExternalForce,
    /// Impulses for jumps, crouch slams and wall-jumps.
    pub external_impulse: ExternalImpulse,
    /// Rotation is locked so collisions never tip the character over.
    pub locked_axes: LockedAxes,
    /// Linear damping is rewritten every frame from the ground/air drag.
    pub damping: Damping,
    /// World gravity multiplier; zeroed while wall-running.
    pub gravity_scale: GravityScale,
    /// Computed mass properties. Rapier updates this based on the entity's collider.
    pub mass_properties: ReadMassProperties,
}

impl Default for Rapier3dCharacterBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Rapier3dCharacterBundle {
    /// Create a dynamic, rotation-locked character body.
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping {
                linear_damping: 0.0,
                angular_damping: 0.0,
            },
            gravity_scale: GravityScale(1.0),
            mass_properties: ReadMassProperties::default(),
        }
    }

    /// Set the rigid body type for the character.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set which axes should be locked for the rigid body.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}
