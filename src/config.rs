//! Controller configuration components.
//!
//! This module defines the tuning for the locomotion controller, the
//! wall-run controller and the portal gun, plus the collision layer masks
//! the sensors cast against. All values are plain numbers with documented
//! effects; validation is left to the caller.

use bevy::prelude::*;

/// Collision layer bits used by the default [`SensorMasks`].
///
/// Level geometry should put its colliders in the matching memberships
/// (for Rapier: `CollisionGroups::new(Group::from_bits_truncate(layers::WALL), Group::ALL)`).
pub mod layers {
    /// Walkable floors and slopes.
    pub const GROUND: u32 = 1 << 0;
    /// Vertical surfaces the character can run along.
    pub const WALL: u32 = 1 << 1;
    /// Surfaces portals can be fired at (including the portals themselves).
    pub const PORTAL: u32 = 1 << 2;
    /// The character's own body.
    pub const CHARACTER: u32 = 1 << 3;
}

/// Defines the horizontal facing of a character.
///
/// The first-person camera drives `yaw`; movement uses the derived
/// `forward` and `right` axes, which always lie in the world XZ plane.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct CharacterOrientation {
    /// Rotation about world up in radians. Zero faces `-Z`.
    yaw: f32,
}

impl CharacterOrientation {
    /// Create a new orientation facing the given yaw.
    pub fn new(yaw: f32) -> Self {
        Self { yaw }
    }

    /// Create an orientation facing along a world direction.
    ///
    /// The vertical component is ignored. A vertical or zero direction
    /// yields the default orientation.
    pub fn looking_along(direction: Vec3) -> Self {
        let flat = Vec3::new(direction.x, 0.0, direction.z);
        if flat.length_squared() <= f32::EPSILON {
            return Self::default();
        }
        Self {
            yaw: f32::atan2(-flat.x, -flat.z),
        }
    }

    /// Get the yaw angle.
    #[inline]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Set the yaw angle.
    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
    }

    /// Rotation about world up matching this orientation.
    #[inline]
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }

    /// Get the "forward" direction.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    /// Get the "right" direction.
    #[inline]
    pub fn right(&self) -> Vec3 {
        self.rotation() * Vec3::X
    }

    /// Get the "up" direction.
    #[inline]
    pub fn up(&self) -> Vec3 {
        Vec3::Y
    }

    /// Combine axis input into a world-space move direction.
    ///
    /// `forward * vertical + right * horizontal`. The result is deliberately
    /// not renormalized, so diagonal input has a magnitude above one.
    pub fn move_direction(&self, horizontal: f32, vertical: f32) -> Vec3 {
        self.forward() * vertical + self.right() * horizontal
    }
}

/// Layer masks used by the contact sensors and the portal tracer.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct SensorMasks {
    /// Mask for ground probes (grounded, slope, minimum wall-run height).
    pub ground: u32,
    /// Mask for wall probes.
    pub wall: u32,
    /// Mask for portal shots.
    pub portal: u32,
}

impl Default for SensorMasks {
    fn default() -> Self {
        Self {
            ground: layers::GROUND,
            wall: layers::WALL,
            portal: layers::GROUND | layers::WALL | layers::PORTAL,
        }
    }
}

/// Configuration for ground, air and slope locomotion.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct MovementConfig {
    // === Speeds (horizontal caps per state) ===
    /// Speed cap while walking and while airborne.
    pub walk_speed: f32,
    /// Speed cap while sprinting.
    pub sprint_speed: f32,
    /// Speed cap while crouching.
    pub crouch_speed: f32,
    /// Speed cap while wall-running.
    pub wallrun_speed: f32,

    /// Locomotion force = direction * speed * force_multiplier.
    pub force_multiplier: f32,

    // === Drag ===
    /// Linear drag while grounded.
    pub ground_drag: f32,
    /// Linear drag while airborne.
    pub air_drag: f32,

    // === Jumping ===
    /// Upward impulse applied by a jump.
    pub jump_force: f32,
    /// Seconds before another jump is allowed.
    pub jump_cooldown: f32,
    /// Force multiplier applied to the move force while airborne.
    pub air_multiplier: f32,

    // === Crouching ===
    /// Vertical scale of the body while crouched.
    pub crouch_y_scale: f32,
    /// One-time downward impulse applied when the crouch starts.
    pub crouch_impulse: f32,

    // === Ground check ===
    /// Full standing height of the body.
    pub player_height: f32,
    /// Extra probe length beyond half the height.
    pub ground_skin: f32,

    // === Slopes ===
    /// Maximum walkable slope angle (radians).
    pub max_slope_angle: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 7.0,
            sprint_speed: 10.0,
            crouch_speed: 3.5,
            wallrun_speed: 8.5,
            force_multiplier: 10.0,
            ground_drag: 5.0,
            air_drag: 1.0,
            jump_force: 12.0,
            jump_cooldown: 0.25,
            air_multiplier: 0.4,
            crouch_y_scale: 0.5,
            crouch_impulse: 5.0,
            player_height: 2.0,
            ground_skin: 0.3,
            max_slope_angle: 40f32.to_radians(),
        }
    }
}

impl MovementConfig {
    /// Length of the downward ground probe measured from the body centre.
    #[inline]
    pub fn ground_probe_length(&self) -> f32 {
        self.player_height * 0.5 + self.ground_skin
    }

    /// Builder: set the four state speeds.
    pub fn with_speeds(mut self, walk: f32, sprint: f32, crouch: f32, wallrun: f32) -> Self {
        self.walk_speed = walk;
        self.sprint_speed = sprint;
        self.crouch_speed = crouch;
        self.wallrun_speed = wallrun;
        self
    }

    /// Builder: set jump force and cooldown.
    pub fn with_jump(mut self, force: f32, cooldown: f32) -> Self {
        self.jump_force = force;
        self.jump_cooldown = cooldown;
        self
    }

    /// Builder: set ground and air drag.
    pub fn with_drag(mut self, ground: f32, air: f32) -> Self {
        self.ground_drag = ground;
        self.air_drag = air;
        self
    }

    /// Builder: set the air control multiplier.
    pub fn with_air_multiplier(mut self, multiplier: f32) -> Self {
        self.air_multiplier = multiplier;
        self
    }

    /// Builder: set the body height used by the ground probe.
    pub fn with_player_height(mut self, height: f32) -> Self {
        self.player_height = height;
        self
    }

    /// Builder: set the maximum walkable slope angle (radians).
    pub fn with_max_slope_angle(mut self, angle: f32) -> Self {
        self.max_slope_angle = angle;
        self
    }
}

/// Configuration for wall-running and wall-jumping.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct WallRunConfig {
    /// Force along the wall tangent while running.
    pub wall_run_force: f32,
    /// Force pressing the body into the wall while running.
    pub wall_pin_force: f32,
    /// Optional upward force while running. Zero disables it.
    pub gravity_counter_force: f32,

    /// Upward component of the wall-jump impulse.
    pub wall_jump_up_force: f32,
    /// Outward component (along the wall normal) of the wall-jump impulse.
    pub wall_jump_side_force: f32,

    /// Maximum duration of a single wall-run in seconds.
    pub max_wall_run_time: f32,
    /// Grace period after leaving a wall during which no run can start.
    pub exit_wall_time: f32,
    /// Minimum angle (radians) between the last wall and a new wall for an
    /// immediate re-attachment.
    pub reattach_angle_threshold: f32,

    /// Length of the lateral wall probes.
    pub wall_check_distance: f32,
    /// Minimum clearance above ground required to start or keep running.
    pub min_jump_height: f32,

    // === Camera requests ===
    /// Field of view outside of wall-runs.
    pub base_fov: f32,
    /// Field of view while wall-running.
    pub wallrun_fov: f32,
    /// Camera roll in degrees while running (negated for left walls).
    pub wallrun_tilt: f32,
}

impl Default for WallRunConfig {
    fn default() -> Self {
        Self {
            wall_run_force: 200.0,
            wall_pin_force: 100.0,
            gravity_counter_force: 0.0,
            wall_jump_up_force: 7.0,
            wall_jump_side_force: 12.0,
            max_wall_run_time: 0.7,
            exit_wall_time: 0.2,
            reattach_angle_threshold: 15f32.to_radians(),
            wall_check_distance: 0.7,
            min_jump_height: 2.0,
            base_fov: 80.0,
            wallrun_fov: 90.0,
            wallrun_tilt: 5.0,
        }
    }
}

impl WallRunConfig {
    /// Builder: set the maximum wall-run duration.
    pub fn with_max_time(mut self, seconds: f32) -> Self {
        self.max_wall_run_time = seconds;
        self
    }

    /// Builder: set the exit grace duration.
    pub fn with_exit_time(mut self, seconds: f32) -> Self {
        self.exit_wall_time = seconds;
        self
    }

    /// Builder: set the re-attachment angle threshold (radians).
    pub fn with_reattach_threshold(mut self, angle: f32) -> Self {
        self.reattach_angle_threshold = angle;
        self
    }

    /// Builder: set the wall-jump impulse components.
    pub fn with_wall_jump(mut self, up: f32, side: f32) -> Self {
        self.wall_jump_up_force = up;
        self.wall_jump_side_force = side;
        self
    }

    /// Builder: set wall probe length and minimum height.
    pub fn with_detection(mut self, check_distance: f32, min_height: f32) -> Self {
        self.wall_check_distance = check_distance;
        self.min_jump_height = min_height;
        self
    }
}

/// Configuration for the portal gun.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct PortalGunConfig {
    /// Camera the gun fires from. When unset, the character's body and
    /// [`CharacterOrientation`] are used.
    pub camera: Option<Entity>,
    /// Initial travel budget of a fired ray.
    pub max_distance: f32,
    /// How far past an entry portal the continuation ray starts.
    pub pass_through_distance: f32,
    /// Placements closer than this to the other portal are rejected.
    pub min_portal_separation: f32,
}

impl Default for PortalGunConfig {
    fn default() -> Self {
        Self {
            camera: None,
            max_distance: 250.0,
            pass_through_distance: 1.0,
            min_portal_separation: 1.0,
        }
    }
}

impl PortalGunConfig {
    /// Builder: fire from a camera entity.
    pub fn with_camera(mut self, camera: Entity) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Builder: set the travel budget.
    pub fn with_max_distance(mut self, distance: f32) -> Self {
        self.max_distance = distance;
        self
    }
}
