//! Locomotion controller.
//!
//! [`MovementController`] is the central per-character state for ground, air
//! and slope movement: the active [`MovementState`], jump arming, crouch and
//! the force accumulator the physics backend drains every step. The math is
//! kept in free functions so it can be checked without a physics world; the
//! systems in [`crate::systems`] glue it to the backend.

use bevy::prelude::*;

use crate::config::{
    CharacterOrientation, MovementConfig, PortalGunConfig, SensorMasks, WallRunConfig,
};
use crate::detection::{GroundContact, WallContact};
use crate::intent::InputSnapshot;
use crate::state::{LocomotionRegime, MovementState};
use crate::wallrun::WallRunController;

/// Core locomotion component.
///
/// Inserting it pulls in the sensor, input and wall-run components with their
/// defaults. Insert a customised [`MovementConfig`] / [`WallRunConfig`] next to
/// it to override the tuning.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
#[require(
    InputSnapshot,
    GroundContact,
    WallContact,
    WallRunController,
    CharacterOrientation,
    SensorMasks,
    MovementConfig,
    WallRunConfig,
    PortalGunConfig
)]
pub struct MovementController {
    /// State resolved on the last frame pass.
    pub state: MovementState,
    /// Whether a jump may start.
    pub jump_ready: bool,
    /// Seconds left until `jump_ready` is restored.
    pub jump_cooldown_remaining: f32,
    /// Whether the body is currently crouched.
    pub crouching: bool,

    /// Vertical scale recorded before the first crouch.
    pub(crate) standing_y_scale: Option<f32>,

    // === Force Accumulation ===
    /// Forces accumulated during the current physics step.
    pub(crate) accumulated_force: Vec3,
    /// Forces handed to the physics engine on the previous step.
    pub(crate) applied_force: Vec3,
}

impl Default for MovementController {
    fn default() -> Self {
        Self {
            state: MovementState::Walking,
            jump_ready: true,
            jump_cooldown_remaining: 0.0,
            crouching: false,
            standing_y_scale: None,
            accumulated_force: Vec3::ZERO,
            applied_force: Vec3::ZERO,
        }
    }
}

/// Crouch transition produced by [`MovementController::update_crouch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrouchChange {
    Enter,
    Exit,
}

impl MovementController {
    /// Create a controller in the walking state with jump ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// Horizontal speed cap of the active state.
    pub fn speed_cap(&self, config: &MovementConfig) -> f32 {
        self.state.speed(config)
    }

    /// Whether a jump may start this frame.
    pub fn can_jump(&self, jump_held: bool, grounded: bool) -> bool {
        jump_held && self.jump_ready && grounded
    }

    /// Consume jump readiness and arm the cooldown.
    pub fn arm_jump_cooldown(&mut self, cooldown: f32) {
        self.jump_ready = false;
        self.jump_cooldown_remaining = cooldown;
    }

    /// Advance the jump cooldown, restoring readiness when it runs out.
    pub fn tick_jump_cooldown(&mut self, dt: f32) {
        if self.jump_ready {
            return;
        }
        self.jump_cooldown_remaining -= dt;
        if self.jump_cooldown_remaining <= 0.0 {
            self.jump_cooldown_remaining = 0.0;
            self.jump_ready = true;
        }
    }

    /// Track the crouch key, reporting when the crouch starts or ends.
    pub fn update_crouch(&mut self, crouch_held: bool) -> Option<CrouchChange> {
        match (crouch_held, self.crouching) {
            (true, false) => {
                self.crouching = true;
                Some(CrouchChange::Enter)
            }
            (false, true) => {
                self.crouching = false;
                Some(CrouchChange::Exit)
            }
            _ => None,
        }
    }

    /// Accumulate a force for this physics step.
    pub fn add_force(&mut self, force: Vec3) {
        self.accumulated_force += force;
    }

    /// Force accumulated so far this step.
    pub fn accumulated_force(&self) -> Vec3 {
        self.accumulated_force
    }

    /// Force handed to the physics engine on the last step.
    pub fn applied_force(&self) -> Vec3 {
        self.applied_force
    }

    /// Start a new step: returns the force applied last step and clears the accumulator.
    pub(crate) fn prepare_new_frame(&mut self) -> Vec3 {
        self.accumulated_force = Vec3::ZERO;
        std::mem::take(&mut self.applied_force)
    }

    /// Finish a step: returns the accumulated force and remembers it as applied.
    pub(crate) fn finalize_frame(&mut self) -> Vec3 {
        let force = std::mem::take(&mut self.accumulated_force);
        self.applied_force = force;
        force
    }
}

/// Rescale the horizontal (XZ) velocity down to `cap`, leaving Y untouched.
pub fn clamp_horizontal_speed(velocity: Vec3, cap: f32) -> Vec3 {
    let flat = Vec3::new(velocity.x, 0.0, velocity.z);
    if flat.length() > cap {
        let limited = flat.normalize_or_zero() * cap.max(0.0);
        Vec3::new(limited.x, velocity.y, limited.z)
    } else {
        velocity
    }
}

/// Velocity just before a jump impulse: downward motion is cancelled.
pub fn cancel_downward_velocity(velocity: Vec3) -> Vec3 {
    if velocity.y < 0.0 {
        Vec3::new(velocity.x, 0.0, velocity.z)
    } else {
        velocity
    }
}

/// Project `vector` onto the plane with the given normal.
pub fn project_on_plane(vector: Vec3, normal: Vec3) -> Vec3 {
    let normal = normal.normalize_or_zero();
    vector - normal * vector.dot(normal)
}

/// Locomotion force for one physics step.
///
/// On slopes the move direction is projected onto the slope plane and
/// normalized; on flat ground and in the air it is used as given, so diagonal
/// input pushes harder until the speed clamp catches it.
pub fn locomotion_force(
    regime: LocomotionRegime,
    move_direction: Vec3,
    speed: f32,
    config: &MovementConfig,
) -> Vec3 {
    let magnitude = speed * config.force_multiplier;
    match regime {
        LocomotionRegime::Slope { normal } => {
            project_on_plane(move_direction, normal).normalize_or_zero() * magnitude
        }
        LocomotionRegime::Ground => move_direction * magnitude,
        LocomotionRegime::Air => move_direction * magnitude * config.air_multiplier,
    }
}

/// Drag for the current ground contact.
pub fn drag_for(grounded: bool, config: &MovementConfig) -> f32 {
    if grounded {
        config.ground_drag
    } else {
        config.air_drag
    }
}

/// World-space move direction for an input snapshot.
pub fn move_direction(orientation: &CharacterOrientation, input: &InputSnapshot) -> Vec3 {
    orientation.move_direction(input.horizontal, input.vertical)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    // ==================== Speed clamp ====================

    #[test]
    fn clamp_rescales_horizontal_only() {
        // 12 units/s horizontal against a cap of 8.
        let velocity = Vec3::new(12.0 * 0.6, -3.0, 12.0 * 0.8);
        let clamped = clamp_horizontal_speed(velocity, 8.0);

        let flat = Vec3::new(clamped.x, 0.0, clamped.z);
        assert!((flat.length() - 8.0).abs() < 1e-4);
        assert!(approx(flat.normalize(), Vec3::new(0.6, 0.0, 0.8)));
        assert_eq!(clamped.y, -3.0);
    }

    #[test]
    fn clamp_leaves_slow_velocity_alone() {
        let velocity = Vec3::new(1.0, 20.0, 1.0);
        assert_eq!(clamp_horizontal_speed(velocity, 8.0), velocity);
    }

    #[test]
    fn clamp_bound_holds_for_many_velocities() {
        for i in 0..64 {
            let angle = i as f32 * 0.37;
            let magnitude = i as f32 * 0.5;
            let velocity = Vec3::new(angle.cos() * magnitude, i as f32 - 30.0, angle.sin() * magnitude);
            let clamped = clamp_horizontal_speed(velocity, 7.0);
            assert!(Vec3::new(clamped.x, 0.0, clamped.z).length() <= 7.0 + 1e-4);
            assert_eq!(clamped.y, velocity.y);
        }
    }

    // ==================== Jump ====================

    #[test]
    fn jump_cooldown_cycle() {
        let mut controller = MovementController::new();
        assert!(controller.can_jump(true, true));
        assert!(!controller.can_jump(true, false));
        assert!(!controller.can_jump(false, true));

        controller.arm_jump_cooldown(0.25);
        assert!(!controller.jump_ready);
        assert!(!controller.can_jump(true, true));

        controller.tick_jump_cooldown(0.1);
        assert!(!controller.jump_ready);
        controller.tick_jump_cooldown(0.1);
        assert!(!controller.jump_ready);
        controller.tick_jump_cooldown(0.1);
        assert!(controller.jump_ready);
        assert_eq!(controller.jump_cooldown_remaining, 0.0);
    }

    #[test]
    fn jump_cancels_only_downward_velocity() {
        assert_eq!(
            cancel_downward_velocity(Vec3::new(1.0, -4.0, 2.0)),
            Vec3::new(1.0, 0.0, 2.0)
        );
        assert_eq!(
            cancel_downward_velocity(Vec3::new(1.0, 3.0, 2.0)),
            Vec3::new(1.0, 3.0, 2.0)
        );
    }

    // ==================== Crouch ====================

    #[test]
    fn crouch_transitions_fire_once() {
        let mut controller = MovementController::new();
        assert_eq!(controller.update_crouch(true), Some(CrouchChange::Enter));
        assert_eq!(controller.update_crouch(true), None);
        assert_eq!(controller.update_crouch(false), Some(CrouchChange::Exit));
        assert_eq!(controller.update_crouch(false), None);
    }

    // ==================== Forces ====================

    #[test]
    fn idle_input_produces_no_force() {
        let config = MovementConfig::default();
        let direction = CharacterOrientation::default().move_direction(0.0, 0.0);
        let force = locomotion_force(LocomotionRegime::Ground, direction, config.walk_speed, &config);
        assert_eq!(force, Vec3::ZERO);
    }

    #[test]
    fn ground_force_is_speed_times_ten() {
        let config = MovementConfig::default();
        let direction = CharacterOrientation::default().move_direction(0.0, 1.0);
        let force = locomotion_force(LocomotionRegime::Ground, direction, 7.0, &config);
        assert!(approx(force, Vec3::new(0.0, 0.0, -70.0)));
    }

    #[test]
    fn diagonal_ground_force_overshoots() {
        let config = MovementConfig::default();
        let direction = CharacterOrientation::default().move_direction(1.0, 1.0);
        let force = locomotion_force(LocomotionRegime::Ground, direction, 7.0, &config);
        assert!(force.length() > 70.0);
    }

    #[test]
    fn air_force_uses_multiplier() {
        let config = MovementConfig::default().with_air_multiplier(0.5);
        let force = locomotion_force(LocomotionRegime::Air, Vec3::X, 8.0, &config);
        assert!(approx(force, Vec3::new(40.0, 0.0, 0.0)));
    }

    #[test]
    fn slope_force_follows_the_surface() {
        let config = MovementConfig::default();
        // Ramp rising towards -Z.
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        let force = locomotion_force(
            LocomotionRegime::Slope { normal },
            Vec3::NEG_Z,
            7.0,
            &config,
        );
        assert!((force.length() - 70.0).abs() < 1e-3);
        assert!(force.dot(normal).abs() < 1e-4);
        assert!(force.y > 0.0);
    }

    #[test]
    fn project_on_plane_removes_normal_component() {
        let projected = project_on_plane(Vec3::new(1.0, 2.0, 3.0), Vec3::Y);
        assert_eq!(projected, Vec3::new(1.0, 0.0, 3.0));
    }

    #[test]
    fn drag_depends_on_ground() {
        let config = MovementConfig::default().with_drag(5.0, 0.5);
        assert_eq!(drag_for(true, &config), 5.0);
        assert_eq!(drag_for(false, &config), 0.5);
    }

    #[test]
    fn force_accumulator_round_trip() {
        let mut controller = MovementController::new();
        controller.add_force(Vec3::X);
        controller.add_force(Vec3::Y);
        assert_eq!(controller.finalize_frame(), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(controller.applied_force(), Vec3::new(1.0, 1.0, 0.0));

        assert_eq!(controller.prepare_new_frame(), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(controller.accumulated_force(), Vec3::ZERO);
        assert_eq!(controller.applied_force(), Vec3::ZERO);
    }
}
