//! Movement state.
//!
//! The active [`MovementState`] is re-derived every frame from the sensors and
//! the input snapshot by [`MovementState::resolve`]. The state-to-speed and
//! state-to-regime mappings are plain lookups so they can be tested without a
//! physics world.

use bevy::prelude::*;

use crate::config::MovementConfig;
use crate::detection::GroundContact;

/// The locomotion mode a character is in. Exactly one is active.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MovementState {
    #[default]
    Walking,
    Sprinting,
    Crouching,
    WallRunning,
    Air,
}

/// The flags [`MovementState::resolve`] decides from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateInputs {
    pub wallrunning: bool,
    pub crouch_held: bool,
    pub grounded: bool,
    pub sprint_held: bool,
}

impl MovementState {
    /// Pick the active state. The first matching rule wins:
    /// wall-running, crouch held, grounded sprint, grounded, airborne.
    pub fn resolve(inputs: StateInputs) -> Self {
        if inputs.wallrunning {
            MovementState::WallRunning
        } else if inputs.crouch_held {
            MovementState::Crouching
        } else if inputs.grounded && inputs.sprint_held {
            MovementState::Sprinting
        } else if inputs.grounded {
            MovementState::Walking
        } else {
            MovementState::Air
        }
    }

    /// Horizontal speed cap for this state.
    ///
    /// Airborne characters keep the base walk speed rather than the sprint speed.
    pub fn speed(self, config: &MovementConfig) -> f32 {
        match self {
            MovementState::Walking | MovementState::Air => config.walk_speed,
            MovementState::Sprinting => config.sprint_speed,
            MovementState::Crouching => config.crouch_speed,
            MovementState::WallRunning => config.wallrun_speed,
        }
    }
}

/// Which force rule the physics pass uses this tick. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocomotionRegime {
    /// Grounded on a walkable slope with the given normal.
    Slope { normal: Vec3 },
    /// Grounded on flat or too-steep ground.
    Ground,
    /// Not grounded.
    Air,
}

impl LocomotionRegime {
    /// Choose the regime for the current ground contact.
    pub fn select(ground: &GroundContact, max_slope_angle: f32) -> Self {
        if let Some(normal) = ground.walkable_slope(max_slope_angle) {
            LocomotionRegime::Slope { normal }
        } else if ground.grounded {
            LocomotionRegime::Ground
        } else {
            LocomotionRegime::Air
        }
    }

    /// Whether the horizontal speed must be re-clamped after the push.
    pub fn reclamps(&self) -> bool {
        matches!(self, LocomotionRegime::Air)
    }
}
