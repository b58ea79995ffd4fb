//! Contact sensing.
//!
//! Short raycasts against static geometry answer the questions the
//! controllers ask every frame: is the body grounded, is it standing on a
//! walkable slope, is there a wall to the left or right, and is it high
//! enough above the floor to wall-run. The probe functions are pure queries;
//! their results are stored in the transient [`GroundContact`] and
//! [`WallContact`] components, which are overwritten every frame.

use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::collision::CollisionData;

/// Non-zero tolerance below which a ground normal counts as flat.
pub const FLAT_GROUND_EPSILON: f32 = 1e-3;

/// Which side of the body a wall was found on.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallSide {
    Left,
    Right,
}

impl WallSide {
    /// Roll sign applied to the camera for this side.
    pub fn roll_sign(self) -> f32 {
        match self {
            WallSide::Left => -1.0,
            WallSide::Right => 1.0,
        }
    }
}

/// Ground probe result.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct GroundContact {
    /// Whether the downward probe hit ground.
    pub grounded: bool,
    /// Normal of the ground under the body, when grounded.
    pub slope_normal: Option<Vec3>,
    /// Angle in radians between world up and `slope_normal`, when grounded.
    pub slope_angle: Option<f32>,
}

impl GroundContact {
    /// Contact result for a probe that found nothing.
    pub fn airborne() -> Self {
        Self::default()
    }

    /// Build a contact from a ground hit.
    pub fn from_hit(hit: &CollisionData) -> Self {
        Self {
            grounded: true,
            slope_normal: Some(hit.normal),
            slope_angle: Some(hit.angle_from_up()),
        }
    }

    /// The slope normal when standing on a walkable, non-flat slope.
    ///
    /// A slope is walkable when its angle is strictly below `max_slope_angle`
    /// and is not flat ground.
    pub fn walkable_slope(&self, max_slope_angle: f32) -> Option<Vec3> {
        if !self.grounded {
            return None;
        }
        match (self.slope_normal, self.slope_angle) {
            (Some(normal), Some(angle))
                if angle < max_slope_angle && angle > FLAT_GROUND_EPSILON =>
            {
                Some(normal)
            }
            _ => None,
        }
    }
}

/// Wall probe result.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct WallContact {
    /// Hit from the probe along `-right`.
    #[reflect(ignore)]
    pub left: Option<CollisionData>,
    /// Hit from the probe along `+right`.
    #[reflect(ignore)]
    pub right: Option<CollisionData>,
    /// Whether the body is above the minimum wall-run height.
    pub above_min_height: bool,
}

impl WallContact {
    /// Check if touching any wall.
    pub fn any(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }

    /// Check if touching the left wall.
    pub fn touching_left(&self) -> bool {
        self.left.is_some()
    }

    /// Check if touching the right wall.
    pub fn touching_right(&self) -> bool {
        self.right.is_some()
    }

    /// The wall to latch onto, preferring the right side when both hit.
    pub fn primary(&self) -> Option<(WallSide, CollisionData)> {
        self.right
            .map(|hit| (WallSide::Right, hit))
            .or_else(|| self.left.map(|hit| (WallSide::Left, hit)))
    }

    /// Whether horizontal input steers away from a wall the body touches.
    pub fn steering_away(&self, horizontal: f32) -> bool {
        (self.touching_left() && horizontal > 0.0) || (self.touching_right() && horizontal < 0.0)
    }
}

/// Cast down from the body centre to find ground.
///
/// `probe_length` is normally [`MovementConfig::ground_probe_length`], which
/// only reaches ground just below the body's feet.
///
/// [`MovementConfig::ground_probe_length`]: crate::config::MovementConfig::ground_probe_length
pub fn probe_ground<B: CharacterPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    position: Vec3,
    probe_length: f32,
    mask: u32,
) -> GroundContact {
    B::raycast(world, position, Vec3::NEG_Y, probe_length, Some(entity), mask)
        .map(|hit| GroundContact::from_hit(&hit))
        .unwrap_or_default()
}

/// Cast along `+right_axis` and `-right_axis` to find walls.
///
/// Returns `(left, right)`. Either, both or neither may hit.
pub fn probe_walls<B: CharacterPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    position: Vec3,
    right_axis: Vec3,
    check_distance: f32,
    mask: u32,
) -> (Option<CollisionData>, Option<CollisionData>) {
    let right = B::raycast(world, position, right_axis, check_distance, Some(entity), mask);
    let left = B::raycast(world, position, -right_axis, check_distance, Some(entity), mask);
    (left, right)
}

/// True iff a downward cast of length `min_height` finds no ground.
pub fn is_above_minimum_height<B: CharacterPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    position: Vec3,
    min_height: f32,
    mask: u32,
) -> bool {
    B::raycast(world, position, Vec3::NEG_Y, min_height, Some(entity), mask).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(normal: Vec3) -> CollisionData {
        CollisionData::new(1.0, normal.normalize(), Vec3::ZERO, None)
    }

    // ==================== GroundContact Tests ====================

    #[test]
    fn airborne_contact_has_no_slope() {
        let contact = GroundContact::airborne();
        assert!(!contact.grounded);
        assert!(contact.slope_normal.is_none());
        assert!(contact.walkable_slope(1.0).is_none());
    }

    #[test]
    fn flat_ground_is_not_a_slope() {
        let contact = GroundContact::from_hit(&hit(Vec3::Y));
        assert!(contact.grounded);
        assert!(contact.slope_angle.unwrap().abs() < 1e-6);
        assert!(contact.walkable_slope(40f32.to_radians()).is_none());
    }

    #[test]
    fn gentle_slope_is_walkable() {
        let normal = Vec3::new(0.0, 1.0, 0.3).normalize();
        let contact = GroundContact::from_hit(&hit(normal));
        let angle = contact.slope_angle.unwrap();
        assert!(angle > 0.2 && angle < 0.4);
        assert_eq!(contact.walkable_slope(40f32.to_radians()), Some(normal));
    }

    #[test]
    fn steep_slope_is_not_walkable() {
        let contact = GroundContact::from_hit(&hit(Vec3::new(0.0, 1.0, 2.0)));
        assert!(contact.grounded);
        assert!(contact.walkable_slope(40f32.to_radians()).is_none());
    }

    // ==================== WallContact Tests ====================

    #[test]
    fn wall_contact_default_no_walls() {
        let contact = WallContact::default();
        assert!(!contact.any());
        assert!(contact.primary().is_none());
    }

    #[test]
    fn primary_prefers_right_wall() {
        let contact = WallContact {
            left: Some(hit(Vec3::X)),
            right: Some(hit(Vec3::NEG_X)),
            above_min_height: true,
        };
        let (side, data) = contact.primary().unwrap();
        assert_eq!(side, WallSide::Right);
        assert_eq!(data.normal, Vec3::NEG_X);

        let left_only = WallContact {
            right: None,
            ..contact
        };
        assert_eq!(left_only.primary().unwrap().0, WallSide::Left);
    }

    #[test]
    fn steering_away_from_walls() {
        let left = WallContact {
            left: Some(hit(Vec3::X)),
            ..default()
        };
        assert!(left.steering_away(1.0));
        assert!(!left.steering_away(-1.0));
        assert!(!left.steering_away(0.0));

        let right = WallContact {
            right: Some(hit(Vec3::NEG_X)),
            ..default()
        };
        assert!(right.steering_away(-0.5));
        assert!(!right.steering_away(0.5));
    }

    #[test]
    fn roll_sign_per_side() {
        assert_eq!(WallSide::Left.roll_sign(), -1.0);
        assert_eq!(WallSide::Right.roll_sign(), 1.0);
    }
}
