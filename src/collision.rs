//! Raycast hit data shared by the sensors and the portal tracer.

use bevy::prelude::*;

/// Information about a raycast collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionData {
    /// Distance travelled along the ray to the hit point.
    pub distance: f32,
    /// Normal of the surface at hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity whose collider was hit (if known).
    pub entity: Option<Entity>,
}

impl Default for CollisionData {
    fn default() -> Self {
        Self {
            distance: 0.0,
            normal: Vec3::Y,
            point: Vec3::ZERO,
            entity: None,
        }
    }
}

impl CollisionData {
    /// Create a collision result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }

    /// Angle in radians between world up and the surface normal.
    pub fn angle_from_up(&self) -> f32 {
        let dot = self.normal.normalize_or_zero().dot(Vec3::Y).clamp(-1.0, 1.0);
        dot.acos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_data_new() {
        let hit = CollisionData::new(5.0, Vec3::Y, Vec3::new(10.0, 0.0, 2.0), None);

        assert_eq!(hit.distance, 5.0);
        assert_eq!(hit.normal, Vec3::Y);
        assert_eq!(hit.point, Vec3::new(10.0, 0.0, 2.0));
    }

    #[test]
    fn collision_data_with_entity() {
        let entity = Entity::from_raw(42);
        let hit = CollisionData::new(3.0, Vec3::X, Vec3::ZERO, Some(entity));

        assert_eq!(hit.entity, Some(entity));
    }

    #[test]
    fn angle_from_up_flat_and_tilted() {
        let flat = CollisionData::new(1.0, Vec3::Y, Vec3::ZERO, None);
        assert!(flat.angle_from_up().abs() < 1e-5);

        let wall = CollisionData::new(1.0, Vec3::X, Vec3::ZERO, None);
        assert!((wall.angle_from_up() - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}
