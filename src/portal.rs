//! Portal gun.
//!
//! A fired ray travels until it hits something. If that something is a
//! portal with a placed partner, the ray continues out of the partner and the
//! trace repeats with a smaller budget; otherwise the portal for the fired
//! slot is placed on the surface that was hit.
//!
//! Frame changes between portals go through [`PortalFrame`] so the mapping
//! can be checked in isolation. The trace is written against the
//! [`PortalScene`] trait; [`WorldPortalScene`] answers it from a Bevy world
//! and a physics backend.

use std::f32::consts::PI;
use std::marker::PhantomData;

use bevy::prelude::*;
use thiserror::Error;

use crate::backend::CharacterPhysicsBackend;
use crate::collision::CollisionData;

/// Smallest budget a single portal crossing consumes.
///
/// Bounds the number of crossings of a trace to `budget / MIN_CROSSING_COST`
/// even when the pass-through distance is zero.
pub const MIN_CROSSING_COST: f32 = 0.01;

/// One of the two portals of a pair.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalSlot {
    Primary,
    Secondary,
}

/// Error converting a raw portal id.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalSlotError {
    #[error("invalid portal slot {0}, expected 0 or 1")]
    InvalidSlot(u8),
}

impl PortalSlot {
    /// Numeric id (0 or 1).
    pub fn index(self) -> usize {
        match self {
            PortalSlot::Primary => 0,
            PortalSlot::Secondary => 1,
        }
    }

    /// The paired slot.
    pub fn other(self) -> Self {
        match self {
            PortalSlot::Primary => PortalSlot::Secondary,
            PortalSlot::Secondary => PortalSlot::Primary,
        }
    }
}

impl TryFrom<u8> for PortalSlot {
    type Error = PortalSlotError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(PortalSlot::Primary),
            1 => Ok(PortalSlot::Secondary),
            other => Err(PortalSlotError::InvalidSlot(other)),
        }
    }
}

/// The portal entity of a slot.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct Portal {
    pub slot: PortalSlot,
}

/// Marks colliders that act as portals when hit by a fired ray.
///
/// The collider may sit on the [`Portal`] entity itself or on one of its
/// children.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct PortalSurface;

/// Marks geometry portals cannot be placed on.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct NonPortalSurface;

/// Where a portal sits.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct PortalPlacement {
    /// Entity whose surface the portal is attached to.
    pub surface: Option<Entity>,
    pub position: Vec3,
    pub rotation: Quat,
}

impl PortalPlacement {
    /// The placement as a rigid frame.
    pub fn frame(&self) -> PortalFrame {
        PortalFrame::new(self.position, self.rotation)
    }
}

/// State of one slot of the pair.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub struct PortalSlotState {
    /// Entity moved onto each new placement.
    pub entity: Option<Entity>,
    pub placement: Option<PortalPlacement>,
}

/// Why a placement was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementError {
    #[error("surface does not accept portals")]
    NonPortalSurface,
    #[error("placement overlaps the other portal")]
    OverlapsOtherPortal,
    #[error("cannot place a portal on another portal")]
    SurfaceIsPortal,
}

/// The two portals the gun places.
#[derive(Resource, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Resource)]
pub struct PortalPair {
    slots: [PortalSlotState; 2],
}

impl PortalPair {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the entity that represents `slot` in the scene.
    pub fn bind(&mut self, slot: PortalSlot, entity: Entity) {
        self.slots[slot.index()].entity = Some(entity);
    }

    pub fn slot(&self, slot: PortalSlot) -> &PortalSlotState {
        &self.slots[slot.index()]
    }

    pub fn placement(&self, slot: PortalSlot) -> Option<&PortalPlacement> {
        self.slots[slot.index()].placement.as_ref()
    }

    /// Whether both portals are placed.
    pub fn is_linked(&self) -> bool {
        self.slots.iter().all(|slot| slot.placement.is_some())
    }

    /// Store a placement for `slot`, replacing the previous one.
    ///
    /// Refused when it lands within `min_separation` of the other portal.
    pub fn place(
        &mut self,
        slot: PortalSlot,
        placement: PortalPlacement,
        min_separation: f32,
    ) -> Result<(), PlacementError> {
        if let Some(other) = self.placement(slot.other()) {
            if other.position.distance(placement.position) < min_separation {
                return Err(PlacementError::OverlapsOtherPortal);
            }
        }
        self.slots[slot.index()].placement = Some(placement);
        Ok(())
    }
}

/// Crosshair state: which portals have been placed.
#[derive(Resource, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Resource)]
pub struct PortalIndicators {
    placed: [bool; 2],
}

impl PortalIndicators {
    pub fn set_portal_placed(&mut self, slot: PortalSlot, placed: bool) {
        self.placed[slot.index()] = placed;
    }

    pub fn is_placed(&self, slot: PortalSlot) -> bool {
        self.placed[slot.index()]
    }
}

/// Rigid frame of a portal (no scale).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalFrame {
    pub position: Vec3,
    pub rotation: Quat,
}

impl PortalFrame {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// World-space frame of an entity, ignoring its scale.
    pub fn from_global_transform(transform: &GlobalTransform) -> Self {
        let (_, rotation, translation) = transform.to_scale_rotation_translation();
        Self::new(translation, rotation)
    }

    pub fn to_local_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }

    pub fn from_local_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    pub fn to_local_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation.inverse() * direction
    }

    pub fn from_local_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation * direction
    }
}

/// Half turn about local up applied between entry and exit portals.
fn half_turn() -> Quat {
    Quat::from_rotation_y(PI)
}

/// Map a point and direction entering `entry` to the matching ray leaving `exit`.
pub fn carry_through(
    entry: &PortalFrame,
    exit: &PortalFrame,
    point: Vec3,
    direction: Vec3,
) -> (Vec3, Vec3) {
    let flip = half_turn();
    let local_point = flip * entry.to_local_point(point);
    let local_direction = flip * entry.to_local_direction(direction);
    (
        exit.from_local_point(local_point),
        exit.from_local_direction(local_direction),
    )
}

/// A hit portal and the partner the ray leaves through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalCrossing {
    pub entry: PortalFrame,
    pub exit: PortalFrame,
}

/// What a traced ray struck.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitSurface {
    /// Anything that is not a portal.
    Solid,
    /// A portal. `None` when it has no placed partner.
    Portal(Option<PortalCrossing>),
}

/// Geometry queries the portal trace needs.
pub trait PortalScene {
    /// Cast a ray, returning the closest hit within `max_distance`.
    fn cast(&mut self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData>;

    /// Decide whether a hit continues through a portal.
    fn classify(&mut self, hit: &CollisionData) -> HitSurface;
}

/// Result of a portal trace. `depth` counts the portal crossings taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortalTrace {
    /// The ray landed on a regular surface, travelling along `direction`.
    Surface {
        hit: CollisionData,
        direction: Vec3,
        depth: u32,
    },
    Missed { depth: u32 },
    Unpaired { depth: u32 },
    BudgetExhausted { depth: u32 },
}

impl PortalTrace {
    pub fn depth(&self) -> u32 {
        match *self {
            PortalTrace::Surface { depth, .. }
            | PortalTrace::Missed { depth }
            | PortalTrace::Unpaired { depth }
            | PortalTrace::BudgetExhausted { depth } => depth,
        }
    }
}

/// Follow a ray through any number of portals.
///
/// Each crossing continues from `pass_through` past the entry hit and costs
/// at least [`MIN_CROSSING_COST`] of the budget, so the trace always ends.
pub fn trace_portal_ray<S: PortalScene>(
    scene: &mut S,
    origin: Vec3,
    direction: Vec3,
    budget: f32,
    pass_through: f32,
) -> PortalTrace {
    let mut origin = origin;
    let mut direction = direction.normalize_or_zero();
    let mut remaining = budget;
    let mut depth = 0;

    loop {
        if remaining <= 0.0 {
            return PortalTrace::BudgetExhausted { depth };
        }

        let Some(hit) = scene.cast(origin, direction, remaining) else {
            return PortalTrace::Missed { depth };
        };

        let crossing = match scene.classify(&hit) {
            HitSurface::Solid => {
                return PortalTrace::Surface {
                    hit,
                    direction,
                    depth,
                };
            }
            HitSurface::Portal(None) => return PortalTrace::Unpaired { depth },
            HitSurface::Portal(Some(crossing)) => crossing,
        };

        let (next_origin, next_direction) = carry_through(
            &crossing.entry,
            &crossing.exit,
            hit.point + direction * pass_through,
            direction,
        );
        origin = next_origin;
        direction = next_direction.normalize_or_zero();
        remaining -= (hit.distance + pass_through).max(MIN_CROSSING_COST);
        depth += 1;
    }
}

/// Snap a direction to the closest of ±X and ±Z, preferring X on ties.
pub fn snap_to_cardinal(direction: Vec3) -> Vec3 {
    if direction.x.abs() >= direction.z.abs() {
        if direction.x >= 0.0 {
            Vec3::X
        } else {
            Vec3::NEG_X
        }
    } else if direction.z >= 0.0 {
        Vec3::Z
    } else {
        Vec3::NEG_Z
    }
}

/// Orientation of a new portal on a surface.
///
/// The portal looks into the surface, with its right axis being the camera's
/// right snapped to a world axis.
pub fn placement_rotation(camera_rotation: Quat, surface_normal: Vec3) -> Quat {
    let right = snap_to_cardinal(camera_rotation * Vec3::X);
    let forward = -surface_normal;
    let up = right.cross(forward);
    Transform::IDENTITY.looking_to(forward, up).rotation
}

/// Outcome of one trigger pull.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortalFireOutcome {
    Placed {
        placement: PortalPlacement,
        depth: u32,
    },
    Rejected {
        error: PlacementError,
        depth: u32,
    },
    Missed { depth: u32 },
    Unpaired { depth: u32 },
    BudgetExhausted { depth: u32 },
}

/// Sent for every portal shot.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct PortalFired {
    pub shooter: Entity,
    pub slot: PortalSlot,
    pub outcome: PortalFireOutcome,
}

/// Find `T` on `entity` or its parent.
fn find_on_self_or_parent<T: Component>(world: &World, entity: Entity) -> Option<(Entity, &T)> {
    if let Some(component) = world.get::<T>(entity) {
        return Some((entity, component));
    }
    let parent = world.get::<ChildOf>(entity)?.parent();
    world.get::<T>(parent).map(|component| (parent, component))
}

/// [`PortalScene`] backed by a Bevy world and a physics backend.
pub struct WorldPortalScene<'w, B: CharacterPhysicsBackend> {
    world: &'w mut World,
    shooter: Entity,
    mask: u32,
    _backend: PhantomData<B>,
}

impl<'w, B: CharacterPhysicsBackend> WorldPortalScene<'w, B> {
    pub fn new(world: &'w mut World, shooter: Entity, mask: u32) -> Self {
        Self {
            world,
            shooter,
            mask,
            _backend: PhantomData,
        }
    }
}

impl<B: CharacterPhysicsBackend> PortalScene for WorldPortalScene<'_, B> {
    fn cast(&mut self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData> {
        B::raycast(
            self.world,
            origin,
            direction,
            max_distance,
            Some(self.shooter),
            self.mask,
        )
    }

    fn classify(&mut self, hit: &CollisionData) -> HitSurface {
        let Some(collider) = hit.entity else {
            return HitSurface::Solid;
        };
        if find_on_self_or_parent::<PortalSurface>(self.world, collider).is_none() {
            return HitSurface::Solid;
        }

        let Some((portal_entity, portal)) = find_on_self_or_parent::<Portal>(self.world, collider)
        else {
            warn!("Portal surface {collider:?} has no backing Portal component");
            return HitSurface::Portal(None);
        };

        let Some(exit) = self
            .world
            .get_resource::<PortalPair>()
            .and_then(|pair| pair.placement(portal.slot.other()))
            .map(PortalPlacement::frame)
        else {
            return HitSurface::Portal(None);
        };

        let entry = self
            .world
            .get::<GlobalTransform>(portal_entity)
            .map(PortalFrame::from_global_transform)
            .unwrap_or_else(|| PortalFrame::new(hit.point, Quat::IDENTITY));

        HitSurface::Portal(Some(PortalCrossing { entry, exit }))
    }
}

/// Place the portal of `slot` at a surface hit.
///
/// Updates [`PortalPair`] and moves the slot's bound entity.
pub fn place_portal(
    world: &mut World,
    slot: PortalSlot,
    hit: &CollisionData,
    rotation: Quat,
    min_separation: f32,
) -> Result<PortalPlacement, PlacementError> {
    if let Some(surface) = hit.entity {
        if find_on_self_or_parent::<NonPortalSurface>(world, surface).is_some() {
            return Err(PlacementError::NonPortalSurface);
        }
        if find_on_self_or_parent::<Portal>(world, surface).is_some() {
            return Err(PlacementError::SurfaceIsPortal);
        }
    }

    let placement = PortalPlacement {
        surface: hit.entity,
        position: hit.point,
        rotation,
    };

    let bound = {
        let mut pair = world.get_resource_or_insert_with(PortalPair::default);
        pair.place(slot, placement, min_separation)?;
        pair.slot(slot).entity
    };

    if let Some(entity) = bound {
        move_portal_entity(world, entity, &placement);
    }

    Ok(placement)
}

/// Move a portal entity onto a world-space placement, keeping its scale.
///
/// A parented portal gets the local transform that lands it there. Its
/// [`GlobalTransform`] is updated immediately so later shots in the same
/// frame see the new frame.
fn move_portal_entity(world: &mut World, entity: Entity, placement: &PortalPlacement) {
    let scale = world
        .get::<GlobalTransform>(entity)
        .map_or(Vec3::ONE, |global| global.to_scale_rotation_translation().0);
    let target = GlobalTransform::from(
        Transform::from_translation(placement.position)
            .with_rotation(placement.rotation)
            .with_scale(scale),
    );
    let parent_global = world
        .get::<ChildOf>(entity)
        .and_then(|child_of| world.get::<GlobalTransform>(child_of.parent()))
        .copied();
    let local = match parent_global {
        Some(parent) => target.reparented_to(&parent),
        None => target.compute_transform(),
    };

    if let Some(mut transform) = world.get_mut::<Transform>(entity) {
        transform.translation = local.translation;
        transform.rotation = local.rotation;
    }
    if let Some(mut global) = world.get_mut::<GlobalTransform>(entity) {
        *global = target;
    }
}
