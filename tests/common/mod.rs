//! Deterministic in-memory physics backend for integration tests.
//!
//! Bodies keep their velocity and flags in a [`TestBody`] component. Static
//! geometry is a list of boxes and planes in the [`TestScene`] resource.
//! Impulses change velocity immediately; forces are only recorded, so tests
//! can assert on exactly what the controller asked for.

#![allow(dead_code)]

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use portal_runner::backend::CharacterPhysicsBackend;
use portal_runner::prelude::*;

/// Simulated rigid body state.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct TestBody {
    pub mass: f32,
    pub velocity: Vec3,
    pub gravity_enabled: bool,
    pub linear_damping: f32,
    pub rotation_locked: bool,
    /// Forces accumulated during the current physics step.
    pub force: Vec3,
    /// Forces settled on the last physics step.
    pub last_force: Vec3,
}

impl Default for TestBody {
    fn default() -> Self {
        Self {
            mass: 1.0,
            velocity: Vec3::ZERO,
            gravity_enabled: true,
            linear_damping: 0.0,
            rotation_locked: false,
            force: Vec3::ZERO,
            last_force: Vec3::ZERO,
        }
    }
}

impl TestBody {
    pub fn with_velocity(velocity: Vec3) -> Self {
        Self {
            velocity,
            ..default()
        }
    }
}

/// Shape of a static surface.
#[derive(Debug, Clone, Copy)]
pub enum TestShape {
    /// Axis-aligned box.
    Box { min: Vec3, max: Vec3 },
    /// Infinite plane, solid on the side opposite its normal.
    Plane { point: Vec3, normal: Vec3 },
}

#[derive(Debug, Clone, Copy)]
pub struct TestSurface {
    pub entity: Option<Entity>,
    pub shape: TestShape,
    pub layers: u32,
}

/// Static level geometry.
#[derive(Resource, Debug, Clone, Default)]
pub struct TestScene {
    pub surfaces: Vec<TestSurface>,
}

fn ray_box(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_enter = 0.0f32;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < 1e-8 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let (mut t1, mut t2) = ((min[axis] - o) / d, (max[axis] - o) / d);
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_enter {
            t_enter = t1;
            normal = Vec3::ZERO;
            normal[axis] = -d.signum();
        }
        t_exit = t_exit.min(t2);
        if t_enter > t_exit {
            return None;
        }
    }

    // Starting inside the box is not a hit.
    (normal != Vec3::ZERO).then_some((t_enter, normal))
}

fn ray_plane(origin: Vec3, direction: Vec3, point: Vec3, normal: Vec3) -> Option<(f32, Vec3)> {
    let normal = normal.normalize();
    let denom = direction.dot(normal);
    if denom >= -1e-8 {
        return None;
    }
    let t = (point - origin).dot(normal) / denom;
    (t >= 0.0).then_some((t, normal))
}

impl TestScene {
    pub fn add(&mut self, entity: Option<Entity>, shape: TestShape, layers: u32) {
        self.surfaces.push(TestSurface {
            entity,
            shape,
            layers,
        });
    }

    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layer_mask: u32,
    ) -> Option<CollisionData> {
        let direction = direction.normalize_or_zero();
        self.surfaces
            .iter()
            .filter(|surface| surface.layers & layer_mask != 0)
            .filter_map(|surface| {
                let (distance, normal) = match surface.shape {
                    TestShape::Box { min, max } => ray_box(origin, direction, min, max)?,
                    TestShape::Plane { point, normal } => ray_plane(origin, direction, point, normal)?,
                };
                (distance <= max_distance).then(|| {
                    CollisionData::new(distance, normal, origin + direction * distance, surface.entity)
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// Backend over [`TestBody`] and [`TestScene`].
pub struct TestBackend;

impl CharacterPhysicsBackend for TestBackend {
    fn plugin() -> impl Plugin {
        TestBackendPlugin
    }

    fn raycast(
        world: &mut World,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        _exclude_entity: Option<Entity>,
        layer_mask: u32,
    ) -> Option<CollisionData> {
        world
            .get_resource::<TestScene>()?
            .raycast(origin, direction, max_distance, layer_mask)
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<TestBody>(entity)
            .map(|b| b.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.velocity = velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            let mass = body.mass;
            body.velocity += impulse / mass;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.force += force;
        }
    }

    fn get_linear_damping(world: &World, entity: Entity) -> f32 {
        world
            .get::<TestBody>(entity)
            .map(|b| b.linear_damping)
            .unwrap_or(0.0)
    }

    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.linear_damping = damping;
        }
    }

    fn gravity_enabled(world: &World, entity: Entity) -> bool {
        world
            .get::<TestBody>(entity)
            .map(|b| b.gravity_enabled)
            .unwrap_or(true)
    }

    fn set_gravity_enabled(world: &mut World, entity: Entity, enabled: bool) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.gravity_enabled = enabled;
        }
    }

    fn set_rotation_locked(world: &mut World, entity: Entity, locked: bool) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.rotation_locked = locked;
        }
    }
}

pub struct TestBackendPlugin;

impl Plugin for TestBackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TestScene>();
        app.add_systems(
            FixedUpdate,
            settle_forces.in_set(ControllerSet::FinalApplication),
        );
    }
}

fn settle_forces(mut q: Query<&mut TestBody>) {
    for mut body in &mut q {
        body.last_force = std::mem::take(&mut body.force);
    }
}

pub const FRAME: f64 = 1.0 / 60.0;

/// App with the controller plugin on the test backend, stepping 1/60 s per update.
pub fn create_test_app() -> App {
    let mut app = App::new();

    app.add_plugins(MinimalPlugins);
    app.add_plugins(TransformPlugin);
    app.add_plugins(PortalRunnerPlugin::<TestBackend>::default());
    app.insert_resource(Time::<Fixed>::from_hz(60.0));
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(
        FRAME,
    )));

    app.finish();
    app.cleanup();
    // The first update only starts the clock.
    app.update();
    app
}

/// Run one frame.
pub fn tick(app: &mut App) {
    app.update();
}

pub fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        tick(app);
    }
}

/// Add a box surface, returning the entity it belongs to.
pub fn spawn_box(app: &mut App, min: Vec3, max: Vec3, layers: u32) -> Entity {
    let entity = app
        .world_mut()
        .spawn(Transform::from_translation((min + max) * 0.5))
        .id();
    app.world_mut()
        .resource_mut::<TestScene>()
        .add(Some(entity), TestShape::Box { min, max }, layers);
    entity
}

/// Floor whose top face is at y = 0.
pub fn spawn_floor(app: &mut App) -> Entity {
    spawn_box(
        app,
        Vec3::new(-100.0, -1.0, -100.0),
        Vec3::new(100.0, 0.0, 100.0),
        layers::GROUND,
    )
}

/// Character standing on a floor at y = 0 when spawned at `position` with y = 1.
pub fn spawn_character(app: &mut App, position: Vec3) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(position),
            TestBody::default(),
            MovementController::new(),
        ))
        .id()
}

pub fn body(app: &App, entity: Entity) -> &TestBody {
    app.world().get::<TestBody>(entity).expect("test body")
}

pub fn body_mut(app: &mut App, entity: Entity) -> Mut<'_, TestBody> {
    app.world_mut().get_mut::<TestBody>(entity).expect("test body")
}

pub fn input_mut(app: &mut App, entity: Entity) -> Mut<'_, InputSnapshot> {
    app.world_mut()
        .get_mut::<InputSnapshot>(entity)
        .expect("input snapshot")
}

pub fn controller(app: &App, entity: Entity) -> &MovementController {
    app.world()
        .get::<MovementController>(entity)
        .expect("movement controller")
}

pub fn wall_run(app: &App, entity: Entity) -> &WallRunController {
    app.world()
        .get::<WallRunController>(entity)
        .expect("wall-run controller")
}

/// Events of type `E` still buffered in the world.
pub fn drain_events<E: Event + Clone>(app: &mut App) -> Vec<E> {
    app.world_mut()
        .resource_mut::<Events<E>>()
        .drain()
        .collect()
}
