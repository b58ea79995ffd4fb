//! Core controller systems.
//!
//! These systems glue the pure controller logic to the ECS. They are
//! exclusive systems generic over the physics backend: each one collects the
//! controllers it needs first, then talks to the backend per entity.

use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::config::{
    CharacterOrientation, MovementConfig, PortalGunConfig, SensorMasks, WallRunConfig,
};
use crate::detection::{
    is_above_minimum_height, probe_ground, probe_walls, GroundContact, WallContact,
};
use crate::intent::{ControlAction, InputSnapshot};
use crate::movement::{
    cancel_downward_velocity, clamp_horizontal_speed, drag_for, locomotion_force,
    move_direction, CrouchChange, MovementController,
};
use crate::portal::{
    place_portal, placement_rotation, trace_portal_ray, PortalFireOutcome, PortalFired,
    PortalIndicators, PortalSlot, PortalTrace, WorldPortalScene,
};
use crate::state::{LocomotionRegime, MovementState, StateInputs};
use crate::wallrun::{
    wall_jump_impulse, wall_run_force, CameraEffectRequest, WallRunController, WallRunInputs,
    WallRunTransition,
};

/// Frame delta of the schedule currently running.
fn frame_delta(world: &World) -> f32 {
    world
        .get_resource::<Time>()
        .map(|t| t.delta_secs())
        .unwrap_or(0.0)
}

/// Refresh [`GroundContact`] and [`WallContact`] for every controller.
pub fn update_contacts<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, MovementConfig, WallRunConfig, SensorMasks, CharacterOrientation)> =
        world
            .query_filtered::<(
                Entity,
                &MovementConfig,
                &WallRunConfig,
                &SensorMasks,
                &CharacterOrientation,
            ), With<MovementController>>()
            .iter(world)
            .map(|(e, movement, wallrun, masks, orientation)| {
                (e, *movement, *wallrun, *masks, *orientation)
            })
            .collect();

    for (entity, movement, wallrun, masks, orientation) in entities {
        let position = B::get_position(world, entity);

        let ground = probe_ground::<B>(
            world,
            entity,
            position,
            movement.ground_probe_length(),
            masks.ground,
        );
        let (left, right) = probe_walls::<B>(
            world,
            entity,
            position,
            orientation.right(),
            wallrun.wall_check_distance,
            masks.wall,
        );
        let above_min_height = is_above_minimum_height::<B>(
            world,
            entity,
            position,
            wallrun.min_jump_height,
            masks.ground,
        );

        if let Some(mut contact) = world.get_mut::<GroundContact>(entity) {
            *contact = ground;
        }
        if let Some(mut contact) = world.get_mut::<WallContact>(entity) {
            *contact = WallContact {
                left,
                right,
                above_min_height,
            };
        }
    }
}

/// Step the wall-run state machine and apply its transitions.
///
/// Every side effect of a transition (velocity, gravity, camera requests)
/// is applied here within the same frame.
pub fn run_wall_run_state_machine<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = frame_delta(world);

    let entities: Vec<(Entity, WallRunConfig, WallRunInputs)> = world
        .query_filtered::<(
            Entity,
            &WallRunConfig,
            &GroundContact,
            &WallContact,
            &InputSnapshot,
        ), With<WallRunController>>()
        .iter(world)
        .map(|(e, config, ground, walls, input)| {
            let inputs = WallRunInputs {
                contact: *walls,
                grounded: ground.grounded,
                vertical: input.vertical,
                jump_pressed: input.just_pressed(ControlAction::Jump),
                dt,
            };
            (e, *config, inputs)
        })
        .collect();

    for (entity, config, inputs) in entities {
        let Some(mut controller) = world.get_mut::<WallRunController>(entity) else {
            continue;
        };
        let Some(transition) = controller.step(&config, inputs) else {
            continue;
        };

        match transition {
            WallRunTransition::Started(session) => {
                debug!(
                    "{entity:?} started wall-run on {:?} wall (normal {:?})",
                    session.side, session.wall_normal
                );
                zero_vertical_velocity::<B>(world, entity);
                B::set_gravity_enabled(world, entity, false);
                world.send_event(CameraEffectRequest::FieldOfView {
                    entity,
                    degrees: config.wallrun_fov,
                });
                world.send_event(CameraEffectRequest::Roll {
                    entity,
                    degrees: session.side.roll_sign() * config.wallrun_tilt,
                });
            }
            WallRunTransition::Stopped { reason, .. } => {
                debug!("{entity:?} stopped wall-run: {reason:?}");
                end_wall_run::<B>(world, entity, &config);
            }
            WallRunTransition::WallJumped(session) => {
                debug!("{entity:?} wall-jumped off {:?}", session.wall_normal);
                end_wall_run::<B>(world, entity, &config);
                zero_vertical_velocity::<B>(world, entity);
                B::apply_impulse(world, entity, wall_jump_impulse(session.wall_normal, &config));
            }
        }
    }
}

fn zero_vertical_velocity<B: CharacterPhysicsBackend>(world: &mut World, entity: Entity) {
    let velocity = B::get_velocity(world, entity);
    B::set_velocity(world, entity, Vec3::new(velocity.x, 0.0, velocity.z));
}

fn end_wall_run<B: CharacterPhysicsBackend>(world: &mut World, entity: Entity, config: &WallRunConfig) {
    B::set_gravity_enabled(world, entity, true);
    world.send_event(CameraEffectRequest::FieldOfView {
        entity,
        degrees: config.base_fov,
    });
    world.send_event(CameraEffectRequest::Roll {
        entity,
        degrees: 0.0,
    });
}

/// Per-frame locomotion pass: jump, speed clamp, crouch, state and drag.
pub fn movement_frame_pass<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = frame_delta(world);

    let entities: Vec<(Entity, MovementController, MovementConfig, GroundContact, InputSnapshot, bool)> =
        world
            .query::<(
                Entity,
                &MovementController,
                &MovementConfig,
                &GroundContact,
                &InputSnapshot,
                &WallRunController,
            )>()
            .iter(world)
            .map(|(e, controller, config, ground, input, wallrun)| {
                (
                    e,
                    controller.clone(),
                    *config,
                    *ground,
                    input.clone(),
                    wallrun.is_running(),
                )
            })
            .collect();

    for (entity, mut controller, config, ground, input, wallrunning) in entities {
        // Jump
        controller.tick_jump_cooldown(dt);
        if controller.can_jump(input.held(ControlAction::Jump), ground.grounded) {
            let velocity = B::get_velocity(world, entity);
            B::set_velocity(world, entity, cancel_downward_velocity(velocity));
            B::apply_impulse(world, entity, Vec3::Y * config.jump_force);
            controller.arm_jump_cooldown(config.jump_cooldown);
        }

        // Speed control uses the state resolved last frame
        let velocity = B::get_velocity(world, entity);
        let clamped = clamp_horizontal_speed(velocity, controller.speed_cap(&config));
        if clamped != velocity {
            B::set_velocity(world, entity, clamped);
        }

        // Crouch
        match controller.update_crouch(input.held(ControlAction::Crouch)) {
            Some(CrouchChange::Enter) => {
                if let Some(mut transform) = world.get_mut::<Transform>(entity) {
                    controller.standing_y_scale.get_or_insert(transform.scale.y);
                    transform.scale.y = config.crouch_y_scale;
                }
                B::apply_impulse(world, entity, Vec3::NEG_Y * config.crouch_impulse);
            }
            Some(CrouchChange::Exit) => {
                if let Some(mut transform) = world.get_mut::<Transform>(entity) {
                    transform.scale.y = controller.standing_y_scale.unwrap_or(1.0);
                }
            }
            None => {}
        }

        let state = MovementState::resolve(StateInputs {
            wallrunning,
            crouch_held: input.held(ControlAction::Crouch),
            grounded: ground.grounded,
            sprint_held: input.held(ControlAction::Sprint),
        });
        if state != controller.state {
            debug!("{entity:?} movement state {:?} -> {state:?}", controller.state);
        }
        controller.state = state;

        B::set_linear_damping(world, entity, drag_for(ground.grounded, &config));

        if let Some(mut stored) = world.get_mut::<MovementController>(entity) {
            stored.state = controller.state;
            stored.jump_ready = controller.jump_ready;
            stored.jump_cooldown_remaining = controller.jump_cooldown_remaining;
            stored.crouching = controller.crouching;
            stored.standing_y_scale = controller.standing_y_scale;
        }
    }
}

/// Accumulate the locomotion force for this physics step.
pub fn apply_locomotion_force<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, MovementState, MovementConfig, GroundContact, CharacterOrientation, InputSnapshot)> =
        world
            .query::<(
                Entity,
                &MovementController,
                &MovementConfig,
                &GroundContact,
                &CharacterOrientation,
                &InputSnapshot,
            )>()
            .iter(world)
            .map(|(e, controller, config, ground, orientation, input)| {
                (e, controller.state, *config, *ground, *orientation, input.clone())
            })
            .collect();

    for (entity, state, config, ground, orientation, input) in entities {
        let regime = LocomotionRegime::select(&ground, config.max_slope_angle);
        let speed = state.speed(&config);
        let force = locomotion_force(regime, move_direction(&orientation, &input), speed, &config);
        B::apply_force(world, entity, force);

        if regime.reclamps() {
            let velocity = B::get_velocity(world, entity);
            let clamped = clamp_horizontal_speed(velocity, speed);
            if clamped != velocity {
                B::set_velocity(world, entity, clamped);
            }
        }
    }
}

/// Accumulate the wall-run propulsion for controllers with a live session.
pub fn apply_wall_run_force<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, Vec3, WallRunConfig, bool, Vec3)> = world
        .query::<(
            Entity,
            &WallRunController,
            &WallRunConfig,
            &WallContact,
            &CharacterOrientation,
            &InputSnapshot,
        )>()
        .iter(world)
        .filter_map(|(e, controller, config, walls, orientation, input)| {
            controller.session().map(|session| {
                (
                    e,
                    session.wall_normal,
                    *config,
                    walls.steering_away(input.horizontal),
                    orientation.forward(),
                )
            })
        })
        .collect();

    for (entity, wall_normal, config, steering_away, forward) in entities {
        if B::gravity_enabled(world, entity) {
            B::set_gravity_enabled(world, entity, false);
        }
        B::apply_force(
            world,
            entity,
            wall_run_force(wall_normal, forward, steering_away, &config),
        );
    }
}

/// Lock the rotation of newly added controllers.
pub fn lock_rotation_on_spawn<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<Entity> = world
        .query_filtered::<Entity, Added<MovementController>>()
        .iter(world)
        .collect();

    for entity in entities {
        B::set_rotation_locked(world, entity, true);
    }
}

/// Where a shot starts and which way the gun faces.
fn aim(world: &World, entity: Entity, gun: &PortalGunConfig) -> (Vec3, Quat) {
    if let Some(camera) = gun.camera {
        if let Some(global) = world.get::<GlobalTransform>(camera) {
            let (_, rotation, translation) = global.to_scale_rotation_translation();
            return (translation, rotation);
        }
        if let Some(transform) = world.get::<Transform>(camera) {
            return (transform.translation, transform.rotation);
        }
    }
    let orientation = world
        .get::<CharacterOrientation>(entity)
        .copied()
        .unwrap_or_default();
    (
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .unwrap_or(Vec3::ZERO),
        orientation.rotation(),
    )
}

/// Handle fire presses: trace the shot and place the portal it lands on.
pub fn fire_portals<B: CharacterPhysicsBackend>(world: &mut World) {
    let shots: Vec<(Entity, PortalSlot, PortalGunConfig, SensorMasks)> = world
        .query::<(Entity, &InputSnapshot, &PortalGunConfig, &SensorMasks)>()
        .iter(world)
        .filter_map(|(e, input, gun, masks)| {
            let slot = if input.just_pressed(ControlAction::FirePrimary) {
                PortalSlot::Primary
            } else if input.just_pressed(ControlAction::FireSecondary) {
                PortalSlot::Secondary
            } else {
                return None;
            };
            Some((e, slot, *gun, *masks))
        })
        .collect();

    for (shooter, slot, gun, masks) in shots {
        let (origin, camera_rotation) = aim(world, shooter, &gun);
        let direction = camera_rotation * Vec3::NEG_Z;

        let trace = {
            let mut scene = WorldPortalScene::<B>::new(world, shooter, masks.portal);
            trace_portal_ray(
                &mut scene,
                origin,
                direction,
                gun.max_distance,
                gun.pass_through_distance,
            )
        };

        let outcome = match trace {
            PortalTrace::Surface { hit, depth, .. } => {
                let rotation = placement_rotation(camera_rotation, hit.normal);
                match place_portal(world, slot, &hit, rotation, gun.min_portal_separation) {
                    Ok(placement) => {
                        world
                            .get_resource_or_insert_with(PortalIndicators::default)
                            .set_portal_placed(slot, true);
                        PortalFireOutcome::Placed { placement, depth }
                    }
                    Err(error) => PortalFireOutcome::Rejected { error, depth },
                }
            }
            PortalTrace::Missed { depth } => PortalFireOutcome::Missed { depth },
            PortalTrace::Unpaired { depth } => PortalFireOutcome::Unpaired { depth },
            PortalTrace::BudgetExhausted { depth } => PortalFireOutcome::BudgetExhausted { depth },
        };

        debug!("{shooter:?} fired {slot:?} portal: {outcome:?}");
        world.send_event(PortalFired {
            shooter,
            slot,
            outcome,
        });
    }
}

/// Clear the just-pressed and just-released edges at the end of the frame.
pub fn clear_input_edges(mut q: Query<&mut InputSnapshot>) {
    for mut input in &mut q {
        input.begin_frame();
    }
}
