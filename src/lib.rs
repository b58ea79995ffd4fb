//! # `portal_runner`
//!
//! A first-person rigidbody character controller with wall-running and a
//! portal gun, built on a physics backend abstraction.
//!
//! This crate provides:
//! - Ground, slope and air locomotion driven by forces, with per-state speed caps
//! - A movement state machine (walking, sprinting, crouching, air, wall-running)
//! - Time-boxed wall-running with wall-jumps and re-attachment suppression
//! - A portal gun whose shots continue through placed portals
//! - A physics backend trait (Rapier3D included)
//!
//! ## Architecture
//!
//! Every rendered frame (`Update`):
//! 1. Sensors cast short rays to refresh [`GroundContact`](detection::GroundContact)
//!    and [`WallContact`](detection::WallContact)
//! 2. The wall-run state machine steps, then the movement frame pass resolves
//!    jump, speed clamp, crouch, state and drag
//! 3. Portal fire presses are traced and placed
//!
//! Every physics step (`FixedUpdate`), the locomotion and wall-run forces are
//! accumulated on the controller and handed to the physics engine.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use portal_runner::prelude::*;
//!
//! // Controller components for a character; the physics bundle comes from the backend
//! let controller = MovementController::new();
//! let config = MovementConfig::default().with_speeds(7.0, 10.0, 3.5, 8.5);
//! let wallrun = WallRunConfig::default().with_max_time(0.7);
//! let mut input = InputSnapshot::default();
//! input.set_axes(0.0, 1.0);
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod collision;
pub mod config;
pub mod detection;
pub mod intent;
pub mod movement;
pub mod portal;
pub mod state;
pub mod systems;
pub mod wallrun;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::CharacterPhysicsBackend;
    pub use crate::collision::CollisionData;
    pub use crate::config::{
        layers, CharacterOrientation, MovementConfig, PortalGunConfig, SensorMasks, WallRunConfig,
    };
    pub use crate::detection::{GroundContact, WallContact, WallSide};
    pub use crate::intent::{ControlAction, InputSnapshot};
    pub use crate::movement::MovementController;
    pub use crate::portal::{
        NonPortalSurface, PlacementError, Portal, PortalFireOutcome, PortalFired,
        PortalIndicators, PortalPair, PortalSlot, PortalSurface,
    };
    pub use crate::state::MovementState;
    pub use crate::wallrun::{CameraEffectRequest, WallRunController, WallRunPhase};
    pub use crate::{ControllerSet, PortalRunnerPlugin};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dCharacterBundle};
}

/// System sets for the controller, in execution order.
///
/// `Sensors`, `StateMachine` and `Portals` run in `Update`;
/// `Preparation`, `Locomotion` and `FinalApplication` run in `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerSet {
    /// Contact probes.
    Sensors,
    /// Wall-run state machine, then the movement frame pass.
    StateMachine,
    /// Portal gun.
    Portals,
    /// Clear forces handed to the physics engine last step.
    Preparation,
    /// Accumulate locomotion and wall-run forces.
    Locomotion,
    /// Hand accumulated forces to the physics engine.
    FinalApplication,
}

/// Main plugin for the controller.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (raycasting, force application, etc.).
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use portal_runner::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(PortalRunnerPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct PortalRunnerPlugin<B: backend::CharacterPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CharacterPhysicsBackend> Default for PortalRunnerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> Plugin for PortalRunnerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::CharacterOrientation>();
        app.register_type::<config::SensorMasks>();
        app.register_type::<config::MovementConfig>();
        app.register_type::<config::WallRunConfig>();
        app.register_type::<config::PortalGunConfig>();
        app.register_type::<intent::InputSnapshot>();
        app.register_type::<detection::GroundContact>();
        app.register_type::<detection::WallContact>();
        app.register_type::<movement::MovementController>();
        app.register_type::<wallrun::WallRunController>();
        app.register_type::<portal::Portal>();
        app.register_type::<portal::PortalSurface>();
        app.register_type::<portal::NonPortalSurface>();
        app.register_type::<portal::PortalPair>();
        app.register_type::<portal::PortalIndicators>();

        app.init_resource::<portal::PortalPair>();
        app.init_resource::<portal::PortalIndicators>();
        app.add_event::<wallrun::CameraEffectRequest>();
        app.add_event::<portal::PortalFired>();

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.configure_sets(
            Update,
            (
                ControllerSet::Sensors,
                ControllerSet::StateMachine,
                ControllerSet::Portals,
            )
                .chain(),
        );
        app.configure_sets(
            FixedUpdate,
            (
                ControllerSet::Preparation,
                ControllerSet::Locomotion,
                ControllerSet::FinalApplication,
            )
                .chain(),
        );

        app.add_systems(
            Update,
            (
                systems::lock_rotation_on_spawn::<B>,
                systems::update_contacts::<B>,
            )
                .chain()
                .in_set(ControllerSet::Sensors),
        );
        app.add_systems(
            Update,
            (
                systems::run_wall_run_state_machine::<B>,
                systems::movement_frame_pass::<B>,
            )
                .chain()
                .in_set(ControllerSet::StateMachine),
        );
        app.add_systems(
            Update,
            systems::fire_portals::<B>.in_set(ControllerSet::Portals),
        );

        app.add_systems(
            FixedUpdate,
            (
                systems::apply_locomotion_force::<B>,
                systems::apply_wall_run_force::<B>,
            )
                .chain()
                .in_set(ControllerSet::Locomotion),
        );

        // Edges only live for the frame they were pressed in
        app.add_systems(Last, systems::clear_input_edges);
    }
}
