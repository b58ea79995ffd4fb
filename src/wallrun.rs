//! Wall-run controller.
//!
//! A secondary state machine layered on the locomotion controller. It decides
//! when a run starts, stops, expires or ends in a wall-jump, and it supplies
//! the wall-parallel propulsion while a run is live.
//!
//! The locomotion state reads [`WallRunController::is_running`] instead of
//! keeping its own flag, so a live session and the `WallRunning` state can
//! never disagree.

use bevy::prelude::*;

use crate::config::WallRunConfig;
use crate::detection::{WallContact, WallSide};

/// Smallest amount a running session's timer drops per frame, so a
/// zero-length frame still counts down.
pub const MIN_WALL_RUN_STEP: f32 = 1e-4;

/// State of an active wall-run.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct WallRunSession {
    /// Seconds left before the run expires.
    pub remaining_time: f32,
    /// Side of the body the wall is on.
    pub side: WallSide,
    /// Normal of the wall being run along.
    pub wall_normal: Vec3,
}

/// Wall-run phase.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub enum WallRunPhase {
    #[default]
    Idle,
    Running(WallRunSession),
    /// Grace period after leaving a wall. Entry is blocked until it elapses.
    Exiting { remaining: f32 },
}

/// Why a wall-run ended without a jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Contact, forward input or height was lost.
    LostContact,
    /// The countdown ran out.
    Expired,
}

/// A phase change reported by [`WallRunController::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WallRunTransition {
    Started(WallRunSession),
    Stopped {
        reason: StopReason,
        session: WallRunSession,
    },
    WallJumped(WallRunSession),
}

impl WallRunTransition {
    /// Whether this transition leaves the `Running` phase.
    pub fn ends_run(&self) -> bool {
        !matches!(self, WallRunTransition::Started(_))
    }
}

/// Per-frame facts the wall-run state machine decides from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WallRunInputs {
    pub contact: WallContact,
    pub grounded: bool,
    /// Forward input axis.
    pub vertical: f32,
    /// Jump was pressed this frame.
    pub jump_pressed: bool,
    /// Frame time in seconds.
    pub dt: f32,
}

/// Wall-run state for one character.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct WallRunController {
    pub phase: WallRunPhase,
    /// Normal of the last wall left, until the character touches ground or
    /// starts a new run.
    pub recently_detached: Option<Vec3>,
}

impl WallRunController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a wall-run session is live.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, WallRunPhase::Running(_))
    }

    /// Whether the exit grace period is active.
    pub fn is_exiting(&self) -> bool {
        matches!(self.phase, WallRunPhase::Exiting { .. })
    }

    /// The live session, if any.
    pub fn session(&self) -> Option<&WallRunSession> {
        match &self.phase {
            WallRunPhase::Running(session) => Some(session),
            _ => None,
        }
    }

    /// Whether `normal` is too close to the wall that was just left.
    pub fn reattach_blocked(&self, normal: Vec3, config: &WallRunConfig) -> bool {
        self.recently_detached
            .is_some_and(|last| last.angle_between(normal) < config.reattach_angle_threshold)
    }

    /// Whether a run may be active this frame, ignoring the exit grace.
    fn conditions_hold(&self, inputs: &WallRunInputs, config: &WallRunConfig) -> bool {
        let Some((_, hit)) = inputs.contact.primary() else {
            return false;
        };
        inputs.vertical > 0.0
            && inputs.contact.above_min_height
            && !self.reattach_blocked(hit.normal, config)
    }

    /// Whether a run would start from `Idle` this frame.
    pub fn can_enter(&self, inputs: &WallRunInputs, config: &WallRunConfig) -> bool {
        !self.is_exiting() && self.conditions_hold(inputs, config)
    }

    /// Advance the state machine by one frame.
    ///
    /// Returns the transition taken, if any. Side effects on the body are left
    /// to the caller.
    pub fn step(
        &mut self,
        config: &WallRunConfig,
        inputs: WallRunInputs,
    ) -> Option<WallRunTransition> {
        if inputs.grounded {
            self.recently_detached = None;
        }

        match self.phase {
            WallRunPhase::Idle => {
                if !self.can_enter(&inputs, config) {
                    return None;
                }
                let (side, hit) = inputs.contact.primary()?;
                let session = WallRunSession {
                    remaining_time: config.max_wall_run_time,
                    side,
                    wall_normal: hit.normal,
                };
                self.recently_detached = None;
                if inputs.jump_pressed {
                    self.detach(&session);
                    self.phase = WallRunPhase::Exiting {
                        remaining: config.exit_wall_time,
                    };
                    return Some(WallRunTransition::WallJumped(session));
                }
                self.phase = WallRunPhase::Running(session);
                Some(WallRunTransition::Started(session))
            }
            WallRunPhase::Running(mut session) => {
                if !self.conditions_hold(&inputs, config) {
                    self.detach(&session);
                    self.phase = WallRunPhase::Idle;
                    return Some(WallRunTransition::Stopped {
                        reason: StopReason::LostContact,
                        session,
                    });
                }

                if let Some((side, hit)) = inputs.contact.primary() {
                    session.side = side;
                    session.wall_normal = hit.normal;
                }

                if inputs.jump_pressed {
                    self.detach(&session);
                    self.phase = WallRunPhase::Exiting {
                        remaining: config.exit_wall_time,
                    };
                    return Some(WallRunTransition::WallJumped(session));
                }

                session.remaining_time =
                    (session.remaining_time - inputs.dt.max(MIN_WALL_RUN_STEP)).max(0.0);
                if session.remaining_time <= 0.0 {
                    self.detach(&session);
                    self.phase = WallRunPhase::Exiting {
                        remaining: config.exit_wall_time,
                    };
                    return Some(WallRunTransition::Stopped {
                        reason: StopReason::Expired,
                        session,
                    });
                }

                self.phase = WallRunPhase::Running(session);
                None
            }
            WallRunPhase::Exiting { remaining } => {
                let remaining = remaining - inputs.dt;
                self.phase = if remaining <= 0.0 {
                    WallRunPhase::Idle
                } else {
                    WallRunPhase::Exiting { remaining }
                };
                None
            }
        }
    }

    fn detach(&mut self, session: &WallRunSession) {
        self.recently_detached = Some(session.wall_normal);
    }
}

/// Direction along the wall closest to the character's forward axis.
pub fn wall_tangent(wall_normal: Vec3, forward: Vec3) -> Vec3 {
    let tangent = wall_normal.cross(Vec3::Y);
    if (forward - tangent).length() > (forward + tangent).length() {
        -tangent
    } else {
        tangent
    }
}

/// Wall-run propulsion for one physics step.
///
/// Pushes along the wall towards `forward`, pins the body to the wall unless
/// the player steers away from it, and adds the optional gravity counter.
pub fn wall_run_force(
    wall_normal: Vec3,
    forward: Vec3,
    steering_away: bool,
    config: &WallRunConfig,
) -> Vec3 {
    let mut force = wall_tangent(wall_normal, forward) * config.wall_run_force;
    if !steering_away {
        force += -wall_normal * config.wall_pin_force;
    }
    force + Vec3::Y * config.gravity_counter_force
}

/// Impulse applied by a wall-jump off a wall with the given normal.
pub fn wall_jump_impulse(wall_normal: Vec3, config: &WallRunConfig) -> Vec3 {
    Vec3::Y * config.wall_jump_up_force + wall_normal * config.wall_jump_side_force
}

/// Camera effects requested by the controller.
///
/// The host camera animates towards the requested values; the controller
/// never waits on it.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum CameraEffectRequest {
    /// Target vertical field of view in degrees.
    FieldOfView { entity: Entity, degrees: f32 },
    /// Target camera roll in degrees.
    Roll { entity: Entity, degrees: f32 },
}
