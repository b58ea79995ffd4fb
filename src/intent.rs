//! Input snapshot component.
//!
//! The host game resolves devices into logical actions and writes an
//! [`InputSnapshot`] on the character every frame. The controller systems only
//! read it, so keyboard, gamepad, replay or AI input all drive the character
//! the same way.

use bevy::prelude::*;

/// A logical action the controller reacts to.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    Jump,
    Sprint,
    Crouch,
    /// Fires portal slot 0.
    FirePrimary,
    /// Fires portal slot 1.
    FireSecondary,
}

/// Per-frame input for one character.
///
/// # Example
///
/// ```rust
/// use portal_runner::prelude::*;
///
/// let mut input = InputSnapshot::default();
/// input.set_axes(0.0, 1.0);
/// input.press(ControlAction::Sprint);
/// assert!(input.held(ControlAction::Sprint));
/// assert!(input.just_pressed(ControlAction::Sprint));
///
/// // Next frame: edges are cleared, holds remain.
/// input.begin_frame();
/// assert!(input.held(ControlAction::Sprint));
/// assert!(!input.just_pressed(ControlAction::Sprint));
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct InputSnapshot {
    /// Strafe axis (-1.0 = left, 1.0 = right).
    pub horizontal: f32,
    /// Forward axis (-1.0 = back, 1.0 = forward).
    pub vertical: f32,
    /// Held, just-pressed and just-released actions.
    #[reflect(ignore)]
    pub buttons: ButtonInput<ControlAction>,
}

impl InputSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both movement axes, clamped to [-1, 1].
    pub fn set_axes(&mut self, horizontal: f32, vertical: f32) {
        self.horizontal = horizontal.clamp(-1.0, 1.0);
        self.vertical = vertical.clamp(-1.0, 1.0);
    }

    /// Press an action (creates a just-pressed edge if it was not held).
    pub fn press(&mut self, action: ControlAction) {
        self.buttons.press(action);
    }

    /// Release an action (creates a just-released edge if it was held).
    pub fn release(&mut self, action: ControlAction) {
        self.buttons.release(action);
    }

    /// Update an action from a boolean held state.
    pub fn set_held(&mut self, action: ControlAction, held: bool) {
        if held {
            self.press(action);
        } else {
            self.release(action);
        }
    }

    /// Whether the action is held this frame.
    pub fn held(&self, action: ControlAction) -> bool {
        self.buttons.pressed(action)
    }

    /// Whether the action was pressed this frame.
    pub fn just_pressed(&self, action: ControlAction) -> bool {
        self.buttons.just_pressed(action)
    }

    /// Whether the action was released this frame.
    pub fn just_released(&self, action: ControlAction) -> bool {
        self.buttons.just_released(action)
    }

    /// Clear just-pressed/just-released edges, keeping held actions.
    pub fn begin_frame(&mut self) {
        self.buttons.clear();
    }

    /// Whether there is forward input.
    pub fn moving_forward(&self) -> bool {
        self.vertical > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_snapshot_new() {
        let input = InputSnapshot::new();
        assert_eq!(input.horizontal, 0.0);
        assert_eq!(input.vertical, 0.0);
        assert!(!input.held(ControlAction::Jump));
    }

    #[test]
    fn set_axes_clamps() {
        let mut input = InputSnapshot::new();
        input.set_axes(5.0, -5.0);
        assert_eq!(input.horizontal, 1.0);
        assert_eq!(input.vertical, -1.0);
        assert!(!input.moving_forward());

        input.set_axes(0.0, 0.5);
        assert!(input.moving_forward());
    }

    #[test]
    fn press_and_release_edges() {
        let mut input = InputSnapshot::new();
        input.press(ControlAction::Jump);
        assert!(input.just_pressed(ControlAction::Jump));

        input.begin_frame();
        input.press(ControlAction::Jump);
        assert!(input.held(ControlAction::Jump));
        assert!(!input.just_pressed(ControlAction::Jump));

        input.begin_frame();
        input.release(ControlAction::Jump);
        assert!(!input.held(ControlAction::Jump));
        assert!(input.just_released(ControlAction::Jump));
    }

    #[test]
    fn set_held_tracks_state() {
        let mut input = InputSnapshot::new();
        input.set_held(ControlAction::Crouch, true);
        assert!(input.held(ControlAction::Crouch));
        input.set_held(ControlAction::Crouch, false);
        assert!(!input.held(ControlAction::Crouch));
        assert!(input.just_released(ControlAction::Crouch));
    }
}
