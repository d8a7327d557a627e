//! Input handling for keyboard and mouse.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

/// Tracks the current state of keyboard and mouse input.
///
/// Mouse motion is accumulated between calls to [`begin_frame`], so a
/// frame that receives several cursor events sees their total movement.
///
/// [`begin_frame`]: InputState::begin_frame
#[derive(Debug, Default)]
pub struct InputState {
    /// Currently pressed keys
    pressed_keys: HashSet<KeyCode>,
    /// Keys that were just pressed this frame
    just_pressed_keys: HashSet<KeyCode>,

    /// Currently pressed mouse buttons
    pressed_buttons: HashSet<MouseButton>,

    /// Last known cursor position, `None` until the first cursor event
    mouse_position: Option<(f32, f32)>,
    /// Cursor movement accumulated since the last `begin_frame`
    mouse_delta: (f32, f32),
}

impl InputState {
    /// Create a new input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the beginning of each frame to clear per-frame state.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    /// Handle a key press event.
    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    /// Handle a key release event.
    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    /// Handle a mouse button press event.
    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        self.pressed_buttons.insert(button);
    }

    /// Handle a mouse button release event.
    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.pressed_buttons.remove(&button);
    }

    /// Handle mouse movement.
    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        if let Some((old_x, old_y)) = self.mouse_position {
            self.mouse_delta.0 += x - old_x;
            self.mouse_delta.1 += y - old_y;
        }
        self.mouse_position = Some((x, y));
    }

    /// Forget all held keys and buttons, e.g. when the window loses focus.
    pub fn reset(&mut self) {
        self.pressed_keys.clear();
        self.just_pressed_keys.clear();
        self.pressed_buttons.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    /// Check if a key is currently pressed.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Check if a key was just pressed this frame.
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    /// Check if a mouse button is currently pressed.
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Get the mouse movement accumulated this frame.
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_cursor_event_has_no_delta() {
        let mut input = InputState::new();
        input.on_mouse_moved(100.0, 50.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_mouse_delta_accumulates_within_frame() {
        let mut input = InputState::new();
        input.on_mouse_moved(0.0, 0.0);
        input.on_mouse_moved(3.0, -1.0);
        input.on_mouse_moved(5.0, 2.0);
        assert_eq!(input.mouse_delta(), (5.0, 2.0));

        input.begin_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
        input.on_mouse_moved(6.0, 2.0);
        assert_eq!(input.mouse_delta(), (1.0, 0.0));
    }

    #[test]
    fn test_key_held_across_frames() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Digit1);
        assert!(input.is_key_just_pressed(KeyCode::Digit1));

        input.begin_frame();
        assert!(input.is_key_pressed(KeyCode::Digit1));
        assert!(!input.is_key_just_pressed(KeyCode::Digit1));

        input.on_key_released(KeyCode::Digit1);
        assert!(!input.is_key_pressed(KeyCode::Digit1));
    }

    #[test]
    fn test_reset_releases_buttons() {
        let mut input = InputState::new();
        input.on_mouse_pressed(MouseButton::Left);
        input.reset();
        assert!(!input.is_mouse_pressed(MouseButton::Left));
    }

    #[test]
    fn test_mouse_button_from_winit() {
        assert_eq!(
            MouseButton::from(winit::event::MouseButton::Right),
            MouseButton::Right
        );
        assert_eq!(
            MouseButton::from(winit::event::MouseButton::Back),
            MouseButton::Other
        );
    }
}
