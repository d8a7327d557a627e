//! Platform abstraction layer for the shapes renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation and the instance extensions it needs
//! - Input handling (keyboard, mouse)

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window};
