//! Scene description.
//!
//! This crate provides:
//! - The orbit camera and its mouse controller
//! - Placement of shapes in the world
//! - The demo scene layout

pub mod camera;
pub mod layout;
pub mod transform;

pub use camera::{Lens, OrbitCamera, OrbitController, OrbitLimits};
pub use layout::{ShapeInstance, demo_layout};
pub use transform::Placement;
