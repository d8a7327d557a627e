//! Orbit camera and its mouse controller.
//!
//! The camera sits on a sphere around the world origin and always looks at
//! it. Its position is given in spherical coordinates: azimuth `theta`
//! (around +Y), polar angle `phi` (down from +Y) and `radius`.
//!
//! # Example
//!
//! ```
//! use shapes_scene::{OrbitCamera, OrbitController};
//!
//! let mut camera = OrbitCamera::default();
//! let controller = OrbitController::default();
//!
//! // A long right-drag towards the top-right zooms out until the limit.
//! for _ in 0..1000 {
//!     controller.zoom(&mut camera, 10.0, -10.0);
//! }
//! assert_eq!(camera.radius, camera.limits.max_radius);
//! ```

use std::f32::consts::PI;

use glam::{Mat4, Vec3};

/// Clamp ranges applied to the orbit parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitLimits {
    pub min_radius: f32,
    pub max_radius: f32,
    /// `phi` is kept inside `[phi_margin, PI - phi_margin]`.
    pub phi_margin: f32,
}

impl Default for OrbitLimits {
    fn default() -> Self {
        Self {
            min_radius: 5.0,
            max_radius: 150.0,
            phi_margin: 0.1,
        }
    }
}

impl OrbitLimits {
    /// Clamps a polar angle strictly inside `(0, PI)`.
    ///
    /// # Panics
    ///
    /// Panics if the margin is not positive, since the look-at basis
    /// degenerates at the poles.
    ///
    /// ```
    /// use shapes_scene::OrbitLimits;
    ///
    /// let limits = OrbitLimits::default();
    /// assert_eq!(limits.clamp_phi(3.3), std::f32::consts::PI - 0.1);
    /// assert_eq!(limits.clamp_phi(-1.0), 0.1);
    /// ```
    pub fn clamp_phi(&self, phi: f32) -> f32 {
        assert!(
            self.phi_margin > 0.0,
            "phi margin must be positive, got {}",
            self.phi_margin
        );
        phi.clamp(self.phi_margin, PI - self.phi_margin)
    }

    /// Clamps a radius into `[min_radius, max_radius]`.
    ///
    /// ```
    /// use shapes_scene::OrbitLimits;
    ///
    /// assert_eq!(OrbitLimits::default().clamp_radius(200.0), 150.0);
    /// ```
    pub fn clamp_radius(&self, radius: f32) -> f32 {
        radius.clamp(self.min_radius, self.max_radius)
    }
}

/// Perspective lens parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lens {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            fov_y: 0.25 * PI,
            near: 1.0,
            far: 1000.0,
        }
    }
}

impl Lens {
    /// Right-handed perspective projection with the Y axis flipped for
    /// Vulkan clip space.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }
}

/// Camera orbiting the world origin.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitCamera {
    /// Azimuth in radians.
    pub theta: f32,
    /// Polar angle in radians, measured from +Y.
    pub phi: f32,
    pub radius: f32,
    pub limits: OrbitLimits,
    pub lens: Lens,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(1.5 * PI, 0.2 * PI, 15.0)
    }
}

impl OrbitCamera {
    /// Creates a camera with default limits and lens.
    pub fn new(theta: f32, phi: f32, radius: f32) -> Self {
        Self {
            theta,
            phi,
            radius,
            limits: OrbitLimits::default(),
            lens: Lens::default(),
        }
    }

    pub fn with_limits(mut self, limits: OrbitLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_lens(mut self, lens: Lens) -> Self {
        self.lens = lens;
        self
    }

    /// `phi` as used for rendering, clamped by the limits.
    pub fn clamped_phi(&self) -> f32 {
        self.limits.clamp_phi(self.phi)
    }

    /// `radius` as used for rendering, clamped by the limits.
    pub fn clamped_radius(&self) -> f32 {
        self.limits.clamp_radius(self.radius)
    }

    /// Eye position in world space.
    ///
    /// ```
    /// use shapes_scene::OrbitCamera;
    ///
    /// let camera = OrbitCamera::new(0.0, std::f32::consts::FRAC_PI_2, 10.0);
    /// let eye = camera.eye_position();
    /// assert!((eye.x - 10.0).abs() < 1e-5);
    /// assert!(eye.y.abs() < 1e-5 && eye.z.abs() < 1e-5);
    /// ```
    pub fn eye_position(&self) -> Vec3 {
        let (phi, r) = (self.clamped_phi(), self.clamped_radius());
        Vec3::new(
            r * phi.sin() * self.theta.cos(),
            r * phi.cos(),
            r * phi.sin() * self.theta.sin(),
        )
    }

    /// Right-handed look-at from the eye to the origin with +Y up.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), Vec3::ZERO, Vec3::Y)
    }

    /// Re-applies the limits to the stored parameters.
    pub fn clamp(&mut self) {
        self.phi = self.clamped_phi();
        self.radius = self.clamped_radius();
    }
}

/// Maps mouse drags onto an [`OrbitCamera`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitController {
    /// Rotation per pixel of left-drag, in radians.
    pub rotate_per_pixel: f32,
    /// Radius change per pixel of right-drag.
    pub zoom_per_pixel: f32,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new(0.25, 0.05)
    }
}

impl OrbitController {
    pub fn new(rotate_degrees_per_pixel: f32, zoom_per_pixel: f32) -> Self {
        Self {
            rotate_per_pixel: rotate_degrees_per_pixel.to_radians(),
            zoom_per_pixel,
        }
    }

    /// Left-drag: horizontal motion spins around the Y axis, vertical motion
    /// tilts towards or away from the poles.
    pub fn rotate(&self, camera: &mut OrbitCamera, dx: f32, dy: f32) {
        camera.theta += dx * self.rotate_per_pixel;
        camera.phi += dy * self.rotate_per_pixel;
        camera.clamp();
    }

    /// Right-drag: moving right or up pulls the camera back.
    pub fn zoom(&self, camera: &mut OrbitCamera, dx: f32, dy: f32) {
        camera.radius += (dx - dy) * self.zoom_per_pixel;
        camera.clamp();
    }
}
