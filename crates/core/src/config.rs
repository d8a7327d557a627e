//! Application configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the stock scene: a 1280x720 window, three frames in flight and an orbit
//! camera looking at the origin.
//!
//! ```
//! use shapes_core::AppConfig;
//!
//! let config = AppConfig::from_toml_str("[renderer]\nframes_in_flight = 2\n").unwrap();
//! assert_eq!(config.renderer.frames_in_flight, 2);
//! assert_eq!(config.window.width, 1280);
//! ```

use std::f32::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest ring depth accepted by [`AppConfig::validate`].
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is outside its valid range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Shapes".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Depth of the frame slot ring.
    pub frames_in_flight: usize,
    /// Enable the Khronos validation layer.
    pub validation: bool,
    /// Render target clear colour (RGBA).
    pub clear_color: [f32; 4],
    pub vsync: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            validation: cfg!(debug_assertions),
            clear_color: [0.69, 0.77, 0.87, 1.0],
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Initial azimuth in radians.
    pub theta: f32,
    /// Initial polar angle in radians.
    pub phi: f32,
    pub radius: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Keeps phi inside `[margin, PI - margin]`.
    pub phi_margin: f32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub rotate_degrees_per_pixel: f32,
    pub zoom_per_pixel: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            theta: 1.5 * PI,
            phi: 0.2 * PI,
            radius: 15.0,
            min_radius: 5.0,
            max_radius: 150.0,
            phi_margin: 0.1,
            fov_y_degrees: 45.0,
            near: 1.0,
            far: 1000.0,
            rotate_degrees_per_pixel: 0.25,
            zoom_per_pixel: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Spin the shapes flagged as animated in the demo layout.
    pub animate: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self { animate: true }
    }
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
    pub camera: CameraConfig,
    pub scene: SceneConfig,
}

impl AppConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise return the validated defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.window.width == 0 || self.window.height == 0 {
            return invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            ));
        }

        let depth = self.renderer.frames_in_flight;
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&depth) {
            return invalid(format!(
                "renderer.frames_in_flight must be in 1..={MAX_FRAMES_IN_FLIGHT}, got {depth}"
            ));
        }

        let camera = &self.camera;
        if !(camera.min_radius > 0.0 && camera.min_radius < camera.max_radius) {
            return invalid(format!(
                "camera radius range [{}, {}] is empty or non-positive",
                camera.min_radius, camera.max_radius
            ));
        }
        if !(camera.phi_margin > 0.0 && camera.phi_margin < PI / 2.0) {
            return invalid(format!(
                "camera.phi_margin must be in (0, pi/2), got {}",
                camera.phi_margin
            ));
        }
        if !(camera.fov_y_degrees > 0.0 && camera.fov_y_degrees < 180.0) {
            return invalid(format!(
                "camera.fov_y_degrees must be in (0, 180), got {}",
                camera.fov_y_degrees
            ));
        }
        if !(camera.near > 0.0 && camera.near < camera.far) {
            return invalid(format!(
                "camera clip range [{}, {}] is invalid",
                camera.near, camera.far
            ));
        }

        Ok(())
    }
}
