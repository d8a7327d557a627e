//! Core utilities for the shapes renderer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - TOML configuration

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::{AppConfig, ConfigError};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use timer::{FrameReport, FrameTime, FrameTimer};
