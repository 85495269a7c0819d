//! Camera Capture Types
//!
//! Frame and configuration types shared between the cabin camera source
//! and the drowsiness pipeline. The capture driver itself lives outside
//! this workspace; it hands `VideoFrame`s to the pipeline.

pub mod frame;

pub use frame::VideoFrame;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Buffer allocation failed")]
    Buffer,

    #[error("Streaming error: {0}")]
    Stream(String),
}

/// Cabin camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fps: 30,
        }
    }
}

impl CameraConfig {
    /// Nominal interval between frames in nanoseconds
    pub fn frame_interval_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.fps.max(1))
    }
}
