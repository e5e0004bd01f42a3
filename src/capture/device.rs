//! Camera device boundary
//!
//! The engine never talks to hardware directly: a `CameraProvider` starts and stops
//! streams, reports capabilities, applies torch/zoom constraints and hands out the latest frame.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capture::frame::CapturedFrame;
use crate::capture::Orientation;
use crate::error::DeviceError;

/// Which camera to ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera
    Environment,
    /// Front camera
    User,
}

/// What a stream is requested with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub width: u32,
    pub height: u32,
}

impl StreamConstraints {
    /// Rear camera at 1080x1920 (portrait) or 1920x1080 (landscape)
    pub fn rear(orientation: Orientation) -> Self {
        let (width, height) = match orientation {
            Orientation::Portrait => (1080, 1920),
            Orientation::Landscape => (1920, 1080),
        };
        Self {
            facing: FacingMode::Environment,
            width,
            height,
        }
    }
}

/// Opaque handle to a running stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Native zoom range exposed by the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f32,
    pub max: f32,
}

/// Capability probe result, read-only once the session has started
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Hardware torch control present
    pub torch: bool,
    /// Native zoom control, if any
    pub zoom: Option<ZoomRange>,
}

/// A single constraint applied to a running stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    Torch(bool),
    Zoom(f32),
}

#[async_trait]
pub trait CameraProvider: Send + Sync {
    /// Start a stream matching `constraints`
    async fn start(&self, constraints: &StreamConstraints) -> Result<StreamHandle, DeviceError>;

    /// Probe torch and zoom support
    async fn capabilities(&self, stream: &StreamHandle) -> Result<Capabilities, DeviceError>;

    /// Apply torch or zoom to a running stream
    async fn apply_constraint(&self, stream: &StreamHandle, constraint: Constraint) -> Result<(), DeviceError>;

    /// Sample the latest frame; no buffering of past frames
    fn latest_frame(&self, stream: &StreamHandle) -> Result<CapturedFrame, DeviceError>;

    /// Release the stream. Stopping an unknown or stopped stream is a no-op.
    fn stop(&self, stream: &StreamHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rear_constraints_follow_orientation() {
        let portrait = StreamConstraints::rear(Orientation::Portrait);
        assert_eq!((portrait.width, portrait.height), (1080, 1920));
        assert_eq!(portrait.facing, FacingMode::Environment);

        let landscape = StreamConstraints::rear(Orientation::Landscape);
        assert_eq!((landscape.width, landscape.height), (1920, 1080));
    }
}
