//! In-memory camera backed by still images
//!
//! Serves the CLI (capturing from photos on disk) and tests. Supports capability
//! overrides and failure injection for permission denial and mid-session disconnects.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;

use crate::capture::device::{CameraProvider, Capabilities, Constraint, StreamConstraints, StreamHandle};
use crate::capture::frame::CapturedFrame;
use crate::error::DeviceError;
use crate::geometry::clamp_zoom;

#[derive(Debug, Default)]
struct StillState {
    next_id: u64,
    active: HashSet<u64>,
    started: usize,
    cursor: usize,
    zoom: f32,
    torch: bool,
    applied: Vec<Constraint>,
    last_constraints: Option<StreamConstraints>,
    deny_permission: bool,
    fail_frames: bool,
}

/// A camera that cycles through a fixed list of frames
pub struct StillCamera {
    frames: Vec<RgbaImage>,
    capabilities: Capabilities,
    state: Mutex<StillState>,
}

impl StillCamera {
    /// Camera with no torch and no native zoom
    pub fn new(frames: Vec<RgbaImage>) -> Self {
        Self {
            frames,
            capabilities: Capabilities::default(),
            state: Mutex::new(StillState {
                zoom: 1.0,
                ..StillState::default()
            }),
        }
    }

    /// Camera that always shows the same image
    pub fn from_image(image: RgbaImage) -> Self {
        Self::new(vec![image])
    }

    /// Load frames from image files on disk
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let frames = paths
            .iter()
            .map(|p| {
                let path = p.as_ref();
                image::open(path)
                    .map(|img| img.to_rgba8())
                    .with_context(|| format!("Failed to load frame: {:?}", path))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(frames))
    }

    /// Override the capabilities reported by the probe
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make the next `start` fail with `PermissionDenied`
    pub fn deny_permission(&self, deny: bool) {
        self.state.lock().deny_permission = deny;
    }

    /// Make frame sampling fail as if the device was unplugged
    pub fn fail_frames(&self, fail: bool) {
        self.state.lock().fail_frames = fail;
    }

    /// Streams started and not yet stopped
    pub fn active_streams(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Total number of successful `start` calls
    pub fn start_count(&self) -> usize {
        self.state.lock().started
    }

    /// Every constraint applied so far, in order
    pub fn applied_constraints(&self) -> Vec<Constraint> {
        self.state.lock().applied.clone()
    }

    /// Constraints of the most recent `start`
    pub fn last_constraints(&self) -> Option<StreamConstraints> {
        self.state.lock().last_constraints
    }

    pub fn torch_on(&self) -> bool {
        self.state.lock().torch
    }

    fn check_active(state: &StillState, stream: &StreamHandle) -> Result<(), DeviceError> {
        if state.active.contains(&stream.0) {
            Ok(())
        } else {
            Err(DeviceError::Disconnected(format!("stream {} is not running", stream.0)))
        }
    }
}

/// Emulate optical zoom: crop the center by `zoom` and scale back to the frame size
fn zoom_frame(frame: &RgbaImage, zoom: f32) -> RgbaImage {
    let (w, h) = frame.dimensions();
    if zoom <= 1.0 || w == 0 || h == 0 {
        return frame.clone();
    }
    let cw = ((w as f32 / zoom).round() as u32).clamp(1, w);
    let ch = ((h as f32 / zoom).round() as u32).clamp(1, h);
    let cropped = imageops::crop_imm(frame, (w - cw) / 2, (h - ch) / 2, cw, ch).to_image();
    imageops::resize(&cropped, w, h, FilterType::Triangle)
}

#[async_trait]
impl CameraProvider for StillCamera {
    async fn start(&self, constraints: &StreamConstraints) -> Result<StreamHandle, DeviceError> {
        let mut state = self.state.lock();
        if state.deny_permission {
            return Err(DeviceError::PermissionDenied);
        }
        if self.frames.is_empty() {
            return Err(DeviceError::NoMatchingDevice);
        }
        state.next_id += 1;
        let id = state.next_id;
        state.active.insert(id);
        state.started += 1;
        state.last_constraints = Some(*constraints);
        Ok(StreamHandle(id))
    }

    async fn capabilities(&self, stream: &StreamHandle) -> Result<Capabilities, DeviceError> {
        let state = self.state.lock();
        Self::check_active(&state, stream)?;
        Ok(self.capabilities)
    }

    async fn apply_constraint(&self, stream: &StreamHandle, constraint: Constraint) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::check_active(&state, stream)?;
        match constraint {
            Constraint::Torch(on) => {
                if !self.capabilities.torch {
                    return Err(DeviceError::ConstraintRejected("torch not supported".to_string()));
                }
                state.torch = on;
            }
            Constraint::Zoom(z) => {
                let Some(range) = self.capabilities.zoom else {
                    return Err(DeviceError::ConstraintRejected("zoom not supported".to_string()));
                };
                state.zoom = clamp_zoom(z.clamp(range.min, range.max));
            }
        }
        state.applied.push(constraint);
        Ok(())
    }

    fn latest_frame(&self, stream: &StreamHandle) -> Result<CapturedFrame, DeviceError> {
        let mut state = self.state.lock();
        Self::check_active(&state, stream)?;
        if state.fail_frames {
            return Err(DeviceError::Disconnected("frame source lost".to_string()));
        }
        let frame = &self.frames[state.cursor % self.frames.len()];
        state.cursor += 1;
        Ok(CapturedFrame::new(zoom_frame(frame, state.zoom)))
    }

    fn stop(&self, stream: &StreamHandle) {
        self.state.lock().active.remove(&stream.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::device::ZoomRange;
    use crate::capture::Orientation;
    use image::Rgba;

    fn frame() -> RgbaImage {
        RgbaImage::from_pixel(40, 30, Rgba([10, 20, 30, 255]))
    }

    #[tokio::test]
    async fn test_start_stop_tracks_streams() {
        let camera = StillCamera::from_image(frame());
        let handle = camera.start(&StreamConstraints::rear(Orientation::Landscape)).await.unwrap();
        assert_eq!(camera.active_streams(), 1);
        assert!(camera.latest_frame(&handle).is_ok());

        camera.stop(&handle);
        camera.stop(&handle);
        assert_eq!(camera.active_streams(), 0);
        assert!(camera.latest_frame(&handle).is_err());
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let camera = StillCamera::from_image(frame());
        camera.deny_permission(true);
        let err = camera
            .start(&StreamConstraints::rear(Orientation::Portrait))
            .await
            .unwrap_err();
        assert_eq!(err, DeviceError::PermissionDenied);
    }

    #[tokio::test]
    async fn test_no_frames_is_no_device() {
        let camera = StillCamera::new(Vec::new());
        let err = camera
            .start(&StreamConstraints::rear(Orientation::Portrait))
            .await
            .unwrap_err();
        assert_eq!(err, DeviceError::NoMatchingDevice);
    }

    #[tokio::test]
    async fn test_unsupported_constraints_rejected() {
        let camera = StillCamera::from_image(frame());
        let handle = camera.start(&StreamConstraints::rear(Orientation::Portrait)).await.unwrap();
        assert!(camera.apply_constraint(&handle, Constraint::Torch(true)).await.is_err());
        assert!(camera.apply_constraint(&handle, Constraint::Zoom(2.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_native_zoom_keeps_frame_size() {
        let camera = StillCamera::from_image(frame()).with_capabilities(Capabilities {
            torch: true,
            zoom: Some(ZoomRange { min: 1.0, max: 4.0 }),
        });
        let handle = camera.start(&StreamConstraints::rear(Orientation::Portrait)).await.unwrap();
        camera.apply_constraint(&handle, Constraint::Zoom(2.0)).await.unwrap();
        let sampled = camera.latest_frame(&handle).unwrap();
        assert_eq!(sampled.dimensions(), (40, 30));
        assert_eq!(camera.applied_constraints(), vec![Constraint::Zoom(2.0)]);
    }
}
