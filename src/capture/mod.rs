//! Camera Capture Layer
//!
//! Owns one live camera stream and turns it into still images under zoom,
//! orientation and flash settings. The stream is released on every exit path:
//! explicit close, device error, and drop.

pub mod device;
pub mod encode;
pub mod frame;
pub mod still;

use crossbeam_channel::Sender;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CameraSettings, FeedbackSettings};
use crate::error::{DeviceError, EngineError, Result};
use crate::feedback::ShutterFeedback;
use crate::geometry::{clamp_zoom, crop_for_aspect, output_size_for_aspect};
use crate::lots::ImageFile;
use crate::shared::SessionEvent;

pub use device::{CameraProvider, Capabilities, Constraint, StreamConstraints, StreamHandle, ZoomRange};
pub use encode::{EncodedImage, FrameEncoder, JpegFrameEncoder, PngFrameEncoder};
pub use frame::CapturedFrame;
pub use still::StillCamera;

/// Stream orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Session options
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Orientation the stream opens in
    pub orientation: Orientation,
    /// Long edge of encoded stills in pixels
    pub output_long_edge: u32,
    /// How long the simulated flash overlay stays up
    pub flash_overlay: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            output_long_edge: 1920,
            flash_overlay: Duration::from_millis(150),
        }
    }
}

impl CaptureOptions {
    pub fn from_settings(camera: &CameraSettings, feedback: &FeedbackSettings) -> Self {
        Self {
            orientation: camera.orientation,
            output_long_edge: camera.output_long_edge,
            flash_overlay: Duration::from_millis(feedback.flash_overlay_ms),
        }
    }
}

/// Mutable per-session state
#[derive(Debug, Clone, Copy)]
struct SessionState {
    zoom: f32,
    /// Zoom the device applies itself, 1.0 without native zoom
    device_zoom: f32,
    orientation: Orientation,
    flash_requested: bool,
    capabilities: Capabilities,
}

impl SessionState {
    /// Zoom still to be applied by cropping: whatever the device range could not reach
    fn software_zoom(&self) -> f32 {
        (self.zoom / self.device_zoom.max(1.0)).max(1.0)
    }
}

/// Crop the largest centered `aspect` region at `zoom` out of `frame` and scale it
/// so its long edge is `long_edge` pixels. Pure function of its inputs.
pub fn render_still(frame: &RgbaImage, aspect: f32, zoom: f32, long_edge: u32) -> Result<RgbaImage> {
    let (fw, fh) = frame.dimensions();
    if fw == 0 || fh == 0 {
        return Err(EngineError::EncodingFailed("empty frame".to_string()));
    }
    let crop = crop_for_aspect(fw, fh, aspect, zoom);
    let (x, y, w, h) = crop.to_pixel_bounds(fw, fh);
    let (out_w, out_h) = output_size_for_aspect(crop.aspect(), long_edge);

    debug!(
        "Crop {}x{} at ({}, {}) from {}x{} -> {}x{}",
        w, h, x, y, fw, fh, out_w, out_h
    );

    let cropped = imageops::crop_imm(frame, x, y, w, h).to_image();
    Ok(imageops::resize(&cropped, out_w, out_h, FilterType::Triangle))
}

/// One open camera stream
pub struct CaptureSession {
    provider: Arc<dyn CameraProvider>,
    encoder: Arc<dyn FrameEncoder>,
    feedback: Option<Arc<ShutterFeedback>>,
    events: Option<Sender<SessionEvent>>,
    options: CaptureOptions,
    stream: Mutex<Option<StreamHandle>>,
    state: RwLock<SessionState>,
    /// Serializes captures (they share the output buffer); holds the capture sequence number
    output: tokio::sync::Mutex<u32>,
    cancel: CancellationToken,
}

impl CaptureSession {
    /// Request a rear camera stream and probe its capabilities.
    ///
    /// Fails with `CameraUnavailable` when permission is denied or no device matches;
    /// the caller should fall back to file upload.
    pub async fn open(
        provider: Arc<dyn CameraProvider>,
        encoder: Arc<dyn FrameEncoder>,
        options: CaptureOptions,
    ) -> Result<Self> {
        let (stream, capabilities) = start_stream(provider.as_ref(), options.orientation).await?;

        info!(
            "Camera stream {:?} opened ({:?}, torch: {}, native zoom: {})",
            stream,
            options.orientation,
            capabilities.torch,
            capabilities.zoom.is_some()
        );

        Ok(Self {
            provider,
            encoder,
            feedback: None,
            events: None,
            state: RwLock::new(SessionState {
                zoom: 1.0,
                device_zoom: 1.0,
                orientation: options.orientation,
                flash_requested: false,
                capabilities,
            }),
            options,
            stream: Mutex::new(Some(stream)),
            output: tokio::sync::Mutex::new(0),
            cancel: CancellationToken::new(),
        })
    }

    /// Play shutter feedback on each capture
    pub fn with_feedback(mut self, feedback: Arc<ShutterFeedback>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    /// Publish session events to the UI
    pub fn with_events(mut self, sender: Sender<SessionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn is_open(&self) -> bool {
        self.stream.lock().is_some()
    }

    pub fn zoom(&self) -> f32 {
        self.state.read().zoom
    }

    pub fn orientation(&self) -> Orientation {
        self.state.read().orientation
    }

    pub fn capabilities(&self) -> Capabilities {
        self.state.read().capabilities
    }

    pub fn torch_available(&self) -> bool {
        self.state.read().capabilities.torch
    }

    pub fn flash_requested(&self) -> bool {
        self.state.read().flash_requested
    }

    /// Scale the live preview should be drawn at. With native zoom the frames are
    /// already zoomed by the device, so only the remainder past its range is scaled.
    pub fn preview_scale(&self) -> f32 {
        self.state.read().software_zoom()
    }

    /// Set zoom, clamped to [1, 5]. Applied natively when the device supports it,
    /// otherwise emulated by the preview scale and a software crop at capture time.
    pub async fn set_zoom(&self, zoom: f32) -> Result<f32> {
        let zoom = clamp_zoom(zoom);
        let stream = self.current_stream()?;
        let native = self.state.read().capabilities.zoom;

        let mut device_zoom = 1.0;
        if let Some(range) = native {
            device_zoom = zoom.clamp(range.min, range.max);
            if let Err(e) = self
                .provider
                .apply_constraint(&stream, Constraint::Zoom(device_zoom))
                .await
            {
                return Err(self.fail(e));
            }
        }

        let preview_scale = {
            let mut state = self.state.write();
            state.zoom = zoom;
            state.device_zoom = device_zoom;
            state.software_zoom()
        };
        debug!("Zoom set to {:.2} (preview scale {:.2})", zoom, preview_scale);
        self.emit(SessionEvent::ZoomChanged { zoom, preview_scale });
        Ok(zoom)
    }

    /// Toggle the torch, or arm the simulated flash when the device has none.
    /// Returns whether flash is now requested.
    pub async fn toggle_torch(&self) -> Result<bool> {
        let stream = self.current_stream()?;
        let (enabled, hardware) = {
            let state = self.state.read();
            (!state.flash_requested, state.capabilities.torch)
        };

        if hardware {
            if let Err(e) = self
                .provider
                .apply_constraint(&stream, Constraint::Torch(enabled))
                .await
            {
                return Err(self.fail(e));
            }
        }

        self.state.write().flash_requested = enabled;
        info!("Flash {} ({})", if enabled { "on" } else { "off" }, if hardware { "torch" } else { "simulated" });
        self.emit(SessionEvent::FlashToggled { enabled, hardware });
        Ok(enabled)
    }

    /// Switch orientation. The stream is restarted at the matching resolution and
    /// native zoom/torch settings are re-applied.
    pub async fn set_orientation(&self, orientation: Orientation) -> Result<()> {
        if self.orientation() == orientation {
            return Ok(());
        }
        // Wait out any capture in flight; it reads from the stream being replaced
        let _output = self.output.lock().await;
        let old = self.current_stream()?;
        self.provider.stop(&old);
        *self.stream.lock() = None;

        let (stream, capabilities) = match start_stream(self.provider.as_ref(), orientation).await {
            Ok(started) => started,
            Err(EngineError::CameraUnavailable(e)) => return Err(self.fail(e)),
            Err(e) => return Err(e),
        };
        *self.stream.lock() = Some(stream);

        let (zoom, flash) = {
            let mut state = self.state.write();
            state.orientation = orientation;
            state.capabilities = capabilities;
            (state.zoom, state.flash_requested)
        };

        let mut device_zoom = 1.0;
        if let Some(range) = capabilities.zoom {
            if zoom > 1.0 {
                device_zoom = zoom.clamp(range.min, range.max);
                if let Err(e) = self.provider.apply_constraint(&stream, Constraint::Zoom(device_zoom)).await {
                    return Err(self.fail(e));
                }
            }
        }
        self.state.write().device_zoom = device_zoom;
        if capabilities.torch && flash {
            if let Err(e) = self.provider.apply_constraint(&stream, Constraint::Torch(true)).await {
                return Err(self.fail(e));
            }
        }

        info!("Orientation changed to {:?}, stream restarted as {:?}", orientation, stream);
        self.emit(SessionEvent::OrientationChanged(orientation));
        Ok(())
    }

    /// Sample the latest frame, crop it to `aspect` at the current zoom, scale to the
    /// output long edge and encode it.
    ///
    /// Concurrent calls are queued. A capture that finishes after `close()` is discarded
    /// and reported as `SessionClosed`.
    pub async fn capture_frame(&self, aspect: f32) -> Result<ImageFile> {
        let mut sequence = tokio::select! {
            guard = self.output.lock() => guard,
            _ = self.cancel.cancelled() => return Err(EngineError::SessionClosed),
        };
        let stream = self.current_stream()?;

        let frame = match self.provider.latest_frame(&stream) {
            Ok(frame) => frame,
            Err(e) => return Err(self.fail(e)),
        };

        let state = *self.state.read();
        if state.flash_requested && !state.capabilities.torch {
            self.emit(SessionEvent::FlashOverlay {
                duration: self.options.flash_overlay,
            });
        }

        let zoom = state.software_zoom();
        let long_edge = self.options.output_long_edge;
        let encoder = self.encoder.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            let still = render_still(&frame.image, aspect, zoom, long_edge)?;
            encoder.encode(&still)
        })
        .await
        .map_err(|e| EngineError::EncodingFailed(e.to_string()))??;

        if self.cancel.is_cancelled() {
            debug!("Discarding capture that finished after close");
            return Err(EngineError::SessionClosed);
        }

        *sequence += 1;
        let name = format!("capture_{:04}.{}", *sequence, encoded.extension);
        info!("Captured {} ({} bytes)", name, encoded.data.len());

        if let Some(feedback) = &self.feedback {
            feedback.trigger();
        }
        self.emit(SessionEvent::Captured { name: name.clone() });

        Ok(ImageFile::new(encoded.data, name, encoded.mime))
    }

    /// Release the device stream. Safe to call any number of times.
    pub fn close(&self) {
        self.cancel.cancel();
        if let Some(stream) = self.stream.lock().take() {
            self.provider.stop(&stream);
            info!("Camera stream {:?} released", stream);
            self.emit(SessionEvent::Closed);
        }
    }

    fn current_stream(&self) -> Result<StreamHandle> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::SessionClosed);
        }
        (*self.stream.lock()).ok_or(EngineError::SessionClosed)
    }

    /// Close before reporting a device error, so no stream outlives the failure
    fn fail(&self, error: DeviceError) -> EngineError {
        warn!("Camera error, closing session: {}", error);
        self.close();
        self.emit(SessionEvent::Failed(error.to_string()));
        EngineError::CameraUnavailable(error)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Start a rear stream and probe it; the stream is stopped again if the probe fails
async fn start_stream(
    provider: &dyn CameraProvider,
    orientation: Orientation,
) -> Result<(StreamHandle, Capabilities)> {
    let constraints = StreamConstraints::rear(orientation);
    let stream = provider.start(&constraints).await?;
    match provider.capabilities(&stream).await {
        Ok(capabilities) => Ok((stream, capabilities)),
        Err(e) => {
            provider.stop(&stream);
            Err(e.into())
        }
    }
}
