//! Application Configuration
//!
//! Capture caps, camera output, annotation defaults and feedback settings, stored in TOML format.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::capture::Orientation;
use crate::lots::GroupingMode;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Lot caps and target aspect for this flow
    pub capture: CaptureConfig,
    /// Camera stream and still output settings
    pub camera: CameraSettings,
    /// Annotation tool defaults
    pub annotation: AnnotationSettings,
    /// Shutter sound and haptics
    pub feedback: FeedbackSettings,
}

/// Aspect ratio captured stills are cropped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAspect {
    /// 3:4, taller than wide
    #[default]
    Portrait,
    /// 4:3, wider than tall
    Landscape,
}

impl TargetAspect {
    /// Width divided by height
    pub fn ratio(&self) -> f32 {
        match self {
            TargetAspect::Portrait => 3.0 / 4.0,
            TargetAspect::Landscape => 4.0 / 3.0,
        }
    }

    /// The stream orientation that best matches this aspect
    pub fn orientation(&self) -> Orientation {
        match self {
            TargetAspect::Portrait => Orientation::Portrait,
            TargetAspect::Landscape => Orientation::Landscape,
        }
    }
}

/// Per-flow capture limits handed in by the surrounding form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Maximum images in a single lot
    pub max_per_lot: usize,
    /// Maximum images across all lots
    pub max_total: usize,
    /// Crop aspect for captured stills
    pub target_aspect: TargetAspect,
    /// Grouping modes this flow offers
    pub allowed_modes: BTreeSet<GroupingMode>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_per_lot: 20,
            max_total: 100,
            target_aspect: TargetAspect::Portrait,
            allowed_modes: GroupingMode::ALL.into_iter().collect(),
        }
    }
}

impl CaptureConfig {
    /// Reject caps that would make every add fail
    pub fn validate(&self) -> Result<()> {
        if self.max_per_lot == 0 {
            bail!("max_per_lot must be at least 1");
        }
        if self.max_total == 0 {
            bail!("max_total must be at least 1");
        }
        if self.allowed_modes.is_empty() {
            bail!("allowed_modes must name at least one grouping mode");
        }
        Ok(())
    }
}

/// Camera stream and still output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Orientation the stream opens in
    pub orientation: Orientation,
    /// Long edge of encoded stills in pixels
    pub output_long_edge: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            output_long_edge: 1920,
            jpeg_quality: 92,
        }
    }
}

/// Annotation tool defaults. Sizes are fractions of the base image width.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSettings {
    /// Freehand stroke color (RGBA)
    pub stroke_color: [u8; 4],
    /// Freehand stroke width
    pub stroke_width: f32,
    /// Text color (RGBA)
    pub text_color: [u8; 4],
    /// Text size
    pub font_size: f32,
    /// Text wraps at this fraction of the image width
    pub text_wrap_fraction: f32,
    /// Box region outline color (RGBA)
    pub box_color: [u8; 4],
    /// Box region outline width
    pub box_width: f32,
    /// Pointer travel before a press turns into a drag
    pub move_threshold: f32,
    /// Hit radius around resize handles
    pub handle_tolerance: f32,
    /// TrueType/OpenType font used to rasterize text; the bundled DejaVu Sans when unset
    pub font_path: Option<PathBuf>,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            stroke_color: [230, 30, 30, 255],
            stroke_width: 0.006,
            text_color: [255, 220, 0, 255],
            font_size: 0.04,
            text_wrap_fraction: 0.8,
            box_color: [230, 30, 30, 255],
            box_width: 0.004,
            move_threshold: 0.01,
            handle_tolerance: 0.03,
            font_path: None,
        }
    }
}

/// Shutter sound and haptics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    /// Play a synthesized shutter click
    pub sound_enabled: bool,
    /// Click volume (0.0 - 1.0)
    pub volume: f32,
    /// Pulse the vibration motor on capture
    pub haptics_enabled: bool,
    /// Vibration pulse length in milliseconds
    pub haptic_pulse_ms: u64,
    /// Simulated flash overlay length in milliseconds
    pub flash_overlay_ms: u64,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            volume: 0.7,
            haptics_enabled: true,
            haptic_pulse_ms: 40,
            flash_overlay_ms: 150,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)?;
    config.capture.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
