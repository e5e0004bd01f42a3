//! Event types sent from the engine to the surrounding UI

use std::time::Duration;

use crate::capture::Orientation;
use crate::lots::GroupingMode;

/// Notifications from an open capture session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Show a brief full-white overlay (no torch on this device)
    FlashOverlay { duration: Duration },
    /// A still was captured and encoded
    Captured { name: String },
    /// Zoom changed; `preview_scale` is what the live preview should be scaled by
    ZoomChanged { zoom: f32, preview_scale: f32 },
    /// Orientation changed and the stream was restarted
    OrientationChanged(Orientation),
    /// Torch or simulated flash toggled
    FlashToggled { enabled: bool, hardware: bool },
    /// The device stream was released
    Closed,
    /// A device error closed the session; fall back to upload
    Failed(String),
}

/// Notifications from the lot controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LotEvent {
    /// A lot was appended
    LotCreated { index: usize, id: String },
    /// A lot was removed
    LotRemoved { index: usize },
    /// The active cursor moved
    ActiveChanged(usize),
    /// A lot was locked to a grouping mode
    ModeChanged { lot: usize, mode: GroupingMode },
    /// Images were filed; `truncated` > 0 should be surfaced to the user
    FilesAdded { lot: usize, accepted: usize, truncated: usize },
    /// A file was removed
    FileRemoved { lot: usize, index: usize },
}
