//! Engine error taxonomy
//!
//! Geometry and cover-index invariants are enforced internally and never show up here.
//! Device failures always do, since the caller needs to fall back to file upload.

use crate::lots::GroupingMode;

/// Failures reported by the camera device boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera matches the requested constraints")]
    NoMatchingDevice,
    #[error("camera disconnected: {0}")]
    Disconnected(String),
    #[error("camera rejected constraint: {0}")]
    ConstraintRejected(String),
}

/// Which cap stopped an add
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// The lot has no grouping mode yet, so nothing can be filed into it
    ModeUnset,
    /// The lot holds `max_per_lot` files
    PerLot,
    /// All lots together hold `max_total` files
    Total,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitKind::ModeUnset => write!(f, "no grouping mode selected"),
            LimitKind::PerLot => write!(f, "lot is full"),
            LimitKind::Total => write!(f, "total image limit reached"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(#[from] DeviceError),

    #[error("lot {lot}: {kind} ({rejected} file(s) rejected)")]
    LimitExceeded {
        lot: usize,
        kind: LimitKind,
        rejected: usize,
    },

    #[error("lot {lot} is locked to {current}; remove its images before switching to {requested}")]
    ModeLocked {
        lot: usize,
        current: GroupingMode,
        requested: GroupingMode,
    },

    #[error("grouping mode {0} is not allowed in this flow")]
    ModeNotAllowed(GroupingMode),

    #[error("lot {0} does not exist")]
    LotNotFound(usize),

    #[error("lot {lot} has no file at index {index}")]
    FileNotFound { lot: usize, index: usize },

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("capture session is closed")]
    SessionClosed,
}

impl EngineError {
    /// Transient failures the coordinator turns into a logged no-op
    pub fn is_silent(&self) -> bool {
        matches!(self, EngineError::EncodingFailed(_) | EngineError::SessionClosed)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::ModeLocked {
            lot: 0,
            current: GroupingMode::SingleLot,
            requested: GroupingMode::PerPhoto,
        };
        let msg = err.to_string();
        assert!(msg.contains("single_lot"));
        assert!(msg.contains("per_photo"));

        let err = EngineError::LimitExceeded {
            lot: 2,
            kind: LimitKind::ModeUnset,
            rejected: 3,
        };
        assert!(err.to_string().contains("no grouping mode selected"));
    }

    #[test]
    fn test_device_error_wraps() {
        let err: EngineError = DeviceError::PermissionDenied.into();
        assert!(matches!(err, EngineError::CameraUnavailable(DeviceError::PermissionDenied)));
        assert!(!err.is_silent());
        assert!(EngineError::SessionClosed.is_silent());
    }
}
