//! Lot Capture - camera capture, lot grouping and photo annotation engine
//!
//! A live camera stream is turned into cropped stills, the stills are filed into a
//! bounded set of lots (each locked to one grouping mode), and single photos can be
//! annotated with strokes, text and boxes before the lots are exported.

pub mod annotation;
pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod feedback;
pub mod geometry;
pub mod lots;
pub mod shared;
pub mod storage;

pub use annotation::{AnnotationAction, AnnotationCanvas, Tool};
pub use app::{CaptureApp, FiledCapture};
pub use capture::{CameraProvider, CaptureSession, Orientation, StillCamera};
pub use config::AppConfig;
pub use error::{DeviceError, EngineError, LimitKind, Result};
pub use feedback::ShutterFeedback;
pub use lots::{GroupingMode, ImageFile, Lot, LotController};
