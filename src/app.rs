//! Application Coordinator
//!
//! Wires the capture session, the shared lot controller and the annotator together,
//! including the upload fallback when no camera can be opened.

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::annotation::{AnnotationCanvas, TextFont};
use crate::capture::{CameraProvider, CaptureOptions, CaptureSession, JpegFrameEncoder};
use crate::config::AppConfig;
use crate::error::{EngineError, LimitKind, Result};
use crate::feedback::ShutterFeedback;
use crate::lots::{AddReport, ImageFile, LotController, SharedLots};
use crate::shared::{LotEvent, SessionEvent};
use crate::storage;

/// Where a capture was filed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiledCapture {
    pub lot: usize,
    pub index: usize,
    pub name: String,
}

/// Main application coordinator
pub struct CaptureApp {
    config: AppConfig,
    /// Lot state shared with the UI and background tasks
    lots: SharedLots,
    feedback: Arc<ShutterFeedback>,
    font: TextFont,
    session: Option<CaptureSession>,
    session_tx: Sender<SessionEvent>,
    session_rx: Receiver<SessionEvent>,
    lot_rx: Receiver<LotEvent>,
}

impl CaptureApp {
    /// Create a coordinator; loads the configured annotation font or the bundled one
    pub fn new(config: AppConfig, feedback: ShutterFeedback) -> anyhow::Result<Self> {
        config.capture.validate()?;

        let font = TextFont::load_or_bundled(config.annotation.font_path.as_deref())
            .context("Failed to load annotation font")?;
        match &config.annotation.font_path {
            Some(path) => debug!("Annotation font loaded from {:?}", path),
            None => debug!("Using bundled annotation font"),
        }

        let (lot_tx, lot_rx) = unbounded();
        let (session_tx, session_rx) = unbounded();
        let lots = LotController::new(&config.capture).with_events(lot_tx).shared();

        Ok(Self {
            config,
            lots,
            feedback: Arc::new(feedback),
            font,
            session: None,
            session_tx,
            session_rx,
            lot_rx,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared handle to the lot controller
    pub fn lots(&self) -> SharedLots {
        self.lots.clone()
    }

    /// Capture session notifications
    pub fn session_events(&self) -> Receiver<SessionEvent> {
        self.session_rx.clone()
    }

    /// Lot controller notifications
    pub fn lot_events(&self) -> Receiver<LotEvent> {
        self.lot_rx.clone()
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    /// Open the camera. On `CameraUnavailable` the caller should offer `upload` instead.
    pub async fn open_camera(&mut self, provider: Arc<dyn CameraProvider>) -> Result<()> {
        self.close_camera();

        let options = CaptureOptions::from_settings(&self.config.camera, &self.config.feedback);
        let encoder = Arc::new(JpegFrameEncoder {
            quality: self.config.camera.jpeg_quality,
        });
        let session = CaptureSession::open(provider, encoder, options)
            .await
            .inspect_err(|e| warn!("Camera unavailable, upload only: {}", e))?
            .with_feedback(self.feedback.clone())
            .with_events(self.session_tx.clone());

        self.session = Some(session);
        Ok(())
    }

    /// Release the camera if one is open
    pub fn close_camera(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }

    /// Capture a still and file it into the active lot, moving on to the next lot when
    /// the active one is full. Encoding failures and captures racing a close are logged
    /// and yield `None`.
    pub async fn capture(&self) -> Result<Option<FiledCapture>> {
        let Some(session) = &self.session else {
            debug!("Capture requested with no open camera");
            return Ok(None);
        };

        let file = match session.capture_frame(self.config.capture.target_aspect.ratio()).await {
            Ok(file) => file,
            Err(e) if e.is_silent() => {
                warn!("Capture dropped: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.file_capture(file).map(Some)
    }

    fn file_capture(&self, file: ImageFile) -> Result<FiledCapture> {
        let name = file.name.clone();
        let mut lots = self.lots.lock();
        loop {
            let active = lots.active_index();
            let report = lots.add_files(active, vec![file.clone()])?;
            if report.accepted == 1 {
                let index = lots.active_lot().len() - 1;
                return Ok(FiledCapture {
                    lot: active,
                    index,
                    name,
                });
            }
            if report.limit != Some(LimitKind::PerLot) || lots.remaining_total() == 0 {
                return Err(EngineError::LimitExceeded {
                    lot: active,
                    kind: report.limit.unwrap_or(LimitKind::Total),
                    rejected: 1,
                });
            }
            info!("Lot {} is full, moving to the next lot", active);
            lots.go_next();
        }
    }

    /// Add picked files to the active lot. Non-images are skipped and counted.
    pub fn upload(&self, paths: &[PathBuf]) -> anyhow::Result<AddReport> {
        let files = paths
            .iter()
            .map(|p| ImageFile::from_path(p))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let report = self.lots.lock().add_to_active(files)?;
        Ok(report)
    }

    /// Start annotating one file of a lot. The lot keeps the original until `finish_annotation`.
    pub fn annotate(&self, lot: usize, index: usize) -> Result<AnnotationCanvas> {
        let file = {
            let lots = self.lots.lock();
            lots.lot(lot)
                .ok_or(EngineError::LotNotFound(lot))?
                .files()
                .get(index)
                .cloned()
                .ok_or(EngineError::FileNotFound { lot, index })?
        };
        AnnotationCanvas::open(file, &self.config.annotation, self.font.clone())
    }

    /// Rasterize the canvas and swap the result into the lot
    pub async fn finish_annotation(&self, lot: usize, index: usize, mut canvas: AnnotationCanvas) -> Result<()> {
        let annotated = canvas.save().await?;
        self.lots.lock().replace_file(lot, index, annotated)?;
        info!("Lot {} file {} replaced with annotated copy", lot, index);
        Ok(())
    }

    /// Write every non-empty lot plus `lots.json` under `dir`
    pub fn export(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let lots = self.lots.lock();
        storage::export_lots(dir, lots.lots())
    }
}

impl Drop for CaptureApp {
    fn drop(&mut self) {
        self.close_camera();
    }
}
