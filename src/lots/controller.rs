//! Lot controller: bounded, mode-gated fan-out of images into lots

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::error::{EngineError, LimitKind, Result};
use crate::lots::{GroupingMode, ImageFile, Lot, LotDescriptor};
use crate::shared::LotEvent;

/// Lot state shared with background capture/encode tasks.
///
/// Size-checked appends are read-modify-write, so every mutation goes through the mutex.
pub type SharedLots = Arc<Mutex<LotController>>;

/// Outcome of an add: partial acceptance is normal, not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddReport {
    /// Files appended to the lot, in input order
    pub accepted: usize,
    /// Image files dropped because a cap was reached
    pub truncated: usize,
    /// Non-image files ignored
    pub skipped: usize,
    /// The cap that caused truncation, if any
    pub limit: Option<LimitKind>,
}

impl AddReport {
    /// Nothing was filed even though images were offered
    pub fn is_rejected(&self) -> bool {
        self.accepted == 0 && self.truncated > 0
    }
}

/// Ordered collection of lots with an "active" cursor
#[derive(Debug)]
pub struct LotController {
    lots: Vec<Lot>,
    active: usize,
    max_per_lot: usize,
    max_total: usize,
    allowed_modes: BTreeSet<GroupingMode>,
    events: Option<Sender<LotEvent>>,
}

impl LotController {
    /// Create a controller holding one empty, mode-unset lot
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            lots: vec![Lot::new()],
            active: 0,
            max_per_lot: config.max_per_lot,
            max_total: config.max_total,
            allowed_modes: config.allowed_modes.clone(),
            events: None,
        }
    }

    /// Publish lot changes to a UI listener
    pub fn with_events(mut self, sender: Sender<LotEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Wrap for sharing with background tasks
    pub fn shared(self) -> SharedLots {
        Arc::new(Mutex::new(self))
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    pub fn lot(&self, index: usize) -> Option<&Lot> {
        self.lots.get(index)
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_files() == 0
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_lot(&self) -> &Lot {
        &self.lots[self.active]
    }

    pub fn max_per_lot(&self) -> usize {
        self.max_per_lot
    }

    pub fn max_total(&self) -> usize {
        self.max_total
    }

    pub fn total_files(&self) -> usize {
        self.lots.iter().map(Lot::len).sum()
    }

    pub fn remaining_total(&self) -> usize {
        self.max_total.saturating_sub(self.total_files())
    }

    /// Descriptors submitted with the files, one per lot in order
    pub fn descriptors(&self) -> Vec<LotDescriptor> {
        self.lots.iter().map(Lot::descriptor).collect()
    }

    /// Hand the lots over to the caller for submission
    pub fn into_lots(self) -> Vec<Lot> {
        self.lots
    }

    /// Append an empty, mode-unset lot and make it active
    pub fn create_lot(&mut self) -> usize {
        let lot = Lot::new();
        let id = lot.id.clone();
        self.lots.push(lot);
        self.active = self.lots.len() - 1;
        info!("Created lot {} ({})", self.active, id);
        self.emit(LotEvent::LotCreated {
            index: self.active,
            id,
        });
        self.emit(LotEvent::ActiveChanged(self.active));
        self.active
    }

    /// Remove a lot by index. The controller never drops to zero lots:
    /// removing the only lot leaves a fresh empty one in its place.
    pub fn remove_lot(&mut self, index: usize) -> Result<Lot> {
        if index >= self.lots.len() {
            return Err(EngineError::LotNotFound(index));
        }
        let removed = self.lots.remove(index);
        if self.lots.is_empty() {
            self.lots.push(Lot::new());
        }
        if self.active > index || self.active >= self.lots.len() {
            self.active = self.active.saturating_sub(1);
        }
        info!("Removed lot {} ({} file(s))", index, removed.len());
        self.emit(LotEvent::LotRemoved { index });
        self.emit(LotEvent::ActiveChanged(self.active));
        Ok(removed)
    }

    /// Lock a lot to a grouping mode.
    ///
    /// Succeeds while the lot is empty or when `mode` equals the current mode;
    /// anything else is `ModeLocked`.
    pub fn set_mode(&mut self, lot_index: usize, mode: GroupingMode) -> Result<()> {
        if !self.allowed_modes.contains(&mode) {
            return Err(EngineError::ModeNotAllowed(mode));
        }
        let lot = self
            .lots
            .get_mut(lot_index)
            .ok_or(EngineError::LotNotFound(lot_index))?;

        if !lot.can_set_mode(mode) {
            let current = lot.mode().unwrap_or(mode);
            warn!("Lot {} is locked to {}, rejected {}", lot_index, current, mode);
            return Err(EngineError::ModeLocked {
                lot: lot_index,
                current,
                requested: mode,
            });
        }

        if lot.mode() != Some(mode) {
            lot.set_mode(mode);
            debug!("Lot {} mode set to {}", lot_index, mode);
            self.emit(LotEvent::ModeChanged {
                lot: lot_index,
                mode,
            });
        }
        Ok(())
    }

    /// File images into a lot, accepting as many as both caps allow.
    ///
    /// Accepts `min(room in lot, room overall, offered)` images in input order and reports
    /// the rest as truncated. A lot without a mode rejects the whole batch.
    pub fn add_files(&mut self, lot_index: usize, files: Vec<ImageFile>) -> Result<AddReport> {
        let total = self.total_files();
        let max_per_lot = self.max_per_lot;
        let max_total = self.max_total;

        let lot = self
            .lots
            .get_mut(lot_index)
            .ok_or(EngineError::LotNotFound(lot_index))?;

        if lot.mode().is_none() {
            return Err(EngineError::LimitExceeded {
                lot: lot_index,
                kind: LimitKind::ModeUnset,
                rejected: files.len(),
            });
        }

        let offered = files.len();
        let images: Vec<ImageFile> = files.into_iter().filter(ImageFile::is_image).collect();
        let skipped = offered - images.len();

        let room_in_lot = max_per_lot.saturating_sub(lot.len());
        let room_total = max_total.saturating_sub(total);
        let accepted = room_in_lot.min(room_total).min(images.len());
        let truncated = images.len() - accepted;

        for file in images.into_iter().take(accepted) {
            lot.push(file);
        }

        let limit = if truncated == 0 {
            None
        } else if room_total <= room_in_lot {
            Some(LimitKind::Total)
        } else {
            Some(LimitKind::PerLot)
        };

        if truncated > 0 {
            info!(
                "Lot {}: accepted {}, truncated {} ({})",
                lot_index,
                accepted,
                truncated,
                limit.unwrap_or(LimitKind::PerLot)
            );
        } else {
            debug!("Lot {}: accepted {}", lot_index, accepted);
        }
        if skipped > 0 {
            warn!("Lot {}: skipped {} non-image file(s)", lot_index, skipped);
        }

        self.emit(LotEvent::FilesAdded {
            lot: lot_index,
            accepted,
            truncated,
        });

        Ok(AddReport {
            accepted,
            truncated,
            skipped,
            limit,
        })
    }

    /// File images into whichever lot is active
    pub fn add_to_active(&mut self, files: Vec<ImageFile>) -> Result<AddReport> {
        self.add_files(self.active, files)
    }

    /// Remove one file; the cover index is re-clamped into the new bounds
    pub fn remove_file(&mut self, lot_index: usize, file_index: usize) -> Result<ImageFile> {
        let lot = self
            .lots
            .get_mut(lot_index)
            .ok_or(EngineError::LotNotFound(lot_index))?;
        let file = lot.remove(file_index).ok_or(EngineError::FileNotFound {
            lot: lot_index,
            index: file_index,
        })?;
        debug!("Lot {}: removed file {} ({})", lot_index, file_index, file.name);
        self.emit(LotEvent::FileRemoved {
            lot: lot_index,
            index: file_index,
        });
        Ok(file)
    }

    /// Swap a file in place (annotation save). Returns the previous file.
    pub fn replace_file(&mut self, lot_index: usize, file_index: usize, file: ImageFile) -> Result<ImageFile> {
        let lot = self
            .lots
            .get_mut(lot_index)
            .ok_or(EngineError::LotNotFound(lot_index))?;
        lot.replace(file_index, file).ok_or(EngineError::FileNotFound {
            lot: lot_index,
            index: file_index,
        })
    }

    /// Move a file between lots as remove + add. On rejection the file goes back where
    /// it was and no `FileRemoved` is published; on success it follows the `FilesAdded`.
    pub fn move_file(&mut self, from: usize, file_index: usize, to: usize) -> Result<AddReport> {
        if to >= self.lots.len() {
            return Err(EngineError::LotNotFound(to));
        }
        let lot = self.lots.get_mut(from).ok_or(EngineError::LotNotFound(from))?;
        let cover_before = lot.cover_index();
        let file = lot.remove(file_index).ok_or(EngineError::FileNotFound {
            lot: from,
            index: file_index,
        })?;

        match self.add_files(to, vec![file.clone()]) {
            Ok(report) if report.accepted == 1 => {
                debug!("Moved {} from lot {} to lot {}", file.name, from, to);
                self.emit(LotEvent::FileRemoved {
                    lot: from,
                    index: file_index,
                });
                Ok(report)
            }
            outcome => {
                let lot = &mut self.lots[from];
                lot.insert(file_index, file);
                lot.set_cover(cover_before);
                outcome
            }
        }
    }

    /// Pick the cover image; out-of-range indices are ignored
    pub fn set_cover(&mut self, lot_index: usize, file_index: usize) {
        if let Some(lot) = self.lots.get_mut(lot_index) {
            lot.set_cover(file_index);
        }
    }

    /// Move the active cursor to a specific lot
    pub fn set_active(&mut self, lot_index: usize) -> Result<()> {
        if lot_index >= self.lots.len() {
            return Err(EngineError::LotNotFound(lot_index));
        }
        self.active = lot_index;
        self.emit(LotEvent::ActiveChanged(self.active));
        Ok(())
    }

    /// Advance the active cursor. Past the last lot a new lot is created; it inherits the
    /// previous lot's mode so a continuous capture session keeps filing without a prompt.
    pub fn go_next(&mut self) -> usize {
        if self.active + 1 < self.lots.len() {
            self.active += 1;
            self.emit(LotEvent::ActiveChanged(self.active));
            return self.active;
        }

        let inherited = self.lots[self.active].mode();
        let index = self.create_lot();
        if let Some(mode) = inherited {
            self.lots[index].set_mode(mode);
            self.emit(LotEvent::ModeChanged { lot: index, mode });
        }
        index
    }

    /// Step the active cursor back; stays put on the first lot
    pub fn go_prev(&mut self) -> usize {
        if self.active > 0 {
            self.active -= 1;
            self.emit(LotEvent::ActiveChanged(self.active));
        }
        self.active
    }

    fn emit(&self, event: LotEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
