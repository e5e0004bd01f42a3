//! Annotation Canvas
//!
//! Vector annotations over one base image. Pointer gestures drive an explicit
//! interaction state machine; `save` rasterizes the action list at native resolution
//! with the same painter the preview uses.

pub mod action;
pub mod raster;
pub mod text;

pub use action::{AnnotationAction, Color};
pub use raster::Rasterizer;
pub use text::TextFont;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::capture::encode::{FrameEncoder, JpegFrameEncoder, PngFrameEncoder};
use crate::config::AnnotationSettings;
use crate::error::{EngineError, Result};
use crate::geometry::{Corner, NormPoint, NormRect};
use crate::lots::ImageFile;

/// What a pointer press on empty space creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Freehand strokes
    #[default]
    Draw,
    /// Tap to place text
    Text,
    /// Drag out a rectangle
    Box,
}

/// Observable interaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Idle,
    Creating,
    Dragging,
    Resizing,
    EditingText,
}

#[derive(Debug, Clone)]
enum Interaction {
    Idle,
    Creating {
        tool: Tool,
        start: NormPoint,
        current: NormPoint,
        points: Vec<NormPoint>,
        moved: bool,
    },
    Dragging {
        index: usize,
        start: NormPoint,
        original: AnnotationAction,
        moved: bool,
    },
    Resizing {
        index: usize,
        corner: Corner,
        original: AnnotationAction,
    },
    EditingText {
        anchor: NormPoint,
        target: Option<usize>,
        buffer: String,
    },
}

impl Interaction {
    fn kind(&self) -> InteractionKind {
        match self {
            Interaction::Idle => InteractionKind::Idle,
            Interaction::Creating { .. } => InteractionKind::Creating,
            Interaction::Dragging { .. } => InteractionKind::Dragging,
            Interaction::Resizing { .. } => InteractionKind::Resizing,
            Interaction::EditingText { .. } => InteractionKind::EditingText,
        }
    }
}

/// Editable annotation layer over one image
pub struct AnnotationCanvas {
    source: ImageFile,
    base: RgbaImage,
    actions: Vec<AnnotationAction>,
    tool: Tool,
    interaction: Interaction,
    selected: Option<usize>,
    settings: AnnotationSettings,
    rasterizer: Rasterizer,
}

impl AnnotationCanvas {
    /// Decode `file` and start an empty annotation session over it
    pub fn open(file: ImageFile, settings: &AnnotationSettings, font: TextFont) -> Result<Self> {
        let base = image::load_from_memory(&file.data)
            .map_err(|e| EngineError::InvalidImage(format!("{}: {}", file.name, e)))?
            .to_rgba8();
        if base.width() == 0 || base.height() == 0 {
            return Err(EngineError::InvalidImage(format!("{}: empty image", file.name)));
        }
        info!("Annotating {} ({}x{})", file.name, base.width(), base.height());

        let rasterizer = Rasterizer::new(
            font,
            settings.text_wrap_fraction,
            Color(settings.box_color),
            settings.box_width,
        );
        Ok(Self {
            source: file,
            base,
            actions: Vec::new(),
            tool: Tool::default(),
            interaction: Interaction::Idle,
            selected: None,
            settings: settings.clone(),
            rasterizer,
        })
    }

    /// The untouched original
    pub fn source(&self) -> &ImageFile {
        &self.source
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.base.dimensions()
    }

    pub fn actions(&self) -> &[AnnotationAction] {
        &self.actions
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch tools. A pending text edit is committed, an unfinished creation is dropped.
    pub fn set_tool(&mut self, tool: Tool) {
        match self.interaction.kind() {
            InteractionKind::EditingText => {
                self.commit_text();
            }
            InteractionKind::Creating => self.interaction = Interaction::Idle,
            _ => {}
        }
        self.tool = tool;
    }

    pub fn interaction(&self) -> InteractionKind {
        self.interaction.kind()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Current contents of the text entry, if one is open
    pub fn text_buffer(&self) -> Option<&str> {
        match &self.interaction {
            Interaction::EditingText { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    /// The action being created, for rubber-band rendering
    pub fn pending_action(&self) -> Option<AnnotationAction> {
        match &self.interaction {
            Interaction::Creating {
                tool: Tool::Draw,
                points,
                moved: true,
                ..
            } => Some(self.stroke(points.clone())),
            Interaction::Creating {
                tool: Tool::Box,
                start,
                current,
                moved: true,
                ..
            } => Some(Self::region(NormRect::from_corners(*start, *current))),
            Interaction::EditingText {
                anchor,
                target: None,
                buffer,
            } => Some(self.text_block(buffer.clone(), *anchor)),
            _ => None,
        }
    }

    /// Index of the topmost movable action under `p`
    pub fn hit_test(&self, p: NormPoint) -> Option<usize> {
        self.actions
            .iter()
            .enumerate()
            .rev()
            .find(|(_, action)| self.bounds_of(action).is_some_and(|b| b.contains(p)))
            .map(|(i, _)| i)
    }

    /// Normalized bounds of a movable action
    pub fn bounds_of(&self, action: &AnnotationAction) -> Option<NormRect> {
        let (w, h) = self.base.dimensions();
        match action {
            AnnotationAction::Stroke { .. } => None,
            AnnotationAction::TextBlock {
                text,
                font_size,
                origin,
                ..
            } => Some(self.rasterizer.text_bounds(text, *font_size, *origin, w, h)),
            AnnotationAction::BoxRegion { .. } => action.region(),
        }
    }

    // ---- pointer gestures ----

    pub fn pointer_down(&mut self, p: NormPoint) {
        match self.interaction.kind() {
            InteractionKind::Idle => {}
            InteractionKind::EditingText => {
                self.commit_text();
            }
            other => {
                debug!("Ignoring pointer down while {:?}", other);
                return;
            }
        }

        if let Some((index, handle)) = self.press_target(p) {
            self.selected = Some(index);
            let original = self.actions[index].clone();
            self.interaction = match handle {
                Some(corner) => Interaction::Resizing {
                    index,
                    corner,
                    original,
                },
                None => Interaction::Dragging {
                    index,
                    start: p,
                    original,
                    moved: false,
                },
            };
        } else {
            self.selected = None;
            self.interaction = Interaction::Creating {
                tool: self.tool,
                start: p,
                current: p,
                points: vec![p],
                moved: false,
            };
        }
    }

    pub fn pointer_move(&mut self, p: NormPoint) {
        let threshold = self.settings.move_threshold;
        let mut update = None;
        match &mut self.interaction {
            Interaction::Creating {
                tool,
                start,
                current,
                points,
                moved,
            } => {
                *current = p;
                if !*moved && start.distance(p) > threshold {
                    *moved = true;
                }
                if *tool == Tool::Draw {
                    points.push(p);
                }
            }
            Interaction::Dragging {
                index,
                start,
                original,
                moved,
            } => {
                if !*moved && start.distance(p) > threshold {
                    *moved = true;
                }
                if *moved {
                    update = Some((*index, original.clone(), p.x - start.x, p.y - start.y));
                }
            }
            Interaction::Resizing {
                index,
                corner,
                original,
            } => {
                if let (Some(rect), Some(action)) = (original.region(), self.actions.get_mut(*index)) {
                    action.set_region(rect.resized_from(*corner, p));
                }
            }
            Interaction::Idle | Interaction::EditingText { .. } => {}
        }

        if let Some((index, original, dx, dy)) = update {
            self.translate_from(index, &original, dx, dy);
        }
    }

    pub fn pointer_up(&mut self, p: NormPoint) {
        self.pointer_move(p);
        match std::mem::replace(&mut self.interaction, Interaction::Idle) {
            Interaction::Creating {
                tool,
                start,
                current,
                points,
                moved,
            } => match (tool, moved) {
                (Tool::Draw, true) => self.commit(self.stroke(points)),
                (Tool::Box, true) => self.commit(Self::region(NormRect::from_corners(start, current))),
                (Tool::Text, false) => {
                    self.interaction = Interaction::EditingText {
                        anchor: start,
                        target: None,
                        buffer: String::new(),
                    };
                }
                _ => debug!("Tap with {:?} tool ignored", tool),
            },
            Interaction::Dragging {
                index,
                moved: false,
                original: AnnotationAction::TextBlock { text, origin, .. },
                ..
            } => {
                self.interaction = Interaction::EditingText {
                    anchor: origin,
                    target: Some(index),
                    buffer: text,
                };
            }
            Interaction::Dragging { .. } | Interaction::Resizing { .. } | Interaction::Idle => {}
            editing @ Interaction::EditingText { .. } => self.interaction = editing,
        }
    }

    /// Abort the current gesture, restoring a dragged or resized action
    pub fn pointer_cancel(&mut self) {
        match std::mem::replace(&mut self.interaction, Interaction::Idle) {
            Interaction::Dragging { index, original, .. } | Interaction::Resizing { index, original, .. } => {
                if let Some(slot) = self.actions.get_mut(index) {
                    *slot = original;
                }
            }
            editing @ Interaction::EditingText { .. } => self.interaction = editing,
            _ => {}
        }
    }

    // ---- text entry ----

    /// Replace the text entry contents. Returns false when no entry is open.
    pub fn set_text(&mut self, text: &str) -> bool {
        match &mut self.interaction {
            Interaction::EditingText { buffer, .. } => {
                buffer.clear();
                buffer.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// Close the text entry. Blank text is discarded; blanking an existing block deletes it.
    /// Returns the index of the committed block.
    pub fn commit_text(&mut self) -> Option<usize> {
        if self.interaction.kind() != InteractionKind::EditingText {
            return None;
        }
        let Interaction::EditingText { anchor, target, buffer } = std::mem::replace(&mut self.interaction, Interaction::Idle)
        else {
            return None;
        };
        let blank = buffer.trim().is_empty();
        match target {
            Some(index) if blank => {
                debug!("Text block {} emptied, removing", index);
                self.delete(index);
                None
            }
            Some(index) => {
                if let Some(AnnotationAction::TextBlock { text, .. }) = self.actions.get_mut(index) {
                    *text = buffer;
                }
                Some(index)
            }
            None if blank => {
                debug!("Discarding blank text");
                None
            }
            None => {
                self.commit(self.text_block(buffer, anchor));
                Some(self.actions.len() - 1)
            }
        }
    }

    /// Close the text entry without changes
    pub fn cancel_text(&mut self) {
        if let Interaction::EditingText { .. } = self.interaction {
            self.interaction = Interaction::Idle;
        }
    }

    // ---- list edits ----

    /// Pop the last committed action. No-op on an empty list.
    pub fn undo(&mut self) -> Option<AnnotationAction> {
        self.interaction = Interaction::Idle;
        let popped = self.actions.pop();
        if self.selected.is_some_and(|s| s >= self.actions.len()) {
            self.selected = None;
        }
        popped
    }

    pub fn clear(&mut self) {
        self.interaction = Interaction::Idle;
        self.selected = None;
        self.actions.clear();
    }

    pub fn delete(&mut self, index: usize) -> Option<AnnotationAction> {
        if index >= self.actions.len() {
            return None;
        }
        if !matches!(self.interaction, Interaction::Idle | Interaction::Creating { .. }) {
            self.interaction = Interaction::Idle;
        }
        self.selected = match self.selected {
            Some(s) if s == index => None,
            Some(s) if s > index => Some(s - 1),
            other => other,
        };
        Some(self.actions.remove(index))
    }

    pub fn delete_selected(&mut self) -> Option<AnnotationAction> {
        self.selected.and_then(|index| self.delete(index))
    }

    /// Replace the action list (e.g. a replayed JSON document). Uncommittable entries are dropped.
    pub fn set_actions(&mut self, actions: Vec<AnnotationAction>) {
        self.clear();
        self.actions = actions.into_iter().filter(|a| a.is_committable()).collect();
    }

    pub fn actions_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.actions)
    }

    /// Load an action list from a JSON file
    pub fn load_actions(&mut self, path: &Path) -> anyhow::Result<usize> {
        use anyhow::Context;
        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read actions: {:?}", path))?;
        let actions: Vec<AnnotationAction> =
            serde_json::from_str(&content).with_context(|| format!("Invalid action list: {:?}", path))?;
        self.set_actions(actions);
        Ok(self.actions.len())
    }

    // ---- output ----

    /// The base image with every action painted at native resolution
    pub fn rasterize(&self) -> RgbaImage {
        let mut out = self.base.clone();
        self.rasterizer.paint(&mut out, &self.actions);
        out
    }

    /// Same painter as `rasterize`, on the base image scaled to `width` x `height`
    pub fn render_preview(&self, width: u32, height: u32) -> RgbaImage {
        let mut out = imageops::resize(&self.base, width.max(1), height.max(1), FilterType::Triangle);
        self.rasterizer.paint(&mut out, &self.actions);
        if let Some(pending) = self.pending_action() {
            self.rasterizer.paint(&mut out, std::slice::from_ref(&pending));
        }
        out
    }

    /// Commit any open text entry, then encode the annotated image as a new file
    pub async fn save(&mut self) -> Result<ImageFile> {
        if self.interaction.kind() == InteractionKind::EditingText {
            self.commit_text();
        }
        self.interaction = Interaction::Idle;

        let encoder: Arc<dyn FrameEncoder> = if self.source.mime == "image/jpeg" {
            Arc::new(JpegFrameEncoder::default())
        } else {
            Arc::new(PngFrameEncoder)
        };
        let base = self.base.clone();
        let actions = self.actions.clone();
        let rasterizer = self.rasterizer.clone();

        let encoded = tokio::task::spawn_blocking(move || {
            let mut out = base;
            rasterizer.paint(&mut out, &actions);
            encoder.encode(&out)
        })
        .await
        .map_err(|e| EngineError::EncodingFailed(e.to_string()))??;

        let stem = Path::new(&self.source.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "annotated".to_string());
        info!("Saved {} annotations onto {}", self.actions.len(), self.source.name);
        Ok(ImageFile::new(
            encoded.data,
            format!("{}.{}", stem, encoded.extension),
            encoded.mime,
        ))
    }

    /// Discard every action and hand back the untouched original
    pub fn cancel(self) -> ImageFile {
        debug!("Annotation of {} cancelled, {} actions dropped", self.source.name, self.actions.len());
        self.source
    }

    // ---- helpers ----

    fn commit(&mut self, action: AnnotationAction) {
        if action.is_committable() {
            self.actions.push(action);
            self.selected = Some(self.actions.len() - 1);
        } else {
            debug!("Dropping uncommittable action");
        }
    }

    fn stroke(&self, points: Vec<NormPoint>) -> AnnotationAction {
        AnnotationAction::Stroke {
            color: Color(self.settings.stroke_color),
            width: self.settings.stroke_width,
            points,
        }
    }

    fn text_block(&self, text: String, origin: NormPoint) -> AnnotationAction {
        AnnotationAction::TextBlock {
            color: Color(self.settings.text_color),
            font_size: self.settings.font_size,
            text,
            origin,
        }
    }

    fn region(rect: NormRect) -> AnnotationAction {
        AnnotationAction::BoxRegion {
            origin: rect.origin,
            size: rect.size,
        }
    }

    /// Topmost action under `p`, by its corner handle or its body. A handle of a
    /// lower box covered by a higher action does not win over that action.
    fn press_target(&self, p: NormPoint) -> Option<(usize, Option<Corner>)> {
        let tolerance = self.settings.handle_tolerance;
        self.actions.iter().enumerate().rev().find_map(|(i, action)| {
            if let Some(corner) = action.region().and_then(|rect| rect.handle_at(p, tolerance)) {
                return Some((i, Some(corner)));
            }
            self.bounds_of(action)
                .is_some_and(|b| b.contains(p))
                .then_some((i, None))
        })
    }

    /// Move `index` to `original` shifted by (dx, dy), kept fully inside the image
    fn translate_from(&mut self, index: usize, original: &AnnotationAction, dx: f32, dy: f32) {
        let Some(bounds) = self.bounds_of(original) else {
            return;
        };
        let moved = bounds.translated_within_unit(dx, dy);
        if let Some(action) = self.actions.get_mut(index) {
            action.set_origin(moved.origin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NormSize;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn png_file(w: u32, h: u32) -> ImageFile {
        let img = RgbaImage::from_pixel(w, h, WHITE);
        let encoded = PngFrameEncoder.encode(&img).unwrap();
        ImageFile::new(encoded.data, "car.png", encoded.mime)
    }

    fn canvas() -> AnnotationCanvas {
        AnnotationCanvas::open(png_file(100, 100), &AnnotationSettings::default(), TextFont::bundled().unwrap()).unwrap()
    }

    fn pt(x: f32, y: f32) -> NormPoint {
        NormPoint::new(x, y)
    }

    fn drag(canvas: &mut AnnotationCanvas, from: NormPoint, to: NormPoint) {
        canvas.pointer_down(from);
        canvas.pointer_move(to);
        canvas.pointer_up(to);
    }

    fn add_box(canvas: &mut AnnotationCanvas, a: NormPoint, b: NormPoint) {
        canvas.set_tool(Tool::Box);
        drag(canvas, a, b);
    }

    fn add_text(canvas: &mut AnnotationCanvas, at: NormPoint, text: &str) {
        canvas.set_tool(Tool::Text);
        canvas.pointer_down(at);
        canvas.pointer_up(at);
        assert!(canvas.set_text(text));
        canvas.commit_text();
    }

    #[test]
    fn test_open_rejects_garbage() {
        let file = ImageFile::new(vec![0, 1, 2, 3], "broken.jpg", "image/jpeg");
        let result = AnnotationCanvas::open(file, &AnnotationSettings::default(), TextFont::bundled().unwrap());
        assert!(matches!(result, Err(EngineError::InvalidImage(_))));
    }

    #[test]
    fn test_stroke_committed_after_threshold() {
        let mut canvas = canvas();
        canvas.pointer_down(pt(0.2, 0.2));
        assert_eq!(canvas.interaction(), InteractionKind::Creating);
        canvas.pointer_move(pt(0.25, 0.25));
        canvas.pointer_move(pt(0.3, 0.2));
        canvas.pointer_up(pt(0.35, 0.2));

        assert_eq!(canvas.interaction(), InteractionKind::Idle);
        match &canvas.actions()[..] {
            [AnnotationAction::Stroke { points, .. }] => assert_eq!(points.len(), 4),
            other => panic!("unexpected actions: {:?}", other),
        }
    }

    #[test]
    fn test_tap_in_draw_mode_creates_nothing() {
        let mut canvas = canvas();
        canvas.pointer_down(pt(0.5, 0.5));
        canvas.pointer_move(pt(0.505, 0.5));
        canvas.pointer_up(pt(0.505, 0.5));
        assert!(canvas.actions().is_empty());
        assert_eq!(canvas.interaction(), InteractionKind::Idle);
    }

    #[test]
    fn test_tap_in_text_mode_opens_entry() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Text);
        canvas.pointer_down(pt(0.4, 0.6));
        canvas.pointer_up(pt(0.4, 0.6));
        assert_eq!(canvas.interaction(), InteractionKind::EditingText);
        assert_eq!(canvas.text_buffer(), Some(""));

        canvas.set_text("dent");
        assert_eq!(canvas.commit_text(), Some(0));
        match &canvas.actions()[0] {
            AnnotationAction::TextBlock { text, origin, .. } => {
                assert_eq!(text, "dent");
                assert_eq!(*origin, pt(0.4, 0.6));
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_blank_text_discarded() {
        let mut canvas = canvas();
        add_text(&mut canvas, pt(0.3, 0.3), "   ");
        assert!(canvas.actions().is_empty());
        assert_eq!(canvas.interaction(), InteractionKind::Idle);
    }

    #[test]
    fn test_cancel_text_keeps_list() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Text);
        canvas.pointer_down(pt(0.3, 0.3));
        canvas.pointer_up(pt(0.3, 0.3));
        canvas.set_text("scratch");
        canvas.cancel_text();
        assert!(canvas.actions().is_empty());
        assert!(!canvas.set_text("late"));
    }

    #[test]
    fn test_tap_on_text_edits_it() {
        let mut canvas = canvas();
        add_text(&mut canvas, pt(0.2, 0.2), "hello");
        canvas.set_tool(Tool::Draw);

        canvas.pointer_down(pt(0.21, 0.21));
        canvas.pointer_up(pt(0.21, 0.21));
        assert_eq!(canvas.text_buffer(), Some("hello"));

        canvas.set_text("hello world");
        canvas.commit_text();
        assert_eq!(canvas.actions().len(), 1);
        assert!(matches!(&canvas.actions()[0], AnnotationAction::TextBlock { text, .. } if text == "hello world"));

        // Blanking an existing block removes it
        canvas.pointer_down(pt(0.21, 0.21));
        canvas.pointer_up(pt(0.21, 0.21));
        canvas.set_text("");
        canvas.commit_text();
        assert!(canvas.actions().is_empty());
    }

    #[test]
    fn test_box_created_from_any_direction() {
        let mut canvas = canvas();
        add_box(&mut canvas, pt(0.6, 0.7), pt(0.2, 0.3));
        let rect = canvas.actions()[0].region().unwrap();
        assert!((rect.origin.x - 0.2).abs() < 1e-6);
        assert!((rect.origin.y - 0.3).abs() < 1e-6);
        assert!((rect.size.width - 0.4).abs() < 1e-6);
        assert!(rect.size.height >= 0.0);
    }

    fn overlapping_boxes() -> Vec<AnnotationAction> {
        vec![
            AnnotationAction::BoxRegion {
                origin: pt(0.1, 0.1),
                size: NormSize::new(0.4, 0.4),
            },
            AnnotationAction::BoxRegion {
                origin: pt(0.3, 0.3),
                size: NormSize::new(0.5, 0.5),
            },
        ]
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut canvas = canvas();
        add_box(&mut canvas, pt(0.1, 0.1), pt(0.6, 0.6));
        // Second box starts outside the first so the press creates instead of dragging
        add_box(&mut canvas, pt(0.8, 0.8), pt(0.3, 0.3));
        assert_eq!(canvas.actions().len(), 2);
        assert_eq!(canvas.hit_test(pt(0.45, 0.45)), Some(1));
        assert_eq!(canvas.hit_test(pt(0.15, 0.15)), Some(0));
        assert_eq!(canvas.hit_test(pt(0.95, 0.05)), None);
    }

    #[test]
    fn test_press_on_covered_handle_drags_topmost() {
        let mut canvas = canvas();
        canvas.set_actions(overlapping_boxes());

        // (0.5, 0.5) is the lower box's corner but lies inside the upper box
        canvas.pointer_down(pt(0.5, 0.5));
        assert_eq!(canvas.interaction(), InteractionKind::Dragging);
        assert_eq!(canvas.selected(), Some(1));
        canvas.pointer_move(pt(0.55, 0.55));
        canvas.pointer_up(pt(0.55, 0.55));
        assert_eq!(canvas.actions()[0], overlapping_boxes()[0]);
        assert!((canvas.actions()[1].region().unwrap().origin.x - 0.35).abs() < 1e-5);

        // An uncovered corner of the lower box still resizes it
        canvas.set_actions(overlapping_boxes());
        canvas.pointer_down(pt(0.1, 0.1));
        assert_eq!(canvas.interaction(), InteractionKind::Resizing);
        assert_eq!(canvas.selected(), Some(0));
        canvas.pointer_cancel();
    }

    #[test]
    fn test_strokes_are_not_hit() {
        let mut canvas = canvas();
        drag(&mut canvas, pt(0.1, 0.5), pt(0.9, 0.5));
        assert_eq!(canvas.hit_test(pt(0.5, 0.5)), None);
    }

    #[test]
    fn test_drag_box_clamped_to_image() {
        let mut canvas = canvas();
        add_box(&mut canvas, pt(0.4, 0.4), pt(0.6, 0.6));
        drag(&mut canvas, pt(0.5, 0.5), pt(1.0, 1.0));

        let rect = canvas.actions()[0].region().unwrap();
        assert!((rect.right() - 1.0).abs() < 1e-5);
        assert!((rect.bottom() - 1.0).abs() < 1e-5);
        assert!((rect.size.width - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_drag_text_clamped_to_image() {
        let mut canvas = canvas();
        add_text(&mut canvas, pt(0.5, 0.5), "hello");
        canvas.pointer_down(pt(0.51, 0.51));
        canvas.pointer_move(pt(0.0, 0.0));
        canvas.pointer_up(pt(0.0, 0.0));

        let origin = canvas.actions()[0].origin().unwrap();
        assert_eq!(origin, pt(0.0, 0.0));
        assert_eq!(canvas.interaction(), InteractionKind::Idle);
    }

    #[test]
    fn test_resize_from_corner_handle() {
        let mut canvas = canvas();
        add_box(&mut canvas, pt(0.2, 0.2), pt(0.5, 0.5));

        canvas.pointer_down(pt(0.5, 0.5));
        assert_eq!(canvas.interaction(), InteractionKind::Resizing);
        canvas.pointer_move(pt(0.7, 0.8));
        canvas.pointer_up(pt(0.7, 0.8));

        let rect = canvas.actions()[0].region().unwrap();
        assert!((rect.origin.x - 0.2).abs() < 1e-6);
        assert!((rect.right() - 0.7).abs() < 1e-6);
        assert!((rect.bottom() - 0.8).abs() < 1e-6);

        // Dragging past the fixed corner flips instead of going negative
        canvas.pointer_down(pt(0.7, 0.8));
        canvas.pointer_move(pt(0.1, 0.1));
        canvas.pointer_up(pt(0.1, 0.1));
        let rect = canvas.actions()[0].region().unwrap();
        assert!((rect.origin.x - 0.1).abs() < 1e-6);
        assert!(rect.size.width >= 0.0 && rect.size.height >= 0.0);
    }

    #[test]
    fn test_pointer_cancel_restores_drag() {
        let mut canvas = canvas();
        add_box(&mut canvas, pt(0.4, 0.4), pt(0.6, 0.6));
        let before = canvas.actions()[0].clone();
        canvas.pointer_down(pt(0.5, 0.5));
        canvas.pointer_move(pt(0.7, 0.7));
        canvas.pointer_cancel();
        assert_eq!(canvas.actions()[0], before);
    }

    #[test]
    fn test_second_press_during_drag_ignored() {
        let mut canvas = canvas();
        add_box(&mut canvas, pt(0.4, 0.4), pt(0.6, 0.6));
        canvas.pointer_down(pt(0.5, 0.5));
        canvas.pointer_down(pt(0.9, 0.9));
        assert_eq!(canvas.interaction(), InteractionKind::Dragging);
        canvas.pointer_up(pt(0.5, 0.5));
        assert_eq!(canvas.actions().len(), 1);
    }

    #[test]
    fn test_undo_is_lifo() {
        let mut canvas = canvas();
        drag(&mut canvas, pt(0.1, 0.1), pt(0.2, 0.2));
        drag(&mut canvas, pt(0.3, 0.3), pt(0.4, 0.4));
        add_text(&mut canvas, pt(0.7, 0.7), "t1");
        assert_eq!(canvas.actions().len(), 3);

        let popped = canvas.undo().unwrap();
        assert!(matches!(popped, AnnotationAction::TextBlock { .. }));
        assert_eq!(canvas.actions().len(), 2);
        assert!(canvas.actions().iter().all(|a| matches!(a, AnnotationAction::Stroke { .. })));

        canvas.undo();
        canvas.undo();
        assert!(canvas.undo().is_none());
        assert!(canvas.actions().is_empty());
    }

    #[test]
    fn test_delete_selected_and_clear() {
        let mut canvas = canvas();
        add_box(&mut canvas, pt(0.1, 0.1), pt(0.3, 0.3));
        add_box(&mut canvas, pt(0.5, 0.5), pt(0.7, 0.7));
        assert_eq!(canvas.selected(), Some(1));

        canvas.pointer_down(pt(0.2, 0.2));
        canvas.pointer_up(pt(0.2, 0.2));
        assert_eq!(canvas.selected(), Some(0));
        canvas.delete_selected();
        assert_eq!(canvas.actions().len(), 1);
        assert_eq!(canvas.selected(), None);

        assert!(canvas.delete(7).is_none());
        canvas.clear();
        assert!(canvas.actions().is_empty());
    }

    #[test]
    fn test_set_actions_drops_empty_strokes() {
        let mut canvas = canvas();
        canvas.set_actions(vec![
            AnnotationAction::Stroke {
                color: Color::RED,
                width: 0.01,
                points: vec![],
            },
            AnnotationAction::BoxRegion {
                origin: pt(0.1, 0.1),
                size: NormSize::new(0.2, 0.2),
            },
        ]);
        assert_eq!(canvas.actions().len(), 1);
    }

    #[test]
    fn test_preview_matches_native_raster() {
        let mut canvas = canvas();
        add_box(&mut canvas, pt(0.2, 0.2), pt(0.8, 0.8));
        let native = canvas.rasterize();
        let preview = canvas.render_preview(100, 100);
        assert_eq!(native, preview);

        let small = canvas.render_preview(50, 50);
        assert_eq!(*small.get_pixel(10, 25), Color(AnnotationSettings::default().box_color).to_rgba());
    }

    #[test]
    fn test_cancel_returns_original() {
        let mut canvas = canvas();
        drag(&mut canvas, pt(0.1, 0.1), pt(0.9, 0.9));
        let original = png_file(100, 100);
        assert_eq!(canvas.cancel(), original);
    }

    #[tokio::test]
    async fn test_save_then_replay_is_stable() {
        let mut canvas = canvas();
        drag(&mut canvas, pt(0.1, 0.1), pt(0.9, 0.4));
        add_box(&mut canvas, pt(0.3, 0.5), pt(0.7, 0.9));
        let actions = canvas.actions().to_vec();

        let saved = canvas.save().await.unwrap();
        assert_eq!(saved.name, "car.png");
        assert_eq!(saved.mime, "image/png");
        assert_ne!(saved, png_file(100, 100));

        let mut reopened =
            AnnotationCanvas::open(saved.clone(), &AnnotationSettings::default(), TextFont::bundled().unwrap()).unwrap();
        let first = reopened.rasterize();
        reopened.set_actions(actions);
        let second = reopened.rasterize();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_save_commits_open_text_entry() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Text);
        canvas.pointer_down(pt(0.5, 0.5));
        canvas.pointer_up(pt(0.5, 0.5));
        canvas.set_text("note");
        canvas.save().await.unwrap();
        assert_eq!(canvas.actions().len(), 1);
    }

    #[tokio::test]
    async fn test_text_changes_saved_pixels() {
        let mut canvas = AnnotationCanvas::open(
            png_file(400, 300),
            &AnnotationSettings::default(),
            TextFont::bundled().unwrap(),
        )
        .unwrap();
        add_text(&mut canvas, pt(0.1, 0.4), "DENT ON DOOR");
        assert_eq!(canvas.actions().len(), 1);

        let blank = RgbaImage::from_pixel(400, 300, WHITE);
        let painted = canvas.rasterize();
        assert_ne!(painted, blank);

        let saved = canvas.save().await.unwrap();
        let decoded = image::load_from_memory(&saved.data).unwrap().to_rgba8();
        let changed = decoded.pixels().filter(|p| **p != WHITE).count();
        assert!(changed > 50, "only {} pixels changed", changed);
        assert_eq!(decoded, painted);
    }

    #[test]
    fn test_actions_json_roundtrip_via_file() {
        let mut canvas = canvas();
        add_box(&mut canvas, pt(0.1, 0.1), pt(0.4, 0.4));
        let json = canvas.actions_json().unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), json).unwrap();

        let mut other = self::canvas();
        assert_eq!(other.load_actions(file.path()).unwrap(), 1);
        assert_eq!(other.actions(), canvas.actions());
    }
}
