//! Vector annotation actions
//!
//! Coordinates are normalized to the base image; widths and font sizes are fractions
//! of the image width, so an action list renders the same at any resolution.

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::geometry::{NormPoint, NormRect, NormSize};

/// RGBA paint color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const RED: Color = Color([230, 30, 30, 255]);

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba(self.0)
    }
}

/// One drawable item, painted in list order (later items on top)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationAction {
    /// Freehand polyline
    Stroke {
        color: Color,
        width: f32,
        points: Vec<NormPoint>,
    },
    /// Wrapped text anchored at its top-left corner
    TextBlock {
        color: Color,
        font_size: f32,
        text: String,
        origin: NormPoint,
    },
    /// Axis-aligned rectangle outline
    BoxRegion { origin: NormPoint, size: NormSize },
}

impl AnnotationAction {
    /// Whether this action is worth keeping: strokes need points, text needs non-blank content
    pub fn is_committable(&self) -> bool {
        match self {
            AnnotationAction::Stroke { points, .. } => !points.is_empty(),
            AnnotationAction::TextBlock { text, .. } => !text.trim().is_empty(),
            AnnotationAction::BoxRegion { .. } => true,
        }
    }

    /// Strokes are not selectable once drawn; text and boxes can be moved
    pub fn is_movable(&self) -> bool {
        !matches!(self, AnnotationAction::Stroke { .. })
    }

    pub fn origin(&self) -> Option<NormPoint> {
        match self {
            AnnotationAction::Stroke { .. } => None,
            AnnotationAction::TextBlock { origin, .. } => Some(*origin),
            AnnotationAction::BoxRegion { origin, .. } => Some(*origin),
        }
    }

    pub(crate) fn set_origin(&mut self, new_origin: NormPoint) {
        match self {
            AnnotationAction::Stroke { .. } => {}
            AnnotationAction::TextBlock { origin, .. } => *origin = new_origin,
            AnnotationAction::BoxRegion { origin, .. } => *origin = new_origin,
        }
    }

    /// The rectangle of a box region
    pub fn region(&self) -> Option<NormRect> {
        match self {
            AnnotationAction::BoxRegion { origin, size } => Some(NormRect::new(*origin, *size)),
            _ => None,
        }
    }

    pub(crate) fn set_region(&mut self, rect: NormRect) {
        if let AnnotationAction::BoxRegion { origin, size } = self {
            *origin = rect.origin;
            *size = rect.size;
        }
    }
}
