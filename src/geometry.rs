//! Coordinate math shared by capture cropping, interactive annotation and rasterization
//!
//! All annotation positions are stored normalized (0.0-1.0 of image width/height)
//! so the same action list renders identically at preview and native resolution.

use serde::{Deserialize, Serialize};

/// A position as a fraction of image width/height
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormPoint {
    pub x: f32,
    pub y: f32,
}

impl NormPoint {
    /// Create a point, clamping both axes into [0, 1]
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    /// Euclidean distance in normalized units
    pub fn distance(&self, other: NormPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Map to pixel coordinates on an image of the given size
    pub fn to_pixels(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }

    /// Map pixel coordinates back to a normalized point (clamped)
    pub fn from_pixels(px: f32, py: f32, width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::default();
        }
        Self::new(px / width as f32, py / height as f32)
    }
}

/// A size as a fraction of image width/height
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormSize {
    pub width: f32,
    pub height: f32,
}

impl NormSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: clamp_unit(width),
            height: clamp_unit(height),
        }
    }
}

/// Axis-aligned rectangle in normalized space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormRect {
    pub origin: NormPoint,
    pub size: NormSize,
}

/// Which corner of a rectangle a resize handle sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// The corner diagonally across, which stays fixed while this one is dragged
    pub fn opposite(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopRight,
            Corner::BottomRight => Corner::TopLeft,
        }
    }
}

impl NormRect {
    pub fn new(origin: NormPoint, size: NormSize) -> Self {
        let mut rect = Self { origin, size };
        rect.clamp_to_unit();
        rect
    }

    /// Build a rectangle spanning two arbitrary points (drag start/end in any direction)
    pub fn from_corners(a: NormPoint, b: NormPoint) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        let max_x = a.x.max(b.x);
        let max_y = a.y.max(b.y);
        Self::new(
            NormPoint::new(min_x, min_y),
            NormSize::new(max_x - min_x, max_y - min_y),
        )
    }

    pub fn right(&self) -> f32 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> f32 {
        self.origin.y + self.size.height
    }

    pub fn corner(&self, corner: Corner) -> NormPoint {
        match corner {
            Corner::TopLeft => self.origin,
            Corner::TopRight => NormPoint::new(self.right(), self.origin.y),
            Corner::BottomLeft => NormPoint::new(self.origin.x, self.bottom()),
            Corner::BottomRight => NormPoint::new(self.right(), self.bottom()),
        }
    }

    /// Inclusive point-in-rectangle test
    pub fn contains(&self, p: NormPoint) -> bool {
        p.x >= self.origin.x && p.x <= self.right() && p.y >= self.origin.y && p.y <= self.bottom()
    }

    /// Grow on every side by `margin` (normalized), used for forgiving hit tests
    pub fn expand(&self, margin: f32) -> NormRect {
        NormRect {
            origin: NormPoint {
                x: self.origin.x - margin,
                y: self.origin.y - margin,
            },
            size: NormSize {
                width: self.size.width + margin * 2.0,
                height: self.size.height + margin * 2.0,
            },
        }
    }

    /// Translate by (dx, dy), keeping the whole rectangle inside [0, 1]
    pub fn translated_within_unit(&self, dx: f32, dy: f32) -> NormRect {
        let max_x = (1.0 - self.size.width).max(0.0);
        let max_y = (1.0 - self.size.height).max(0.0);
        NormRect {
            origin: NormPoint {
                x: (self.origin.x + dx).clamp(0.0, max_x),
                y: (self.origin.y + dy).clamp(0.0, max_y),
            },
            size: self.size,
        }
    }

    /// Recompute the rectangle while `dragged` corner follows the pointer and the opposite corner stays put
    pub fn resized_from(&self, dragged: Corner, pointer: NormPoint) -> NormRect {
        let fixed = self.corner(dragged.opposite());
        NormRect::from_corners(fixed, pointer)
    }

    /// Which corner handle (if any) lies within `tolerance` of `p`
    pub fn handle_at(&self, p: NormPoint, tolerance: f32) -> Option<Corner> {
        Corner::ALL
            .into_iter()
            .find(|c| self.corner(*c).distance(p) <= tolerance)
    }

    fn clamp_to_unit(&mut self) {
        self.origin = NormPoint::new(self.origin.x, self.origin.y);
        self.size.width = self.size.width.max(0.0).min(1.0 - self.origin.x);
        self.size.height = self.size.height.max(0.0).min(1.0 - self.origin.y);
    }
}

/// Pixel-space rectangle, used for crop regions on raw frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn aspect(&self) -> f32 {
        if self.height <= 0.0 {
            0.0
        } else {
            self.width / self.height
        }
    }

    /// Round to integer pixel bounds that stay inside a `frame_w` x `frame_h` frame
    pub fn to_pixel_bounds(&self, frame_w: u32, frame_h: u32) -> (u32, u32, u32, u32) {
        let x = (self.x.round().max(0.0) as u32).min(frame_w.saturating_sub(1));
        let y = (self.y.round().max(0.0) as u32).min(frame_h.saturating_sub(1));
        let w = (self.width.round() as u32).clamp(1, frame_w - x);
        let h = (self.height.round() as u32).clamp(1, frame_h - y);
        (x, y, w, h)
    }
}

/// Compute the largest centered crop of aspect `target_aspect` (width/height) inside a
/// `frame_w` x `frame_h` frame, then shrink it around the center by `zoom`.
///
/// `zoom` is clamped to [1, 5]. A non-positive or non-finite aspect falls back to the frame's own.
pub fn crop_for_aspect(frame_w: u32, frame_h: u32, target_aspect: f32, zoom: f32) -> PixelRect {
    let fw = frame_w as f32;
    let fh = frame_h as f32;
    let zoom = clamp_zoom(zoom);
    let aspect = if target_aspect.is_finite() && target_aspect > 0.0 {
        target_aspect
    } else if fh > 0.0 {
        fw / fh
    } else {
        1.0
    };

    let (base_w, base_h) = if fh > 0.0 && fw / fh > aspect {
        (fh * aspect, fh)
    } else {
        (fw, fw / aspect)
    };

    let width = base_w / zoom;
    let height = base_h / zoom;

    PixelRect {
        x: (fw - width) / 2.0,
        y: (fh - height) / 2.0,
        width,
        height,
    }
}

/// Output dimensions for a capture whose long edge is fixed at `long_edge` pixels
pub fn output_size_for_aspect(target_aspect: f32, long_edge: u32) -> (u32, u32) {
    let long = long_edge.max(1) as f32;
    if target_aspect >= 1.0 {
        (long as u32, ((long / target_aspect).round() as u32).max(1))
    } else {
        (((long * target_aspect).round() as u32).max(1), long as u32)
    }
}

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 5.0;

/// Clamp a zoom factor into the supported [1, 5] range
pub fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_nan() {
        MIN_ZOOM
    } else {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    }
}

/// Clamp into [0, 1]; NaN maps to 0
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Distance from `p` to the segment `a`-`b`, all in normalized units
pub fn point_to_segment_distance(p: NormPoint, a: NormPoint, b: NormPoint) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    let proj = NormPoint {
        x: a.x + abx * t,
        y: a.y + aby * t,
    };
    p.distance(proj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_point_clamps() {
        let p = NormPoint::new(-0.5, 1.7);
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 1.0);
        let nan = NormPoint::new(f32::NAN, 0.5);
        assert_eq!(nan.x, 0.0);
    }

    #[test]
    fn test_pixel_mapping() {
        let p = NormPoint::new(0.25, 0.5);
        let (px, py) = p.to_pixels(800, 600);
        assert!((px - 200.0).abs() < 0.001);
        assert!((py - 300.0).abs() < 0.001);

        let back = NormPoint::from_pixels(px, py, 800, 600);
        assert!((back.x - 0.25).abs() < 0.001);
        assert!((back.y - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_rect_from_corners_reversed() {
        // Dragged from bottom-right to top-left
        let rect = NormRect::from_corners(NormPoint::new(0.6, 0.8), NormPoint::new(0.2, 0.3));
        assert!((rect.origin.x - 0.2).abs() < 0.001);
        assert!((rect.origin.y - 0.3).abs() < 0.001);
        assert!((rect.size.width - 0.4).abs() < 0.001);
        assert!((rect.size.height - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_rect_contains_and_expand() {
        let rect = NormRect::from_corners(NormPoint::new(0.2, 0.2), NormPoint::new(0.4, 0.4));
        assert!(rect.contains(NormPoint::new(0.3, 0.3)));
        assert!(rect.contains(NormPoint::new(0.2, 0.4)));
        assert!(!rect.contains(NormPoint::new(0.41, 0.3)));
        assert!(rect.expand(0.02).contains(NormPoint::new(0.41, 0.3)));
    }

    #[test]
    fn test_translate_stays_in_bounds() {
        let rect = NormRect::from_corners(NormPoint::new(0.7, 0.7), NormPoint::new(0.9, 0.9));
        let moved = rect.translated_within_unit(0.5, -2.0);
        assert!((moved.origin.x - 0.8).abs() < 0.001);
        assert_eq!(moved.origin.y, 0.0);
        assert!((moved.size.width - 0.2).abs() < 0.001);
        assert!(moved.right() <= 1.0 + 1e-6);
    }

    #[test]
    fn test_resize_keeps_opposite_corner_fixed() {
        let rect = NormRect::from_corners(NormPoint::new(0.2, 0.2), NormPoint::new(0.5, 0.5));
        let resized = rect.resized_from(Corner::BottomRight, NormPoint::new(0.7, 0.6));
        assert!((resized.origin.x - 0.2).abs() < 0.001);
        assert!((resized.origin.y - 0.2).abs() < 0.001);
        assert!((resized.right() - 0.7).abs() < 0.001);
        assert!((resized.bottom() - 0.6).abs() < 0.001);

        // Dragging a corner past the fixed one flips the rectangle instead of going negative
        let flipped = rect.resized_from(Corner::TopLeft, NormPoint::new(0.9, 0.9));
        assert!((flipped.origin.x - 0.5).abs() < 0.001);
        assert!(flipped.size.width >= 0.0 && flipped.size.height >= 0.0);
    }

    #[test]
    fn test_handle_hit() {
        let rect = NormRect::from_corners(NormPoint::new(0.2, 0.2), NormPoint::new(0.5, 0.5));
        assert_eq!(rect.handle_at(NormPoint::new(0.505, 0.495), 0.02), Some(Corner::BottomRight));
        assert_eq!(rect.handle_at(NormPoint::new(0.35, 0.35), 0.02), None);
    }

    #[test]
    fn test_crop_aspect_and_centering() {
        let frames = [(1920u32, 1080u32), (1080, 1920), (4000, 3000), (640, 640)];
        let aspects = [9.0 / 16.0, 16.0 / 9.0, 1.0, 4.0 / 3.0];
        let zooms = [1.0, 1.5, 2.0, 3.7, 5.0];

        for &(fw, fh) in &frames {
            for &aspect in &aspects {
                for &zoom in &zooms {
                    let crop = crop_for_aspect(fw, fh, aspect, zoom);
                    assert!((crop.aspect() - aspect).abs() < 1e-3, "aspect for {fw}x{fh} a={aspect} z={zoom}");
                    let (cx, cy) = crop.center();
                    assert!((cx - fw as f32 / 2.0).abs() < 1e-2);
                    assert!((cy - fh as f32 / 2.0).abs() < 1e-2);
                    assert!(crop.x >= -1e-3 && crop.y >= -1e-3);
                    assert!(crop.x + crop.width <= fw as f32 + 1e-3);
                    assert!(crop.y + crop.height <= fh as f32 + 1e-3);
                }
            }
        }
    }

    #[test]
    fn test_crop_is_maximal_at_zoom_one() {
        let crop = crop_for_aspect(1920, 1080, 9.0 / 16.0, 1.0);
        // Height-bound: the crop spans the full frame height
        assert!((crop.height - 1080.0).abs() < 1e-3);
        assert!((crop.width - 607.5).abs() < 1e-3);

        let zoomed = crop_for_aspect(1920, 1080, 9.0 / 16.0, 2.0);
        assert!((zoomed.height - 540.0).abs() < 1e-3);
    }

    #[test]
    fn test_zoom_clamped() {
        let over = crop_for_aspect(1000, 1000, 1.0, 12.0);
        assert!((over.width - 200.0).abs() < 1e-3);
        let under = crop_for_aspect(1000, 1000, 1.0, 0.2);
        assert!((under.width - 1000.0).abs() < 1e-3);
        assert_eq!(clamp_zoom(f32::NAN), 1.0);
    }

    #[test]
    fn test_output_size_long_edge() {
        assert_eq!(output_size_for_aspect(9.0 / 16.0, 1920), (1080, 1920));
        assert_eq!(output_size_for_aspect(16.0 / 9.0, 1920), (1920, 1080));
        assert_eq!(output_size_for_aspect(1.0, 1920), (1920, 1920));
    }

    #[test]
    fn test_pixel_bounds_inside_frame() {
        let crop = crop_for_aspect(101, 57, 9.0 / 16.0, 1.3);
        let (x, y, w, h) = crop.to_pixel_bounds(101, 57);
        assert!(x + w <= 101);
        assert!(y + h <= 57);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn test_point_to_segment_distance() {
        let a = NormPoint::new(0.0, 0.0);
        let b = NormPoint::new(1.0, 0.0);
        assert!((point_to_segment_distance(NormPoint::new(0.5, 0.1), a, b) - 0.1).abs() < 1e-5);
        assert!((point_to_segment_distance(NormPoint::new(1.0, 0.3), a, a) - (1.09f32).sqrt()).abs() < 1e-5);
    }
}
