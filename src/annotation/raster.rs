//! Annotation rasterizer
//!
//! Paints an action list onto an RGBA buffer. The preview and the saved image both go
//! through `Rasterizer::paint`, only the target size differs.

use ab_glyph::PxScale;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

use super::action::{AnnotationAction, Color};
use super::text::{layout_text, TextFont};
use crate::geometry::{NormPoint, NormRect, NormSize};

/// Draws actions at whatever resolution the target buffer has
#[derive(Debug, Clone)]
pub struct Rasterizer {
    font: TextFont,
    wrap_fraction: f32,
    box_color: Color,
    box_width: f32,
}

impl Rasterizer {
    pub fn new(font: TextFont, wrap_fraction: f32, box_color: Color, box_width: f32) -> Self {
        Self {
            font,
            wrap_fraction,
            box_color,
            box_width,
        }
    }

    pub fn font(&self) -> &TextFont {
        &self.font
    }

    pub fn wrap_fraction(&self) -> f32 {
        self.wrap_fraction
    }

    /// Paint every action in order onto `canvas`
    pub fn paint(&self, canvas: &mut RgbaImage, actions: &[AnnotationAction]) {
        if canvas.width() == 0 || canvas.height() == 0 {
            return;
        }
        for action in actions {
            match action {
                AnnotationAction::Stroke { color, width, points } => {
                    self.paint_stroke(canvas, points, *width, color.to_rgba());
                }
                AnnotationAction::TextBlock {
                    color,
                    font_size,
                    text,
                    origin,
                } => {
                    self.paint_text(canvas, text, *font_size, *origin, color.to_rgba());
                }
                AnnotationAction::BoxRegion { origin, size } => {
                    self.paint_box(canvas, NormRect::new(*origin, *size));
                }
            }
        }
    }

    /// Normalized bounds a text block covers on an image `image_width` x `image_height`
    pub fn text_bounds(
        &self,
        text: &str,
        font_size: f32,
        origin: NormPoint,
        image_width: u32,
        image_height: u32,
    ) -> NormRect {
        if image_width == 0 || image_height == 0 {
            return NormRect::new(origin, Default::default());
        }
        let layout = layout_text(&self.font, text, font_size, self.wrap_fraction, image_width);
        NormRect {
            origin,
            size: NormSize {
                width: layout.width / image_width as f32,
                height: layout.height / image_height as f32,
            },
        }
    }

    fn paint_stroke(&self, canvas: &mut RgbaImage, points: &[NormPoint], width: f32, color: Rgba<u8>) {
        let (w, h) = canvas.dimensions();
        let thickness = (width * w as f32).max(1.0);
        let radius = (thickness / 2.0).round() as i32;
        let pixels: Vec<(f32, f32)> = points.iter().map(|p| p.to_pixels(w, h)).collect();

        for pair in pixels.windows(2) {
            draw_thick_segment(canvas, pair[0], pair[1], thickness, color);
        }
        // Round caps and joins
        if radius >= 1 {
            for &(x, y) in &pixels {
                draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), radius, color);
            }
        } else if let Some(&(x, y)) = pixels.first() {
            if pixels.len() == 1 {
                draw_line_segment_mut(canvas, (x, y), (x, y), color);
            }
        }
    }

    fn paint_box(&self, canvas: &mut RgbaImage, rect: NormRect) {
        let (w, h) = canvas.dimensions();
        let thickness = ((self.box_width * w as f32).round() as u32).max(1);
        let color = self.box_color.to_rgba();

        let (x0, y0) = rect.origin.to_pixels(w, h);
        let x0 = x0.round() as i32;
        let y0 = y0.round() as i32;
        let bw = ((rect.size.width * w as f32).round() as u32).max(1);
        let bh = ((rect.size.height * h as f32).round() as u32).max(1);
        let x1 = x0 + bw as i32 - thickness as i32;
        let y1 = y0 + bh as i32 - thickness as i32;

        draw_filled_rect_mut(canvas, Rect::at(x0, y0).of_size(bw, thickness), color);
        draw_filled_rect_mut(canvas, Rect::at(x0, y1.max(y0)).of_size(bw, thickness), color);
        draw_filled_rect_mut(canvas, Rect::at(x0, y0).of_size(thickness, bh), color);
        draw_filled_rect_mut(canvas, Rect::at(x1.max(x0), y0).of_size(thickness, bh), color);
    }

    fn paint_text(&self, canvas: &mut RgbaImage, text: &str, font_size: f32, origin: NormPoint, color: Rgba<u8>) {
        let font = self.font.font();
        let (w, h) = canvas.dimensions();
        let layout = layout_text(&self.font, text, font_size, self.wrap_fraction, w);
        let (x, y) = origin.to_pixels(w, h);
        let scale = PxScale::from(layout.font_px);
        for (i, line) in layout.lines.iter().enumerate() {
            let line_y = y + layout.line_height * i as f32;
            draw_text_mut(canvas, color, x.round() as i32, line_y.round() as i32, scale, font, line);
        }
    }
}

/// A segment `thickness` pixels wide, as a filled quad
fn draw_thick_segment(canvas: &mut RgbaImage, a: (f32, f32), b: (f32, f32), thickness: f32, color: Rgba<u8>) {
    let half = thickness / 2.0;
    if half < 1.0 {
        draw_line_segment_mut(canvas, a, b, color);
        return;
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 0.5 {
        return;
    }
    let (nx, ny) = (-dy / len * half, dx / len * half);
    let quad = [
        Point::new((a.0 + nx).round() as i32, (a.1 + ny).round() as i32),
        Point::new((b.0 + nx).round() as i32, (b.1 + ny).round() as i32),
        Point::new((b.0 - nx).round() as i32, (b.1 - ny).round() as i32),
        Point::new((a.0 - nx).round() as i32, (a.1 - ny).round() as i32),
    ];
    // draw_polygon_mut rejects closed outlines
    if quad[0] != quad[3] {
        draw_polygon_mut(canvas, &quad, color);
    }
}
