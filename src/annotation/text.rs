//! Text measurement and wrapping
//!
//! Interactive hit-testing and rasterization both lay text out through here,
//! so a text block occupies the same box on screen and in the saved image.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::{Context, Result};
use std::path::Path;

/// DejaVu Sans, used when no font file is configured
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Slack allowed when a line is compared against the wrap width. Line widths are
/// summed glyph by glyph and can land a rounding error past a width computed from
/// the same text.
const WRAP_EPSILON: f32 = 1e-3;

/// Font used for measuring and drawing text
#[derive(Clone)]
pub struct TextFont {
    font: FontArc,
}

impl std::fmt::Debug for TextFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextFont")
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl TextFont {
    pub fn new(font: FontArc) -> Self {
        Self { font }
    }

    /// The font compiled into the binary
    pub fn bundled() -> Result<Self> {
        let font = FontArc::try_from_slice(BUNDLED_FONT).context("Bundled font is invalid")?;
        Ok(Self::new(font))
    }

    /// Load a TrueType/OpenType font file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read font: {:?}", path))?;
        let font = FontArc::try_from_vec(bytes).with_context(|| format!("Invalid font file: {:?}", path))?;
        Ok(Self::new(font))
    }

    /// `path` when given, otherwise the bundled font
    pub fn load_or_bundled(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::bundled(),
        }
    }

    pub fn font(&self) -> &FontArc {
        &self.font
    }

    /// Width of a single line in pixels
    pub fn line_width(&self, line: &str, px: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0;
        let mut prev = None;
        for c in line.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    /// Distance between baselines in pixels
    pub fn line_height(&self, px: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(px));
        scaled.height() + scaled.line_gap()
    }

    fn fits(&self, line: &str, px: f32, max_width: f32) -> bool {
        self.line_width(line, px) <= max_width + WRAP_EPSILON
    }

    /// Greedy word wrap at `max_width` pixels. Words wider than a line are split by character.
    /// Explicit newlines are kept.
    pub fn wrap(&self, text: &str, px: f32, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{current} {word}")
                };
                if self.fits(&candidate, px, max_width) {
                    current = candidate;
                    continue;
                }
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                if self.fits(word, px, max_width) {
                    current = word.to_string();
                } else {
                    for c in word.chars() {
                        current.push(c);
                        if !self.fits(&current, px, max_width) && current.chars().count() > 1 {
                            current.pop();
                            lines.push(std::mem::take(&mut current));
                            current.push(c);
                        }
                    }
                }
            }
            lines.push(current);
        }
        lines
    }
}

/// A text block laid out for a specific image size
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<String>,
    pub font_px: f32,
    pub line_height: f32,
    pub width: f32,
    pub height: f32,
}

/// Lay out `text` with size and wrap width expressed as fractions of `image_width`
pub fn layout_text(
    font: &TextFont,
    text: &str,
    font_size: f32,
    wrap_fraction: f32,
    image_width: u32,
) -> TextLayout {
    let font_px = (font_size * image_width as f32).max(1.0);
    let max_width = (wrap_fraction * image_width as f32).max(font_px);
    let lines = font.wrap(text, font_px, max_width);
    let line_height = font.line_height(font_px);
    let width = lines
        .iter()
        .map(|l| font.line_width(l, font_px))
        .fold(0.0f32, f32::max);
    let height = line_height * lines.len() as f32;
    TextLayout {
        lines,
        font_px,
        line_height,
        width,
        height,
    }
}
