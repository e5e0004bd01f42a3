//! Frame data structures for sampled camera content

use image::RgbaImage;
use std::time::Instant;

/// The most recent frame sampled from a live stream
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGBA pixels
    pub image: RgbaImage,
    /// When the frame was sampled
    pub timestamp: Instant,
}

impl CapturedFrame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            timestamp: Instant::now(),
        }
    }

    /// Wrap raw RGBA bytes; `None` if the buffer does not match the dimensions
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(Self::new)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}
