//! Still encoding

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, RgbaImage};

use crate::error::{EngineError, Result};

/// Encoded bytes plus the metadata needed to name the file
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub mime: &'static str,
    pub extension: &'static str,
}

/// Turns a rendered RGBA buffer into a compressed image
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, image: &RgbaImage) -> Result<EncodedImage>;
}

/// JPEG output (alpha is dropped)
#[derive(Debug, Clone, Copy)]
pub struct JpegFrameEncoder {
    pub quality: u8,
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self { quality: 92 }
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, image: &RgbaImage) -> Result<EncodedImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EngineError::EncodingFailed("empty image".to_string()));
        }
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut data = Vec::new();
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut data, self.quality.clamp(1, 100)))
            .map_err(|e| EngineError::EncodingFailed(e.to_string()))?;
        if data.is_empty() {
            return Err(EngineError::EncodingFailed("encoder produced no output".to_string()));
        }
        Ok(EncodedImage {
            data,
            mime: "image/jpeg",
            extension: "jpg",
        })
    }
}

/// Lossless PNG output
#[derive(Debug, Clone, Copy, Default)]
pub struct PngFrameEncoder;

impl FrameEncoder for PngFrameEncoder {
    fn encode(&self, image: &RgbaImage) -> Result<EncodedImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EngineError::EncodingFailed("empty image".to_string()));
        }
        let mut data = Vec::new();
        image
            .write_with_encoder(PngEncoder::new(&mut data))
            .map_err(|e| EngineError::EncodingFailed(e.to_string()))?;
        Ok(EncodedImage {
            data,
            mime: "image/png",
            extension: "png",
        })
    }
}
