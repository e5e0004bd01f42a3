//! Image blobs owned by lots

use anyhow::{Context, Result};
use std::path::Path;

/// An encoded image plus the name and MIME type it is submitted under
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Encoded bytes (JPEG/PNG/...)
    pub data: Vec<u8>,
    /// File name presented to the backend
    pub name: String,
    /// MIME type, e.g. "image/jpeg"
    pub mime: String,
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl ImageFile {
    pub fn new(data: Vec<u8>, name: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            data,
            name: name.into(),
            mime: mime.into(),
        }
    }

    /// Read a file picked for upload, inferring the MIME type from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read upload: {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = image::ImageFormat::from_path(path)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(Self { data, name, mime })
    }

    /// Whether this blob claims to be an image at all
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_path_infers_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.png");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"not really a png").unwrap();

        let file = ImageFile::from_path(&path).unwrap();
        assert_eq!(file.name, "shelf.png");
        assert_eq!(file.mime, "image/png");
        assert!(file.is_image());
        assert_eq!(file.len(), 16);
    }

    #[test]
    fn test_unknown_extension_is_not_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let file = ImageFile::from_path(&path).unwrap();
        assert!(!file.is_image());
    }

    #[test]
    fn test_debug_hides_bytes() {
        let file = ImageFile::new(vec![0; 1024], "a.jpg", "image/jpeg");
        let dbg = format!("{:?}", file);
        assert!(dbg.contains("1024"));
        assert!(!dbg.contains("[0, 0"));
    }
}
