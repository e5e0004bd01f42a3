//! Lot export
//!
//! Writes each non-empty lot to its own directory and a `lots.json` manifest carrying
//! the per-lot descriptors the backend expects next to the files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::lots::{Lot, LotDescriptor};

pub const MANIFEST_FILE: &str = "lots.json";

/// One exported lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedLot {
    pub id: String,
    /// Directory name relative to the export root
    pub dir: String,
    /// File names in submission order
    pub files: Vec<String>,
    #[serde(flatten)]
    pub descriptor: LotDescriptor,
}

/// Contents of `lots.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub lots: Vec<ExportedLot>,
}

impl ExportManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Export lots under `dir`, returning the manifest path. Empty lots are skipped.
pub fn export_lots(dir: &Path, lots: &[Lot]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create export dir: {:?}", dir))?;

    let mut manifest = ExportManifest { lots: Vec::new() };
    for lot in lots.iter().filter(|l| !l.is_empty()) {
        let lot_dir_name = format!("lot_{:02}", manifest.lots.len() + 1);
        let lot_dir = dir.join(&lot_dir_name);
        std::fs::create_dir_all(&lot_dir)?;

        let mut files = Vec::with_capacity(lot.len());
        for (i, file) in lot.files().iter().enumerate() {
            // Prefix keeps order and disambiguates repeated upload names
            let name = format!("{:02}_{}", i + 1, file.name);
            std::fs::write(lot_dir.join(&name), &file.data)
                .with_context(|| format!("Failed to write {:?}", lot_dir.join(&name)))?;
            files.push(name);
        }

        manifest.lots.push(ExportedLot {
            id: lot.id.clone(),
            dir: lot_dir_name,
            files,
            descriptor: lot.descriptor(),
        });
    }

    let manifest_path = dir.join(MANIFEST_FILE);
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
    info!("Exported {} lot(s) to {:?}", manifest.lots.len(), dir);

    Ok(manifest_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureConfig;
    use crate::lots::{GroupingMode, ImageFile, LotController};
    use tempfile::TempDir;

    fn image(name: &str) -> ImageFile {
        ImageFile::new(name.as_bytes().to_vec(), name, "image/jpeg")
    }

    #[test]
    fn test_export_writes_files_and_manifest() {
        let mut lots = LotController::new(&CaptureConfig::default());
        lots.set_mode(0, GroupingMode::PerItem).unwrap();
        lots.add_files(0, vec![image("a.jpg"), image("b.jpg")]).unwrap();
        lots.set_cover(0, 1);
        let empty = lots.create_lot();
        assert!(lots.lot(empty).unwrap().is_empty());

        let dir = TempDir::new().unwrap();
        let manifest_path = export_lots(dir.path(), lots.lots()).unwrap();

        let manifest = ExportManifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.lots.len(), 1);
        let lot = &manifest.lots[0];
        assert_eq!(lot.files, vec!["01_a.jpg", "02_b.jpg"]);
        assert_eq!(lot.descriptor.cover_index, 1);
        assert_eq!(lot.descriptor.mode, Some(GroupingMode::PerItem));

        let bytes = std::fs::read(dir.path().join("lot_01").join("02_b.jpg")).unwrap();
        assert_eq!(bytes, b"b.jpg");
    }

    #[test]
    fn test_manifest_json_shape() {
        let mut lots = LotController::new(&CaptureConfig::default());
        lots.set_mode(0, GroupingMode::SingleLot).unwrap();
        lots.add_files(0, vec![image("a.jpg")]).unwrap();

        let dir = TempDir::new().unwrap();
        let manifest_path = export_lots(dir.path(), lots.lots()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(manifest_path).unwrap()).unwrap();

        let lot = &json["lots"][0];
        assert_eq!(lot["count"], 1);
        assert_eq!(lot["coverIndex"], 0);
        assert_eq!(lot["mode"], "single_lot");
        assert_eq!(lot["dir"], "lot_01");
    }
}
