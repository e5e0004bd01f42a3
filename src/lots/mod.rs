//! Lot Management Layer
//!
//! Routes captured or uploaded images into a bounded, ordered collection of lots.
//! Each lot is locked to one grouping mode while it holds images.

pub mod controller;
pub mod file;

pub use controller::{AddReport, LotController, SharedLots};
pub use file::ImageFile;

use serde::{Deserialize, Serialize};

/// How the backend interprets a lot's images once submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// All images describe one catalogue entry
    SingleLot,
    /// Each image shows a separate item
    PerItem,
    /// Each photo becomes its own entry
    PerPhoto,
}

impl GroupingMode {
    pub const ALL: [GroupingMode; 3] = [
        GroupingMode::SingleLot,
        GroupingMode::PerItem,
        GroupingMode::PerPhoto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingMode::SingleLot => "single_lot",
            GroupingMode::PerItem => "per_item",
            GroupingMode::PerPhoto => "per_photo",
        }
    }
}

impl std::fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GroupingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GroupingMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown grouping mode: {s}"))
    }
}

/// A group of images destined for one catalogue entry
#[derive(Debug, Clone)]
pub struct Lot {
    /// Opaque identifier, stable across removal of other lots
    pub id: String,
    files: Vec<ImageFile>,
    cover_index: usize,
    mode: Option<GroupingMode>,
}

impl Lot {
    pub(crate) fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            files: Vec::new(),
            cover_index: 0,
            mode: None,
        }
    }

    pub fn files(&self) -> &[ImageFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn cover_index(&self) -> usize {
        self.cover_index
    }

    pub fn mode(&self) -> Option<GroupingMode> {
        self.mode
    }

    pub fn cover(&self) -> Option<&ImageFile> {
        self.files.get(self.cover_index)
    }

    /// The mode may change only while empty, or be re-set to the same value
    pub(crate) fn can_set_mode(&self, mode: GroupingMode) -> bool {
        self.files.is_empty() || self.mode == Some(mode)
    }

    pub(crate) fn set_mode(&mut self, mode: GroupingMode) {
        self.mode = Some(mode);
    }

    pub(crate) fn push(&mut self, file: ImageFile) {
        self.files.push(file);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<ImageFile> {
        if index >= self.files.len() {
            return None;
        }
        let file = self.files.remove(index);
        self.clamp_cover();
        Some(file)
    }

    pub(crate) fn insert(&mut self, index: usize, file: ImageFile) {
        let index = index.min(self.files.len());
        self.files.insert(index, file);
    }

    pub(crate) fn replace(&mut self, index: usize, file: ImageFile) -> Option<ImageFile> {
        self.files
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, file))
    }

    /// Out-of-range indices are ignored
    pub(crate) fn set_cover(&mut self, index: usize) {
        if index < self.files.len() {
            self.cover_index = index;
        }
    }

    fn clamp_cover(&mut self) {
        self.cover_index = self.cover_index.min(self.files.len().saturating_sub(1));
    }

    /// Plain descriptor submitted alongside the files
    pub fn descriptor(&self) -> LotDescriptor {
        LotDescriptor {
            count: self.files.len(),
            cover_index: self.cover_index,
            mode: self.mode,
        }
    }
}

/// Per-lot summary that crosses the backend boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotDescriptor {
    pub count: usize,
    pub cover_index: usize,
    pub mode: Option<GroupingMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> ImageFile {
        ImageFile::new(vec![1, 2, 3], name, "image/jpeg")
    }

    #[test]
    fn test_mode_parse_and_display() {
        for mode in GroupingMode::ALL {
            assert_eq!(mode.to_string().parse::<GroupingMode>().unwrap(), mode);
        }
        assert!("per_lot".parse::<GroupingMode>().is_err());
    }

    #[test]
    fn test_mode_serde_snake_case() {
        let json = serde_json::to_string(&GroupingMode::PerItem).unwrap();
        assert_eq!(json, "\"per_item\"");
    }

    #[test]
    fn test_cover_reclamped_on_remove() {
        let mut lot = Lot::new();
        lot.push(file("a"));
        lot.push(file("b"));
        lot.push(file("c"));
        lot.set_cover(2);
        assert_eq!(lot.cover_index(), 2);

        lot.remove(2);
        assert_eq!(lot.cover_index(), 1);
        lot.remove(0);
        assert_eq!(lot.cover_index(), 0);
        lot.remove(0);
        assert_eq!(lot.cover_index(), 0);
        assert!(lot.cover().is_none());
        assert!(lot.remove(0).is_none());
    }

    #[test]
    fn test_set_cover_out_of_range_is_noop() {
        let mut lot = Lot::new();
        lot.push(file("a"));
        lot.set_cover(5);
        assert_eq!(lot.cover_index(), 0);
    }

    #[test]
    fn test_descriptor_camel_case() {
        let mut lot = Lot::new();
        lot.set_mode(GroupingMode::SingleLot);
        lot.push(file("a"));
        let json = serde_json::to_value(lot.descriptor()).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["coverIndex"], 0);
        assert_eq!(json["mode"], "single_lot");
    }
}
