//! Saved detection images.
//!
//! Accepted (non-duplicate) detections persist two JPEGs under a
//! per-verdict subdirectory: the full annotated frame and the face crop,
//! both named with a sortable timestamp. Files are written once and never
//! touched again.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::frame::{Frame, COLOR_TEXT};
use crate::PersonType;

const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

pub struct ImageStore {
    root: PathBuf,
    enabled: bool,
}

impl ImageStore {
    /// Open the store, creating `known/` and `unknown/` under `root`.
    pub fn open(root: impl Into<PathBuf>, enabled: bool) -> Result<Self> {
        let root = root.into();
        if enabled {
            for sub in ["known", "unknown"] {
                let dir = root.join(sub);
                fs::create_dir_all(&dir)
                    .with_context(|| format!("create image dir {}", dir.display()))?;
            }
        }
        Ok(Self { root, enabled })
    }

    /// Store that writes nothing; duplicate suppression still runs upstream.
    pub fn disabled() -> Self {
        Self {
            root: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Write the annotated full frame and the crop. Returns the full-frame
    /// path for the event log, or `None` when saving is disabled.
    pub fn save_detection(
        &self,
        annotated: &Frame,
        crop: &Frame,
        person_type: PersonType,
        at: DateTime<Local>,
    ) -> Result<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }

        let stamp = at.naive_local().format(FILE_STAMP_FORMAT).to_string();
        let dir = self.root.join(person_type.as_str());

        let mut full = annotated.clone();
        full.draw_text(
            &at.naive_local().format("%Y-%m-%d %H:%M:%S").to_string(),
            10,
            10,
            COLOR_TEXT,
            2,
        );

        let full_path = dir.join(format!("full_{}.jpg", stamp));
        full.save_jpeg(&full_path)?;

        let crop_path = dir.join(format!("crop_{}.jpg", stamp));
        crop.save_jpeg(&crop_path)?;

        Ok(Some(full_path.to_string_lossy().into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_full_and_crop_under_verdict_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::open(dir.path(), true).unwrap();

        let frame = Frame::blank(64, 48);
        let crop = Frame::blank(16, 16);
        let path = store
            .save_detection(&frame, &crop, PersonType::Unknown, Local::now())
            .unwrap()
            .expect("path when enabled");

        assert!(path.contains("unknown"));
        assert!(PathBuf::from(&path).exists());

        let crops: Vec<_> = fs::read_dir(dir.path().join("unknown"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("crop_"))
            .collect();
        assert_eq!(crops.len(), 1);
    }

    #[test]
    fn disabled_store_writes_nothing() {
        let store = ImageStore::disabled();
        let frame = Frame::blank(64, 48);
        let saved = store
            .save_detection(&frame, &frame, PersonType::Known, Local::now())
            .unwrap();
        assert!(saved.is_none());
    }
}
