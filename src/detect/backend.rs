use anyhow::Result;

use crate::frame::Frame;
use crate::geometry::BoundingBox;

/// One "person" box reported by the object detector.
#[derive(Clone, Copy, Debug)]
pub struct PersonDetection {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Object detector boundary.
///
/// The detector is an external collaborator; the engine only relies on this
/// contract. Implementations return an empty list when nothing clears the
/// confidence threshold, never an error for "no detections". An `Err` from
/// either call aborts only the current frame: the run loop logs it and moves
/// on.
pub trait PersonDetector: Send {
    /// Backend identifier for log lines.
    fn name(&self) -> &'static str;

    /// Detect "person" boxes with at least `min_confidence`.
    fn detect_persons(
        &mut self,
        frame: &Frame,
        min_confidence: f32,
    ) -> Result<Vec<PersonDetection>>;

    /// Optional warm-up hook, run once before the processing loop.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Face classifier boundary.
///
/// `Ok(Some(confidence))` means the crop matched a known face at or above
/// `min_confidence`; `Ok(None)` means not recognized as known. The engine
/// calls this at most once per track lifetime.
pub trait FaceClassifier: Send {
    fn name(&self) -> &'static str;

    fn classify(&mut self, crop: &Frame, min_confidence: f32) -> Result<Option<f32>>;
}
