//! Built-in detector and classifier backends.
//!
//! Real neural backends plug in behind the traits in `backend`; what ships
//! here is the stub wiring for daemons without a model configured and the
//! scripted backends the tests drive frame sequences with.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::detect::backend::{FaceClassifier, PersonDetection, PersonDetector};
use crate::frame::Frame;

/// Detector that never reports anything. Default wiring until a real model
/// backend is configured.
#[derive(Debug, Default)]
pub struct StubDetector;

impl PersonDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect_persons(
        &mut self,
        _frame: &Frame,
        _min_confidence: f32,
    ) -> Result<Vec<PersonDetection>> {
        Ok(Vec::new())
    }
}

/// Detector that replays a canned per-frame script. Each call pops the next
/// frame's detections; past the end of the script it reports nothing.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: VecDeque<Vec<PersonDetection>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<PersonDetection>>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn push_frame(&mut self, detections: Vec<PersonDetection>) {
        self.script.push_back(detections);
    }
}

impl PersonDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect_persons(
        &mut self,
        _frame: &Frame,
        min_confidence: f32,
    ) -> Result<Vec<PersonDetection>> {
        Ok(self
            .script
            .pop_front()
            .unwrap_or_default()
            .into_iter()
            .filter(|d| d.confidence >= min_confidence)
            .collect())
    }
}

/// Classifier for setups without a face model: nothing is ever known.
#[derive(Debug, Default)]
pub struct NullClassifier;

impl FaceClassifier for NullClassifier {
    fn name(&self) -> &'static str {
        "null"
    }

    fn classify(&mut self, _crop: &Frame, _min_confidence: f32) -> Result<Option<f32>> {
        Ok(None)
    }
}

/// Classifier returning a fixed verdict, for tests. The call counter is
/// shared so callers can assert on it after the classifier moves into the
/// engine.
#[derive(Debug)]
pub struct FixedClassifier {
    verdict: Option<f32>,
    calls: Arc<AtomicUsize>,
}

impl FixedClassifier {
    pub fn known(confidence: f32) -> Self {
        Self {
            verdict: Some(confidence),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unknown() -> Self {
        Self {
            verdict: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl FaceClassifier for FixedClassifier {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn classify(&mut self, _crop: &Frame, _min_confidence: f32) -> Result<Option<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict)
    }
}
