//! sentinel-cam
//!
//! Core engine for an ESP32-CAM perimeter security setup. Raw per-frame
//! person detections from an external object detector are associated into
//! persistent tracks, gated behind a confirmation threshold before the
//! (expensive) face classifier runs, deduplicated against recently saved
//! faces by perceptual hash, and throttled per track before the ESP32
//! buzzer is paged. Accepted detections append to a JSON event log and
//! persist annotated images.
//!
//! # Architecture
//!
//! One processing loop owns all mutable state; concurrent readers only see
//! snapshots through `pipeline::StatusBoard` and the event log's query
//! methods. Collaborators are injected into `pipeline::Engine`, never
//! reached through globals:
//!
//! - `geometry`: bounding boxes and IoU
//! - `track`: detection-to-track association and the Pending -> Confirmed
//!   state machine
//! - `hash` + `dedup`: perceptual hashing and the duplicate window
//! - `alert`: buzzer client and per-track cooldowns
//! - `detect`: detector/classifier boundaries and stub backends
//! - `ingest`: camera frame sources (ESP32-CAM over HTTP)
//! - `eventlog` + `images`: append-only event log and saved JPEGs
//! - `pipeline`: per-frame orchestration and the run loop

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod alert;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod detect;
pub mod eventlog;
pub mod frame;
pub mod geometry;
pub mod hash;
pub mod images;
pub mod ingest;
pub mod pipeline;
pub mod track;

pub use alert::{AlertDispatcher, AlertSink, BuzzerClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SentineldConfig;
pub use dedup::{DedupDecision, DuplicateSuppressor, SavedFace};
pub use detect::{
    FaceClassifier, FixedClassifier, NullClassifier, PersonDetection, PersonDetector,
    ScriptedDetector, StubDetector,
};
pub use eventlog::{
    DetectionEvent, EventLogStore, InMemoryEventLog, JsonFileEventLog, WindowCounts,
};
pub use frame::Frame;
pub use geometry::BoundingBox;
pub use hash::FaceHash;
pub use images::ImageStore;
pub use ingest::{Esp32Config, Esp32Source, FrameSource, StaticSource};
pub use pipeline::{DetailedStats, Engine, EngineConfig, StatusBoard};
pub use track::{Track, TrackRegistry, TrackState};

/// Verdict attached to a confirmed person. Serialized lowercase in the
/// event log ("known" / "unknown").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonType {
    Known,
    Unknown,
}

impl PersonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::Known => "known",
            PersonType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PersonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "known" => Ok(PersonType::Known),
            "unknown" => Ok(PersonType::Unknown),
            other => Err(anyhow::anyhow!(
                "expected 'known' or 'unknown', got '{}'",
                other
            )),
        }
    }
}

/// Process-lifetime counters exposed on the status surface.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Stats {
    pub total_detections: u64,
    pub known_detections: u64,
    pub unknown_detections: u64,
    pub false_positives_blocked: u64,
    pub images_saved: u64,
    pub alerts_sent: u64,
    pub uptime_seconds: u64,
}
