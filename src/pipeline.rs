//! Frame pipeline: per-frame orchestration and the processing loop.
//!
//! One `Engine` instance owns all mutable core state (track registry,
//! duplicate suppressor, alert cooldowns, counters) and is driven by a
//! single processing loop. Collaborators (detector, classifier, alert sink,
//! clock, log store, image store) are injected at construction; nothing here
//! is process-global. Concurrent readers see state only through the
//! `StatusBoard`, which swaps in a fully-formed snapshot under a mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use anyhow::Result;
use chrono::Duration;
use serde::Serialize;

use crate::alert::{AlertDispatcher, AlertSink};
use crate::clock::Clock;
use crate::dedup::{DedupDecision, DuplicateSuppressor};
use crate::detect::{FaceClassifier, PersonDetector};
use crate::eventlog::EventLogStore;
use crate::frame::{Frame, COLOR_KNOWN, COLOR_PENDING, COLOR_UNKNOWN};
use crate::geometry::BoundingBox;
use crate::hash::FaceHash;
use crate::images::ImageStore;
use crate::ingest::FrameSource;
use crate::track::{TrackRegistry, TrackState};
use crate::{PersonType, Stats};

/// Engine tunables. Defaults follow the deployed setup: 0.75 person
/// confidence, 5-frame confirmation, 30 s alert cooldown, 1 h duplicate
/// window at 5 bits, every 5th frame processed.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub person_confidence: f32,
    pub known_confidence: f32,
    pub min_detections: u32,
    pub frame_skip: u64,
    /// Detections smaller than this fraction of the frame are dropped as
    /// false positives.
    pub min_area_fraction: f32,
    pub alert_cooldown: Duration,
    pub dedup_window: Duration,
    pub hash_similarity_threshold: u32,
    pub buzzer_pattern: u8,
    /// Fixed backoff before reconnecting after a failed frame read.
    pub read_retry_delay: StdDuration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            person_confidence: 0.75,
            known_confidence: 0.92,
            min_detections: 5,
            frame_skip: 5,
            min_area_fraction: 0.02,
            alert_cooldown: Duration::seconds(30),
            dedup_window: Duration::hours(1),
            hash_similarity_threshold: 5,
            buzzer_pattern: 1,
            read_retry_delay: StdDuration::from_secs(5),
        }
    }
}

/// Snapshot surface for concurrent readers (stream endpoint, dashboards).
/// The pipeline publishes a complete replacement each frame; readers never
/// observe a half-updated view.
#[derive(Default)]
pub struct StatusBoard {
    inner: Mutex<StatusInner>,
}

#[derive(Default)]
struct StatusInner {
    stats: Stats,
    latest_frame: Option<Frame>,
}

impl StatusBoard {
    fn publish(&self, stats: Stats, frame: Frame) {
        let mut inner = self.inner.lock().unwrap();
        *inner = StatusInner {
            stats,
            latest_frame: Some(frame),
        };
    }

    pub fn stats(&self) -> Stats {
        self.inner.lock().unwrap().stats.clone()
    }

    pub fn latest_frame(&self) -> Option<Frame> {
        self.inner.lock().unwrap().latest_frame.clone()
    }
}

/// Counters plus log-derived rollups, the shape the status endpoint reports.
#[derive(Clone, Debug, Serialize)]
pub struct DetailedStats {
    #[serde(flatten)]
    pub stats: Stats,
    pub known_24h: u64,
    pub unknown_24h: u64,
    pub total_24h: u64,
    pub total_logged: u64,
}

struct ConfirmedDetection {
    track_id: u64,
    bbox: BoundingBox,
    person_type: PersonType,
    confidence: f32,
}

pub struct Engine {
    cfg: EngineConfig,
    detector: Box<dyn PersonDetector>,
    classifier: Box<dyn FaceClassifier>,
    alert_sink: Box<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    log: Box<dyn EventLogStore>,
    images: ImageStore,
    registry: TrackRegistry,
    suppressor: DuplicateSuppressor,
    dispatcher: AlertDispatcher,
    stats: Stats,
    status: Arc<StatusBoard>,
}

impl Engine {
    pub fn new(
        cfg: EngineConfig,
        detector: Box<dyn PersonDetector>,
        classifier: Box<dyn FaceClassifier>,
        alert_sink: Box<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        log: Box<dyn EventLogStore>,
        images: ImageStore,
    ) -> Self {
        let suppressor =
            DuplicateSuppressor::new(cfg.hash_similarity_threshold, cfg.dedup_window);
        let dispatcher = AlertDispatcher::new(cfg.alert_cooldown);
        Self {
            cfg,
            detector,
            classifier,
            alert_sink,
            clock,
            log,
            images,
            registry: TrackRegistry::new(),
            suppressor,
            dispatcher,
            stats: Stats::default(),
            status: Arc::new(StatusBoard::default()),
        }
    }

    /// Handle for concurrent readers; clone freely across threads.
    pub fn status(&self) -> Arc<StatusBoard> {
        self.status.clone()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn event_log(&self) -> &dyn EventLogStore {
        self.log.as_ref()
    }

    pub fn detailed_stats(&self) -> DetailedStats {
        let cutoff = self.clock.now() - Duration::hours(24);
        let counts = self.log.counts_since(cutoff);
        DetailedStats {
            stats: self.stats.clone(),
            known_24h: counts.known,
            unknown_24h: counts.unknown,
            total_24h: counts.total(),
            total_logged: self.log.len() as u64,
        }
    }

    /// Run one frame through detection, tracking, confirmation, duplicate
    /// suppression and alerting. Returns the annotated frame, which is also
    /// published to the status board.
    pub fn process_frame(&mut self, frame: &Frame, frame_number: u64) -> Result<Frame> {
        let now = self.clock.now();
        let detections = self
            .detector
            .detect_persons(frame, self.cfg.person_confidence)?;
        let min_area = (frame.area() as f32 * self.cfg.min_area_fraction) as i64;

        // Associate detections to tracks, greedily in detector-output order.
        let mut matched: Vec<(u64, f32)> = Vec::new();
        for det in &detections {
            if det.bbox.area() < min_area {
                self.stats.false_positives_blocked += 1;
                log::debug!(
                    "blocked false positive: area {} below floor {}",
                    det.bbox.area(),
                    min_area
                );
                continue;
            }
            if frame.crop(&det.bbox).is_none() {
                continue;
            }
            let id = self.registry.match_or_create(det.bbox, frame_number);
            matched.push((id, det.confidence));
        }

        // Classify tracks that just crossed the confirmation threshold.
        // At most one classification per track lifetime.
        for (id, det_confidence) in &matched {
            let Some(track) = self.registry.get(*id) else {
                debug_assert!(false, "matched track {} missing from registry", id);
                continue;
            };
            if !track.needs_classification(self.cfg.min_detections) {
                continue;
            }
            let bbox = track.bbox;
            let Some(crop) = frame.crop(&bbox) else {
                continue;
            };
            let verdict = self.classifier.classify(&crop, self.cfg.known_confidence)?;
            let (is_known, confidence) = match verdict {
                Some(known_confidence) => (true, known_confidence),
                None => (false, *det_confidence),
            };
            if let Some(track) = self.registry.get_mut(*id) {
                track.confirm(is_known, confidence);
            }
            log::info!(
                "track {} confirmed {} (confidence {:.2})",
                id,
                if is_known { "known" } else { "unknown" },
                confidence
            );
        }

        // Annotate and collect tracks whose confirmation has not yet fired.
        let mut annotated = frame.clone();
        let mut newly_confirmed: Vec<ConfirmedDetection> = Vec::new();
        for (id, _) in &matched {
            let Some(track) = self.registry.get(*id) else {
                continue;
            };
            let bbox = track.bbox;
            match track.state {
                TrackState::Pending => {
                    annotated.draw_box(&bbox, COLOR_PENDING, 2);
                    annotated.draw_text(
                        &format!(
                            "VERIFYING {}/{}",
                            track.detection_count, self.cfg.min_detections
                        ),
                        bbox.x1,
                        bbox.y1 - Frame::text_height(2) - 3,
                        COLOR_PENDING,
                        2,
                    );
                }
                TrackState::Confirmed {
                    is_known,
                    confidence,
                } => {
                    let (color, tag) = if is_known {
                        (COLOR_KNOWN, "KNOWN")
                    } else {
                        (COLOR_UNKNOWN, "UNKNOWN")
                    };
                    annotated.draw_box(&bbox, color, 3);
                    annotated.draw_text(
                        &format!("{}: {:.2}", tag, confidence),
                        bbox.x1,
                        bbox.y1 - Frame::text_height(2) - 3,
                        color,
                        2,
                    );

                    let already_fired = track.alerted;
                    if !already_fired {
                        if let Some(track) = self.registry.get_mut(*id) {
                            track.alerted = true;
                        }
                        newly_confirmed.push(ConfirmedDetection {
                            track_id: *id,
                            bbox,
                            person_type: if is_known {
                                PersonType::Known
                            } else {
                                PersonType::Unknown
                            },
                            confidence,
                        });
                    }
                }
            }
        }

        // Cooldown, duplicate suppression, persistence, alerting.
        for det in newly_confirmed {
            if !self.dispatcher.should_alert(det.track_id, now) {
                continue;
            }

            let crop = annotated.crop(&det.bbox);
            let hash = crop.as_ref().and_then(FaceHash::of);
            if let DedupDecision::Duplicate { since_save } = self.suppressor.check(hash, now) {
                log::info!(
                    "skipping save: same face seen {:.1} min ago",
                    since_save.num_seconds() as f64 / 60.0
                );
                continue;
            }

            let image_path = match &crop {
                Some(crop) => {
                    self.images
                        .save_detection(&annotated, crop, det.person_type, now)?
                }
                None => None,
            };
            if let Some(path) = &image_path {
                self.stats.images_saved += 1;
                log::info!("image saved: {}", path);
            }
            if let Some(hash) = hash {
                self.suppressor
                    .record(hash, det.track_id, det.person_type, now);
            }

            self.log
                .append(det.person_type, det.confidence, now, image_path)?;
            self.stats.total_detections += 1;
            match det.person_type {
                PersonType::Known => self.stats.known_detections += 1,
                PersonType::Unknown => self.stats.unknown_detections += 1,
            }

            if det.person_type == PersonType::Unknown {
                log::warn!(
                    "unknown person detected, confidence {:.2}",
                    det.confidence
                );
                match self.alert_sink.send_alert(self.cfg.buzzer_pattern) {
                    Ok(()) => {
                        self.stats.alerts_sent += 1;
                        log::info!("buzzer alerted (pattern {})", self.cfg.buzzer_pattern);
                    }
                    Err(e) => log::error!("buzzer alert failed: {}", e),
                }
                self.dispatcher.record_alert(det.track_id, now);
            }
        }

        // Bound memory: drop dead tracks and their cooldown entries.
        for id in self.registry.evict_stale(frame_number) {
            self.dispatcher.forget(id);
        }

        self.status.publish(self.stats.clone(), annotated.clone());
        Ok(annotated)
    }

    /// Processing loop: read frames until `stop` is raised, processing every
    /// `frame_skip`-th one. Read failures back off for a fixed delay and
    /// reconnect; per-frame errors are logged and skipped. Only the stop
    /// signal ends the loop.
    pub fn run(&mut self, source: &mut dyn FrameSource, stop: &AtomicBool) -> Result<()> {
        let started = Instant::now();
        let mut frame_number: u64 = 0;
        let mut connected = false;

        log::info!(
            "monitoring started (detector: {}, classifier: {})",
            self.detector.name(),
            self.classifier.name()
        );
        if let Err(e) = self.detector.warm_up() {
            log::warn!("detector warm-up failed: {}", e);
        }
        while !stop.load(Ordering::SeqCst) {
            if !connected {
                match source.connect() {
                    Ok(()) => {
                        connected = true;
                        log::info!("camera stream connected");
                    }
                    Err(e) => {
                        log::warn!(
                            "camera connect failed: {}; retrying in {:?}",
                            e,
                            self.cfg.read_retry_delay
                        );
                        std::thread::sleep(self.cfg.read_retry_delay);
                        continue;
                    }
                }
            }

            let frame = match source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("frame read failed: {}; reconnecting", e);
                    connected = false;
                    std::thread::sleep(self.cfg.read_retry_delay);
                    continue;
                }
            };

            frame_number += 1;
            self.stats.uptime_seconds = started.elapsed().as_secs();

            if frame_number % self.cfg.frame_skip == 0 {
                if let Err(e) = self.process_frame(&frame, frame_number) {
                    log::error!("frame {} processing failed: {}", frame_number, e);
                }
            } else {
                self.status.publish(self.stats.clone(), frame);
            }
        }
        log::info!("monitoring stopped");
        Ok(())
    }
}
