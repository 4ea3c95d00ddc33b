//! Track registry: detection-to-track association and per-track
//! confirmation state.
//!
//! Association is greedy nearest-neighbor by IoU, detector-output order,
//! not an optimal bipartite assignment. Overlapping simultaneous detections
//! can therefore mismatch; a stricter assignment algorithm could be swapped
//! in behind `match_or_create` without touching the rest of the engine.

use std::collections::BTreeMap;

use crate::geometry::BoundingBox;

/// A detection must overlap a live track strictly more than this to match it.
pub const MATCH_IOU_THRESHOLD: f32 = 0.4;

/// Tracks unseen for more than this many frames are dead to matching and
/// get removed by the next sweep.
pub const STALE_AFTER_FRAMES: u64 = 30;

/// Per-track classification state. A track is Pending until the face
/// classifier has run for it, then Confirmed for the rest of its lifetime.
/// There is no transition back; classification runs at most once per track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrackState {
    Pending,
    Confirmed { is_known: bool, confidence: f32 },
}

#[derive(Clone, Debug)]
pub struct Track {
    pub id: u64,
    pub bbox: BoundingBox,
    /// Frames this track has been matched in; non-decreasing while alive.
    pub detection_count: u32,
    pub last_seen_frame: u64,
    pub state: TrackState,
    /// Whether the confirmed state already produced an event this lifetime.
    pub alerted: bool,
}

impl Track {
    fn new(id: u64, bbox: BoundingBox, frame_number: u64) -> Self {
        Self {
            id,
            bbox,
            detection_count: 1,
            last_seen_frame: frame_number,
            state: TrackState::Pending,
            alerted: false,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self.state, TrackState::Confirmed { .. })
    }

    /// Confirmation gate: true iff the track has survived enough matched
    /// frames and has never been classified. Returns true at most once per
    /// track lifetime when paired with `confirm`.
    pub fn needs_classification(&self, min_detections: u32) -> bool {
        self.detection_count >= min_detections && !self.is_classified()
    }

    /// Record the one classification result for this track. The transition
    /// Pending -> Confirmed is irreversible; a second call is a programming
    /// error and is ignored in release builds.
    pub fn confirm(&mut self, is_known: bool, confidence: f32) {
        debug_assert!(!self.is_classified(), "track classified twice");
        if !self.is_classified() {
            self.state = TrackState::Confirmed {
                is_known,
                confidence,
            };
        }
    }

    fn is_stale(&self, frame_number: u64, stale_after: u64) -> bool {
        frame_number.saturating_sub(self.last_seen_frame) > stale_after
    }
}

/// Owns all live tracks. Ids increase monotonically and are never reused,
/// so iterating the id-keyed map visits tracks in insertion order, which
/// keeps greedy matching deterministic.
pub struct TrackRegistry {
    tracks: BTreeMap<u64, Track>,
    next_id: u64,
    stale_after: u64,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::with_stale_after(STALE_AFTER_FRAMES)
    }

    pub fn with_stale_after(stale_after: u64) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 0,
            stale_after,
        }
    }

    /// Match a detection to the best-overlapping live track, or create a new
    /// track. Returns the track id.
    ///
    /// The best candidate is the live track with maximum IoU strictly above
    /// `MATCH_IOU_THRESHOLD`; ties keep the first-encountered (lowest-id)
    /// track. On match: bump `detection_count`, overwrite `bbox`, refresh
    /// `last_seen_frame`.
    pub fn match_or_create(&mut self, bbox: BoundingBox, frame_number: u64) -> u64 {
        let mut best_id = None;
        let mut best_iou = MATCH_IOU_THRESHOLD;

        for track in self.tracks.values() {
            if track.is_stale(frame_number, self.stale_after) {
                continue;
            }
            let iou = bbox.iou(&track.bbox);
            if iou > best_iou {
                best_iou = iou;
                best_id = Some(track.id);
            }
        }

        if let Some(id) = best_id {
            // The id was just taken from the live set; a miss here would be
            // a registry bug.
            debug_assert!(self.tracks.contains_key(&id));
            if let Some(track) = self.tracks.get_mut(&id) {
                track.detection_count += 1;
                track.bbox = bbox;
                track.last_seen_frame = frame_number;
                return id;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.tracks.insert(id, Track::new(id, bbox, frame_number));
        id
    }

    /// Sweep out tracks idle past the staleness window. Matching already
    /// ignores them, so this only bounds memory. Returns the evicted ids so
    /// callers can drop any per-track side state (alert cooldowns).
    pub fn evict_stale(&mut self, frame_number: u64) -> Vec<u64> {
        let stale_after = self.stale_after;
        let evicted: Vec<u64> = self
            .tracks
            .values()
            .filter(|t| t.is_stale(frame_number, stale_after))
            .map(|t| t.id)
            .collect();
        for id in &evicted {
            self.tracks.remove(id);
        }
        evicted
    }

    pub fn get(&self, id: u64) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }
}

impl Default for TrackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: i32, y1: i32, x2: i32, y2: i32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2)
    }

    #[test]
    fn new_track_starts_pending_with_count_one() {
        let mut reg = TrackRegistry::new();
        let id = reg.match_or_create(bbox(0, 0, 100, 100), 1);
        let track = reg.get(id).unwrap();
        assert_eq!(track.detection_count, 1);
        assert_eq!(track.state, TrackState::Pending);
        assert!(!track.alerted);
    }

    #[test]
    fn overlapping_detection_rejoins_track() {
        let mut reg = TrackRegistry::new();
        let id = reg.match_or_create(bbox(0, 0, 100, 100), 1);
        // shifted by 25px: IoU 0.6, above threshold
        let same = reg.match_or_create(bbox(25, 0, 125, 100), 2);
        assert_eq!(id, same);
        let track = reg.get(id).unwrap();
        assert_eq!(track.detection_count, 2);
        assert_eq!(track.bbox, bbox(25, 0, 125, 100));
        assert_eq!(track.last_seen_frame, 2);
    }

    #[test]
    fn weak_overlap_creates_new_track() {
        let mut reg = TrackRegistry::new();
        let a = reg.match_or_create(bbox(0, 0, 100, 100), 1);
        // shifted by 60px: IoU 0.25, below threshold
        let b = reg.match_or_create(bbox(60, 0, 160, 100), 2);
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn assignment_is_deterministic() {
        let frames = vec![
            vec![bbox(0, 0, 100, 100), bbox(300, 300, 400, 400)],
            vec![bbox(5, 5, 105, 105), bbox(305, 305, 405, 405)],
            vec![bbox(10, 10, 110, 110)],
        ];

        let run = |frames: &[Vec<BoundingBox>]| -> Vec<Vec<u64>> {
            let mut reg = TrackRegistry::new();
            frames
                .iter()
                .enumerate()
                .map(|(i, dets)| {
                    dets.iter()
                        .map(|b| reg.match_or_create(*b, i as u64 + 1))
                        .collect()
                })
                .collect()
        };

        assert_eq!(run(&frames), run(&frames));
    }

    #[test]
    fn stale_track_is_never_matched() {
        let mut reg = TrackRegistry::new();
        let old = reg.match_or_create(bbox(50, 50, 150, 150), 1);

        // same box 32 frames later: 31 > 30 frames idle, must not match
        let fresh = reg.match_or_create(bbox(50, 50, 150, 150), 32);
        assert_ne!(old, fresh);
    }

    #[test]
    fn track_idle_exactly_the_window_still_matches() {
        let mut reg = TrackRegistry::new();
        let id = reg.match_or_create(bbox(50, 50, 150, 150), 1);
        let again = reg.match_or_create(bbox(50, 50, 150, 150), 31);
        assert_eq!(id, again);
    }

    #[test]
    fn evict_stale_removes_and_reports() {
        let mut reg = TrackRegistry::new();
        let a = reg.match_or_create(bbox(0, 0, 100, 100), 1);
        let b = reg.match_or_create(bbox(300, 0, 400, 100), 25);

        let evicted = reg.evict_stale(40);
        assert_eq!(evicted, vec![a]);
        assert!(reg.get(a).is_none());
        assert!(reg.get(b).is_some());
    }

    #[test]
    fn classification_gate_fires_exactly_once() {
        let mut reg = TrackRegistry::new();
        let id = reg.match_or_create(bbox(0, 0, 100, 100), 1);

        let mut fired = 0;
        for frame in 2..=10 {
            reg.match_or_create(bbox(0, 0, 100, 100), frame);
            let track = reg.get_mut(id).unwrap();
            if track.needs_classification(5) {
                fired += 1;
                track.confirm(false, 0.8);
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(
            reg.get(id).unwrap().state,
            TrackState::Confirmed {
                is_known: false,
                confidence: 0.8
            }
        );
    }

    #[test]
    fn ids_are_never_reused_after_eviction() {
        let mut reg = TrackRegistry::new();
        let a = reg.match_or_create(bbox(0, 0, 100, 100), 1);
        reg.evict_stale(100);
        let b = reg.match_or_create(bbox(0, 0, 100, 100), 100);
        assert!(b > a);
    }
}
