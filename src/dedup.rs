//! Duplicate suppression for recently saved faces.
//!
//! Holds the perceptual hashes of faces persisted within the cooldown
//! window, across track ids: the same person re-entering under a fresh
//! track id hits the same hash. Eviction is lazy, triggered by the next
//! lookup that lands on an expired entry; there is no background sweep,
//! so the set stays bounded by the number of distinct faces seen.

use chrono::{DateTime, Duration, Local};

use crate::hash::FaceHash;
use crate::PersonType;

pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 5;
pub const DEFAULT_WINDOW_HOURS: i64 = 1;

/// Memory of one persisted face.
#[derive(Clone, Debug)]
pub struct SavedFace {
    pub hash: FaceHash,
    pub saved_at: DateTime<Local>,
    pub track_id: u64,
    pub person_type: PersonType,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DedupDecision {
    Fresh,
    Duplicate { since_save: Duration },
}

impl DedupDecision {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DedupDecision::Duplicate { .. })
    }
}

pub struct DuplicateSuppressor {
    entries: Vec<SavedFace>,
    similarity_threshold: u32,
    window: Duration,
}

impl DuplicateSuppressor {
    pub fn new(similarity_threshold: u32, window: Duration) -> Self {
        Self {
            entries: Vec::new(),
            similarity_threshold,
            window,
        }
    }

    /// Decide whether a candidate hash is a repeat of a recently saved face.
    ///
    /// A missing hash (failed computation on a bad crop) is never a
    /// duplicate. The scan short-circuits on the first entry within the
    /// similarity threshold: inside the window that entry wins, outside it
    /// the stale entry is evicted and the candidate passes.
    pub fn check(&mut self, candidate: Option<FaceHash>, now: DateTime<Local>) -> DedupDecision {
        let Some(candidate) = candidate else {
            return DedupDecision::Fresh;
        };

        for (idx, entry) in self.entries.iter().enumerate() {
            if candidate.distance(entry.hash) <= self.similarity_threshold {
                let since_save = now - entry.saved_at;
                if since_save < self.window {
                    return DedupDecision::Duplicate { since_save };
                }
                self.entries.remove(idx);
                return DedupDecision::Fresh;
            }
        }
        DedupDecision::Fresh
    }

    /// Remember a face that was actually persisted. Upserts by exact hash
    /// value, refreshing the save timestamp.
    pub fn record(
        &mut self,
        hash: FaceHash,
        track_id: u64,
        person_type: PersonType,
        now: DateTime<Local>,
    ) {
        let entry = SavedFace {
            hash,
            saved_at: now,
            track_id,
            person_type,
        };
        if let Some(existing) = self.entries.iter_mut().find(|e| e.hash == hash) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
