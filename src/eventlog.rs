//! Append-only detection event log.
//!
//! Records are appended in confirmation order by the single pipeline writer;
//! readers get value snapshots. The JSON file layout (an array of records,
//! pretty-printed, ids equal to the record's position) is an external
//! contract shared with existing log consumers and must not change.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::PersonType;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One log record. Field names are part of the on-disk contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub person_type: PersonType,
    pub confidence: f32,
    /// ISO-8601 local time, microsecond precision, no zone suffix.
    pub timestamp: String,
    pub date: String,
    pub time: String,
    pub image_path: Option<String>,
}

impl DetectionEvent {
    fn new(
        id: u64,
        person_type: PersonType,
        confidence: f32,
        at: DateTime<Local>,
        image_path: Option<String>,
    ) -> Self {
        let naive = at.naive_local();
        Self {
            id,
            person_type,
            confidence,
            timestamp: naive.format(TIMESTAMP_FORMAT).to_string(),
            date: naive.format("%Y-%m-%d").to_string(),
            time: naive.format("%H:%M:%S").to_string(),
            image_path,
        }
    }

    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f").ok()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub known: u64,
    pub unknown: u64,
}

impl WindowCounts {
    pub fn total(&self) -> u64 {
        self.known + self.unknown
    }
}

/// Event log boundary. The pipeline owns the sole writing handle; the query
/// methods serve the status surface and the CLI.
pub trait EventLogStore: Send {
    /// Append a record. The id is the 0-based log length at append time.
    fn append(
        &mut self,
        person_type: PersonType,
        confidence: f32,
        at: DateTime<Local>,
        image_path: Option<String>,
    ) -> Result<DetectionEvent>;

    fn all(&self) -> &[DetectionEvent];

    fn len(&self) -> usize {
        self.all().len()
    }

    fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    /// Most recent first, optionally filtered by type, at most `limit`.
    fn recent(&self, limit: usize, type_filter: Option<PersonType>) -> Vec<DetectionEvent> {
        let filtered: Vec<&DetectionEvent> = self
            .all()
            .iter()
            .filter(|e| type_filter.map_or(true, |t| e.person_type == t))
            .collect();
        let start = filtered.len().saturating_sub(limit);
        filtered[start..].iter().rev().map(|e| (*e).clone()).collect()
    }

    fn by_id(&self, id: u64) -> Option<DetectionEvent> {
        self.all().iter().find(|e| e.id == id).cloned()
    }

    /// Known/unknown counts for records at or after `cutoff`. Records with
    /// unparsable timestamps are skipped.
    fn counts_since(&self, cutoff: DateTime<Local>) -> WindowCounts {
        let cutoff = cutoff.naive_local();
        let mut counts = WindowCounts::default();
        for event in self.all() {
            let Some(at) = event.parsed_timestamp() else {
                continue;
            };
            if at <= cutoff {
                continue;
            }
            match event.person_type {
                PersonType::Known => counts.known += 1,
                PersonType::Unknown => counts.unknown += 1,
            }
        }
        counts
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: Vec<DetectionEvent>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLogStore for InMemoryEventLog {
    fn append(
        &mut self,
        person_type: PersonType,
        confidence: f32,
        at: DateTime<Local>,
        image_path: Option<String>,
    ) -> Result<DetectionEvent> {
        let event = DetectionEvent::new(
            self.events.len() as u64,
            person_type,
            confidence,
            at,
            image_path,
        );
        self.events.push(event.clone());
        Ok(event)
    }

    fn all(&self) -> &[DetectionEvent] {
        &self.events
    }
}

/// JSON-file-backed store. Loads any pre-existing log at open so the id
/// sequence continues across restarts; each append rewrites the file through
/// a temp-and-rename so an interrupted write never leaves a torn log.
pub struct JsonFileEventLog {
    path: PathBuf,
    events: Vec<DetectionEvent>,
}

impl JsonFileEventLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let events = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("read event log {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parse event log {}", path.display()))?
        } else {
            Vec::new()
        };
        Ok(Self { path, events })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.events)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write event log {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace event log {}", self.path.display()))?;
        Ok(())
    }
}

impl EventLogStore for JsonFileEventLog {
    fn append(
        &mut self,
        person_type: PersonType,
        confidence: f32,
        at: DateTime<Local>,
        image_path: Option<String>,
    ) -> Result<DetectionEvent> {
        let event = DetectionEvent::new(
            self.events.len() as u64,
            person_type,
            confidence,
            at,
            image_path,
        );
        self.events.push(event.clone());
        self.persist()?;
        Ok(event)
    }

    fn all(&self) -> &[DetectionEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Local> {
        Local::now()
    }

    #[test]
    fn ids_follow_log_length() {
        let mut log = InMemoryEventLog::new();
        let a = log.append(PersonType::Unknown, 0.8, t0(), None).unwrap();
        let b = log.append(PersonType::Known, 0.95, t0(), None).unwrap();
        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
    }

    #[test]
    fn recent_is_newest_first_with_filter() {
        let mut log = InMemoryEventLog::new();
        log.append(PersonType::Unknown, 0.8, t0(), None).unwrap();
        log.append(PersonType::Known, 0.9, t0(), None).unwrap();
        log.append(PersonType::Unknown, 0.7, t0(), None).unwrap();

        let recent = log.recent(10, None);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].id, 2);
        assert_eq!(recent[2].id, 0);

        let unknown = log.recent(1, Some(PersonType::Unknown));
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].id, 2);
    }

    #[test]
    fn counts_since_skips_older_records() {
        let mut log = InMemoryEventLog::new();
        let start = t0();
        log.append(PersonType::Unknown, 0.8, start - Duration::hours(25), None)
            .unwrap();
        log.append(PersonType::Unknown, 0.8, start - Duration::hours(2), None)
            .unwrap();
        log.append(PersonType::Known, 0.9, start - Duration::minutes(5), None)
            .unwrap();

        let counts = log.counts_since(start - Duration::hours(24));
        assert_eq!(counts.unknown, 1);
        assert_eq!(counts.known, 1);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn json_file_log_resumes_id_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security_log.json");

        {
            let mut log = JsonFileEventLog::open(&path).unwrap();
            log.append(PersonType::Unknown, 0.8, t0(), Some("a.jpg".into()))
                .unwrap();
        }

        let mut log = JsonFileEventLog::open(&path).unwrap();
        assert_eq!(log.len(), 1);
        let next = log.append(PersonType::Known, 0.97, t0(), None).unwrap();
        assert_eq!(next.id, 1);
    }

    #[test]
    fn serialized_layout_matches_contract() {
        let event = DetectionEvent::new(0, PersonType::Unknown, 0.8, t0(), None);
        let json = serde_json::to_value(&event).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["id", "type", "confidence", "timestamp", "date", "time", "image_path"] {
            assert!(obj.contains_key(key), "missing field {}", key);
        }
        assert_eq!(obj["type"], "unknown");
        assert!(obj["image_path"].is_null());
    }
}
