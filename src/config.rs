use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CAMERA_URL: &str = "http://192.168.1.100/stream";
const DEFAULT_BUZZER_ALERT_URL: &str = "http://192.168.1.101/alert";
const DEFAULT_BUZZER_TEST_URL: &str = "http://192.168.1.101/test";
const DEFAULT_BUZZER_PATTERN: u8 = 1;
const DEFAULT_PERSON_CONFIDENCE: f32 = 0.75;
const DEFAULT_KNOWN_CONFIDENCE: f32 = 0.92;
const DEFAULT_MIN_DETECTIONS: u32 = 5;
const DEFAULT_FRAME_SKIP: u64 = 5;
const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 30;
const DEFAULT_IMAGES_DIR: &str = "security_images";
const DEFAULT_LOG_PATH: &str = "security_log.json";
const DEFAULT_DEDUP_WINDOW_HOURS: u64 = 1;
const DEFAULT_HASH_SIMILARITY: u32 = 5;

#[derive(Debug, Deserialize, Default)]
struct SentineldConfigFile {
    camera: Option<CameraConfigFile>,
    buzzer: Option<BuzzerConfigFile>,
    detection: Option<DetectionConfigFile>,
    alerts: Option<AlertsConfigFile>,
    storage: Option<StorageConfigFile>,
    dedup: Option<DedupConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct BuzzerConfigFile {
    alert_url: Option<String>,
    test_url: Option<String>,
    pattern: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    person_confidence: Option<f32>,
    known_confidence: Option<f32>,
    min_detections: Option<u32>,
    frame_skip: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertsConfigFile {
    cooldown_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct StorageConfigFile {
    images_dir: Option<String>,
    log_path: Option<String>,
    save_images: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DedupConfigFile {
    window_hours: Option<u64>,
    similarity_threshold: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SentineldConfig {
    pub camera_url: String,
    pub buzzer: BuzzerSettings,
    pub detection: DetectionSettings,
    pub alert_cooldown_secs: u64,
    pub storage: StorageSettings,
    pub dedup: DedupSettings,
}

#[derive(Debug, Clone)]
pub struct BuzzerSettings {
    pub alert_url: String,
    pub test_url: Option<String>,
    pub pattern: u8,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub person_confidence: f32,
    pub known_confidence: f32,
    pub min_detections: u32,
    pub frame_skip: u64,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub images_dir: String,
    pub log_path: String,
    pub save_images: bool,
}

#[derive(Debug, Clone)]
pub struct DedupSettings {
    pub window_hours: u64,
    pub similarity_threshold: u32,
}

impl SentineldConfig {
    /// Load from the JSON file named by `SENTINEL_CONFIG` (when set), apply
    /// env-var overrides, validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentineldConfigFile) -> Self {
        let camera_url = file
            .camera
            .and_then(|camera| camera.url)
            .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string());
        let buzzer = BuzzerSettings {
            alert_url: file
                .buzzer
                .as_ref()
                .and_then(|buzzer| buzzer.alert_url.clone())
                .unwrap_or_else(|| DEFAULT_BUZZER_ALERT_URL.to_string()),
            test_url: file
                .buzzer
                .as_ref()
                .and_then(|buzzer| buzzer.test_url.clone())
                .or_else(|| Some(DEFAULT_BUZZER_TEST_URL.to_string())),
            pattern: file
                .buzzer
                .as_ref()
                .and_then(|buzzer| buzzer.pattern)
                .unwrap_or(DEFAULT_BUZZER_PATTERN),
        };
        let detection = DetectionSettings {
            person_confidence: file
                .detection
                .as_ref()
                .and_then(|d| d.person_confidence)
                .unwrap_or(DEFAULT_PERSON_CONFIDENCE),
            known_confidence: file
                .detection
                .as_ref()
                .and_then(|d| d.known_confidence)
                .unwrap_or(DEFAULT_KNOWN_CONFIDENCE),
            min_detections: file
                .detection
                .as_ref()
                .and_then(|d| d.min_detections)
                .unwrap_or(DEFAULT_MIN_DETECTIONS),
            frame_skip: file
                .detection
                .as_ref()
                .and_then(|d| d.frame_skip)
                .unwrap_or(DEFAULT_FRAME_SKIP),
        };
        let alert_cooldown_secs = file
            .alerts
            .and_then(|alerts| alerts.cooldown_seconds)
            .unwrap_or(DEFAULT_ALERT_COOLDOWN_SECS);
        let storage = StorageSettings {
            images_dir: file
                .storage
                .as_ref()
                .and_then(|s| s.images_dir.clone())
                .unwrap_or_else(|| DEFAULT_IMAGES_DIR.to_string()),
            log_path: file
                .storage
                .as_ref()
                .and_then(|s| s.log_path.clone())
                .unwrap_or_else(|| DEFAULT_LOG_PATH.to_string()),
            save_images: file
                .storage
                .as_ref()
                .and_then(|s| s.save_images)
                .unwrap_or(true),
        };
        let dedup = DedupSettings {
            window_hours: file
                .dedup
                .as_ref()
                .and_then(|d| d.window_hours)
                .unwrap_or(DEFAULT_DEDUP_WINDOW_HOURS),
            similarity_threshold: file
                .dedup
                .as_ref()
                .and_then(|d| d.similarity_threshold)
                .unwrap_or(DEFAULT_HASH_SIMILARITY),
        };
        Self {
            camera_url,
            buzzer,
            detection,
            alert_cooldown_secs,
            storage,
            dedup,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SENTINEL_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera_url = url;
            }
        }
        if let Ok(url) = std::env::var("SENTINEL_BUZZER_URL") {
            if !url.trim().is_empty() {
                self.buzzer.alert_url = url;
            }
        }
        if let Ok(path) = std::env::var("SENTINEL_LOG_PATH") {
            if !path.trim().is_empty() {
                self.storage.log_path = path;
            }
        }
        if let Ok(dir) = std::env::var("SENTINEL_IMAGES_DIR") {
            if !dir.trim().is_empty() {
                self.storage.images_dir = dir;
            }
        }
        if let Ok(secs) = std::env::var("SENTINEL_ALERT_COOLDOWN_SECS") {
            self.alert_cooldown_secs = secs.parse().map_err(|_| {
                anyhow!("SENTINEL_ALERT_COOLDOWN_SECS must be an integer number of seconds")
            })?;
        }
        if let Ok(skip) = std::env::var("SENTINEL_FRAME_SKIP") {
            self.detection.frame_skip = skip
                .parse()
                .map_err(|_| anyhow!("SENTINEL_FRAME_SKIP must be a positive integer"))?;
        }
        if let Ok(save) = std::env::var("SENTINEL_SAVE_IMAGES") {
            self.storage.save_images = match save.trim() {
                "1" | "true" => true,
                "0" | "false" => false,
                other => return Err(anyhow!("SENTINEL_SAVE_IMAGES must be 0/1, got '{}'", other)),
            };
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("person_confidence", self.detection.person_confidence),
            ("known_confidence", self.detection.known_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) || value == 0.0 {
                return Err(anyhow!("{} must be in (0, 1]", name));
            }
        }
        if self.detection.min_detections == 0 {
            return Err(anyhow!("min_detections must be at least 1"));
        }
        if self.detection.frame_skip == 0 {
            return Err(anyhow!("frame_skip must be at least 1"));
        }
        if self.alert_cooldown_secs == 0 {
            return Err(anyhow!("alert cooldown must be greater than zero"));
        }
        if self.dedup.window_hours == 0 {
            return Err(anyhow!("dedup window must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SentineldConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
