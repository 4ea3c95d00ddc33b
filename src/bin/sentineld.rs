//! sentineld - perimeter camera monitoring daemon
//!
//! This daemon:
//! 1. Connects to the ESP32-CAM stream (MJPEG or snapshot polling)
//! 2. Runs person detection on every Nth frame
//! 3. Confirms tracks, classifies faces once per track, suppresses
//!    duplicate faces within the cooldown window
//! 4. Appends accepted detections to the JSON event log and saves
//!    annotated images
//! 5. Pages the ESP32 buzzer for unknown persons, throttled per track

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;

use sentinel_cam::{
    BuzzerClient, Engine, EngineConfig, Esp32Config, Esp32Source, EventLogStore, ImageStore,
    JsonFileEventLog, NullClassifier, SentineldConfig, StubDetector, SystemClock,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = SentineldConfig::load()?;

    log::info!("sentineld {} starting", env!("CARGO_PKG_VERSION"));
    log::info!("camera: {}", cfg.camera_url);
    log::info!("buzzer: {}", cfg.buzzer.alert_url);
    log::info!(
        "event log: {}, images: {} (save_images={})",
        cfg.storage.log_path,
        cfg.storage.images_dir,
        cfg.storage.save_images
    );

    let buzzer = BuzzerClient::new(cfg.buzzer.alert_url.clone(), cfg.buzzer.test_url.clone());
    if std::env::var("SENTINEL_BUZZER_SELFTEST").as_deref() == Ok("1") {
        match buzzer.test() {
            Ok(()) => log::info!("buzzer self-test ok"),
            Err(e) => log::warn!("buzzer self-test failed: {}", e),
        }
    }

    let log_store = JsonFileEventLog::open(&cfg.storage.log_path)?;
    log::info!("{} events loaded from log", log_store.len());
    let images = ImageStore::open(&cfg.storage.images_dir, cfg.storage.save_images)?;

    let engine_cfg = EngineConfig {
        person_confidence: cfg.detection.person_confidence,
        known_confidence: cfg.detection.known_confidence,
        min_detections: cfg.detection.min_detections,
        frame_skip: cfg.detection.frame_skip,
        alert_cooldown: Duration::seconds(cfg.alert_cooldown_secs as i64),
        dedup_window: Duration::hours(cfg.dedup.window_hours as i64),
        hash_similarity_threshold: cfg.dedup.similarity_threshold,
        buzzer_pattern: cfg.buzzer.pattern,
        ..EngineConfig::default()
    };

    // No neural backend is wired in this build; the stub detector reports
    // nothing until a model backend is configured.
    log::warn!("no model backend configured; using stub detector");
    let mut engine = Engine::new(
        engine_cfg,
        Box::new(StubDetector),
        Box::new(NullClassifier),
        Box::new(buzzer),
        Arc::new(SystemClock),
        Box::new(log_store),
        images,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("stop requested");
        stop_handler.store(true, Ordering::SeqCst);
    })?;

    let mut source = Esp32Source::new(Esp32Config {
        url: cfg.camera_url.clone(),
    })?;
    engine.run(&mut source, &stop)
}
