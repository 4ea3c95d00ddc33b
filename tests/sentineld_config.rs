use std::sync::Mutex;

use tempfile::NamedTempFile;

use sentinel_cam::SentineldConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTINEL_CONFIG",
        "SENTINEL_CAMERA_URL",
        "SENTINEL_BUZZER_URL",
        "SENTINEL_LOG_PATH",
        "SENTINEL_IMAGES_DIR",
        "SENTINEL_ALERT_COOLDOWN_SECS",
        "SENTINEL_FRAME_SKIP",
        "SENTINEL_SAVE_IMAGES",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "camera": { "url": "http://10.0.0.20/stream" },
        "buzzer": {
            "alert_url": "http://10.0.0.21/alert",
            "test_url": "http://10.0.0.21/test",
            "pattern": 3
        },
        "detection": {
            "person_confidence": 0.8,
            "known_confidence": 0.9,
            "min_detections": 7,
            "frame_skip": 3
        },
        "alerts": { "cooldown_seconds": 45 },
        "storage": {
            "images_dir": "captures",
            "log_path": "perimeter_log.json",
            "save_images": false
        },
        "dedup": { "window_hours": 2, "similarity_threshold": 8 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SENTINEL_CONFIG", file.path());
    std::env::set_var("SENTINEL_CAMERA_URL", "http://10.0.0.99/stream");
    std::env::set_var("SENTINEL_ALERT_COOLDOWN_SECS", "60");

    let cfg = SentineldConfig::load().expect("load config");

    assert_eq!(cfg.camera_url, "http://10.0.0.99/stream");
    assert_eq!(cfg.buzzer.alert_url, "http://10.0.0.21/alert");
    assert_eq!(cfg.buzzer.test_url.as_deref(), Some("http://10.0.0.21/test"));
    assert_eq!(cfg.buzzer.pattern, 3);
    assert_eq!(cfg.detection.person_confidence, 0.8);
    assert_eq!(cfg.detection.known_confidence, 0.9);
    assert_eq!(cfg.detection.min_detections, 7);
    assert_eq!(cfg.detection.frame_skip, 3);
    assert_eq!(cfg.alert_cooldown_secs, 60);
    assert_eq!(cfg.storage.images_dir, "captures");
    assert_eq!(cfg.storage.log_path, "perimeter_log.json");
    assert!(!cfg.storage.save_images);
    assert_eq!(cfg.dedup.window_hours, 2);
    assert_eq!(cfg.dedup.similarity_threshold, 8);

    clear_env();
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SentineldConfig::load().expect("load defaults");

    assert_eq!(cfg.detection.person_confidence, 0.75);
    assert_eq!(cfg.detection.min_detections, 5);
    assert_eq!(cfg.detection.frame_skip, 5);
    assert_eq!(cfg.alert_cooldown_secs, 30);
    assert_eq!(cfg.storage.log_path, "security_log.json");
    assert!(cfg.storage.save_images);
    assert_eq!(cfg.dedup.window_hours, 1);
    assert_eq!(cfg.dedup.similarity_threshold, 5);

    clear_env();
}

#[test]
fn rejects_out_of_range_confidence() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "detection": { "person_confidence": 1.4 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("SENTINEL_CONFIG", file.path());

    assert!(SentineldConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_FRAME_SKIP", "every-fifth");
    assert!(SentineldConfig::load().is_err());
    clear_env();

    std::env::set_var("SENTINEL_SAVE_IMAGES", "maybe");
    assert!(SentineldConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_zero_frame_skip() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_FRAME_SKIP", "0");
    assert!(SentineldConfig::load().is_err());

    clear_env();
}
