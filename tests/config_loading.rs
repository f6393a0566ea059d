use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use marker_overlay::assets::BuiltinPattern;
use marker_overlay::config::DetectionMode;
use marker_overlay::{CameraParamsRef, Config, FrameSize, PatternRef, TriggerMode};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MARKER_OVERLAY_CONFIG",
        "MARKER_OVERLAY_SOURCE",
        "MARKER_OVERLAY_PATTERN",
        "MARKER_OVERLAY_CAMERA_PARAMS",
        "MARKER_OVERLAY_TRIGGER",
        "MARKER_OVERLAY_VIEWPORT",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(body.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = Config::load().expect("load defaults");
    assert_eq!(cfg.source.url, "stub://webcam");
    assert_eq!(cfg.trigger, TriggerMode::Auto);
    assert_eq!(cfg.viewport, FrameSize::new(1280, 720));
    assert_eq!(cfg.tracker.pattern, PatternRef::Builtin(BuiltinPattern::Hiro));
    assert_eq!(cfg.tracker.camera_parameters, CameraParamsRef::Default);
    assert_eq!(cfg.tracker.detection_mode, DetectionMode::Mono);
    assert_eq!(cfg.camera.fov_deg, 75.0);
    assert_eq!(cfg.cube.color, 0xff0000);
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "trigger": "tap",
            "refresh_rate": 30,
            "source": {
                "url": "stub://lab-camera",
                "width": 800,
                "height": 600,
                "ready_after_ms": 500
            },
            "tracker": {
                "pattern": "kanji",
                "camera_parameters": "data/camera_para.dat",
                "detection_mode": "color_and_matrix"
            },
            "viewport": { "width": 1024, "height": 768 },
            "cube": { "size": 0.25 }
        }"#,
    );

    std::env::set_var("MARKER_OVERLAY_CONFIG", file.path());
    std::env::set_var("MARKER_OVERLAY_SOURCE", "stub://override");
    std::env::set_var("MARKER_OVERLAY_VIEWPORT", "800x600");

    let cfg = Config::load().expect("load config");
    assert_eq!(cfg.trigger, TriggerMode::Tap);
    assert_eq!(cfg.refresh_rate, 30);
    assert_eq!(cfg.source.url, "stub://override");
    assert_eq!(cfg.source.width, 800);
    assert_eq!(cfg.source.ready_after, Duration::from_millis(500));
    assert_eq!(cfg.tracker.pattern, PatternRef::Builtin(BuiltinPattern::Kanji));
    assert_eq!(
        cfg.tracker.camera_parameters,
        CameraParamsRef::File(PathBuf::from("data/camera_para.dat"))
    );
    assert_eq!(cfg.tracker.detection_mode, DetectionMode::ColorAndMatrix);
    assert_eq!(cfg.viewport, FrameSize::new(800, 600));
    assert_eq!(cfg.cube.size, 0.25);
    // Unset sections keep defaults.
    assert_eq!(cfg.camera.near, 0.1);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
trigger = "auto"

[source]
url = "/dev/video2"
target_fps = 15

[tracker]
pattern = "https://example.invalid/markers/custom.patt"

[camera]
fov_deg = 60.0
"#,
    );

    let cfg = Config::load_from(Some(file.path())).expect("load toml");
    assert_eq!(cfg.source.url, "/dev/video2");
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(
        cfg.tracker.pattern,
        PatternRef::Url("https://example.invalid/markers/custom.patt".to_string())
    );
    assert_eq!(cfg.camera.fov_deg, 60.0);
}

#[test]
fn env_trigger_override_accepts_aliases() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MARKER_OVERLAY_TRIGGER", "click");
    let cfg = Config::load().expect("load config");
    assert_eq!(cfg.trigger, TriggerMode::Tap);

    std::env::set_var("MARKER_OVERLAY_TRIGGER", "sometimes");
    let err = Config::load().unwrap_err();
    assert!(err.to_string().contains("unknown trigger"));

    clear_env();
}

#[test]
fn rejects_unknown_fields() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(".json", r#"{ "source": { "uri": "stub://typo" } }"#);
    let err = Config::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(".json", r#"{ "camera": { "near": 5.0, "far": 1.0 } }"#);
    let err = Config::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("near < far"));

    let file = write_config(".json", r#"{ "refresh_rate": 0 }"#);
    assert!(Config::load_from(Some(file.path())).is_err());

    std::env::set_var("MARKER_OVERLAY_VIEWPORT", "wide");
    let err = Config::load().unwrap_err();
    assert!(err.to_string().contains("WIDTHxHEIGHT"));

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("temp dir");
    let err = Config::load_from(Some(&dir.path().join("absent.json"))).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}
