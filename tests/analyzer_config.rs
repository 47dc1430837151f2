use std::io::Write;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use roosterscan::config::{
    AnalyzerConfig, ENV_CLASS_LABELS, ENV_CONFIG, ENV_MIN_KEYPOINTS, ENV_POSE_CONFIDENCE_THRESHOLD,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        ENV_CONFIG,
        ENV_POSE_CONFIDENCE_THRESHOLD,
        ENV_MIN_KEYPOINTS,
        ENV_CLASS_LABELS,
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AnalyzerConfig::load().expect("load config");

    assert_eq!(cfg, AnalyzerConfig::default());
    assert_eq!(cfg.gate.pose_confidence, 0.65);
    assert_eq!(cfg.gate.min_keypoints, 12);
    assert_eq!(cfg.anomalies.wing_asymmetry_px, 30.0);
    assert_eq!(cfg.anomalies.leg_offset_px, 25.0);
    assert_eq!(cfg.models.class_labels[0], "bumblefoot");
}

#[test]
fn loads_json_config_from_env_path_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{
            "gate": {
                "pose_confidence_threshold": 0.7,
                "min_keypoints_detected": 14
            },
            "pose": {
                "wing_asymmetry_px": 40.0
            },
            "models": {
                "classifier_input_size": 256,
                "class_labels": ["healthy", "bumblefoot"]
            }
        }"#,
    );
    std::env::set_var(ENV_CONFIG, file.path());
    std::env::set_var(ENV_MIN_KEYPOINTS, "10");

    let cfg = AnalyzerConfig::load().expect("load config");

    assert_eq!(cfg.gate.pose_confidence, 0.7);
    assert_eq!(cfg.gate.min_keypoints, 10);
    assert_eq!(cfg.anomalies.wing_asymmetry_px, 40.0);
    assert_eq!(cfg.anomalies.leg_offset_px, 25.0);
    assert_eq!(cfg.models.classifier_input_size, 256);
    assert_eq!(cfg.models.pose_input_size, 640);
    assert_eq!(cfg.models.class_labels, vec!["healthy", "bumblefoot"]);

    clear_env();
}

#[test]
fn loads_toml_config_from_explicit_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
[gate]
pose_confidence_threshold = 0.5

[pose]
keypoint_visibility = 0.4
leg_offset_px = 20.0
"#,
    );
    std::env::set_var(ENV_CLASS_LABELS, "healthy, wing_injury ,");

    let cfg = AnalyzerConfig::load_from(Some(file.path())).expect("load config");

    assert_eq!(cfg.gate.pose_confidence, 0.5);
    assert_eq!(cfg.gate.min_keypoints, 12);
    assert_eq!(cfg.anomalies.keypoint_visibility, 0.4);
    assert_eq!(cfg.anomalies.leg_offset_px, 20.0);
    assert_eq!(cfg.models.class_labels, vec!["healthy", "wing_injury"]);

    clear_env();
}

#[test]
fn cli_overrides_apply_after_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var(ENV_POSE_CONFIDENCE_THRESHOLD, "0.8");

    let cfg = AnalyzerConfig::load_from(None)
        .and_then(|cfg| cfg.with_overrides(Some(0.6), None))
        .expect("load config");

    assert_eq!(cfg.gate.pose_confidence, 0.6);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var(ENV_POSE_CONFIDENCE_THRESHOLD, "high");
    assert!(AnalyzerConfig::load().is_err());
    std::env::set_var(ENV_POSE_CONFIDENCE_THRESHOLD, "1.2");
    assert!(AnalyzerConfig::load().is_err());
    clear_env();

    std::env::set_var(ENV_MIN_KEYPOINTS, "-3");
    assert!(AnalyzerConfig::load().is_err());
    clear_env();

    let unknown = config_file(".json", r#"{"gate": {"threshold": 0.5}}"#);
    assert!(AnalyzerConfig::load_from(Some(unknown.path())).is_err());

    let zero_size = config_file(".toml", "[models]\npose_input_size = 0\n");
    assert!(AnalyzerConfig::load_from(Some(zero_size.path())).is_err());

    let missing = std::env::temp_dir().join("roosterscan-missing-config.json");
    let err = AnalyzerConfig::load_from(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}
