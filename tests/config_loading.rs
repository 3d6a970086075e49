use posture_sup::common::{Config, PipelineError};
use std::io::Write;
use std::path::Path;

#[test]
fn loads_sections_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[camera]
device_index = 2
capture_fps = 15.0
auto_brightness = true

[perception]
redetection_interval = 5
bbox_reduce_ratio = 0.2

[identity]
samples_per_user = 6
absence_timeout_secs = 3.5

[pipeline]
stop_timeout_ms = 250
"#
    )
    .unwrap();

    let config = Config::load_from_path(file.path()).unwrap();
    assert_eq!(config.camera.device_index, 2);
    assert!(config.camera.auto_brightness);
    assert_eq!(config.perception.redetection_interval, 5);
    assert_eq!(config.identity.samples_per_user, 6);
    assert_eq!(config.identity.absence_timeout().as_millis(), 3500);
    assert_eq!(config.pipeline.stop_timeout_ms, 250);

    // Untouched fields keep their defaults.
    assert_eq!(config.camera.width, 640);
    assert_eq!(config.identity.unknown_streak_for_enroll, 15);
    assert!(config.perception.auto_track_largest);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let err = Config::load_from_path(Path::new("/definitely/not/here.toml")).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn invalid_values_are_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[identity]\nmatch_threshold = 3.0").unwrap();
    assert!(Config::load_from_path(file.path()).is_err());
}

#[test]
fn malformed_toml_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[camera\nwidth = ").unwrap();
    assert!(matches!(
        Config::load_from_path(file.path()),
        Err(PipelineError::Config(_))
    ));
}

#[test]
fn relative_model_paths_are_resolved() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.resolve_model_paths(dir.path());
    assert_eq!(config.models.detector_path, dir.path().join("face_detector.onnx"));
    assert_eq!(config.models.recognizer_path, dir.path().join("face_embedder.onnx"));
}
