use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::common::error::{PipelineError, Result};
use crate::common::paths;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_index: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_capture_fps")]
    pub capture_fps: f64,
    #[serde(default)]
    pub auto_brightness: bool,
    #[serde(default = "default_brightness_threshold")]
    pub brightness_threshold: u8,
    #[serde(default = "default_true")]
    pub preview_enabled: bool,
    #[serde(default = "default_preview_quality")]
    pub preview_quality: u8,
}

fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_capture_fps() -> f64 { 30.0 }
fn default_brightness_threshold() -> u8 { 80 }
fn default_true() -> bool { true }
fn default_preview_quality() -> u8 { 80 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: default_width(),
            height: default_height(),
            capture_fps: default_capture_fps(),
            auto_brightness: false,
            brightness_threshold: default_brightness_threshold(),
            preview_enabled: true,
            preview_quality: default_preview_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_detector_path")]
    pub detector_path: PathBuf,
    #[serde(default = "default_recognizer_path")]
    pub recognizer_path: PathBuf,
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u32,
}

fn default_detector_path() -> PathBuf { PathBuf::from("face_detector.onnx") }
fn default_recognizer_path() -> PathBuf { PathBuf::from("face_embedder.onnx") }
fn default_optimization_level() -> u32 { 3 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_path: default_detector_path(),
            recognizer_path: default_recognizer_path(),
            optimization_level: default_optimization_level(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_detector_input")]
    pub input_width: u32,
    #[serde(default = "default_detector_input")]
    pub input_height: u32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default = "default_nms_iou")]
    pub nms_iou: f32,
    #[serde(default = "default_max_faces")]
    pub max_faces: usize,
}

fn default_detector_input() -> u32 { 640 }
fn default_confidence() -> f32 { 0.5 }
fn default_nms_iou() -> f32 { 0.45 }
fn default_max_faces() -> usize { 5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_width: default_detector_input(),
            input_height: default_detector_input(),
            confidence: default_confidence(),
            nms_iou: default_nms_iou(),
            max_faces: default_max_faces(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognizerConfig {
    #[serde(default = "default_recognizer_input")]
    pub input_size: u32,
    #[serde(default = "default_normalization_value")]
    pub normalization_value: f32,
    /// 1 for grayscale embedding models, 3 for RGB ones.
    #[serde(default = "default_channels")]
    pub channels: usize,
}

fn default_recognizer_input() -> u32 { 112 }
fn default_normalization_value() -> f32 { 127.5 }
fn default_channels() -> usize { 3 }

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            input_size: default_recognizer_input(),
            normalization_value: default_normalization_value(),
            channels: default_channels(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Search window around the last box, as a fraction of its size per side.
    #[serde(default = "default_search_margin")]
    pub search_margin: f32,
    #[serde(default = "default_max_match_error")]
    pub max_match_error: f32,
}

fn default_search_margin() -> f32 { 0.5 }
fn default_max_match_error() -> f32 { 0.3 }

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            search_margin: default_search_margin(),
            max_match_error: default_max_match_error(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerceptionConfig {
    #[serde(default = "default_processing_fps")]
    pub processing_fps: f64,
    #[serde(default = "default_bbox_reduce_ratio")]
    pub bbox_reduce_ratio: f32,
    #[serde(default = "default_redetection_interval")]
    pub redetection_interval: u32,
    #[serde(default = "default_face_match_threshold")]
    pub face_match_threshold: f32,
    #[serde(default = "default_true")]
    pub auto_track_largest: bool,
}

fn default_processing_fps() -> f64 { 6.0 }
fn default_bbox_reduce_ratio() -> f32 { 0.1 }
fn default_redetection_interval() -> u32 { 10 }
fn default_face_match_threshold() -> f32 { 0.6 }

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            processing_fps: default_processing_fps(),
            bbox_reduce_ratio: default_bbox_reduce_ratio(),
            redetection_interval: default_redetection_interval(),
            face_match_threshold: default_face_match_threshold(),
            auto_track_largest: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityConfig {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    #[serde(default = "default_samples_per_user")]
    pub samples_per_user: usize,
    #[serde(default = "default_unknown_streak")]
    pub unknown_streak_for_enroll: u32,
    #[serde(default = "default_absence_timeout")]
    pub absence_timeout_secs: f64,
    #[serde(default = "default_calibration_frames")]
    pub calibration_frames: u32,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_match_threshold() -> f32 { 0.63 }
fn default_samples_per_user() -> usize { 4 }
fn default_unknown_streak() -> u32 { 15 }
fn default_absence_timeout() -> f64 { 10.0 }

/// One day.
pub const MAX_ABSENCE_TIMEOUT_SECS: f64 = 86_400.0;
fn default_calibration_frames() -> u32 { 2 }
fn default_poll_interval() -> u64 { 200 }

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            samples_per_user: default_samples_per_user(),
            unknown_streak_for_enroll: default_unknown_streak(),
            absence_timeout_secs: default_absence_timeout(),
            calibration_frames: default_calibration_frames(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl IdentityConfig {
    pub fn absence_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.absence_timeout_secs.min(MAX_ABSENCE_TIMEOUT_SECS))
            .unwrap_or(Duration::ZERO)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,
}

fn default_stop_timeout() -> u64 { 1000 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { stop_timeout_ms: default_stop_timeout() }
    }
}

impl Config {
    /// Load the first config file found in the usual places, or defaults.
    pub fn load() -> Result<Self> {
        for candidate in paths::config_candidates() {
            if candidate.exists() {
                return Self::load_from_path(&candidate);
            }
        }

        tracing::info!("No config file found, using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| PipelineError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Resolve relative model paths against `base`.
    pub fn resolve_model_paths(&mut self, base: &Path) {
        if self.models.detector_path.is_relative() {
            self.models.detector_path = base.join(&self.models.detector_path);
        }
        if self.models.recognizer_path.is_relative() {
            self.models.recognizer_path = base.join(&self.models.recognizer_path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        // Camera
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(invalid(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(invalid(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }
        if !(self.camera.capture_fps > 0.0 && self.camera.capture_fps <= 240.0) {
            return Err(invalid(format!(
                "Capture FPS must be in (0, 240], got {}", self.camera.capture_fps
            )));
        }
        if self.camera.preview_quality == 0 || self.camera.preview_quality > 100 {
            return Err(invalid(format!(
                "Preview JPEG quality must be between 1 and 100, got {}",
                self.camera.preview_quality
            )));
        }

        // Detector / recognizer
        if self.detector.input_width == 0 || self.detector.input_width > 4096
            || self.detector.input_height == 0 || self.detector.input_height > 4096 {
            return Err(invalid(format!(
                "Detector input must be between 1 and 4096 per side, got {}x{}",
                self.detector.input_width, self.detector.input_height
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence) {
            return Err(invalid(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.nms_iou) {
            return Err(invalid(format!(
                "NMS IoU must be between 0.0 and 1.0, got {}", self.detector.nms_iou
            )));
        }
        if self.recognizer.input_size == 0 || self.recognizer.input_size > 1024 {
            return Err(invalid(format!(
                "Recognizer input size must be between 1 and 1024, got {}",
                self.recognizer.input_size
            )));
        }
        if self.recognizer.channels != 1 && self.recognizer.channels != 3 {
            return Err(invalid(format!(
                "Recognizer channels must be 1 or 3, got {}", self.recognizer.channels
            )));
        }

        // Tracker
        if !(self.tracker.search_margin > 0.0 && self.tracker.search_margin <= 2.0) {
            return Err(invalid(format!(
                "Tracker search margin must be in (0, 2], got {}", self.tracker.search_margin
            )));
        }
        if !(self.tracker.max_match_error > 0.0 && self.tracker.max_match_error <= 1.0) {
            return Err(invalid(format!(
                "Tracker max match error must be in (0, 1], got {}",
                self.tracker.max_match_error
            )));
        }

        // Perception
        if !(self.perception.processing_fps > 0.0 && self.perception.processing_fps <= 240.0) {
            return Err(invalid(format!(
                "Processing FPS must be in (0, 240], got {}", self.perception.processing_fps
            )));
        }
        if !(0.0..=0.5).contains(&self.perception.bbox_reduce_ratio) {
            return Err(invalid(format!(
                "Bounding box reduce ratio must be between 0.0 and 0.5, got {}",
                self.perception.bbox_reduce_ratio
            )));
        }
        if self.perception.redetection_interval == 0 {
            return Err(invalid("Re-detection interval must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.perception.face_match_threshold) {
            return Err(invalid(format!(
                "Face match threshold must be between 0.0 and 2.0, got {}",
                self.perception.face_match_threshold
            )));
        }

        // Identity
        if !(-1.0..=1.0).contains(&self.identity.match_threshold) {
            return Err(invalid(format!(
                "Match threshold must be between -1.0 and 1.0, got {}",
                self.identity.match_threshold
            )));
        }
        if self.identity.samples_per_user == 0 {
            return Err(invalid("Samples per user must be at least 1".to_string()));
        }
        if self.identity.unknown_streak_for_enroll == 0 {
            return Err(invalid("Unknown streak trigger must be at least 1".to_string()));
        }
        if !(0.0..=MAX_ABSENCE_TIMEOUT_SECS).contains(&self.identity.absence_timeout_secs) {
            return Err(invalid(format!(
                "Absence timeout must be between 0 and {} seconds, got {}",
                MAX_ABSENCE_TIMEOUT_SECS, self.identity.absence_timeout_secs
            )));
        }
        if self.identity.poll_interval_ms == 0 {
            return Err(invalid("Identity poll interval must be at least 1ms".to_string()));
        }

        if self.pipeline.stop_timeout_ms == 0 {
            return Err(invalid("Stop timeout must be at least 1ms".to_string()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> PipelineError {
    PipelineError::Config(message)
}
