use crate::core::{BoundingBox, Embedding, Frame};
use crate::storage::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    #[default]
    Recognizing,
    StartTracking,
    Tracking,
}

impl std::fmt::Display for TrackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrackState::Recognizing => "RECOGNIZING",
            TrackState::StartTracking => "START_TRACKING",
            TrackState::Tracking => "TRACKING",
        };
        f.write_str(name)
    }
}

/// Output of the posture classifier. Nothing in this crate classifies
/// posture, so parcels carry `Unknown` unless a consumer fills it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureStatus {
    #[default]
    Unknown,
    Normal,
    Turtle,
    #[serde(rename = "l")]
    Reclined,
    LeanLeft,
    LeanRight,
}

/// Requests from outside the perception thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingCommand {
    Start(BoundingBox),
    Stop,
}

/// One unit of work flowing perception -> identity -> presentation.
#[derive(Debug, Clone, Default)]
pub struct DataParcel {
    /// `None` only on absence notices sent by the identity worker.
    pub frame: Option<Frame>,
    pub embeddings: Vec<Embedding>,
    pub boxes: Vec<BoundingBox>,
    pub track_state: TrackState,
    pub current_user_id: Option<UserId>,
    pub calibration_needed: bool,
    pub posture_status: PostureStatus,
}

impl DataParcel {
    pub fn recognizing(frame: Frame, boxes: Vec<BoundingBox>, embeddings: Vec<Embedding>) -> Self {
        Self {
            frame: Some(frame),
            boxes,
            embeddings,
            track_state: TrackState::Recognizing,
            ..Default::default()
        }
    }

    pub fn tracking(frame: Frame, bbox: BoundingBox) -> Self {
        Self {
            frame: Some(frame),
            boxes: vec![bbox],
            track_state: TrackState::Tracking,
            ..Default::default()
        }
    }

    pub fn absence_notice() -> Self {
        Self::default()
    }

    /// True for the single-box, embedding-free parcels emitted while tracking.
    pub fn is_tracking_update(&self) -> bool {
        self.track_state == TrackState::Tracking
            && !self.boxes.is_empty()
            && self.embeddings.is_empty()
    }
}
