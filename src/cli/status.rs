use crate::pipeline::{DataParcel, PostureStatus, TrackState};
use crate::storage::UserId;
use serde::Serialize;

/// One line of the JSON status stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub timestamp: String,
    pub user_id: Option<UserId>,
    pub track_state: TrackState,
    pub calibration_needed: bool,
    pub posture: PostureStatus,
    pub faces: usize,
}

impl StatusReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    user_id: Option<UserId>,
    track_state: TrackState,
    calibration_needed: bool,
}

/// Turns the parcel stream into status reports, one per visible change.
#[derive(Debug, Default)]
pub struct StatusTracker {
    last: Option<Snapshot>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report for `parcel` if user, track state or calibration changed.
    pub fn observe(&mut self, parcel: &DataParcel) -> Option<StatusReport> {
        // Absence notices carry no perception state; keep the last one.
        let track_state = if parcel.frame.is_none() {
            self.last.map_or(TrackState::Recognizing, |s| s.track_state)
        } else {
            parcel.track_state
        };

        let snapshot = Snapshot {
            user_id: parcel.current_user_id,
            track_state,
            calibration_needed: parcel.calibration_needed,
        };
        if self.last == Some(snapshot) {
            return None;
        }

        if let Some(previous) = self.last {
            if previous.user_id != snapshot.user_id {
                tracing::info!("Current user: {:?} -> {:?}", previous.user_id, snapshot.user_id);
            }
            if previous.track_state != snapshot.track_state {
                tracing::info!("Track state: {} -> {}", previous.track_state, snapshot.track_state);
            }
        }
        self.last = Some(snapshot);

        Some(StatusReport {
            timestamp: chrono::Local::now().to_rfc3339(),
            user_id: snapshot.user_id,
            track_state: snapshot.track_state,
            calibration_needed: snapshot.calibration_needed,
            posture: parcel.posture_status,
            faces: parcel.boxes.len(),
        })
    }
}
