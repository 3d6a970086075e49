#![allow(dead_code)]

use parking_lot::Mutex;
use posture_sup::camera::FrameSource;
use posture_sup::core::{
    BoundingBox, DetectOutcome, DetectedFace, EmbedOutcome, FaceAnalyzer, Frame, InitOutcome,
    TrackOutcome, TrackerFactory, VisualTracker,
};
use posture_sup::Result;
use image::{DynamicImage, GrayImage, Luma};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub fn test_frame() -> Frame {
    Frame::new(DynamicImage::ImageLuma8(GrayImage::from_pixel(320, 240, Luma([90]))))
}

pub fn face(bbox: BoundingBox, embedding: Vec<f32>) -> DetectedFace {
    DetectedFace { bbox, embedding }
}

/// Analyzer that replays queued detection results, then reports no faces.
#[derive(Clone, Default)]
pub struct ScriptedAnalyzer {
    detections: Arc<Mutex<VecDeque<DetectOutcome>>>,
    embeddings: Arc<Mutex<VecDeque<EmbedOutcome>>>,
    fallback: Arc<Mutex<Option<DetectOutcome>>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_detection(&self, outcome: DetectOutcome) {
        self.detections.lock().push_back(outcome);
    }

    pub fn push_faces(&self, faces: Vec<DetectedFace>) {
        self.push_detection(DetectOutcome::Faces(faces));
    }

    pub fn push_embedding(&self, outcome: EmbedOutcome) {
        self.embeddings.lock().push_back(outcome);
    }

    /// Returned whenever the detection queue is empty.
    pub fn always(&self, outcome: DetectOutcome) {
        *self.fallback.lock() = Some(outcome);
    }
}

impl FaceAnalyzer for ScriptedAnalyzer {
    fn detect(&mut self, _frame: &Frame) -> DetectOutcome {
        if let Some(outcome) = self.detections.lock().pop_front() {
            return outcome;
        }
        self.fallback.lock().clone().unwrap_or(DetectOutcome::NoFaces)
    }

    fn embed(&mut self, _frame: &Frame, _bbox: &BoundingBox) -> EmbedOutcome {
        self.embeddings.lock().pop_front().unwrap_or(EmbedOutcome::NoFace)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Built(usize),
    Init(usize, BoundingBox),
    Update(usize),
}

#[derive(Default)]
struct TrackerScript {
    inits: VecDeque<InitOutcome>,
    updates: VecDeque<TrackOutcome>,
    built: usize,
    events: Vec<TrackerEvent>,
}

/// Shared script for every tracker a factory builds.
///
/// Unscripted inits succeed; unscripted updates report the init box.
#[derive(Clone, Default)]
pub struct ScriptedTrackers {
    script: Arc<Mutex<TrackerScript>>,
}

impl ScriptedTrackers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_init(&self, outcome: InitOutcome) {
        self.script.lock().inits.push_back(outcome);
    }

    pub fn push_update(&self, outcome: TrackOutcome) {
        self.script.lock().updates.push_back(outcome);
    }

    pub fn events(&self) -> Vec<TrackerEvent> {
        self.script.lock().events.clone()
    }

    pub fn factory(&self) -> TrackerFactory {
        let script = self.script.clone();
        Box::new(move || {
            let id = {
                let mut s = script.lock();
                s.built += 1;
                let id = s.built;
                s.events.push(TrackerEvent::Built(id));
                id
            };
            Box::new(ScriptedTracker { id, script: script.clone(), bbox: None }) as Box<dyn VisualTracker>
        })
    }
}

struct ScriptedTracker {
    id: usize,
    script: Arc<Mutex<TrackerScript>>,
    bbox: Option<BoundingBox>,
}

impl VisualTracker for ScriptedTracker {
    fn init(&mut self, _frame: &Frame, bbox: BoundingBox) -> InitOutcome {
        let mut s = self.script.lock();
        s.events.push(TrackerEvent::Init(self.id, bbox));
        let outcome = s.inits.pop_front().unwrap_or(InitOutcome::Ready);
        if outcome == InitOutcome::Ready {
            self.bbox = Some(bbox);
        }
        outcome
    }

    fn update(&mut self, _frame: &Frame) -> TrackOutcome {
        let mut s = self.script.lock();
        s.events.push(TrackerEvent::Update(self.id));
        match s.updates.pop_front() {
            Some(outcome) => outcome,
            None => match self.bbox {
                Some(bbox) => TrackOutcome::Tracked(bbox),
                None => TrackOutcome::Failed("not initialised".into()),
            },
        }
    }
}

/// Camera stand-in producing a flat frame every `delay`.
pub struct FakeSource {
    pub delay: Duration,
}

impl FrameSource for FakeSource {
    fn acquire_frame(&mut self) -> Result<Frame> {
        std::thread::sleep(self.delay);
        Ok(test_frame())
    }
}
