use crate::common::config::PerceptionConfig;
use crate::core::{
    face_distance, largest_index, BoundingBox, DetectedFace, EmbedOutcome, Embedding,
    FaceAnalyzer, Frame, InitOutcome, TrackOutcome, TrackerFactory, VisualTracker,
};
use crate::pipeline::channel::LatestOnlyChannel;
use crate::pipeline::frame_cell::FrameCell;
use crate::pipeline::pacing::Pacer;
use crate::pipeline::parcel::{DataParcel, TrackState, TrackingCommand};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const IDLE_DELAY: Duration = Duration::from_millis(10);
const MIN_REDETECT_IOU: f32 = 0.1;
const IOU_WEIGHT: f32 = 0.4;
const FACE_WEIGHT: f32 = 0.6;

/// Score of one re-detection candidate against the tracked subject.
#[derive(Debug, Clone, Copy)]
struct CandidateScore {
    index: usize,
    iou: f32,
    face_distance: Option<f32>,
    distance: f32,
}

/// Detect/track state machine.
///
/// RECOGNIZING runs full detection every cycle. START_TRACKING locks a
/// fresh tracker onto a requested box. TRACKING follows that box with the
/// cheap tracker and re-detects every `redetection_interval` cycles to
/// confirm the subject is still the same person.
pub struct HybridTracker {
    analyzer: Box<dyn FaceAnalyzer>,
    tracker_factory: TrackerFactory,
    config: PerceptionConfig,
    state: TrackState,
    pending: Option<BoundingBox>,
    tracker: Option<Box<dyn VisualTracker>>,
    counter: u32,
    last_known: Option<BoundingBox>,
    reference: Option<Embedding>,
}

impl HybridTracker {
    pub fn new(
        analyzer: Box<dyn FaceAnalyzer>,
        tracker_factory: TrackerFactory,
        config: PerceptionConfig,
    ) -> Self {
        Self {
            analyzer,
            tracker_factory,
            config,
            state: TrackState::Recognizing,
            pending: None,
            tracker: None,
            counter: 0,
            last_known: None,
            reference: None,
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn last_known(&self) -> Option<BoundingBox> {
        self.last_known
    }

    pub fn reference(&self) -> Option<&Embedding> {
        self.reference.as_ref()
    }

    pub fn tracking_counter(&self) -> u32 {
        self.counter
    }

    pub fn apply(&mut self, command: TrackingCommand) {
        match command {
            TrackingCommand::Start(bbox) => {
                tracing::info!("Tracking requested for {:?}", bbox);
                self.pending = Some(bbox);
                self.state = TrackState::StartTracking;
            }
            TrackingCommand::Stop => {
                tracing::info!("Tracking stop requested");
                self.reset();
            }
        }
    }

    /// Run one cycle on `frame`. Always yields exactly one parcel.
    pub fn process(&mut self, frame: Frame) -> DataParcel {
        match self.state {
            TrackState::Recognizing => self.recognize(frame),
            TrackState::StartTracking => self.start_tracking(frame),
            TrackState::Tracking => self.track(frame),
        }
    }

    fn reset(&mut self) {
        if self.state != TrackState::Recognizing {
            tracing::info!("{} -> {}", self.state, TrackState::Recognizing);
        }
        self.state = TrackState::Recognizing;
        self.pending = None;
        self.tracker = None;
        self.counter = 0;
        self.last_known = None;
        self.reference = None;
    }

    fn fall_back(&mut self, frame: Frame) -> DataParcel {
        self.reset();
        DataParcel::recognizing(frame, vec![], vec![])
    }

    fn recognize(&mut self, frame: Frame) -> DataParcel {
        let detect_start = Instant::now();
        let faces = self.analyzer.detect(&frame).into_faces();
        tracing::debug!("Detected {} face(s) in {:?}", faces.len(), detect_start.elapsed());

        let (boxes, embeddings): (Vec<BoundingBox>, Vec<Embedding>) =
            faces.into_iter().map(|f| (f.bbox, f.embedding)).unzip();

        if self.config.auto_track_largest {
            if let Some(idx) = largest_index(&boxes) {
                self.apply(TrackingCommand::Start(boxes[idx]));
            }
        }

        DataParcel::recognizing(frame, boxes, embeddings)
    }

    fn start_tracking(&mut self, frame: Frame) -> DataParcel {
        let Some(original) = self.pending.take() else {
            return self.fall_back(frame);
        };
        let shrunk = original.shrink(self.config.bbox_reduce_ratio);
        tracing::debug!("Box shrunk {:?} -> {:?}", original, shrunk);

        self.reference = match self.analyzer.embed(&frame, &original) {
            EmbedOutcome::Embedded(embedding) => Some(embedding),
            EmbedOutcome::NoFace => {
                tracing::warn!("No face to embed at {:?}; tracking without reference", original);
                None
            }
            EmbedOutcome::Failed(reason) => {
                tracing::warn!("Reference embedding failed ({}); tracking without reference", reason);
                None
            }
        };

        let mut tracker = (self.tracker_factory)();
        match tracker.init(&frame, shrunk) {
            InitOutcome::Ready => {
                tracing::info!("{} -> {} at {:?}", self.state, TrackState::Tracking, shrunk);
                self.tracker = Some(tracker);
                self.state = TrackState::Tracking;
                self.counter = 0;
                self.last_known = Some(shrunk);
                DataParcel::tracking(frame, shrunk)
            }
            InitOutcome::Rejected => {
                tracing::warn!("Tracker rejected {:?}", shrunk);
                self.fall_back(frame)
            }
            InitOutcome::Failed(reason) => {
                tracing::warn!("Tracker init failed: {}", reason);
                self.fall_back(frame)
            }
        }
    }

    fn track(&mut self, frame: Frame) -> DataParcel {
        self.counter += 1;
        let interval = self.config.redetection_interval.max(1);

        if self.counter % interval != 0 {
            self.update_tracker(frame)
        } else {
            self.redetect(frame)
        }
    }

    fn update_tracker(&mut self, frame: Frame) -> DataParcel {
        let outcome = match self.tracker.as_mut() {
            Some(tracker) => tracker.update(&frame),
            None => TrackOutcome::Failed("no active tracker".into()),
        };

        match outcome {
            TrackOutcome::Tracked(bbox) => {
                self.last_known = Some(bbox);
                DataParcel::tracking(frame, bbox)
            }
            TrackOutcome::Lost => {
                tracing::info!("Tracker lost the subject");
                self.fall_back(frame)
            }
            TrackOutcome::Failed(reason) => {
                tracing::warn!("Tracker update failed: {}", reason);
                self.fall_back(frame)
            }
        }
    }

    fn score_candidates(&self, faces: &[DetectedFace]) -> Option<CandidateScore> {
        let expanded = self.last_known.map(|b| b.expand(self.config.bbox_reduce_ratio));
        let mut best: Option<CandidateScore> = None;

        for (index, face) in faces.iter().enumerate() {
            let iou = expanded.map_or(0.0, |e| e.iou(&face.bbox));
            let face_distance = self.reference.as_ref().map(|r| face_distance(r, &face.embedding));
            let score = match face_distance {
                Some(d) => IOU_WEIGHT * iou + FACE_WEIGHT * (1.0 - d),
                None => iou,
            };
            let distance = 1.0 - score;

            tracing::debug!(
                "Candidate #{} {:?}: iou={:.3} face_distance={:?} score={:.3}",
                index, face.bbox, iou, face_distance, score
            );

            if best.map_or(true, |b| distance < b.distance) {
                best = Some(CandidateScore { index, iou, face_distance, distance });
            }
        }

        best
    }

    fn redetect(&mut self, frame: Frame) -> DataParcel {
        let mut faces = self.analyzer.detect(&frame).into_faces();
        if faces.is_empty() {
            tracing::info!("Re-detection at cycle {} found no face", self.counter);
            return self.fall_back(frame);
        }

        let Some(best) = self.score_candidates(&faces) else {
            return self.fall_back(frame);
        };

        if best.iou < MIN_REDETECT_IOU {
            tracing::info!("Re-detection rejected: position mismatch (iou {:.3})", best.iou);
            return self.fall_back(frame);
        }
        if let Some(d) = best.face_distance {
            if d > self.config.face_match_threshold {
                tracing::info!(
                    "Re-detection rejected: different face (distance {:.3} > {})",
                    d, self.config.face_match_threshold
                );
                return self.fall_back(frame);
            }
        }

        let winner = faces.swap_remove(best.index);
        let shrunk = winner.bbox.shrink(self.config.bbox_reduce_ratio);
        let mut tracker = (self.tracker_factory)();

        match tracker.init(&frame, shrunk) {
            InitOutcome::Ready => {
                tracing::debug!("Tracker re-anchored at {:?}", shrunk);
                self.tracker = Some(tracker);
                self.last_known = Some(shrunk);
                self.reference = Some(winner.embedding);
                DataParcel::tracking(frame, shrunk)
            }
            InitOutcome::Rejected => {
                tracing::debug!("Re-anchor rejected; keeping previous tracker");
                self.update_tracker(frame)
            }
            InitOutcome::Failed(reason) => {
                tracing::warn!("Tracker re-init failed: {}", reason);
                self.fall_back(frame)
            }
        }
    }
}

/// Sends tracking requests to a running perception loop.
#[derive(Clone)]
pub struct PerceptionHandle {
    commands: Sender<TrackingCommand>,
}

impl PerceptionHandle {
    pub fn start_tracking(&self, bbox: BoundingBox) {
        self.send(TrackingCommand::Start(bbox));
    }

    pub fn stop_tracking(&self) {
        self.send(TrackingCommand::Stop);
    }

    fn send(&self, command: TrackingCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Perception loop is gone; dropped {:?}", command);
        }
    }
}

/// Feeds the newest frame through a [`HybridTracker`] at its own rate.
pub struct PerceptionLoop {
    engine: HybridTracker,
    cell: FrameCell,
    inbox: Receiver<TrackingCommand>,
    output: LatestOnlyChannel<DataParcel>,
    processing_fps: f64,
}

impl PerceptionLoop {
    pub fn new(
        engine: HybridTracker,
        cell: FrameCell,
        output: LatestOnlyChannel<DataParcel>,
        processing_fps: f64,
    ) -> (Self, PerceptionHandle) {
        let (commands, inbox) = unbounded();
        let perception = Self { engine, cell, inbox, output, processing_fps };
        (perception, PerceptionHandle { commands })
    }

    pub fn engine(&self) -> &HybridTracker {
        &self.engine
    }

    /// One cycle. Returns false if there was no frame to work on.
    pub fn cycle(&mut self) -> bool {
        // Last command wins.
        if let Some(command) = self.inbox.try_iter().last() {
            self.engine.apply(command);
        }

        let Some(frame) = self.cell.read_copy() else {
            return false;
        };

        let parcel = self.engine.process(frame);
        self.output.send(parcel);
        true
    }

    pub fn run(mut self, running: &AtomicBool) {
        tracing::info!("Perception loop started ({} fps)", self.processing_fps);
        let mut pacer = Pacer::new(self.processing_fps);

        while running.load(Ordering::SeqCst) {
            pacer.begin();
            if !self.cycle() {
                std::thread::sleep(IDLE_DELAY);
                continue;
            }
            pacer.wait();
        }

        tracing::info!("Perception loop stopped");
    }
}
