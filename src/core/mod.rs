pub mod analyzer;
pub mod detector;
pub mod embedding;
pub mod frame;
pub mod geometry;
pub mod recognizer;
pub mod tracker;

pub use analyzer::{DetectOutcome, DetectedFace, EmbedOutcome, FaceAnalyzer, OnnxFaceAnalyzer};
pub use detector::{FaceCandidate, FaceDetector};
pub use embedding::{cosine_similarity, face_distance, l2_normalize, mean_embedding, Embedding};
pub use frame::Frame;
pub use geometry::{largest_index, BoundingBox, MIN_BOX_SIDE};
pub use recognizer::FaceRecognizer;
pub use tracker::{
    template_tracker_factory, InitOutcome, TemplateTracker, TrackOutcome, TrackerFactory,
    VisualTracker,
};
