use crate::common::{Config, Result};
use crate::core::detector::FaceDetector;
use crate::core::embedding::Embedding;
use crate::core::frame::Frame;
use crate::core::geometry::BoundingBox;
use crate::core::recognizer::FaceRecognizer;

/// One face found in a frame: its box and identity embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
    Faces(Vec<DetectedFace>),
    NoFaces,
    Failed(String),
}

impl DetectOutcome {
    /// Collapse to a face list; a failure counts as "no faces this cycle".
    pub fn into_faces(self) -> Vec<DetectedFace> {
        match self {
            DetectOutcome::Faces(faces) => faces,
            DetectOutcome::NoFaces => vec![],
            DetectOutcome::Failed(reason) => {
                tracing::warn!("Face detection failed: {}", reason);
                vec![]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbedOutcome {
    Embedded(Embedding),
    NoFace,
    Failed(String),
}

/// Face detection plus embedding, consumed by the perception loop.
pub trait FaceAnalyzer: Send {
    /// Every face in the frame, boxes and embeddings index-aligned.
    fn detect(&mut self, frame: &Frame) -> DetectOutcome;

    /// Embedding for a face already known to sit inside `bbox`.
    fn embed(&mut self, frame: &Frame, bbox: &BoundingBox) -> EmbedOutcome;
}

/// ONNX detector + embedder pair.
pub struct OnnxFaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceAnalyzer {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            detector: FaceDetector::new(config)?,
            recognizer: FaceRecognizer::new(config)?,
        })
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn detect(&mut self, frame: &Frame) -> DetectOutcome {
        let candidates = match self.detector.detect(&frame.image) {
            Ok(candidates) => candidates,
            Err(e) => return DetectOutcome::Failed(e.to_string()),
        };

        if candidates.is_empty() {
            return DetectOutcome::NoFaces;
        }

        let mut faces = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            // A face we cannot embed is dropped so boxes and embeddings stay aligned.
            match self.recognizer.get_embedding(&frame.image, &candidate.bbox) {
                Ok(embedding) => faces.push(DetectedFace { bbox: candidate.bbox, embedding }),
                Err(e) => tracing::debug!("Skipping face {:?}: {}", candidate.bbox, e),
            }
        }

        if faces.is_empty() {
            DetectOutcome::NoFaces
        } else {
            DetectOutcome::Faces(faces)
        }
    }

    fn embed(&mut self, frame: &Frame, bbox: &BoundingBox) -> EmbedOutcome {
        if bbox.clamp_to(frame.width(), frame.height()).is_none() {
            return EmbedOutcome::NoFace;
        }
        match self.recognizer.get_embedding(&frame.image, bbox) {
            Ok(embedding) => EmbedOutcome::Embedded(embedding),
            Err(e) => EmbedOutcome::Failed(e.to_string()),
        }
    }
}
