// Core modules
pub mod core;
pub mod camera;
pub mod storage;
pub mod pipeline;
pub mod cli;
pub mod common;

// Re-export commonly used types
pub use common::{Config, DevMode, PipelineError, Result};
pub use core::{BoundingBox, Embedding, FaceAnalyzer, Frame, OnnxFaceAnalyzer, VisualTracker};
pub use camera::{Camera, FrameSource};
pub use storage::{InMemoryUserStore, UserId, UserRepository};
pub use pipeline::{Collaborators, DataParcel, Pipeline, TrackState};

pub mod config {
    pub use crate::common::config::*;
}
