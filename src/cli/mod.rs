pub mod annotate;
pub mod status;

pub use annotate::{annotate_boxes, annotate_candidates, state_color};
pub use status::{StatusReport, StatusTracker};
