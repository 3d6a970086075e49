use crate::core::Frame;
use parking_lot::Mutex;
use std::sync::Arc;

/// Single-slot holder for the newest camera frame.
///
/// The capture loop overwrites it; readers get their own copy.
#[derive(Clone, Default)]
pub struct FrameCell {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl FrameCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, frame: Frame) {
        *self.slot.lock() = Some(frame);
    }

    pub fn read_copy(&self) -> Option<Frame> {
        self.slot.lock().clone()
    }
}
