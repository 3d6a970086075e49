pub mod v4l2;

pub use v4l2::{Camera, CameraInfo};

use crate::common::Result;
use crate::core::Frame;

/// Anything that hands out camera frames, one per call.
///
/// Implementations may block until the next frame is available.
pub trait FrameSource: Send {
    fn acquire_frame(&mut self) -> Result<Frame>;
}

impl<F: FrameSource + ?Sized> FrameSource for Box<F> {
    fn acquire_frame(&mut self) -> Result<Frame> {
        (**self).acquire_frame()
    }
}
