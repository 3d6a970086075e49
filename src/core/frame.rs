use image::DynamicImage;
use std::time::Instant;

/// One captured camera image.
///
/// Frames are cloned, never shared, when they cross a thread boundary.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image, captured_at: Instant::now() }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl From<DynamicImage> for Frame {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}
