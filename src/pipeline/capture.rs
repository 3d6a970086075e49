use crate::camera::FrameSource;
use crate::common::config::CameraConfig;
use crate::common::Result;
use crate::core::Frame;
use crate::pipeline::channel::LatestOnlyChannel;
use crate::pipeline::frame_cell::FrameCell;
use crate::pipeline::pacing::Pacer;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use imageproc::contrast::equalize_histogram;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Pulls frames from the camera into the shared [`FrameCell`].
pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    cell: FrameCell,
    preview: Option<LatestOnlyChannel<Vec<u8>>>,
    config: CameraConfig,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        cell: FrameCell,
        preview: Option<LatestOnlyChannel<Vec<u8>>>,
        config: CameraConfig,
    ) -> Self {
        Self { source, cell, preview, config }
    }

    /// One acquisition. Returns false when the camera gave nothing.
    pub fn step(&mut self) -> bool {
        let frame = match self.source.acquire_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Frame acquisition failed: {}", e);
                return false;
            }
        };

        let frame = if self.config.auto_brightness {
            let captured_at = frame.captured_at;
            Frame {
                image: correct_brightness(frame.image, self.config.brightness_threshold),
                captured_at,
            }
        } else {
            frame
        };

        if let Some(preview) = &self.preview {
            match encode_preview(&frame.image, self.config.preview_quality) {
                Ok(jpeg) => {
                    preview.send(jpeg);
                }
                Err(e) => tracing::debug!("Preview encoding failed: {}", e),
            }
        }

        self.cell.write(frame);
        true
    }

    pub fn run(mut self, running: &AtomicBool) {
        tracing::info!("Capture loop started ({} fps)", self.config.capture_fps);
        let mut pacer = Pacer::new(self.config.capture_fps);

        while running.load(Ordering::SeqCst) {
            pacer.begin();
            if !self.step() {
                std::thread::sleep(RETRY_DELAY);
                continue;
            }
            pacer.wait();
        }

        tracing::info!("Capture loop stopped");
    }
}

pub fn mean_luma(image: &DynamicImage) -> f32 {
    let gray = image.to_luma8();
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    pixels.iter().map(|&p| p as u64).sum::<u64>() as f32 / pixels.len() as f32
}

/// Lift frames darker than `threshold` (mean luma).
///
/// Grayscale frames get histogram equalization; colour frames are shifted
/// up so the mean reaches the threshold.
pub fn correct_brightness(image: DynamicImage, threshold: u8) -> DynamicImage {
    let mean = mean_luma(&image);
    if mean >= threshold as f32 {
        return image;
    }

    tracing::debug!("Dark frame (mean luma {:.1}), adjusting", mean);
    match image {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(equalize_histogram(&gray)),
        other => {
            let lift = (threshold as f32 - mean).round() as i32;
            other.brighten(lift)
        }
    }
}

pub fn encode_preview(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    match image {
        DynamicImage::ImageLuma8(gray) => encoder.encode_image(gray)?,
        other => encoder.encode_image(&other.to_rgb8())?,
    }
    Ok(bytes)
}
