use crate::common::config::TrackerConfig;
use crate::core::frame::Frame;
use crate::core::geometry::BoundingBox;
use image::{imageops, GrayImage};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    Ready,
    Rejected,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Tracked(BoundingBox),
    Lost,
    Failed(String),
}

/// Single-subject frame-to-frame tracker.
///
/// Stateful; a fresh instance is built every time tracking (re)starts.
pub trait VisualTracker: Send {
    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> InitOutcome;
    fn update(&mut self, frame: &Frame) -> TrackOutcome;
}

pub type TrackerFactory = Box<dyn Fn() -> Box<dyn VisualTracker> + Send>;

pub fn template_tracker_factory(config: TrackerConfig) -> TrackerFactory {
    Box::new(move || Box::new(TemplateTracker::new(config.clone())) as Box<dyn VisualTracker>)
}

/// Grayscale template matcher searching a window around the last position.
pub struct TemplateTracker {
    config: TrackerConfig,
    template: Option<GrayImage>,
    last_box: Option<BoundingBox>,
}

impl TemplateTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config, template: None, last_box: None }
    }

    fn search_window(&self, bbox: &BoundingBox, width: u32, height: u32) -> Option<BoundingBox> {
        let margin_x = (bbox.width as f32 * self.config.search_margin) as i32;
        let margin_y = (bbox.height as f32 * self.config.search_margin) as i32;
        BoundingBox::new(
            bbox.x - margin_x,
            bbox.y - margin_y,
            bbox.width + margin_x * 2,
            bbox.height + margin_y * 2,
        )
        .clamp_to(width, height)
    }
}

fn crop_gray(gray: &GrayImage, bbox: &BoundingBox) -> GrayImage {
    imageops::crop_imm(gray, bbox.x as u32, bbox.y as u32, bbox.width as u32, bbox.height as u32)
        .to_image()
}

impl VisualTracker for TemplateTracker {
    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> InitOutcome {
        let Some(clipped) = bbox.clamp_to(frame.width(), frame.height()) else {
            return InitOutcome::Rejected;
        };
        if clipped.width < 2 || clipped.height < 2 {
            return InitOutcome::Rejected;
        }

        let gray = frame.image.to_luma8();
        self.template = Some(crop_gray(&gray, &clipped));
        self.last_box = Some(clipped);
        InitOutcome::Ready
    }

    fn update(&mut self, frame: &Frame) -> TrackOutcome {
        let (Some(template), Some(last_box)) = (self.template.as_ref(), self.last_box) else {
            return TrackOutcome::Failed("tracker used before init".into());
        };

        let Some(window) = self.search_window(&last_box, frame.width(), frame.height()) else {
            return TrackOutcome::Lost;
        };
        if (window.width as u32) < template.width() || (window.height as u32) < template.height() {
            return TrackOutcome::Lost;
        }

        let gray = frame.image.to_luma8();
        let region = crop_gray(&gray, &window);
        let scores = match_template(&region, template, MatchTemplateMethod::SumOfSquaredErrorsNormalized);

        let mut best: Option<(u32, u32, f32)> = None;
        for (x, y, score) in scores.enumerate_pixels() {
            let score = score[0];
            if best.map_or(true, |(_, _, s)| score < s) {
                best = Some((x, y, score));
            }
        }

        let Some((dx, dy, error)) = best else {
            return TrackOutcome::Lost;
        };
        if !error.is_finite() || error > self.config.max_match_error {
            tracing::debug!("Template match error {:.3} above limit", error);
            return TrackOutcome::Lost;
        }

        let tracked = BoundingBox::new(
            window.x + dx as i32,
            window.y + dy as i32,
            template.width() as i32,
            template.height() as i32,
        );
        self.last_box = Some(tracked);
        TrackOutcome::Tracked(tracked)
    }
}
