use crate::core::{BoundingBox, FaceCandidate};
use crate::pipeline::TrackState;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

const RECOGNIZING_COLOR: Rgb<u8> = Rgb([0, 0, 255]); // Blue
const TRACKING_COLOR: Rgb<u8> = Rgb([0, 255, 0]); // Green

pub fn state_color(state: TrackState) -> Rgb<u8> {
    match state {
        TrackState::Tracking => TRACKING_COLOR,
        TrackState::Recognizing | TrackState::StartTracking => RECOGNIZING_COLOR,
    }
}

/// Two-pixel rectangle outline, clipped to the image.
fn draw_box(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let Some(clipped) = bbox.clamp_to(img.width(), img.height()) else {
        return;
    };

    let rect = Rect::at(clipped.x, clipped.y).of_size(clipped.width as u32, clipped.height as u32);
    draw_hollow_rect_mut(img, rect, color);

    if clipped.width > 2 && clipped.height > 2 {
        let inner = Rect::at(clipped.x + 1, clipped.y + 1)
            .of_size(clipped.width as u32 - 2, clipped.height as u32 - 2);
        draw_hollow_rect_mut(img, inner, color);
    }
}

/// Draw the boxes of a parcel in the colour of the state that produced it.
pub fn annotate_boxes(image: &DynamicImage, boxes: &[BoundingBox], state: TrackState) -> DynamicImage {
    let mut img = image.to_rgb8();
    let color = state_color(state);
    for bbox in boxes {
        draw_box(&mut img, bbox, color);
    }
    DynamicImage::ImageRgb8(img)
}

/// Raw detector output, coloured by confidence.
pub fn annotate_candidates(image: &DynamicImage, candidates: &[FaceCandidate]) -> DynamicImage {
    let mut img = image.to_rgb8();

    for candidate in candidates {
        let color = if candidate.confidence > 0.7 {
            Rgb([0, 255, 0])
        } else if candidate.confidence > 0.5 {
            Rgb([255, 255, 0])
        } else {
            Rgb([255, 0, 0])
        };
        draw_box(&mut img, &candidate.bbox, color);
    }

    DynamicImage::ImageRgb8(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn tracking_boxes_are_green() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 50, Luma([0])));
        let out = annotate_boxes(&img, &[BoundingBox::new(10, 10, 20, 20)], TrackState::Tracking)
            .to_rgb8();
        assert_eq!(*out.get_pixel(10, 10), TRACKING_COLOR);
        assert_eq!(*out.get_pixel(20, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_outside_are_skipped() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 20, Luma([0])));
        let out = annotate_boxes(&img, &[BoundingBox::new(100, 100, 20, 20)], TrackState::Recognizing);
        assert!(out.to_rgb8().pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
