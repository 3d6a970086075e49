use crate::common::{Config, PipelineError, Result};
use crate::common::config::DetectorConfig;
use crate::core::geometry::BoundingBox;
use ort::{Environment, Session, SessionBuilder, Value, GraphOptimizationLevel};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

/// A detected face in original image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceCandidate {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Raw prediction in detector input space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RawDetection {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
}

pub struct FaceDetector {
    session: Session,
    _environment: Arc<Environment>,
    config: DetectorConfig,
}

/// Build an ONNX session the way every model in this crate is loaded.
pub(crate) fn build_session(
    name: &str,
    model_path: &Path,
    optimization_level: u32,
) -> Result<(Arc<Environment>, Session)> {
    let environment = Arc::new(
        Environment::builder()
            .with_name(name)
            .build()
            .map_err(|e| PipelineError::Model(format!("Failed to create environment: {}", e)))?
    );

    if !model_path.exists() {
        return Err(PipelineError::Model(
            format!("Model not found at: {:?}", model_path)
        ));
    }

    let opt_level = match optimization_level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    };

    let session = SessionBuilder::new(&environment)?
        .with_optimization_level(opt_level)?
        .with_model_from_file(model_path)?;

    Ok((environment, session))
}

impl FaceDetector {
    pub fn new(config: &Config) -> Result<Self> {
        let (environment, session) = build_session(
            "face_detector",
            &config.models.detector_path,
            config.models.optimization_level,
        )?;

        tracing::info!("Loaded face detector from {:?}", config.models.detector_path);

        Ok(Self {
            session,
            _environment: environment,
            config: config.detector.clone(),
        })
    }

    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceCandidate>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;

        let img_array = if image.width() == self.config.input_width
            && image.height() == self.config.input_height {
            self.image_to_array(image)
        } else {
            let resized = image.resize_exact(
                self.config.input_width,
                self.config.input_height,
                FilterType::Nearest,
            );
            self.image_to_array(&resized)
        };

        let cow_array = CowArray::from(img_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let Some(first) = outputs.first() else {
            return Ok(vec![]);
        };
        let output = first.try_extract::<f32>()?.view().to_owned();
        let shape = output.shape().to_vec();
        let data: Vec<f32> = output.iter().copied().collect();

        let raw = decode_predictions(
            &data,
            &shape,
            self.config.input_width as f32,
            self.config.input_height as f32,
        );

        let scale_x = orig_width / self.config.input_width as f32;
        let scale_y = orig_height / self.config.input_height as f32;

        let candidates = raw
            .into_iter()
            .map(|d| FaceCandidate {
                bbox: BoundingBox::from_corners(
                    d.x1 * scale_x,
                    d.y1 * scale_y,
                    d.x2 * scale_x,
                    d.y2 * scale_y,
                ),
                confidence: d.confidence,
            })
            .collect();

        Ok(select_faces(
            candidates,
            self.config.nms_iou,
            self.config.confidence,
            self.config.max_faces,
        ))
    }

    fn image_to_array(&self, img: &DynamicImage) -> Array4<f32> {
        let rgb = img.to_rgb8();
        let width = rgb.width() as usize;
        let height = rgb.height() as usize;
        let mut array = Array4::<f32>::zeros((1, 3, height, width));
        let norm_factor = 1.0 / 255.0;

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            array[[0, 0, y, x]] = pixel[0] as f32 * norm_factor;
            array[[0, 1, y, x]] = pixel[1] as f32 * norm_factor;
            array[[0, 2, y, x]] = pixel[2] as f32 * norm_factor;
        }

        array
    }
}

/// Decode YOLO-style output, either `[1, N, 5+]` or transposed `[1, 5+, N]`.
fn decode_predictions(data: &[f32], shape: &[usize], input_w: f32, input_h: f32) -> Vec<RawDetection> {
    let mut detections = Vec::new();

    let (num_predictions, prediction_length, is_transposed) = match shape.len() {
        n if n >= 3 => {
            if shape[1] <= 10 && shape[2] > 10 {
                (shape[2], shape[1], true)
            } else {
                (shape[1], shape[2], false)
            }
        }
        2 => (shape[0], shape[1], false),
        _ => {
            tracing::warn!("Unexpected detector output shape: {:?}", shape);
            return detections;
        }
    };

    if prediction_length < 4 || data.len() < num_predictions * prediction_length {
        tracing::warn!("Detector output too short for shape {:?}", shape);
        return detections;
    }

    let at = |i: usize, field: usize| -> f32 {
        if is_transposed {
            data[field * num_predictions + i]
        } else {
            data[i * prediction_length + field]
        }
    };

    for i in 0..num_predictions {
        let confidence = if prediction_length > 4 { at(i, 4) } else { 0.0 };
        if confidence <= 0.001 {
            continue;
        }

        let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));

        // Normalized coordinates are scaled to the input size.
        let (sx, sy) = if cx > 1.0 || cy > 1.0 || w > 1.0 || h > 1.0 {
            (1.0, 1.0)
        } else {
            (input_w, input_h)
        };
        let (cx, cy, w, h) = (cx * sx, cy * sy, w * sx, h * sy);

        let x1 = (cx - w / 2.0).max(0.0);
        let y1 = (cy - h / 2.0).max(0.0);
        let x2 = (cx + w / 2.0).min(input_w);
        let y2 = (cy + h / 2.0).min(input_h);

        if x2 - x1 > 10.0 && y2 - y1 > 10.0 {
            detections.push(RawDetection { x1, y1, x2, y2, confidence });
        }
    }

    detections
}

/// NMS first, then the confidence cut, then keep the `max_faces` best.
fn select_faces(
    candidates: Vec<FaceCandidate>,
    iou_threshold: f32,
    min_confidence: f32,
    max_faces: usize,
) -> Vec<FaceCandidate> {
    let mut faces = apply_nms(candidates, iou_threshold);
    faces.retain(|face| face.confidence >= min_confidence);
    faces.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    faces.truncate(max_faces);
    faces
}

fn apply_nms(mut boxes: Vec<FaceCandidate>, iou_threshold: f32) -> Vec<FaceCandidate> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceCandidate> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|kept| kept.bbox.iou(&candidate.bbox) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}
