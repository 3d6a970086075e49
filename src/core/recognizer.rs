use crate::common::{Config, PipelineError, Result};
use crate::common::config::RecognizerConfig;
use crate::core::detector::build_session;
use crate::core::embedding::Embedding;
use crate::core::geometry::BoundingBox;
use ort::{Environment, Session, Value};
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

pub struct FaceRecognizer {
    session: Session,
    _environment: Arc<Environment>,
    config: RecognizerConfig,
}

impl FaceRecognizer {
    pub fn new(config: &Config) -> Result<Self> {
        let (environment, session) = build_session(
            "face_recognizer",
            &config.models.recognizer_path,
            config.models.optimization_level,
        )?;

        tracing::info!("Loaded face embedder from {:?}", config.models.recognizer_path);

        Ok(Self {
            session,
            _environment: environment,
            config: config.recognizer.clone(),
        })
    }

    pub fn get_embedding(&self, image: &DynamicImage, face: &BoundingBox) -> Result<Embedding> {
        let face_img = crop_face(image, face)?;

        let resized = face_img.resize_exact(
            self.config.input_size,
            self.config.input_size,
            FilterType::Triangle,
        );

        let input_array = self.preprocess_face(&resized);
        let cow_array = CowArray::from(input_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let first = outputs
            .first()
            .ok_or_else(|| PipelineError::Model("Embedder produced no output".into()))?;

        let embedding: Embedding = first.try_extract::<f32>()?.view().iter().copied().collect();
        if embedding.is_empty() {
            return Err(PipelineError::Model("Embedder produced an empty vector".into()));
        }
        Ok(embedding)
    }

    fn preprocess_face(&self, img: &DynamicImage) -> Array4<f32> {
        let size = self.config.input_size as usize;
        let norm = self.config.normalization_value;
        let mut array = Array4::<f32>::zeros((1, self.config.channels, size, size));

        if self.config.channels == 1 {
            let gray = img.to_luma8();
            for (x, y, pixel) in gray.enumerate_pixels() {
                array[[0, 0, y as usize, x as usize]] = (pixel[0] as f32 - norm) / norm;
            }
        } else {
            let rgb = img.to_rgb8();
            for (x, y, pixel) in rgb.enumerate_pixels() {
                for c in 0..3 {
                    array[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - norm) / norm;
                }
            }
        }

        array
    }
}

/// Crop `face` out of `image`, clipped to the image bounds.
pub fn crop_face(image: &DynamicImage, face: &BoundingBox) -> Result<DynamicImage> {
    let clipped = face.clamp_to(image.width(), image.height()).ok_or_else(|| {
        PipelineError::Model(format!("Face box {:?} lies outside the frame", face))
    })?;

    Ok(image.crop_imm(
        clipped.x as u32,
        clipped.y as u32,
        clipped.width as u32,
        clipped.height as u32,
    ))
}
