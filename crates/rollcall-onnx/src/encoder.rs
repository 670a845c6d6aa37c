//! ArcFace face encoder.
//!
//! Encodes a square crop around a detected face into a 512-dimensional,
//! L2-normalized embedding using the w600k_r50 model.

use crate::{check_model, OnnxError};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::{FaceRegion, FeatureVector};
use std::path::Path;

const INPUT_SIZE: u32 = 112;
const MEAN: f32 = 127.5;
const STD: f32 = 127.5; // symmetric, unlike SCRFD
const EMBEDDING_DIM: usize = 512;
/// Crop side relative to the larger edge of the detected box.
const CROP_MARGIN: f32 = 1.2;

pub struct FaceEncoder {
    session: Session,
}

impl FaceEncoder {
    pub fn load(model_path: &Path) -> Result<Self, OnnxError> {
        check_model(model_path)?;

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    pub fn encode(&mut self, image: &RgbImage, region: &FaceRegion) -> Result<FeatureVector, OnnxError> {
        let crop = crop_face(image, region)
            .ok_or_else(|| OnnxError::InferenceFailed(format!("empty face region {region:?}")))?;
        let input = preprocess(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| OnnxError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(OnnxError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(FeatureVector::new(l2_normalize(raw)))
    }
}

/// Square crop centred on the region, enlarged by [`CROP_MARGIN`] and
/// resized to the model input. Returns `None` for a degenerate region.
fn crop_face(image: &RgbImage, region: &FaceRegion) -> Option<RgbImage> {
    let (w, h) = image.dimensions();
    if region.width() == 0 || region.height() == 0 || w == 0 || h == 0 {
        return None;
    }

    let side = (region.width().max(region.height()) as f32 * CROP_MARGIN).round() as u32;
    let side = side.clamp(1, w.min(h));
    let cx = region.left + region.width() / 2;
    let cy = region.top + region.height() / 2;
    let x = cx.saturating_sub(side / 2).min(w - side);
    let y = cy.saturating_sub(side / 2).min(h - side);

    let crop = imageops::crop_imm(image, x, y, side, side).to_image();
    Some(imageops::resize(&crop, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle))
}

fn preprocess(face: &RgbImage) -> Array4<f32> {
    let size = INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in face.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 - MEAN) / STD;
        }
    }
    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}
