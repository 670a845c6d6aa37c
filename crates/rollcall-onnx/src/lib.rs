//! rollcall-onnx — Face analyzer backed by ONNX Runtime.
//!
//! SCRFD finds faces, ArcFace turns each face crop into a 512-dimensional
//! L2-normalized encoding. Both models run on the CPU.

pub mod detector;
pub mod encoder;

use image::RgbImage;
use rollcall_core::{AnalyzerError, FaceAnalyzer, FaceRegion, FeatureVector};
use std::path::Path;
use thiserror::Error;

pub use detector::FaceDetector;
pub use encoder::FaceEncoder;

/// Detector model file name inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// Encoder model file name inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Euclidean distance between unit-length ArcFace encodings at which two
/// faces are considered the same (cosine similarity ≈ 0.4).
pub const ARCFACE_TOLERANCE: f32 = 1.1;

#[derive(Error, Debug)]
pub enum OnnxError {
    #[error("model file not found: {0}; download it from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// [`FaceAnalyzer`] combining the SCRFD detector and ArcFace encoder.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    encoder: FaceEncoder,
}

impl OnnxAnalyzer {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, OnnxError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE))?;
        let encoder = FaceEncoder::load(&model_dir.join(ARCFACE_MODEL_FILE))?;
        Ok(Self { detector, encoder })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, AnalyzerError> {
        self.detector
            .detect(image)
            .map_err(|e| AnalyzerError::Detection(e.to_string()))
    }

    fn encode(&mut self, image: &RgbImage, region: &FaceRegion) -> Result<FeatureVector, AnalyzerError> {
        self.encoder
            .encode(image, region)
            .map_err(|e| AnalyzerError::Encoding(e.to_string()))
    }

    fn default_tolerance(&self) -> f32 {
        ARCFACE_TOLERANCE
    }
}

pub(crate) fn check_model(path: &Path) -> Result<(), OnnxError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(OnnxError::ModelNotFound(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reports_missing_model() {
        let tmp = std::env::temp_dir().join("rollcall-onnx-missing-models");
        match OnnxAnalyzer::load(&tmp) {
            Err(OnnxError::ModelNotFound(path)) => assert!(path.ends_with(SCRFD_MODEL_FILE)),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("models should not exist"),
        }
    }

    #[test]
    fn test_tolerance_matches_cosine_threshold() {
        // |a - b|^2 = 2 - 2cos for unit vectors.
        let cos = 1.0 - ARCFACE_TOLERANCE.powi(2) / 2.0;
        assert!((cos - 0.395).abs() < 0.01, "cos = {cos}");
    }
}
