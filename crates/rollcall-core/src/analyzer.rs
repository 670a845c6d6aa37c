//! Face detection and encoding capability.

use crate::types::{FaceRegion, FeatureVector};
use image::RgbImage;
use thiserror::Error;

/// Distance at or below which two encodings are the same face, for analyzers
/// that do not override [`FaceAnalyzer::default_tolerance`].
pub const DEFAULT_TOLERANCE: f32 = 0.6;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detection failed: {0}")]
    Detection(String),
    #[error("encoding failed: {0}")]
    Encoding(String),
}

/// Opaque face detection/encoding/comparison capability.
///
/// `detect` and `encode` are the expensive model-backed calls. The comparison
/// helpers default to Euclidean distance over the encodings.
pub trait FaceAnalyzer {
    /// Detect faces, most confident first.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, AnalyzerError>;

    /// Encode the face inside `region`.
    fn encode(&mut self, image: &RgbImage, region: &FaceRegion) -> Result<FeatureVector, AnalyzerError>;

    /// Distance from `query` to each of `known`, in order.
    fn distance(&self, known: &[FeatureVector], query: &FeatureVector) -> Vec<f32> {
        known.iter().map(|k| k.euclidean_distance(query)).collect()
    }

    /// Same/different decision for each of `known`, in order.
    fn is_same_face(&self, known: &[FeatureVector], query: &FeatureVector, tolerance: f32) -> Vec<bool> {
        self.distance(known, query)
            .into_iter()
            .map(|d| d <= tolerance)
            .collect()
    }

    fn default_tolerance(&self) -> f32 {
        DEFAULT_TOLERANCE
    }
}

impl<A: FaceAnalyzer + ?Sized> FaceAnalyzer for Box<A> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, AnalyzerError> {
        (**self).detect(image)
    }

    fn encode(&mut self, image: &RgbImage, region: &FaceRegion) -> Result<FeatureVector, AnalyzerError> {
        (**self).encode(image, region)
    }

    fn distance(&self, known: &[FeatureVector], query: &FeatureVector) -> Vec<f32> {
        (**self).distance(known, query)
    }

    fn is_same_face(&self, known: &[FeatureVector], query: &FeatureVector, tolerance: f32) -> Vec<bool> {
        (**self).is_same_face(known, query, tolerance)
    }

    fn default_tolerance(&self) -> f32 {
        (**self).default_tolerance()
    }
}
