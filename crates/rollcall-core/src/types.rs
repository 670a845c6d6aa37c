use chrono::{DateTime, Local};
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Pixel bounds of a detected face, in `(top, right, bottom, left)` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
}

impl FaceRegion {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
            confidence: 1.0,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Multiply every edge by `factor` (e.g. to undo a downscale).
    pub fn scale(&self, factor: f32) -> Self {
        let s = |v: u32| (v as f32 * factor).round().max(0.0) as u32;
        Self {
            top: s(self.top),
            right: s(self.right),
            bottom: s(self.bottom),
            left: s(self.left),
            confidence: self.confidence,
        }
    }

    /// Clamp the region to an image of the given size.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        Self {
            top: self.top.min(height),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
            left: self.left.min(width),
            confidence: self.confidence,
        }
    }
}

/// Fixed-length face encoding produced by a [`FaceAnalyzer`](crate::FaceAnalyzer).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance. Vectors of different dimension are infinitely far apart.
    pub fn euclidean_distance(&self, other: &FeatureVector) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u32,
    /// Wall-clock capture time; attendance is stamped with it.
    pub captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u32) -> Self {
        Self::captured(image, sequence, Local::now())
    }

    pub fn captured(image: RgbImage, sequence: u32, captured_at: DateTime<Local>) -> Self {
        Self {
            image,
            sequence,
            captured_at,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Resize by `factor`. Factors outside (0, 1) return an unscaled copy.
    pub fn downscale(&self, factor: f32) -> RgbImage {
        if !(factor > 0.0 && factor < 1.0) {
            return self.image.clone();
        }
        let w = ((self.width() as f32 * factor).round() as u32).max(1);
        let h = ((self.height() as f32 * factor).round() as u32).max(1);
        imageops::resize(&self.image, w, h, FilterType::Triangle)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Enrolled encodings as two parallel sequences: label per vector, and the vector.
///
/// An identity with several samples appears once per sample; the samples are
/// alternative references and are never averaged.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    labels: Vec<String>,
    encodings: Vec<FeatureVector>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, encoding: FeatureVector) {
        self.labels.push(label.into());
        self.encodings.push(encoding);
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn encodings(&self) -> &[FeatureVector] {
        &self.encodings
    }

    pub fn len(&self) -> usize {
        self.encodings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encodings.is_empty()
    }

    /// Number of vectors enrolled under `name`.
    pub fn count_for(&self, name: &str) -> usize {
        self.labels.iter().filter(|l| l.as_str() == name).count()
    }

    /// Distinct identity names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}
