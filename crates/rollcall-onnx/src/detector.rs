//! SCRFD face detector.
//!
//! Letterboxes the frame to 640×640, runs the 3-stride anchor-based model and
//! merges the per-stride candidates with non-maximum suppression.

use crate::{check_model, OnnxError};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::FaceRegion;
use std::path::Path;

const INPUT_SIZE: u32 = 640;
const MEAN: f32 = 127.5;
const STD: f32 = 128.0;
const CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

/// Scale and padding applied by the letterbox, for mapping boxes back.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32) -> Self {
        let scale = (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((INPUT_SIZE as f32 - new_w) / 2.0).floor(),
            pad_y: ((INPUT_SIZE as f32 - new_h) / 2.0).floor(),
        }
    }

    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// A decoded box in frame coordinates, before NMS.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    fn to_region(self, width: u32, height: u32) -> FaceRegion {
        let clamp_x = |v: f32| v.round().clamp(0.0, width as f32) as u32;
        let clamp_y = |v: f32| v.round().clamp(0.0, height as f32) as u32;
        FaceRegion {
            top: clamp_y(self.y1),
            right: clamp_x(self.x2),
            bottom: clamp_y(self.y2),
            left: clamp_x(self.x1),
            confidence: self.score,
        }
    }
}

/// Output tensor indices for one stride: (score, bbox).
type StrideOutputs = (usize, usize);

pub struct FaceDetector {
    session: Session,
    outputs: [StrideOutputs; 3],
}

impl FaceDetector {
    pub fn load(model_path: &Path) -> Result<Self, OnnxError> {
        check_model(model_path)?;

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        tracing::info!(path = %model_path.display(), outputs = ?names, "loaded SCRFD model");

        if names.len() < 6 {
            return Err(OnnxError::InferenceFailed(format!(
                "SCRFD model needs score and bbox outputs for 3 strides, got {} outputs",
                names.len()
            )));
        }

        Ok(Self {
            session,
            outputs: output_indices(&names),
        })
    }

    /// Detect faces, most confident first.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, OnnxError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }
        let letterbox = Letterbox::fit(width, height);
        let input = preprocess(image, &letterbox);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (&stride, &(score_idx, bbox_idx)) in STRIDES.iter().zip(self.outputs.iter()) {
            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| OnnxError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| OnnxError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            candidates.extend(decode_stride(scores, bboxes, stride, &letterbox));
        }

        let kept = nms(candidates, NMS_THRESHOLD);
        tracing::trace!(faces = kept.len(), "SCRFD detections");
        Ok(kept.into_iter().map(|c| c.to_region(width, height)).collect())
    }
}

/// Letterboxed NCHW RGB tensor; padding normalizes to 0.0.
fn preprocess(image: &RgbImage, letterbox: &Letterbox) -> Array4<f32> {
    let size = INPUT_SIZE as usize;
    let new_w = ((image.width() as f32 * letterbox.scale).round() as u32).clamp(1, INPUT_SIZE);
    let new_h = ((image.height() as f32 * letterbox.scale).round() as u32).clamp(1, INPUT_SIZE);
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    let (ox, oy) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = (x as usize + ox, y as usize + oy);
        if tx >= size || ty >= size {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel.0[c] as f32 - MEAN) / STD;
        }
    }
    tensor
}

/// Map output names (`score_8`, `bbox_16`, ...) to stride slots, falling
/// back to the standard positional layout: scores 0-2, bboxes 3-5.
fn output_indices(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let named: Option<Vec<StrideOutputs>> = STRIDES
        .iter()
        .map(|&s| Some((find("score", s)?, find("bbox", s)?)))
        .collect();

    match named {
        Some(v) => [v[0], v[1], v[2]],
        None => {
            tracing::debug!(?names, "SCRFD output names not recognized; using positional mapping");
            [(0, 3), (1, 4), (2, 5)]
        }
    }
}

fn decode_stride(scores: &[f32], bboxes: &[f32], stride: usize, letterbox: &Letterbox) -> Vec<Candidate> {
    let grid_w = INPUT_SIZE as usize / stride;
    let s = stride as f32;

    scores
        .iter()
        .enumerate()
        .filter(|(_, &score)| score > CONFIDENCE_THRESHOLD)
        .filter_map(|(idx, &score)| {
            let offsets = bboxes.get(idx * 4..idx * 4 + 4)?;
            let cell = idx / ANCHORS_PER_CELL;
            let ax = (cell % grid_w) as f32 * s;
            let ay = (cell / grid_w) as f32 * s;
            let (x1, y1) = letterbox.unmap(ax - offsets[0] * s, ay - offsets[1] * s);
            let (x2, y2) = letterbox.unmap(ax + offsets[2] * s, ay + offsets[3] * s);
            Some(Candidate { x1, y1, x2, y2, score })
        })
        .collect()
}

/// Greedy non-maximum suppression; result is sorted by score, descending.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for c in candidates {
        if kept.iter().all(|k| k.iou(&c) <= iou_threshold) {
            kept.push(c);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(x: f32, y: f32, w: f32, h: f32, score: f32) -> Candidate {
        Candidate { x1: x, y1: y, x2: x + w, y2: y + h, score }
    }

    #[test]
    fn test_iou() {
        let a = cand(0.0, 0.0, 10.0, 10.0, 1.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert!(a.iou(&cand(20.0, 20.0, 10.0, 10.0, 1.0)).abs() < 1e-6);
        // Overlap 5x10 = 50, union 150.
        assert!((a.iou(&cand(5.0, 0.0, 10.0, 10.0, 1.0)) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let kept = nms(
            vec![
                cand(5.0, 5.0, 100.0, 100.0, 0.8),
                cand(200.0, 200.0, 50.0, 50.0, 0.7),
                cand(0.0, 0.0, 100.0, 100.0, 0.9),
            ],
            NMS_THRESHOLD,
        );
        let scores: Vec<f32> = kept.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
        assert!(nms(Vec::new(), NMS_THRESHOLD).is_empty());
    }

    #[test]
    fn test_letterbox_unmap() {
        let lb = Letterbox::fit(320, 240);
        assert_eq!(lb.scale, 2.0);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 80.0);
        let (x, y) = lb.unmap(100.0 * 2.0, 50.0 * 2.0 + 80.0);
        assert!((x - 100.0).abs() < 1e-4 && (y - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_stride_maps_to_frame() {
        let lb = Letterbox::fit(640, 640);
        let grid_w = INPUT_SIZE as usize / 32;
        let mut scores = vec![0.0f32; grid_w * grid_w * ANCHORS_PER_CELL];
        let mut bboxes = vec![0.0f32; scores.len() * 4];
        // Anchor (cell x=2, y=1), second anchor in the cell.
        let idx = (grid_w + 2) * ANCHORS_PER_CELL + 1;
        scores[idx] = 0.9;
        bboxes[idx * 4..idx * 4 + 4].copy_from_slice(&[1.0, 1.0, 1.0, 2.0]);

        let dets = decode_stride(&scores, &bboxes, 32, &lb);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0], Candidate { x1: 32.0, y1: 0.0, x2: 96.0, y2: 96.0, score: 0.9 });
    }

    #[test]
    fn test_output_indices() {
        let named: Vec<String> = ["bbox_8", "kps_8", "score_8", "bbox_16", "kps_16", "score_16", "bbox_32", "kps_32", "score_32"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(output_indices(&named), [(2, 0), (5, 3), (8, 6)]);

        let numeric: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(output_indices(&numeric), [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_region_is_clamped() {
        let region = cand(-5.0, 10.0, 50.0, 500.0, 0.8).to_region(40, 100);
        assert_eq!((region.top, region.right, region.bottom, region.left), (10, 40, 100, 0));
    }

    #[test]
    fn test_preprocess_pads_to_zero() {
        let image = RgbImage::from_pixel(320, 240, image::Rgb([255, 255, 255]));
        let lb = Letterbox::fit(320, 240);
        let t = preprocess(&image, &lb);
        assert_eq!(t.shape(), &[1, 3, 640, 640]);
        assert_eq!(t[[0, 0, 0, 0]], 0.0);
        assert!((t[[0, 2, 320, 320]] - (255.0 - MEAN) / STD).abs() < 1e-6);
    }
}
