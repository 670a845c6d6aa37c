//! Test doubles shared by the flow tests.
//!
//! Faces are modelled as solid-colour frames: a frame whose red channel is
//! non-zero "contains" one face covering the whole image, and its encoding is
//! the normalized colour of the centre pixel.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::source::{FrameSource, SourceError};
use crate::types::{FaceRegion, FeatureVector, Frame};
use image::{Rgb, RgbImage};
use std::collections::VecDeque;

pub const ASHA: [u8; 3] = [200, 20, 20];
pub const BOB: [u8; 3] = [20, 200, 20];
pub const STRANGER: [u8; 3] = [120, 120, 250];
pub const NO_FACE: [u8; 3] = [0, 90, 90];

pub fn solid(color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(64, 48, Rgb(color))
}

pub fn frame(color: [u8; 3], sequence: u32) -> Frame {
    Frame::new(solid(color), sequence)
}

pub fn encoding(color: [u8; 3]) -> FeatureVector {
    FeatureVector::new(color.iter().map(|&c| c as f32 / 255.0).collect())
}

#[derive(Default)]
pub struct ColorAnalyzer {
    pub detect_calls: usize,
}

impl FaceAnalyzer for ColorAnalyzer {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, AnalyzerError> {
        self.detect_calls += 1;
        let Some(pixel) = image.get_pixel_checked(0, 0) else {
            return Ok(Vec::new());
        };
        if pixel.0[0] == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![FaceRegion::new(0, image.width(), image.height(), 0)])
    }

    fn encode(&mut self, image: &RgbImage, region: &FaceRegion) -> Result<FeatureVector, AnalyzerError> {
        let cx = region.left + region.width() / 2;
        let cy = region.top + region.height() / 2;
        let pixel = image
            .get_pixel_checked(cx, cy)
            .ok_or_else(|| AnalyzerError::Encoding("region outside image".into()))?;
        Ok(encoding(pixel.0))
    }
}

/// Scripted frame source that records open/release calls.
#[derive(Default)]
pub struct ScriptedSource {
    pub frames: VecDeque<Result<Frame, SourceError>>,
    pub fail_open: bool,
    pub opened: usize,
    pub released: usize,
    pub reads: usize,
}

impl ScriptedSource {
    pub fn with_frames(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }
}

impl FrameSource for ScriptedSource {
    fn open(&mut self) -> Result<(), SourceError> {
        if self.fail_open {
            return Err(SourceError::DeviceUnavailable("scripted".into()));
        }
        self.opened += 1;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        self.reads += 1;
        self.frames.pop_front().transpose()
    }

    fn release(&mut self) {
        self.released += 1;
    }
}
