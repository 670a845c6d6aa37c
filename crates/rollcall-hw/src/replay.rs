//! Replays still images from a directory as a frame stream.
//!
//! Useful for enrolling from existing photos and for exercising recognition
//! without a camera attached.

use rollcall_core::store::{decode_rgb, is_image_file};
use rollcall_core::{Frame, FrameSource, SourceError};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

pub struct ReplaySource {
    dir: PathBuf,
    pending: VecDeque<PathBuf>,
    sequence: u32,
}

impl ReplaySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: VecDeque::new(),
            sequence: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSource for ReplaySource {
    /// Snapshot the directory listing, sorted by file name.
    fn open(&mut self) -> Result<(), SourceError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| SourceError::DeviceUnavailable(format!("{}: {e}", self.dir.display())))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        paths.sort();

        tracing::info!(dir = %self.dir.display(), frames = paths.len(), "replay source opened");
        self.pending = paths.into();
        self.sequence = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let image = decode_rgb(&path)
            .map_err(|reason| SourceError::ReadFailed(format!("{}: {reason}", path.display())))?;
        let frame = Frame::new(image, self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.pending.clear();
    }
}
