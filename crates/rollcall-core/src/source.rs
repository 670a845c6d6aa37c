//! Frame source capability and scoped acquisition.

use crate::types::Frame;
use std::time::Duration;
use thiserror::Error;

/// Consecutive read failures tolerated before capture is abandoned.
pub const DEFAULT_MAX_READ_FAILURES: usize = 5;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("read timed out after {0:?}")]
    Timeout(Duration),
    #[error("read failed: {0}")]
    ReadFailed(String),
    #[error("capture failed after {0} consecutive read errors")]
    CaptureFailed(usize),
}

/// A camera or camera-like producer of frames.
///
/// `release` must be idempotent; it is called on every exit path, including
/// after a failed `open`.
pub trait FrameSource {
    fn open(&mut self) -> Result<(), SourceError>;

    /// Next frame, or `None` once the source is exhausted.
    fn read(&mut self) -> Result<Option<Frame>, SourceError>;

    fn release(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<(), SourceError> {
        (**self).open()
    }

    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).read()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// An opened source that is released when dropped.
///
/// Individual read errors are logged and retried; `max_failures` errors in a
/// row become a fatal [`SourceError::CaptureFailed`].
pub struct ScopedCapture<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
    max_failures: usize,
    failures: usize,
}

impl<'a, S: FrameSource + ?Sized> ScopedCapture<'a, S> {
    pub fn acquire(source: &'a mut S, max_failures: usize) -> Result<Self, SourceError> {
        if let Err(e) = source.open() {
            source.release();
            return Err(e);
        }
        tracing::debug!("frame source acquired");
        Ok(Self {
            source,
            max_failures: max_failures.max(1),
            failures: 0,
        })
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            match self.source.read() {
                Ok(frame) => {
                    self.failures = 0;
                    return Ok(frame);
                }
                Err(e @ SourceError::DeviceUnavailable(_)) => return Err(e),
                Err(e) => {
                    self.failures += 1;
                    tracing::warn!(error = %e, failures = self.failures, "frame read failed");
                    if self.failures >= self.max_failures {
                        return Err(SourceError::CaptureFailed(self.failures));
                    }
                }
            }
        }
    }
}

impl<S: FrameSource + ?Sized> Drop for ScopedCapture<'_, S> {
    fn drop(&mut self) {
        self.source.release();
        tracing::debug!("frame source released");
    }
}
