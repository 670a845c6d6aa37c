//! Recognition: match every face in a live frame stream and mark attendance.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::attendance::{AttendanceHandle, AttendanceRecord, LogError, MarkOutcome};
use crate::matcher::{Identification, MatchResult, NearestMatcher};
use crate::session::{InvalidTransition, Session};
use crate::source::{FrameSource, ScopedCapture, SourceError, DEFAULT_MAX_READ_FAILURES};
use crate::types::{FaceRegion, Frame, Gallery};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use thiserror::Error;

/// Frames are shrunk by this factor before detection.
pub const DEFAULT_DOWNSCALE: f32 = 0.25;

const KNOWN_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([220, 0, 0]);

#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Session(#[from] InvalidTransition),
}

#[derive(Debug, Clone, Copy)]
pub struct RecognizeOptions {
    pub downscale: f32,
    pub tolerance: f32,
    pub max_read_failures: usize,
}

impl RecognizeOptions {
    /// Defaults, with the analyzer's own match tolerance.
    pub fn for_analyzer<A: FaceAnalyzer + ?Sized>(analyzer: &A) -> Self {
        Self {
            downscale: DEFAULT_DOWNSCALE,
            tolerance: analyzer.default_tolerance(),
            max_read_failures: DEFAULT_MAX_READ_FAILURES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FaceReport {
    /// Face bounds in full-resolution frame coordinates.
    pub region: FaceRegion,
    pub result: MatchResult,
}

#[derive(Debug)]
pub struct FrameReport {
    pub frame: Frame,
    pub faces: Vec<FaceReport>,
    /// Attendance rows written because of this frame.
    pub recorded: Vec<AttendanceRecord>,
    /// Set when the log refused a write; no further faces in the frame are marked.
    pub log_error: Option<LogError>,
}

impl FrameReport {
    pub fn known(&self) -> impl Iterator<Item = &str> {
        self.faces
            .iter()
            .filter(|f| f.result.identification.is_known())
            .map(|f| f.result.identification.label())
    }
}

/// Lazy, possibly endless sequence of per-frame reports.
///
/// Ends when the session is cancelled, the source is exhausted, or the source
/// fails fatally (the error is yielded as the last item). Analyzer errors are
/// yielded for the offending frame and the run continues; a log failure is
/// attached to the frame's report alongside its face results. The
/// source is released as soon as production stops or the iterator is
/// dropped.
pub struct Recognition<'a, S: FrameSource + ?Sized, A: FaceAnalyzer + ?Sized> {
    session: &'a mut Session,
    capture: Option<ScopedCapture<'a, S>>,
    analyzer: &'a mut A,
    gallery: &'a Gallery,
    log: &'a AttendanceHandle,
    matcher: NearestMatcher,
    downscale: f32,
}

/// Start a recognition run against a snapshot of enrolled identities.
pub fn recognize<'a, S, A>(
    session: &'a mut Session,
    source: &'a mut S,
    analyzer: &'a mut A,
    gallery: &'a Gallery,
    log: &'a AttendanceHandle,
    options: RecognizeOptions,
) -> Result<Recognition<'a, S, A>, RecognizeError>
where
    S: FrameSource + ?Sized,
    A: FaceAnalyzer + ?Sized,
{
    session.begin()?;
    let capture = match ScopedCapture::acquire(source, options.max_read_failures) {
        Ok(c) => c,
        Err(e) => {
            session.finish();
            return Err(e.into());
        }
    };

    tracing::info!(
        vectors = gallery.len(),
        identities = gallery.names().len(),
        tolerance = options.tolerance,
        downscale = options.downscale,
        "recognition started"
    );

    Ok(Recognition {
        session,
        capture: Some(capture),
        analyzer,
        gallery,
        log,
        matcher: NearestMatcher::new(options.tolerance),
        downscale: options.downscale,
    })
}

impl<S: FrameSource + ?Sized, A: FaceAnalyzer + ?Sized> Recognition<'_, S, A> {
    fn stop(&mut self) {
        if self.capture.take().is_some() {
            tracing::info!(cancelled = self.session.is_cancelled(), "recognition stopped");
        }
        self.session.finish();
    }

    fn process(&mut self, frame: Frame) -> Result<FrameReport, RecognizeError> {
        let scale = if self.downscale > 0.0 && self.downscale < 1.0 {
            self.downscale
        } else {
            1.0
        };
        let small = frame.downscale(scale);
        let regions = self.analyzer.detect(&small)?;

        let mut faces = Vec::with_capacity(regions.len());
        let mut recorded = Vec::new();
        let mut log_error = None;

        for region in &regions {
            let encoding = self.analyzer.encode(&small, region)?;
            let result = self.matcher.compare(&*self.analyzer, &encoding, self.gallery);

            if let Identification::Known(name) = &result.identification {
                if log_error.is_none() {
                    match self.log.mark_at(name, frame.captured_at.naive_local()) {
                        Ok(MarkOutcome::Recorded(record)) => recorded.push(record),
                        Ok(MarkOutcome::AlreadyMarked) => {}
                        Err(e) => {
                            tracing::error!(error = %e, name = %name, seq = frame.sequence, "attendance not recorded");
                            log_error = Some(e);
                        }
                    }
                }
            }

            tracing::debug!(
                seq = frame.sequence,
                label = %result.identification,
                distance = ?result.distance,
                "face matched"
            );

            faces.push(FaceReport {
                region: region.scale(1.0 / scale).clamp_to(frame.width(), frame.height()),
                result,
            });
        }

        Ok(FrameReport {
            frame,
            faces,
            recorded,
            log_error,
        })
    }
}

impl<S: FrameSource + ?Sized, A: FaceAnalyzer + ?Sized> Iterator for Recognition<'_, S, A> {
    type Item = Result<FrameReport, RecognizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.session.is_cancelled() {
            self.stop();
            return None;
        }

        let next = self.capture.as_mut()?.next_frame();
        match next {
            Ok(Some(frame)) => Some(self.process(frame)),
            Ok(None) => {
                self.stop();
                None
            }
            Err(e) => {
                self.stop();
                Some(Err(e.into()))
            }
        }
    }
}

impl<S: FrameSource + ?Sized, A: FaceAnalyzer + ?Sized> Drop for Recognition<'_, S, A> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Draw a box around every reported face: green for known, red for unknown.
pub fn annotate(report: &FrameReport) -> RgbImage {
    let mut canvas = report.frame.image.clone();
    for face in &report.faces {
        let r = &face.region;
        if r.width() == 0 || r.height() == 0 {
            continue;
        }
        let color = if face.result.identification.is_known() {
            KNOWN_COLOR
        } else {
            UNKNOWN_COLOR
        };
        let rect = Rect::at(r.left as i32, r.top as i32).of_size(r.width(), r.height());
        draw_hollow_rect_mut(&mut canvas, rect, color);
    }
    canvas
}
