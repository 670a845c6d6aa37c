//! Enrollment: capture face-bearing frames for a new identity.

use crate::analyzer::FaceAnalyzer;
use crate::session::{InvalidTransition, Session};
use crate::source::{FrameSource, ScopedCapture, SourceError, DEFAULT_MAX_READ_FAILURES};
use crate::store::{IdentityStore, StoreError};
use image::ImageFormat;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Samples saved per enrollment.
pub const DEFAULT_ENROLL_TARGET: usize = 10;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("invalid identity name {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Session(#[from] InvalidTransition),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to save sample {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct EnrollOptions {
    pub target: usize,
    pub max_read_failures: usize,
}

impl Default for EnrollOptions {
    fn default() -> Self {
        Self {
            target: DEFAULT_ENROLL_TARGET,
            max_read_failures: DEFAULT_MAX_READ_FAILURES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollOutcome {
    /// Filesystem-safe identity key the samples were saved under.
    pub key: String,
    pub saved: usize,
    /// True if the session was cancelled before `target` was reached.
    pub cancelled: bool,
}

/// Normalize a display name into an identity key: trimmed, with each run of
/// whitespace replaced by `_`.
pub fn identity_key(name: &str) -> Result<String, EnrollError> {
    let key = name.split_whitespace().collect::<Vec<_>>().join("_");
    let unsafe_key = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\'])
        || key.chars().any(char::is_control);
    if unsafe_key {
        return Err(EnrollError::InvalidName(name.to_string()));
    }
    Ok(key)
}

/// Capture up to `options.target` frames that contain a face and save them
/// as `<key>_<index>.jpg` under the identity's directory.
///
/// Frames without a face are skipped. Stops early when the session is
/// cancelled or the source runs dry, and reports how many were saved. The
/// identity directory is only created once there is something to put in it.
pub fn enroll<S, A>(
    session: &mut Session,
    name: &str,
    source: &mut S,
    analyzer: &mut A,
    store: &IdentityStore,
    options: &EnrollOptions,
) -> Result<EnrollOutcome, EnrollError>
where
    S: FrameSource + ?Sized,
    A: FaceAnalyzer + ?Sized,
{
    let key = identity_key(name)?;
    let dir = store.identity_dir(&key);
    let mut index = store.next_sample_index(&key)?;

    session.begin()?;
    let result = capture_samples(session, &key, &dir, &mut index, source, analyzer, options);
    session.finish();

    let saved = result?;
    let cancelled = session.is_cancelled() && saved < options.target;
    tracing::info!(identity = %key, saved, cancelled, "enrollment finished");

    Ok(EnrollOutcome { key, saved, cancelled })
}

fn capture_samples<S, A>(
    session: &Session,
    key: &str,
    dir: &std::path::Path,
    index: &mut usize,
    source: &mut S,
    analyzer: &mut A,
    options: &EnrollOptions,
) -> Result<usize, EnrollError>
where
    S: FrameSource + ?Sized,
    A: FaceAnalyzer + ?Sized,
{
    let mut capture = ScopedCapture::acquire(source, options.max_read_failures)?;
    let mut saved = 0usize;

    while saved < options.target {
        if session.is_cancelled() {
            tracing::info!(identity = %key, saved, "enrollment cancelled");
            break;
        }
        let Some(frame) = capture.next_frame()? else {
            tracing::info!(identity = %key, saved, "frame source exhausted");
            break;
        };

        let faces = match analyzer.detect(&frame.image) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = %e, seq = frame.sequence, "detection failed; skipping frame");
                continue;
            }
        };
        if faces.is_empty() {
            tracing::warn!(seq = frame.sequence, "no face detected; skipping frame");
            continue;
        }

        if saved == 0 {
            fs::create_dir_all(dir).map_err(|source| EnrollError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let path = dir.join(format!("{key}_{index}.jpg"));
        frame
            .image
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|source| EnrollError::Save {
                path: path.clone(),
                source,
            })?;
        *index += 1;
        saved += 1;
        tracing::info!(identity = %key, saved, target = options.target, path = %path.display(), "sample saved");
    }

    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::testing::{frame, ColorAnalyzer, ScriptedSource, ASHA, NO_FACE};

    #[test]
    fn test_identity_key() {
        assert_eq!(identity_key("Asha").unwrap(), "Asha");
        assert_eq!(identity_key("  Ravi   Kumar ").unwrap(), "Ravi_Kumar");
        assert_eq!(identity_key("Ana\tMaria").unwrap(), "Ana_Maria");
        assert!(identity_key("").is_err());
        assert!(identity_key("   ").is_err());
        assert!(identity_key("..").is_err());
        assert!(identity_key("a/b").is_err());
        assert!(identity_key("a\\b").is_err());
    }

    #[test]
    fn test_enroll_saves_target_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(tmp.path());
        let mut source = ScriptedSource::with_frames((0..15).map(|i| frame(ASHA, i)));
        let mut session = Session::new();

        let outcome = enroll(
            &mut session,
            "Asha",
            &mut source,
            &mut ColorAnalyzer::default(),
            &store,
            &EnrollOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.saved, 10);
        assert!(!outcome.cancelled);
        assert_eq!(source.reads, 10);
        assert_eq!(source.released, 1);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(tmp.path().join("Asha/Asha_0.jpg").is_file());
        assert!(tmp.path().join("Asha/Asha_9.jpg").is_file());
    }

    #[test]
    fn test_enroll_skips_faceless_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(tmp.path());
        let frames = [frame(NO_FACE, 0), frame(ASHA, 1), frame(NO_FACE, 2), frame(ASHA, 3)];
        let mut source = ScriptedSource::with_frames(frames);

        let outcome = enroll(
            &mut Session::new(),
            "Ravi Kumar",
            &mut source,
            &mut ColorAnalyzer::default(),
            &store,
            &EnrollOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.key, "Ravi_Kumar");
        assert_eq!(outcome.saved, 2);
        assert_eq!(store.identities().unwrap()[0].samples, 2);
    }

    #[test]
    fn test_no_faces_leaves_no_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(tmp.path());
        let mut source = ScriptedSource::with_frames((0..5).map(|i| frame(NO_FACE, i)));

        let outcome = enroll(
            &mut Session::new(),
            "Asha",
            &mut source,
            &mut ColorAnalyzer::default(),
            &store,
            &EnrollOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.saved, 0);
        assert!(!tmp.path().join("Asha").exists());
        assert!(store.load(&mut ColorAnalyzer::default()).unwrap().gallery.is_empty());
    }

    #[test]
    fn test_cancelled_before_start() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(tmp.path());
        let mut source = ScriptedSource::with_frames((0..5).map(|i| frame(ASHA, i)));
        let mut session = Session::new();
        session.token().cancel();

        let outcome = enroll(
            &mut session,
            "Asha",
            &mut source,
            &mut ColorAnalyzer::default(),
            &store,
            &EnrollOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.saved, 0);
        assert!(outcome.cancelled);
        assert_eq!(source.reads, 0);
        assert_eq!(source.released, 1);
    }

    #[test]
    fn test_reenroll_continues_numbering() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(tmp.path());
        let options = EnrollOptions {
            target: 2,
            ..EnrollOptions::default()
        };

        for _ in 0..2 {
            let mut source = ScriptedSource::with_frames((0..2).map(|i| frame(ASHA, i)));
            enroll(&mut Session::new(), "Asha", &mut source, &mut ColorAnalyzer::default(), &store, &options)
                .unwrap();
        }

        assert!(tmp.path().join("Asha/Asha_3.jpg").is_file());
        assert_eq!(store.identities().unwrap()[0].samples, 4);
    }

    #[test]
    fn test_device_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource {
            fail_open: true,
            ..ScriptedSource::default()
        };
        let mut session = Session::new();
        let err = enroll(
            &mut session,
            "Asha",
            &mut source,
            &mut ColorAnalyzer::default(),
            &IdentityStore::new(tmp.path()),
            &EnrollOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, EnrollError::Source(SourceError::DeviceUnavailable(_))));
        assert_eq!(source.released, 1);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_invalid_name_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::default();
        let err = enroll(
            &mut Session::new(),
            "  ",
            &mut source,
            &mut ColorAnalyzer::default(),
            &IdentityStore::new(tmp.path()),
            &EnrollOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EnrollError::InvalidName(_)));
        assert_eq!(source.opened, 0);
    }
}
