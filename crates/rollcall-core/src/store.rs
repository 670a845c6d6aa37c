//! On-disk identity store: one directory of sample images per identity.
//!
//! ```text
//! <root>/
//!   Asha/Asha_0.jpg, Asha_1.jpg, ...
//!   Ravi_Kumar/Ravi_Kumar_0.jpg, ...
//! ```
//!
//! Encodings are recomputed from the images on every load.

use crate::analyzer::FaceAnalyzer;
use crate::types::Gallery;
use image::{ImageReader, RgbImage};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sample image extensions, matched case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read identity store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A sample image skipped during [`IdentityStore::load`].
#[derive(Debug, Clone)]
pub enum LoadWarning {
    NoFaceDetected { identity: String, path: PathBuf },
    Unreadable { identity: String, path: PathBuf, reason: String },
    AnalyzerFailed { identity: String, path: PathBuf, reason: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::NoFaceDetected { identity, path } => {
                write!(f, "no face detected in {} ({identity})", path.display())
            }
            LoadWarning::Unreadable { identity, path, reason } => {
                write!(f, "cannot decode {} ({identity}): {reason}", path.display())
            }
            LoadWarning::AnalyzerFailed { identity, path, reason } => {
                write!(f, "analyzer failed on {} ({identity}): {reason}", path.display())
            }
        }
    }
}

pub struct LoadReport {
    pub gallery: Gallery,
    pub warnings: Vec<LoadWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySummary {
    pub name: String,
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub struct IdentityStore {
    root: PathBuf,
}

impl IdentityStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the samples for an identity key.
    pub fn identity_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Enrolled identities and their sample counts, sorted by name.
    /// Does not run the analyzer.
    pub fn identities(&self) -> Result<Vec<IdentitySummary>, StoreError> {
        let mut summaries = Vec::new();
        for dir in self.identity_dirs()? {
            let samples = sample_paths(&dir)?.len();
            summaries.push(IdentitySummary {
                name: dir_name(&dir),
                samples,
            });
        }
        Ok(summaries)
    }

    /// Encode every sample image under the root.
    ///
    /// Images without a detectable face, or that fail to decode, are skipped
    /// and reported as warnings. Only the first (most confident) face of each
    /// image is used. A missing root yields an empty gallery.
    pub fn load<A: FaceAnalyzer + ?Sized>(&self, analyzer: &mut A) -> Result<LoadReport, StoreError> {
        let mut gallery = Gallery::new();
        let mut warnings = Vec::new();

        for dir in self.identity_dirs()? {
            let identity = dir_name(&dir);
            let before = gallery.len();

            for path in sample_paths(&dir)? {
                let image = match decode_rgb(&path) {
                    Ok(img) => img,
                    Err(reason) => {
                        warnings.push(LoadWarning::Unreadable {
                            identity: identity.clone(),
                            path,
                            reason,
                        });
                        continue;
                    }
                };

                let encoded = analyzer.detect(&image).and_then(|faces| match faces.first() {
                    Some(face) => analyzer.encode(&image, face).map(Some),
                    None => Ok(None),
                });

                match encoded {
                    Ok(Some(vector)) => gallery.push(identity.clone(), vector),
                    Ok(None) => warnings.push(LoadWarning::NoFaceDetected {
                        identity: identity.clone(),
                        path,
                    }),
                    Err(e) => warnings.push(LoadWarning::AnalyzerFailed {
                        identity: identity.clone(),
                        path,
                        reason: e.to_string(),
                    }),
                }
            }

            tracing::debug!(identity = %identity, vectors = gallery.len() - before, "loaded identity");
        }

        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        tracing::info!(
            root = %self.root.display(),
            vectors = gallery.len(),
            identities = gallery.names().len(),
            skipped = warnings.len(),
            "identity store loaded"
        );

        Ok(LoadReport { gallery, warnings })
    }

    /// Index to use for the next sample saved under `key`: one past the
    /// highest existing `<key>_<n>` index, or 0.
    pub fn next_sample_index(&self, key: &str) -> Result<usize, StoreError> {
        let dir = self.identity_dir(key);
        if !dir.is_dir() {
            return Ok(0);
        }
        let prefix = format!("{key}_");
        let next = sample_paths(&dir)?
            .iter()
            .filter_map(|p| p.file_stem()?.to_str()?.strip_prefix(&prefix)?.parse::<usize>().ok())
            .max()
            .map_or(0, |n| n + 1);
        Ok(next)
    }

    fn identity_dirs(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(root = %self.root.display(), "identity store does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.root, e))?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

/// True if the path has a sample image extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Decode an image by content rather than extension.
pub fn decode_rgb(path: &Path) -> Result<RgbImage, String> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| e.to_string())?;
    reader.decode().map(|img| img.to_rgb8()).map_err(|e| e.to_string())
}

fn sample_paths(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if path.is_file() && is_image_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
