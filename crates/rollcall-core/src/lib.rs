//! rollcall-core — Face enrollment and attendance engine.
//!
//! Loads enrolled identities from disk, matches live face encodings against
//! them, and records at most one attendance event per identity per day.
//! Face detection and encoding are supplied by a [`FaceAnalyzer`]
//! implementation; frames come from a [`FrameSource`].

pub mod analyzer;
pub mod attendance;
pub mod config;
pub mod enroll;
pub mod matcher;
pub mod recognize;
pub mod session;
pub mod source;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::{AnalyzerError, FaceAnalyzer};
pub use attendance::{spawn_writer, AttendanceHandle, AttendanceLog, AttendanceRecord, LogError, MarkOutcome};
pub use config::{ChatSettings, Config, ConfigError};
pub use enroll::{enroll, identity_key, EnrollError, EnrollOptions, EnrollOutcome};
pub use matcher::{Identification, MatchResult, NearestMatcher};
pub use recognize::{annotate, recognize, FaceReport, FrameReport, RecognizeError, RecognizeOptions, Recognition};
pub use session::{Session, SessionState};
pub use source::{FrameSource, ScopedCapture, SourceError};
pub use store::{IdentityStore, IdentitySummary, LoadReport, LoadWarning, StoreError};
pub use types::{FaceRegion, FeatureVector, Frame, Gallery};
