//! Nearest-neighbour identity matching.

use crate::analyzer::FaceAnalyzer;
use crate::types::{FeatureVector, Gallery};
use std::cmp::Ordering;
use std::fmt;

pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identification {
    Known(String),
    Unknown,
}

impl Identification {
    pub fn label(&self) -> &str {
        match self {
            Identification::Known(name) => name,
            Identification::Unknown => UNKNOWN_LABEL,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Identification::Known(_))
    }
}

impl fmt::Display for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of matching a probe encoding against a gallery.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub identification: Identification,
    /// Distance to the nearest candidate, if the gallery had any.
    pub distance: Option<f32>,
    /// Gallery index of the nearest candidate.
    pub index: Option<usize>,
}

impl MatchResult {
    fn unknown(distance: Option<f32>, index: Option<usize>) -> Self {
        Self {
            identification: Identification::Unknown,
            distance,
            index,
        }
    }
}

/// Picks the nearest gallery vector and accepts it only if the analyzer's
/// same-face decision agrees at the configured tolerance.
///
/// Equal distances resolve to the lexicographically smallest name, then the
/// lowest gallery index. NaN distances are never selected.
#[derive(Debug, Clone, Copy)]
pub struct NearestMatcher {
    pub tolerance: f32,
}

impl NearestMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn compare<A: FaceAnalyzer + ?Sized>(
        &self,
        analyzer: &A,
        probe: &FeatureVector,
        gallery: &Gallery,
    ) -> MatchResult {
        if gallery.is_empty() {
            return MatchResult::unknown(None, None);
        }

        let distances = analyzer.distance(gallery.encodings(), probe);
        let Some(best) = nearest(&distances, gallery.labels()) else {
            return MatchResult::unknown(None, None);
        };
        let distance = distances[best];

        let same = analyzer.is_same_face(gallery.encodings(), probe, self.tolerance);
        if same.get(best).copied().unwrap_or(false) {
            MatchResult {
                identification: Identification::Known(gallery.labels()[best].clone()),
                distance: Some(distance),
                index: Some(best),
            }
        } else {
            MatchResult::unknown(Some(distance), Some(best))
        }
    }
}

fn nearest(distances: &[f32], labels: &[String]) -> Option<usize> {
    distances
        .iter()
        .zip(labels)
        .enumerate()
        .filter(|(_, (d, _))| !d.is_nan())
        .min_by(|(i, (da, la)), (j, (db, lb))| {
            da.partial_cmp(db)
                .unwrap_or(Ordering::Equal)
                .then_with(|| la.cmp(lb))
                .then_with(|| i.cmp(j))
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{encoding, ColorAnalyzer, ASHA, BOB, STRANGER};

    fn gallery(entries: &[(&str, Vec<f32>)]) -> Gallery {
        let mut g = Gallery::new();
        for (label, values) in entries {
            g.push(*label, FeatureVector::new(values.clone()));
        }
        g
    }

    #[test]
    fn test_matches_own_sample() {
        let mut g = Gallery::new();
        g.push("Asha", encoding(ASHA));
        g.push("Bob", encoding(BOB));

        let result = NearestMatcher::new(0.6).compare(&ColorAnalyzer::default(), &encoding(ASHA), &g);
        assert_eq!(result.identification, Identification::Known("Asha".into()));
        assert_eq!(result.index, Some(0));
        assert!(result.distance.unwrap() < 1e-6);
    }

    #[test]
    fn test_best_match_is_last_entry() {
        let g = gallery(&[
            ("decoy1", vec![0.0, 1.0, 0.0]),
            ("decoy2", vec![0.0, 0.0, 1.0]),
            ("match", vec![1.0, 0.0, 0.0]),
        ]);
        let probe = FeatureVector::new(vec![0.9, 0.0, 0.0]);
        let result = NearestMatcher::new(0.6).compare(&ColorAnalyzer::default(), &probe, &g);
        assert_eq!(result.identification.label(), "match");
        assert_eq!(result.index, Some(2));
    }

    #[test]
    fn test_far_probe_is_unknown() {
        let mut g = Gallery::new();
        g.push("Asha", encoding(ASHA));
        g.push("Bob", encoding(BOB));

        let result = NearestMatcher::new(0.6).compare(&ColorAnalyzer::default(), &encoding(STRANGER), &g);
        assert_eq!(result.identification, Identification::Unknown);
        assert_eq!(result.identification.to_string(), "unknown");
        // Nearest distance is still reported for diagnostics.
        assert!(result.distance.is_some());
    }

    #[test]
    fn test_empty_gallery() {
        let probe = FeatureVector::new(vec![1.0, 0.0]);
        let result = NearestMatcher::new(0.6).compare(&ColorAnalyzer::default(), &probe, &Gallery::new());
        assert_eq!(result.identification, Identification::Unknown);
        assert!(result.distance.is_none());
    }

    #[test]
    fn test_tie_breaks_by_name() {
        // Both candidates are exactly 0.5 away; "alice" sorts before "zed".
        let g = gallery(&[("zed", vec![0.5, 0.0]), ("alice", vec![-0.5, 0.0])]);
        let probe = FeatureVector::new(vec![0.0, 0.0]);
        let result = NearestMatcher::new(0.6).compare(&ColorAnalyzer::default(), &probe, &g);
        assert_eq!(result.identification.label(), "alice");
        assert_eq!(result.index, Some(1));
    }

    #[test]
    fn test_tie_same_name_prefers_lowest_index() {
        let g = gallery(&[("bob", vec![0.5, 0.0]), ("bob", vec![-0.5, 0.0])]);
        let probe = FeatureVector::new(vec![0.0, 0.0]);
        let result = NearestMatcher::new(0.6).compare(&ColorAnalyzer::default(), &probe, &g);
        assert_eq!(result.index, Some(0));
    }

    #[test]
    fn test_nan_distance_never_wins() {
        let g = gallery(&[("nan", vec![f32::NAN, 0.0]), ("real", vec![0.1, 0.0])]);
        let probe = FeatureVector::new(vec![0.0, 0.0]);
        let result = NearestMatcher::new(0.6).compare(&ColorAnalyzer::default(), &probe, &g);
        assert_eq!(result.identification.label(), "real");
    }

    #[test]
    fn test_boundary_distance_is_accepted() {
        let g = gallery(&[("edge", vec![0.5, 0.0])]);
        let probe = FeatureVector::new(vec![0.0, 0.0]);
        let result = NearestMatcher::new(0.5).compare(&ColorAnalyzer::default(), &probe, &g);
        assert!(result.identification.is_known());
    }
}
