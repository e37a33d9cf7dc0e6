//! Nearest-neighbour descriptor matching against the labeled set.

use crate::types::{Descriptor, LabeledDescriptor};

/// Default maximum distance for declaring a match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Label reported when the best distance is not below the threshold.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Best match for one probe descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    /// Matched account id, or [`UNKNOWN_LABEL`].
    pub label: String,
    pub distance: f32,
}

impl FaceMatch {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Matches probe descriptors against labeled descriptors.
///
/// For each label the distance is the mean Euclidean distance over that
/// label's descriptors; the label with the smallest distance wins.
#[derive(Debug, Clone)]
pub struct FaceMatcher {
    labeled: Vec<LabeledDescriptor>,
    threshold: f32,
}

impl FaceMatcher {
    pub fn new(labeled: Vec<LabeledDescriptor>, threshold: f32) -> Self {
        Self { labeled, threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_empty(&self) -> bool {
        self.labeled.iter().all(|l| l.descriptors.is_empty())
    }

    fn mean_distance(probe: &Descriptor, labeled: &LabeledDescriptor) -> f32 {
        if labeled.descriptors.is_empty() {
            return f32::INFINITY;
        }
        let total: f32 = labeled.descriptors.iter().map(|d| probe.distance(d)).sum();
        total / labeled.descriptors.len() as f32
    }

    /// Find the closest label for `probe`.
    ///
    /// Returns `None` only when there are no labeled descriptors at all.
    pub fn best_match(&self, probe: &Descriptor) -> Option<FaceMatch> {
        let (label, distance) = self
            .labeled
            .iter()
            .map(|l| (l, Self::mean_distance(probe, l)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        if !distance.is_finite() {
            return None;
        }

        let label = if distance < self.threshold {
            label.label.clone()
        } else {
            UNKNOWN_LABEL.to_string()
        };
        Some(FaceMatch { label, distance })
    }

    /// Match every probe and keep the single best-distance result.
    pub fn best_of<'a, I>(&self, probes: I) -> Option<FaceMatch>
    where
        I: IntoIterator<Item = &'a Descriptor>,
    {
        probes
            .into_iter()
            .filter_map(|p| self.best_match(p))
            .min_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(label: &str, values: &[&[f32]]) -> LabeledDescriptor {
        LabeledDescriptor::new(
            label,
            values.iter().map(|v| Descriptor::new(v.to_vec())).collect(),
        )
    }

    #[test]
    fn test_best_match_below_threshold() {
        let m = FaceMatcher::new(
            vec![labeled("alice", &[&[0.0, 0.0]]), labeled("bob", &[&[1.0, 1.0]])],
            DEFAULT_MATCH_THRESHOLD,
        );
        let r = m.best_match(&Descriptor::new(vec![0.3, 0.0])).unwrap();
        assert_eq!(r.label, "alice");
        assert!((r.distance - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_best_match_at_threshold_is_unknown() {
        let m = FaceMatcher::new(vec![labeled("alice", &[&[0.0, 0.0]])], 0.6);
        let r = m.best_match(&Descriptor::new(vec![0.6, 0.0])).unwrap();
        assert!(r.is_unknown());
        assert!((r.distance - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_mean_distance_over_descriptors() {
        // Distances 0.2 and 0.6 average to 0.4.
        let m = FaceMatcher::new(vec![labeled("alice", &[&[0.2], &[0.6]])], 0.6);
        let r = m.best_match(&Descriptor::new(vec![0.0])).unwrap();
        assert_eq!(r.label, "alice");
        assert!((r.distance - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_empty_matcher() {
        let m = FaceMatcher::new(vec![], 0.6);
        assert!(m.is_empty());
        assert!(m.best_match(&Descriptor::new(vec![0.0])).is_none());
    }

    #[test]
    fn test_best_of_picks_smallest_distance() {
        let m = FaceMatcher::new(
            vec![labeled("alice", &[&[0.0, 0.0]]), labeled("bob", &[&[5.0, 5.0]])],
            0.6,
        );
        let far = Descriptor::new(vec![2.0, 2.0]);
        let near_bob = Descriptor::new(vec![5.1, 5.0]);
        let r = m.best_of([&far, &near_bob]).unwrap();
        assert_eq!(r.label, "bob");
    }

    #[test]
    fn test_best_of_no_probes() {
        let m = FaceMatcher::new(vec![labeled("alice", &[&[0.0]])], 0.6);
        assert!(m.best_of(std::iter::empty()).is_none());
    }
}
