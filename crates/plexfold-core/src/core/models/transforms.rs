use std::collections::HashMap;

use crate::core::geometry::RigidTransform;

/// A candidate placement of one chain of `to_type` relative to one chain of
/// `from_type`, extracted upstream from a pairwise structure prediction.
///
/// Generated once and never rewritten; the transform lives in the
/// `from_type` local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PairTransform {
    pub from_type: usize,
    pub to_type: usize,
    pub transform: RigidTransform,
    /// Interface confidence in [0, 100].
    pub score: f64,
    /// Free-form tag identifying the source prediction.
    pub provenance: String,
}

fn canonical_key(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Symmetric, read-only pool of pair transforms.
///
/// Entries are keyed by the unordered subunit-type pair, sorted by score
/// descending and capped per pair at construction. Querying the reverse
/// direction of a stored transform yields its inverse.
#[derive(Debug, Clone, Default)]
pub struct TransformLibrary {
    entries: HashMap<(usize, usize), Vec<PairTransform>>,
}

impl TransformLibrary {
    /// Builds the library, sorting each pair's entry by score descending
    /// (ties by provenance for a stable order) and truncating to
    /// `cap_per_pair`.
    pub fn from_pairs(transforms: Vec<PairTransform>, cap_per_pair: usize) -> Self {
        let mut entries: HashMap<(usize, usize), Vec<PairTransform>> = HashMap::new();
        for t in transforms {
            entries
                .entry(canonical_key(t.from_type, t.to_type))
                .or_default()
                .push(t);
        }
        for entry in entries.values_mut() {
            entry.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.provenance.cmp(&b.provenance))
            });
            entry.truncate(cap_per_pair);
        }
        entries.retain(|_, v| !v.is_empty());
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_entry(&self, a: usize, b: usize) -> bool {
        self.entry_len(a, b) > 0
    }

    /// Number of stored transforms for the unordered pair; the richness
    /// used to rank connector pairs.
    pub fn entry_len(&self, a: usize, b: usize) -> usize {
        self.entries
            .get(&canonical_key(a, b))
            .map_or(0, |v| v.len())
    }

    /// Transforms placing a `to` chain relative to a `from` chain, best
    /// score first. Stored transforms recorded in the opposite direction
    /// are inverted on the fly.
    pub fn transforms_between(
        &self,
        from: usize,
        to: usize,
    ) -> impl Iterator<Item = (RigidTransform, f64)> + '_ {
        self.entries
            .get(&canonical_key(from, to))
            .into_iter()
            .flatten()
            .map(move |t| {
                if t.from_type == from {
                    (t.transform, t.score)
                } else {
                    (t.transform.inverse(), t.score)
                }
            })
    }

    /// Unordered type pairs with at least one transform.
    pub fn type_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn pt(from: usize, to: usize, tz: f64, score: f64) -> PairTransform {
        PairTransform {
            from_type: from,
            to_type: to,
            transform: RigidTransform::from_wire(0.0, 0.0, 0.0, 0.0, 0.0, tz),
            score,
            provenance: format!("model_{}", tz as i64),
        }
    }

    #[test]
    fn entries_are_sorted_by_score_descending() {
        let lib = TransformLibrary::from_pairs(
            vec![pt(0, 1, 10.0, 40.0), pt(0, 1, 20.0, 90.0), pt(0, 1, 30.0, 70.0)],
            10,
        );

        let scores: Vec<f64> = lib.transforms_between(0, 1).map(|(_, s)| s).collect();
        assert_eq!(scores, vec![90.0, 70.0, 40.0]);
    }

    #[test]
    fn cap_truncates_each_pair() {
        let lib = TransformLibrary::from_pairs(
            vec![pt(0, 1, 10.0, 40.0), pt(0, 1, 20.0, 90.0), pt(0, 1, 30.0, 70.0)],
            2,
        );

        assert_eq!(lib.entry_len(0, 1), 2);
        let scores: Vec<f64> = lib.transforms_between(0, 1).map(|(_, s)| s).collect();
        assert_eq!(scores, vec![90.0, 70.0]);
    }

    #[test]
    fn reverse_query_inverts_the_transform() {
        let lib = TransformLibrary::from_pairs(vec![pt(0, 1, 20.0, 90.0)], 10);

        let (forward, _) = lib.transforms_between(0, 1).next().unwrap();
        let (reverse, _) = lib.transforms_between(1, 0).next().unwrap();

        assert!((forward.translation - Vector3::new(0.0, 0.0, 20.0)).norm() < 1e-12);
        let round_trip = forward.compose(&reverse);
        assert!(round_trip.translation.norm() < 1e-9);
    }

    #[test]
    fn symmetric_lookup_shares_one_entry() {
        let lib = TransformLibrary::from_pairs(vec![pt(2, 0, 5.0, 50.0)], 10);

        assert!(lib.has_entry(0, 2));
        assert!(lib.has_entry(2, 0));
        assert_eq!(lib.entry_len(0, 2), 1);
        assert_eq!(lib.type_pairs().collect::<Vec<_>>(), vec![(0, 2)]);
    }

    #[test]
    fn missing_pair_yields_empty_iteration() {
        let lib = TransformLibrary::from_pairs(vec![pt(0, 1, 5.0, 50.0)], 10);
        assert_eq!(lib.transforms_between(0, 2).count(), 0);
        assert!(!lib.has_entry(0, 2));
    }

    #[test]
    fn same_type_pairs_are_supported() {
        let lib = TransformLibrary::from_pairs(vec![pt(1, 1, 12.0, 80.0)], 10);
        assert!(lib.has_entry(1, 1));
        assert_eq!(lib.transforms_between(1, 1).count(), 1);
    }
}
