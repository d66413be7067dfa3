use super::similarity::SimilarityMetric;
use crate::models::{Neighbor, UserId};
use crate::store::PreferenceStore;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

/// Candidate counts above this are scored on the rayon pool.
const PARALLEL_THRESHOLD: usize = 256;

/// Nearest-N user neighborhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborhoodSelector {
    metric: SimilarityMetric,
    min_similarity: Option<f64>,
}

impl NeighborhoodSelector {
    pub fn new(metric: SimilarityMetric) -> Self {
        Self {
            metric,
            min_similarity: None,
        }
    }

    /// Drops candidates whose similarity is below `threshold` before truncating.
    pub fn with_min_similarity(mut self, threshold: f64) -> Self {
        self.min_similarity = Some(threshold);
        self
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// The `k` users most similar to `target`, by similarity descending and
    /// then user id ascending. Users with undefined similarity are skipped, so
    /// the result may be shorter than `k`.
    pub fn neighbors_of(&self, store: &PreferenceStore, target: UserId, k: usize) -> Vec<Neighbor> {
        if k == 0 || store.ratings_of(target).is_empty() {
            return Vec::new();
        }

        let candidates: Vec<UserId> = store.all_user_ids().filter(|&u| u != target).collect();

        let score = |&user_id: &UserId| -> Option<Neighbor> {
            let similarity = self.metric.similarity(store, target, user_id)?;
            match self.min_similarity {
                Some(threshold) if similarity < threshold => None,
                _ => Some(Neighbor {
                    user_id,
                    similarity,
                }),
            }
        };

        let mut neighbors: Vec<Neighbor> = if candidates.len() > PARALLEL_THRESHOLD {
            candidates.par_iter().filter_map(score).collect()
        } else {
            candidates.iter().filter_map(score).collect()
        };

        neighbors.sort_unstable_by(compare_neighbors);
        neighbors.truncate(k);

        debug!(
            user = target,
            k,
            candidates = candidates.len(),
            selected = neighbors.len(),
            "Selected neighborhood"
        );

        neighbors
    }
}

/// Similarity descending, then user id ascending.
pub fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.user_id.cmp(&b.user_id))
}

impl Default for NeighborhoodSelector {
    fn default() -> Self {
        Self::new(SimilarityMetric::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;

    fn store(ratings: &[(i64, i64, f64)]) -> PreferenceStore {
        PreferenceStore::from_ratings(ratings.iter().map(|&(u, i, v)| Rating::new(u, i, v))).unwrap()
    }

    fn scenario_a() -> PreferenceStore {
        store(&[
            (1, 10, 5.0), (1, 11, 3.0),
            (2, 10, 5.0), (2, 11, 3.0), (2, 12, 4.0),
            (3, 10, 1.0), (3, 11, 5.0),
        ])
    }

    #[test]
    fn test_nearest_neighbor() {
        let neighbors = NeighborhoodSelector::default().neighbors_of(&scenario_a(), 1, 1);

        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].user_id, 2);
        assert!((neighbors[0].similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_k_larger_than_candidates() {
        let neighbors = NeighborhoodSelector::default().neighbors_of(&scenario_a(), 1, 10);

        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].user_id, 2);
        assert_eq!(neighbors[1].user_id, 3);
        assert!(neighbors[1].similarity < 0.0);
    }

    #[test]
    fn test_unknown_target_has_no_neighbors() {
        assert!(NeighborhoodSelector::default().neighbors_of(&scenario_a(), 99, 3).is_empty());
    }

    #[test]
    fn test_ties_break_by_user_id() {
        let store = store(&[
            (1, 10, 1.0), (1, 11, 2.0),
            (7, 10, 2.0), (7, 11, 4.0),
            (4, 10, 3.0), (4, 11, 5.0),
        ]);
        let neighbors = NeighborhoodSelector::default().neighbors_of(&store, 1, 2);
        let ids: Vec<_> = neighbors.iter().map(|n| n.user_id).collect();

        assert_eq!(ids, vec![4, 7]);
    }

    #[test]
    fn test_min_similarity_filters() {
        let selector = NeighborhoodSelector::default().with_min_similarity(0.0);
        let neighbors = selector.neighbors_of(&scenario_a(), 1, 10);

        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].user_id, 2);
    }

    #[test]
    fn test_parallel_path_matches_bound_and_order() {
        let mut ratings = vec![(0, 0, 1.0), (0, 1, 2.0), (0, 2, 3.0)];
        for user in 1..400 {
            ratings.push((user, 0, (user % 5) as f64 + 1.0));
            ratings.push((user, 1, ((user * 3) % 5) as f64 + 1.0));
            ratings.push((user, 2, ((user * 7) % 5) as f64 + 1.0));
        }
        let store = store(&ratings);

        let neighbors = NeighborhoodSelector::default().neighbors_of(&store, 0, 25);
        assert!(neighbors.len() <= 25);
        assert!(neighbors.windows(2).all(|w| compare_neighbors(&w[0], &w[1]) == Ordering::Less));
        assert!(neighbors.iter().all(|n| n.user_id != 0 && n.similarity.is_finite()));
    }

    #[test]
    fn test_parallel_path_equals_sequential_scoring() {
        let mut ratings = vec![(0, 0, 4.0), (0, 1, 2.0), (0, 2, 5.0), (0, 3, 1.0)];
        for user in 1..600 {
            for item in 0..4 {
                if (user + item) % 5 != 0 {
                    ratings.push((user, item, ((user * (item + 2)) % 5) as f64 + 1.0));
                }
            }
        }
        let store = store(&ratings);
        let metric = SimilarityMetric::PearsonCorrelation;
        assert!(store.num_users() - 1 > PARALLEL_THRESHOLD);

        for k in [1, 10, 50, 1000] {
            let mut expected: Vec<Neighbor> = store
                .all_user_ids()
                .filter(|&u| u != 0)
                .filter_map(|u| metric.similarity(&store, 0, u).map(|similarity| Neighbor { user_id: u, similarity }))
                .collect();
            expected.sort_by(compare_neighbors);
            expected.truncate(k);

            assert_eq!(NeighborhoodSelector::new(metric).neighbors_of(&store, 0, k), expected);
        }
    }

    #[test]
    fn test_extreme_ratings_never_yield_undefined_neighbors() {
        let store = store(&[
            (1, 1, 1e300), (1, 2, -1e300),
            (2, 1, 1e300), (2, 2, -1e300), (2, 3, 4.0),
            (3, 1, 5.0), (3, 2, 1.0), (3, 3, 2.0),
        ]);
        let neighbors = NeighborhoodSelector::default().neighbors_of(&store, 1, 5);

        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.iter().all(|n| n.similarity.is_finite() && (-1.0..=1.0).contains(&n.similarity)));
        let mut ids: Vec<_> = neighbors.iter().map(|n| n.user_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3]);
    }
}
