use crate::models::{ItemId, Neighbor, RecommendedItem, UserId};
use crate::store::PreferenceStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// How neighbors with a non-positive similarity take part in a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeSimilarityPolicy {
    /// Only strictly positive similarities contribute; the prediction is the
    /// similarity-weighted average of neighbor ratings.
    #[default]
    Exclude,
    /// Every neighbor contributes with its signed similarity. Neighbor ratings
    /// are taken as deviations from that neighbor's mean and added to the
    /// target's mean, normalised by the sum of absolute similarities; the
    /// result is kept inside the store's rating range.
    Include,
}

impl NegativeSimilarityPolicy {
    fn weight(&self, similarity: f64) -> Option<f64> {
        match self {
            Self::Exclude if similarity > 0.0 => Some(similarity),
            Self::Exclude => None,
            Self::Include if similarity != 0.0 => Some(similarity),
            Self::Include => None,
        }
    }

    /// Value subtracted from a neighbor's ratings before weighting.
    fn offset(&self, store: &PreferenceStore, neighbor: UserId) -> f64 {
        match self {
            Self::Exclude => 0.0,
            Self::Include => store.mean_rating(neighbor).unwrap_or(0.0),
        }
    }

    fn finish(&self, store: &PreferenceStore, target: UserId, weighted_mean: f64) -> f64 {
        match self {
            Self::Exclude => weighted_mean,
            Self::Include => {
                let (lo, hi) = store.value_range();
                let base = store.mean_rating(target).unwrap_or((lo + hi) / 2.0);
                (base + weighted_mean).clamp(lo, hi)
            }
        }
    }
}

/// Running sums for one candidate item.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    weighted_sum: f64,
    weight_total: f64,
    raters: usize,
}

impl Accumulator {
    fn add(&mut self, deviation: f64, weight: f64) {
        self.weighted_sum += weight * deviation;
        self.weight_total += weight.abs();
        self.raters += 1;
    }

    fn weighted_mean(&self, min_raters: usize) -> Option<f64> {
        if self.raters < min_raters.max(1) || self.weight_total == 0.0 {
            return None;
        }
        Some(self.weighted_sum / self.weight_total)
    }
}

/// A neighbor's weight and rating offset, resolved once per request.
struct Contributor {
    user_id: UserId,
    weight: f64,
    offset: f64,
}

/// User-based recommender: similarity-weighted average of neighbor ratings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommenderEngine {
    policy: NegativeSimilarityPolicy,
    min_raters: usize,
}

impl RecommenderEngine {
    pub fn new(policy: NegativeSimilarityPolicy) -> Self {
        Self {
            policy,
            min_raters: 1,
        }
    }

    /// Minimum number of contributing neighbors before an item is scored.
    pub fn with_min_raters(mut self, min_raters: usize) -> Self {
        self.min_raters = min_raters.max(1);
        self
    }

    pub fn policy(&self) -> NegativeSimilarityPolicy {
        self.policy
    }

    fn contributors(&self, store: &PreferenceStore, target: UserId, neighborhood: &[Neighbor]) -> Vec<Contributor> {
        neighborhood
            .iter()
            .filter(|n| n.user_id != target)
            .filter_map(|n| {
                let weight = self.policy.weight(n.similarity)?;
                Some(Contributor {
                    user_id: n.user_id,
                    weight,
                    offset: self.policy.offset(store, n.user_id),
                })
            })
            .collect()
    }

    /// Top `n` items the target has not rated, by predicted value descending
    /// and then item id ascending.
    pub fn recommend(
        &self,
        store: &PreferenceStore,
        target: UserId,
        neighborhood: &[Neighbor],
        n: usize,
    ) -> Vec<RecommendedItem> {
        if n == 0 || neighborhood.is_empty() {
            return Vec::new();
        }

        let rated = store.ratings_of(target);
        let mut candidates: BTreeMap<ItemId, Accumulator> = BTreeMap::new();

        for contributor in self.contributors(store, target, neighborhood) {
            for (&item_id, &rating) in store.ratings_of(contributor.user_id) {
                if rated.contains_key(&item_id) {
                    continue;
                }
                candidates
                    .entry(item_id)
                    .or_default()
                    .add(rating - contributor.offset, contributor.weight);
            }
        }

        let considered = candidates.len();
        let mut recommendations: Vec<RecommendedItem> = candidates
            .into_iter()
            .filter_map(|(item_id, acc)| {
                acc.weighted_mean(self.min_raters).map(|mean| RecommendedItem {
                    item_id,
                    value: self.policy.finish(store, target, mean),
                })
            })
            .collect();

        recommendations.sort_unstable_by(compare_recommendations);
        recommendations.truncate(n);

        debug!(
            user = target,
            neighbors = neighborhood.len(),
            candidates = considered,
            returned = recommendations.len(),
            "Ranked candidate items"
        );

        recommendations
    }

    /// The target's own rating when present, otherwise the neighborhood
    /// prediction for `item`.
    pub fn estimate_preference(
        &self,
        store: &PreferenceStore,
        target: UserId,
        item: ItemId,
        neighborhood: &[Neighbor],
    ) -> Option<f64> {
        if let Some(value) = store.rating(target, item) {
            return Some(value);
        }

        let mut acc = Accumulator::default();
        for contributor in self.contributors(store, target, neighborhood) {
            if let Some(rating) = store.rating(contributor.user_id, item) {
                acc.add(rating - contributor.offset, contributor.weight);
            }
        }

        acc.weighted_mean(self.min_raters)
            .map(|mean| self.policy.finish(store, target, mean))
    }
}

impl Default for RecommenderEngine {
    fn default() -> Self {
        Self::new(NegativeSimilarityPolicy::default())
    }
}

/// Predicted value descending, then item id ascending.
pub fn compare_recommendations(a: &RecommendedItem, b: &RecommendedItem) -> Ordering {
    b.value
        .total_cmp(&a.value)
        .then_with(|| a.item_id.cmp(&b.item_id))
}
