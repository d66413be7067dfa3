pub mod neighborhood;
pub mod recommender;
pub mod similarity;

pub use neighborhood::NeighborhoodSelector;
pub use recommender::{NegativeSimilarityPolicy, RecommenderEngine};
pub use similarity::SimilarityMetric;

use crate::models::{Neighbor, RecommendedItem, UserId};
use crate::store::PreferenceStore;

/// Selector and engine wired together: neighborhood first, then ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UserBasedRecommender {
    pub selector: NeighborhoodSelector,
    pub engine: RecommenderEngine,
}

impl UserBasedRecommender {
    pub fn new(selector: NeighborhoodSelector, engine: RecommenderEngine) -> Self {
        Self { selector, engine }
    }

    pub fn neighborhood(&self, store: &PreferenceStore, user: UserId, k: usize) -> Vec<Neighbor> {
        self.selector.neighbors_of(store, user, k)
    }

    pub fn recommend(&self, store: &PreferenceStore, user: UserId, k: usize, n: usize) -> Vec<RecommendedItem> {
        let neighborhood = self.neighborhood(store, user, k);
        self.engine.recommend(store, user, &neighborhood, n)
    }
}
