use crate::algorithms::UserBasedRecommender;
use crate::config::Config;
use crate::error::Result;
use crate::models::*;
use crate::services::catalog::ItemCatalog;
use crate::store::PreferenceStore;
use crate::utils::validation::{validate_neighborhood_size, validate_recommendation_config, validate_recommendation_request};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A loaded store together with the generation it was published under.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub store: Arc<PreferenceStore>,
    pub generation: u64,
}

type CacheKey = (u64, UserId, usize, usize);

pub struct RecommendationService {
    snapshot: RwLock<StoreSnapshot>,
    catalog: Arc<ItemCatalog>,
    config: Arc<Config>,
    recommender: UserBasedRecommender,
    response_cache: DashMap<CacheKey, Vec<RecommendationItem>>,
}

impl RecommendationService {
    pub fn new(store: PreferenceStore, catalog: ItemCatalog, config: Arc<Config>) -> Result<Self> {
        validate_recommendation_config(&config.recommendation)?;
        let recommender = config.recommendation.recommender();

        info!(
            similarity = recommender.selector.metric().name(),
            policy = ?recommender.engine.policy(),
            users = store.num_users(),
            items = store.num_items(),
            "Recommendation service ready"
        );

        Ok(Self {
            snapshot: RwLock::new(StoreSnapshot {
                store: Arc::new(store),
                generation: 0,
            }),
            catalog: Arc::new(catalog),
            config,
            recommender,
            response_cache: DashMap::new(),
        })
    }

    /// Loads the ratings file and catalog named in `config.data`.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let store = PreferenceStore::from_path(&config.data.ratings_path)?;
        let catalog = ItemCatalog::load(config.data.catalog_path.as_deref())?;
        Self::new(store, catalog, config)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.snapshot.read().clone()
    }

    pub fn store(&self) -> Arc<PreferenceStore> {
        self.snapshot.read().store.clone()
    }

    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn recommender(&self) -> &UserBasedRecommender {
        &self.recommender
    }

    pub fn get_recommendations(&self, request: &RecommendationRequest) -> Result<RecommendationResponse> {
        let (k, n) = validate_recommendation_request(request, &self.config.recommendation)?;
        let StoreSnapshot { store, generation } = self.snapshot();
        let key = (generation, request.user_id, k, n);

        let cached = self.response_cache.get(&key).map(|entry| entry.value().clone());
        let recommendations = match cached {
            Some(items) => {
                debug!(user_id = request.user_id, k, n, "Serving cached recommendations");
                items
            }
            None => {
                let items: Vec<RecommendationItem> = self
                    .recommender
                    .recommend(&store, request.user_id, k, n)
                    .iter()
                    .map(|r| self.catalog.annotate(r))
                    .collect();

                if self.config.recommendation.cache_responses && store.contains_user(request.user_id) {
                    self.cache_response(key, items.clone());
                }
                items
            }
        };

        if recommendations.is_empty() {
            info!(user_id = request.user_id, "No recommendations found");
        }

        Ok(RecommendationResponse {
            request_id: Uuid::new_v4(),
            user_id: request.user_id,
            neighborhood_size: k,
            recommendations,
            generated_at: Utc::now(),
        })
    }

    /// Inserts under the snapshot read lock, so an entry is either cleared by
    /// `replace_store` or skipped because its generation is already stale.
    fn cache_response(&self, key: CacheKey, items: Vec<RecommendationItem>) {
        let snapshot = self.snapshot.read();
        if snapshot.generation != key.0 {
            return;
        }

        if self.response_cache.len() >= self.config.recommendation.max_cached_responses {
            debug!(entries = self.response_cache.len(), "Response cache full, clearing");
            self.response_cache.clear();
        }
        if self.config.recommendation.max_cached_responses > 0 {
            self.response_cache.insert(key, items);
        }
    }

    pub fn neighbors(&self, user_id: UserId, k: usize) -> Result<Vec<Neighbor>> {
        validate_neighborhood_size(k, self.config.recommendation.max_neighborhood_size)?;
        Ok(self.recommender.neighborhood(&self.store(), user_id, k))
    }

    pub fn estimate_preference(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        let store = self.store();
        let neighborhood = self.recommender.neighborhood(
            &store,
            user_id,
            self.config.recommendation.neighborhood_size,
        );
        self.recommender
            .engine
            .estimate_preference(&store, user_id, item_id, &neighborhood)
    }

    /// Publishes `store` as the new snapshot. Requests already running keep the
    /// snapshot they started with.
    pub fn replace_store(&self, store: PreferenceStore) -> StoreSummary {
        let summary = store.summary();
        {
            let mut snapshot = self.snapshot.write();
            snapshot.store = Arc::new(store);
            snapshot.generation += 1;
            self.response_cache.clear();
        }

        info!(
            users = summary.num_users,
            items = summary.num_items,
            ratings = summary.num_ratings,
            "Published new preference store snapshot"
        );
        summary
    }

    /// Re-reads the configured ratings file. On failure the current snapshot
    /// stays in place.
    pub fn reload(&self) -> Result<StoreSummary> {
        let store = PreferenceStore::from_path(&self.config.data.ratings_path)?;
        Ok(self.replace_store(store))
    }

    pub fn cached_responses(&self) -> usize {
        self.response_cache.len()
    }
}
