use crate::models::*;
use crate::services::recommendation::RecommendationService;
use anyhow::Result;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Async front for the recommendation service: runs the CPU-bound work on the
/// blocking pool and keeps request statistics.
pub struct ServingService {
    recommendation_service: Arc<RecommendationService>,
    serving_stats: Arc<DashMap<String, u64>>,
}

impl ServingService {
    pub fn new(recommendation_service: Arc<RecommendationService>) -> Self {
        Self {
            recommendation_service,
            serving_stats: Arc::new(DashMap::new()),
        }
    }

    pub async fn serve_recommendations(&self, request: RecommendationRequest) -> Result<RecommendationResponse> {
        let user_id = request.user_id;
        let response = self
            .run_tracked("recommendation_requests", move |service| service.get_recommendations(&request))
            .await?;

        if response.is_empty() {
            self.increment_stat("empty_responses");
        }
        info!(
            user_id,
            request_id = %response.request_id,
            returned = response.recommendations.len(),
            "Served recommendations"
        );
        Ok(response)
    }

    pub async fn get_similar_users(&self, user_id: UserId, k: usize) -> Result<Vec<Neighbor>> {
        self.run_tracked("neighbor_requests", move |service| service.neighbors(user_id, k))
            .await
    }

    pub async fn estimate_preference(&self, user_id: UserId, item_id: ItemId) -> Result<Option<f64>> {
        self.run_tracked("estimate_requests", move |service| {
            Ok(service.estimate_preference(user_id, item_id))
        })
        .await
    }

    /// Runs `work` on the blocking pool and records the request count, latency
    /// and outcome the same way for every kind of request.
    async fn run_tracked<T, F>(&self, kind: &str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RecommendationService) -> crate::error::Result<T> + Send + 'static,
    {
        self.increment_stat("total_requests");
        self.increment_stat(kind);
        let start_time = Instant::now();

        let service = self.recommendation_service.clone();
        let outcome: Result<T> = match tokio::task::spawn_blocking(move || work(&*service)).await {
            Ok(result) => result.map_err(Into::into),
            Err(e) => Err(e.into()),
        };

        let latency = start_time.elapsed().as_millis() as u64;
        self.update_latency_stat(latency);

        match &outcome {
            Ok(_) => self.increment_stat("successful_requests"),
            Err(e) => {
                self.increment_stat("failed_requests");
                error!(kind, latency_ms = latency, "Request failed: {}", e);
            }
        }
        outcome
    }

    pub fn item_metadata(&self, item_id: ItemId) -> Option<ItemMetadata> {
        self.recommendation_service.catalog().get(item_id).cloned()
    }

    pub async fn reload(&self) -> Result<StoreSummary> {
        let service = self.recommendation_service.clone();
        let summary = tokio::task::spawn_blocking(move || service.reload()).await??;
        self.increment_stat("reloads");
        Ok(summary)
    }

    pub fn health_check(&self) -> HashMap<String, serde_json::Value> {
        let snapshot = self.recommendation_service.snapshot();
        let mut health = HashMap::new();

        health.insert("status".to_string(), serde_json::json!("healthy"));
        health.insert("users".to_string(), serde_json::json!(snapshot.store.num_users()));
        health.insert("items".to_string(), serde_json::json!(snapshot.store.num_items()));
        health.insert("ratings".to_string(), serde_json::json!(snapshot.store.num_ratings()));
        health.insert("store_generation".to_string(), serde_json::json!(snapshot.generation));
        health.insert(
            "catalog_items".to_string(),
            serde_json::json!(self.recommendation_service.catalog().len()),
        );

        health
    }

    pub fn get_serving_stats(&self) -> HashMap<String, u64> {
        let mut stats: HashMap<String, u64> = self
            .serving_stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        stats.insert(
            "cached_responses".to_string(),
            self.recommendation_service.cached_responses() as u64,
        );
        stats
    }

    fn increment_stat(&self, key: &str) {
        *self.serving_stats.entry(key.to_string()).or_insert(0) += 1;
    }

    fn update_latency_stat(&self, latency_ms: u64) {
        *self.serving_stats.entry("total_latency_ms".to_string()).or_insert(0) += latency_ms;

        let mut max = self.serving_stats.entry("max_latency_ms".to_string()).or_insert(0);
        if latency_ms > *max {
            *max = latency_ms;
        }
    }
}
