use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

pub type UserId = i64;
pub type ItemId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub value: f64,
}

/// A user selected into a neighborhood together with its similarity to the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub user_id: UserId,
    pub similarity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub item_id: ItemId,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub display_name: String,
    pub brand: String,
    pub category: String,
    pub price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    pub neighborhood_size: Option<usize>,
    pub num_recommendations: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub request_id: Uuid,
    pub user_id: UserId,
    pub neighborhood_size: usize,
    pub recommendations: Vec<RecommendationItem>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub item_id: ItemId,
    pub predicted_value: f64,
    pub metadata: Option<ItemMetadata>,
}

/// Counts describing a loaded ratings snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub num_users: usize,
    pub num_items: usize,
    pub num_ratings: usize,
    pub min_value: f64,
    pub max_value: f64,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, value: f64) -> Self {
        Self {
            user_id,
            item_id,
            value,
        }
    }
}

impl ItemMetadata {
    pub fn new(brand: &str, display_name: &str, category: &str, price: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            brand: brand.to_string(),
            category: category.to_string(),
            price: price.to_string(),
        }
    }
}

impl RecommendationRequest {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            neighborhood_size: None,
            num_recommendations: None,
        }
    }

    pub fn with_neighborhood_size(mut self, k: usize) -> Self {
        self.neighborhood_size = Some(k);
        self
    }

    pub fn with_num_recommendations(mut self, n: usize) -> Self {
        self.num_recommendations = Some(n);
        self
    }
}

impl RecommendationResponse {
    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }
}
