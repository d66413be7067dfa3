use crate::error::{RecommenderError, Result};
use crate::models::{ItemId, ItemMetadata, RecommendationItem, RecommendedItem};
use crate::utils::format_score;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Read-only item metadata lookup, passed explicitly to whoever presents results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCatalog {
    items: BTreeMap<ItemId, ItemMetadata>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The seven-phone table the recommender ships with.
    pub fn phones() -> Self {
        Self::new()
            .with_item(1, ItemMetadata::new("Samsung", "Galaxy Trend", "All-rounder", "799"))
            .with_item(2, ItemMetadata::new("Apple", "iPhone SE", "Compact & Powerful", "499"))
            .with_item(3, ItemMetadata::new("Google", "Pixel 7a", "Mid-range Excellence", "449"))
            .with_item(4, ItemMetadata::new("OnePlus", "Nord CE", "Budget Gaming", "349"))
            .with_item(5, ItemMetadata::new("Xiaomi", "Redmi Note", "Value King", "299"))
            .with_item(6, ItemMetadata::new("Motorola", "Moto G Power", "Battery Champion", "249"))
            .with_item(7, ItemMetadata::new("Nokia", "G400 5G", "Durable & Reliable", "199"))
    }

    /// Loads a JSON object keyed by item id.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&raw)
            .map_err(|e| RecommenderError::Catalog(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), items = catalog.len(), "Loaded item catalog");
        Ok(catalog)
    }

    /// `from_path` when a path is configured, the built-in phone table otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::phones()),
        }
    }

    pub fn with_item(mut self, item_id: ItemId, metadata: ItemMetadata) -> Self {
        self.items.insert(item_id, metadata);
        self
    }

    pub fn get(&self, item_id: ItemId) -> Option<&ItemMetadata> {
        self.items.get(&item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn annotate(&self, recommendation: &RecommendedItem) -> RecommendationItem {
        RecommendationItem {
            item_id: recommendation.item_id,
            predicted_value: recommendation.value,
            metadata: self.get(recommendation.item_id).cloned(),
        }
    }

    /// One display line per recommendation; unknown ids fall back to the raw id.
    /// Values always carry a decimal point (`4.0`, not `4`).
    pub fn describe(&self, item: &RecommendationItem) -> String {
        self.render(item, format!("{:?}", item.predicted_value))
    }

    /// `describe` with the predicted value rounded to `digits` decimals.
    pub fn describe_with_precision(&self, item: &RecommendationItem, digits: usize) -> String {
        self.render(item, format_score(item.predicted_value, digits))
    }

    fn render(&self, item: &RecommendationItem, value: String) -> String {
        match &item.metadata {
            Some(meta) => format!(
                "Brand: {}, Name: {}, Category: {}, Price: ${}, Predicted Preference: {}",
                meta.brand, meta.display_name, meta.category, meta.price, value
            ),
            None => format!(
                "Brand ID: {}, Preference Value: {} (Phone details not found)",
                item.item_id, value
            ),
        }
    }
}
