pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::RecommenderError;
pub use models::*;
pub use store::PreferenceStore;

use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub recommendation_service: Arc<services::recommendation::RecommendationService>,
    pub serving_service: Arc<services::serving::ServingService>,
}

impl AppState {
    /// Loads the configured ratings file and catalog. The store is fully built
    /// before any service can see it.
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let recommendation_service = Arc::new(
            services::recommendation::RecommendationService::from_config(config.clone())?
        );

        Ok(Self::with_service(config, recommendation_service))
    }

    pub fn with_service(
        config: Arc<Config>,
        recommendation_service: Arc<services::recommendation::RecommendationService>,
    ) -> Self {
        let serving_service = Arc::new(
            services::serving::ServingService::new(recommendation_service.clone())
        );

        Self {
            config,
            recommendation_service,
            serving_service,
        }
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Like `init_tracing`, but `level` applies when `RUST_LOG` is unset.
pub fn init_tracing_with_level(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
