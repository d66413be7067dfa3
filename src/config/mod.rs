use crate::algorithms::{
    NegativeSimilarityPolicy, NeighborhoodSelector, RecommenderEngine, SimilarityMetric,
    UserBasedRecommender,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub recommendation: RecommendationConfig,
    pub batch: BatchConfig,
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub ratings_path: PathBuf,
    /// JSON item metadata; the built-in phone table is used when unset.
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub neighborhood_size: usize,
    pub num_recommendations: usize,
    pub similarity: SimilarityMetric,
    pub negative_similarity: NegativeSimilarityPolicy,
    pub min_similarity: Option<f64>,
    pub min_raters: usize,
    pub max_neighborhood_size: usize,
    pub max_recommendations: usize,
    pub cache_responses: bool,
    /// Upper bound on cached responses; the cache is emptied when it is reached.
    pub max_cached_responses: usize,
}

impl RecommendationConfig {
    pub fn recommender(&self) -> UserBasedRecommender {
        let mut selector = NeighborhoodSelector::new(self.similarity);
        if let Some(threshold) = self.min_similarity {
            selector = selector.with_min_similarity(threshold);
        }

        let engine = RecommenderEngine::new(self.negative_similarity).with_min_raters(self.min_raters);

        UserBasedRecommender::new(selector, engine)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub holdout_fraction: f64,
    pub relevance_threshold: f64,
    pub seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: num_cpus::get(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ratings_path: PathBuf::from("ratings.csv"),
            catalog_path: None,
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            neighborhood_size: 3,
            num_recommendations: 2,
            similarity: SimilarityMetric::PearsonCorrelation,
            negative_similarity: NegativeSimilarityPolicy::Exclude,
            min_similarity: None,
            min_raters: 1,
            max_neighborhood_size: 1000,
            max_recommendations: 1000,
            cache_responses: true,
            max_cached_responses: 10_000,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            output_path: None,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.2,
            relevance_threshold: 4.0,
            seed: 42,
        }
    }
}

impl Config {
    /// Reads `path` (any format the `config` crate recognises) and applies
    /// `PHONEREC`-prefixed environment overrides on top.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("PHONEREC").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// `from_file` when the file exists, defaults otherwise.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path, "Config file not found, using default configuration");
            Ok(Self::default())
        }
    }
}
