use crate::config::{EvaluationConfig, RecommendationConfig};
use crate::error::{RecommenderError, Result};
use crate::models::RecommendationRequest;

/// Resolves the request's K and N against configured defaults and limits.
pub fn validate_recommendation_request(
    request: &RecommendationRequest,
    config: &RecommendationConfig,
) -> Result<(usize, usize)> {
    let k = request.neighborhood_size.unwrap_or(config.neighborhood_size);
    let n = request.num_recommendations.unwrap_or(config.num_recommendations);

    validate_neighborhood_size(k, config.max_neighborhood_size)?;

    if n == 0 {
        return Err(RecommenderError::InvalidRequest(
            "number of recommendations must be greater than 0".to_string(),
        ));
    }

    if n > config.max_recommendations {
        return Err(RecommenderError::InvalidRequest(format!(
            "number of recommendations too large: {} (max {})",
            n, config.max_recommendations
        )));
    }

    Ok((k, n))
}

pub fn validate_neighborhood_size(k: usize, max: usize) -> Result<()> {
    if k == 0 {
        return Err(RecommenderError::InvalidRequest(
            "neighborhood size must be greater than 0".to_string(),
        ));
    }

    if k > max {
        return Err(RecommenderError::InvalidRequest(format!(
            "neighborhood size too large: {} (max {})",
            k, max
        )));
    }

    Ok(())
}

pub fn validate_recommendation_config(config: &RecommendationConfig) -> Result<()> {
    validate_neighborhood_size(config.neighborhood_size, config.max_neighborhood_size)?;

    if config.num_recommendations == 0 || config.num_recommendations > config.max_recommendations {
        return Err(RecommenderError::InvalidRequest(format!(
            "num_recommendations must be in 1..={}",
            config.max_recommendations
        )));
    }

    if let Some(threshold) = config.min_similarity {
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(RecommenderError::InvalidRequest(format!(
                "min_similarity must lie in [-1, 1], got {}",
                threshold
            )));
        }
    }

    Ok(())
}

pub fn validate_evaluation_config(config: &EvaluationConfig) -> Result<()> {
    if !(config.holdout_fraction > 0.0 && config.holdout_fraction < 1.0) {
        return Err(RecommenderError::InvalidRequest(format!(
            "holdout_fraction must lie in (0, 1), got {}",
            config.holdout_fraction
        )));
    }

    if !config.relevance_threshold.is_finite() {
        return Err(RecommenderError::InvalidRequest(
            "relevance_threshold must be finite".to_string(),
        ));
    }

    Ok(())
}
