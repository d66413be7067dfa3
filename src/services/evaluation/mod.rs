use crate::algorithms::UserBasedRecommender;
use crate::config::EvaluationConfig;
use crate::models::{ItemId, Rating, UserId};
use crate::store::PreferenceStore;
use crate::utils::metrics::{mean_absolute_error, root_mean_squared_error, MetricsCalculator, RecommendationMetrics};
use crate::utils::validation::validate_evaluation_config;
use crate::utils::CancellationFlag;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::info;

/// Ratings split into a training store and a held-out set.
#[derive(Debug, Clone)]
pub struct HoldoutSplit {
    pub train: PreferenceStore,
    pub test: Vec<Rating>,
}

/// Splits every user's ratings with a seeded shuffle. Each user keeps at
/// least one training rating, so users with a single rating are never tested.
pub fn split_holdout(store: &PreferenceStore, fraction: f64, seed: u64) -> crate::error::Result<HoldoutSplit> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(store.num_ratings());
    let mut test = Vec::new();

    for user_id in store.all_user_ids() {
        let mut ratings: Vec<Rating> = store
            .ratings_of(user_id)
            .iter()
            .map(|(&item_id, &value)| Rating::new(user_id, item_id, value))
            .collect();
        ratings.shuffle(&mut rng);

        let held = ((ratings.len() as f64 * fraction).round() as usize).min(ratings.len().saturating_sub(1));
        test.extend(ratings.drain(..held));
        train.extend(ratings);
    }

    Ok(HoldoutSplit {
        train: PreferenceStore::from_ratings(train)?,
        test,
    })
}

/// Offline evaluation: prediction error on held-out ratings plus top-N
/// precision/recall against held-out items rated at or above the threshold.
pub struct Evaluator {
    recommender: UserBasedRecommender,
    config: EvaluationConfig,
    neighborhood_size: usize,
    at_n: usize,
}

impl Evaluator {
    pub fn new(
        recommender: UserBasedRecommender,
        config: EvaluationConfig,
        neighborhood_size: usize,
        at_n: usize,
    ) -> Result<Self> {
        validate_evaluation_config(&config)?;
        Ok(Self {
            recommender,
            config,
            neighborhood_size,
            at_n,
        })
    }

    pub fn evaluate(&self, store: &PreferenceStore, cancel: &CancellationFlag) -> Result<RecommendationMetrics> {
        let split = split_holdout(store, self.config.holdout_fraction, self.config.seed)?;
        let train = &split.train;

        let mut test_by_user: BTreeMap<UserId, Vec<&Rating>> = BTreeMap::new();
        for rating in &split.test {
            test_by_user.entry(rating.user_id).or_default().push(rating);
        }
        let users: Vec<(&UserId, &Vec<&Rating>)> = test_by_user.iter().collect();

        let per_user: Vec<UserOutcome> = users
            .par_iter()
            .map(|(user_id, held)| -> Result<UserOutcome> {
                cancel.check()?;
                Ok(self.evaluate_user(train, **user_id, held))
            })
            .collect::<Result<_>>()?;

        let calculator = MetricsCalculator::new(self.at_n);
        let pairs: Vec<(f64, f64)> = per_user.iter().flat_map(|o| o.pairs.iter().copied()).collect();
        let unpredictable: usize = per_user.iter().map(|o| o.unpredictable).sum();

        let ranked: Vec<&UserOutcome> = per_user.iter().filter(|o| !o.relevant.is_empty()).collect();
        let mut precision = 0.0;
        let mut recall = 0.0;
        let mut ndcg = 0.0;
        for outcome in &ranked {
            precision += calculator.calculate_precision_at_k(&outcome.recommended, &outcome.relevant);
            recall += calculator.calculate_recall_at_k(&outcome.recommended, &outcome.relevant);
            ndcg += calculator.calculate_ndcg_at_k(&outcome.recommended, &outcome.relevance);
        }
        if !ranked.is_empty() {
            let count = ranked.len() as f64;
            precision /= count;
            recall /= count;
            ndcg /= count;
        }

        let recommended: BTreeSet<ItemId> = per_user.iter().flat_map(|o| o.recommended.iter().copied()).collect();
        let all_items: Vec<ItemId> = store.all_item_ids().collect();
        let recommended: Vec<ItemId> = recommended.into_iter().collect();

        let metrics = RecommendationMetrics {
            mae: mean_absolute_error(&pairs),
            rmse: root_mean_squared_error(&pairs),
            precision_at_k: precision,
            recall_at_k: recall,
            f1_score: calculator.calculate_f1_score(precision, recall),
            ndcg_at_k: ndcg,
            coverage: calculator.calculate_coverage(&recommended, &all_items),
            predicted: pairs.len(),
            unpredictable,
        };

        info!(
            at_n = calculator.k(),
            test_ratings = split.test.len(),
            predicted = metrics.predicted,
            mae = ?metrics.mae,
            rmse = ?metrics.rmse,
            precision = metrics.precision_at_k,
            recall = metrics.recall_at_k,
            "Evaluation finished"
        );

        Ok(metrics)
    }

    fn evaluate_user(&self, train: &PreferenceStore, user_id: UserId, held: &[&Rating]) -> UserOutcome {
        let neighborhood = self.recommender.neighborhood(train, user_id, self.neighborhood_size);

        let mut pairs = Vec::new();
        let mut unpredictable = 0;
        for rating in held {
            match self
                .recommender
                .engine
                .estimate_preference(train, user_id, rating.item_id, &neighborhood)
            {
                Some(estimate) => pairs.push((estimate, rating.value)),
                None => unpredictable += 1,
            }
        }

        let relevant_ratings: Vec<&&Rating> = held
            .iter()
            .filter(|r| r.value >= self.config.relevance_threshold)
            .collect();
        let relevant = relevant_ratings.iter().map(|r| r.item_id).collect();
        let relevance = relevant_ratings.iter().map(|r| (r.item_id, r.value)).collect();

        let recommended = if relevant_ratings.is_empty() {
            Vec::new()
        } else {
            self.recommender
                .engine
                .recommend(train, user_id, &neighborhood, self.at_n)
                .into_iter()
                .map(|r| r.item_id)
                .collect()
        };

        UserOutcome {
            pairs,
            unpredictable,
            relevant,
            relevance,
            recommended,
        }
    }
}

struct UserOutcome {
    pairs: Vec<(f64, f64)>,
    unpredictable: usize,
    relevant: Vec<ItemId>,
    relevance: HashMap<ItemId, f64>,
    recommended: Vec<ItemId>,
}
