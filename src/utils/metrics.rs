use crate::models::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Offline quality of a recommender run against held-out ratings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationMetrics {
    pub mae: Option<f64>,
    pub rmse: Option<f64>,
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub f1_score: f64,
    pub ndcg_at_k: f64,
    pub coverage: f64,
    pub predicted: usize,
    pub unpredictable: usize,
}

#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    k: usize,
}

impl MetricsCalculator {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn calculate_precision_at_k(&self, recommended: &[ItemId], relevant: &[ItemId]) -> f64 {
        if recommended.is_empty() || self.k == 0 {
            return 0.0;
        }

        let relevant_set: HashSet<_> = relevant.iter().collect();
        let relevant_recommended = recommended
            .iter()
            .take(self.k)
            .filter(|item| relevant_set.contains(item))
            .count();

        relevant_recommended as f64 / self.k.min(recommended.len()) as f64
    }

    pub fn calculate_recall_at_k(&self, recommended: &[ItemId], relevant: &[ItemId]) -> f64 {
        if relevant.is_empty() {
            return 0.0;
        }

        let relevant_set: HashSet<_> = relevant.iter().collect();
        let relevant_recommended = recommended
            .iter()
            .take(self.k)
            .filter(|item| relevant_set.contains(item))
            .count();

        relevant_recommended as f64 / relevant.len() as f64
    }

    pub fn calculate_f1_score(&self, precision: f64, recall: f64) -> f64 {
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }

    pub fn calculate_ndcg_at_k(&self, recommended: &[ItemId], relevant_scores: &HashMap<ItemId, f64>) -> f64 {
        let dcg = self.calculate_dcg(recommended, relevant_scores);
        let idcg = self.calculate_ideal_dcg(relevant_scores);

        if idcg == 0.0 {
            0.0
        } else {
            dcg / idcg
        }
    }

    // Positions are 1-based, so the discount is log2(position + 1).
    fn calculate_dcg(&self, recommended: &[ItemId], relevant_scores: &HashMap<ItemId, f64>) -> f64 {
        recommended
            .iter()
            .take(self.k)
            .enumerate()
            .map(|(i, item_id)| {
                let relevance = relevant_scores.get(item_id).copied().unwrap_or(0.0);
                relevance / ((i + 2) as f64).log2()
            })
            .sum()
    }

    fn calculate_ideal_dcg(&self, relevant_scores: &HashMap<ItemId, f64>) -> f64 {
        let mut scores: Vec<f64> = relevant_scores.values().copied().collect();
        scores.sort_by(|a, b| b.total_cmp(a));

        scores
            .iter()
            .take(self.k)
            .enumerate()
            .map(|(i, &score)| score / ((i + 2) as f64).log2())
            .sum()
    }

    pub fn calculate_coverage(&self, recommended_items: &[ItemId], all_items: &[ItemId]) -> f64 {
        if all_items.is_empty() {
            return 0.0;
        }

        let recommended_set: HashSet<_> = recommended_items.iter().collect();
        let covered_items = all_items
            .iter()
            .filter(|item| recommended_set.contains(item))
            .count();

        covered_items as f64 / all_items.len() as f64
    }
}

/// Mean absolute error over (predicted, actual) pairs.
pub fn mean_absolute_error(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let total: f64 = pairs.iter().map(|(p, a)| (p - a).abs()).sum();
    Some(total / pairs.len() as f64)
}

/// Root mean squared error over (predicted, actual) pairs.
pub fn root_mean_squared_error(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let total: f64 = pairs.iter().map(|(p, a)| (p - a).powi(2)).sum();
    Some((total / pairs.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_recall() {
        let calculator = MetricsCalculator::new(5);
        let recommended = vec![1, 2, 3];
        let relevant = vec![1, 3];

        let precision = calculator.calculate_precision_at_k(&recommended, &relevant);
        let recall = calculator.calculate_recall_at_k(&recommended, &relevant);

        assert!((precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((recall - 1.0).abs() < 1e-9);
        assert!(calculator.calculate_f1_score(precision, recall) > precision);
    }

    #[test]
    fn test_ndcg_perfect_ordering() {
        let calculator = MetricsCalculator::new(3);
        let scores = HashMap::from([(1, 3.0), (2, 2.0), (3, 1.0)]);

        assert!((calculator.calculate_ndcg_at_k(&[1, 2, 3], &scores) - 1.0).abs() < 1e-9);
        assert!(calculator.calculate_ndcg_at_k(&[3, 2, 1], &scores) < 1.0);
    }

    #[test]
    fn test_error_metrics() {
        let pairs = vec![(4.0, 5.0), (3.0, 1.0)];

        assert_eq!(mean_absolute_error(&pairs), Some(1.5));
        assert!((root_mean_squared_error(&pairs).unwrap() - 2.5_f64.sqrt()).abs() < 1e-9);
        assert_eq!(mean_absolute_error(&[]), None);
    }

    #[test]
    fn test_coverage() {
        let calculator = MetricsCalculator::new(2);
        assert_eq!(calculator.calculate_coverage(&[1, 2], &[1, 2, 3, 4]), 0.5);
        assert_eq!(calculator.calculate_coverage(&[1], &[]), 0.0);
    }
}
