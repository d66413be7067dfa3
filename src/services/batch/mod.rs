use crate::algorithms::UserBasedRecommender;
use crate::error::RecommenderError;
use crate::models::{RecommendedItem, UserId};
use crate::store::PreferenceStore;
use crate::utils::CancellationFlag;
use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecommendations {
    pub user_id: UserId,
    pub recommendations: Vec<RecommendedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per processed user, in ascending user id order.
    pub results: Vec<UserRecommendations>,
    pub processed: usize,
    pub skipped: usize,
    pub empty: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

/// Recommends for every user in a store on a dedicated rayon pool.
pub struct BatchRecommender {
    recommender: UserBasedRecommender,
    neighborhood_size: usize,
    num_recommendations: usize,
    workers: usize,
}

impl BatchRecommender {
    pub fn new(
        recommender: UserBasedRecommender,
        neighborhood_size: usize,
        num_recommendations: usize,
        workers: usize,
    ) -> Self {
        Self {
            recommender,
            neighborhood_size,
            num_recommendations,
            workers: workers.max(1),
        }
    }

    /// Each worker only reads `store` and produces its own output; the flag is
    /// checked once per user, so cancellation leaves a partial, in-order report.
    pub fn run(&self, store: &PreferenceStore, cancel: &CancellationFlag) -> Result<BatchReport> {
        cancel.check()?;

        let start = Instant::now();
        let users: Vec<UserId> = store.all_user_ids().collect();
        let progress = AtomicUsize::new(0);
        let total = users.len();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("phonerec-batch-{}", i))
            .build()?;

        info!(users = total, workers = self.workers, "Starting batch recommendation run");

        let outputs: Vec<Option<UserRecommendations>> = pool.install(|| {
            users
                .par_iter()
                .map(|&user_id| {
                    if cancel.is_cancelled() {
                        return None;
                    }

                    let recommendations = self.recommender.recommend(
                        store,
                        user_id,
                        self.neighborhood_size,
                        self.num_recommendations,
                    );

                    let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % 1000 == 0 {
                        info!(done, total, "Batch progress");
                    }

                    Some(UserRecommendations {
                        user_id,
                        recommendations,
                    })
                })
                .collect()
        });

        let skipped = outputs.iter().filter(|o| o.is_none()).count();
        let results: Vec<UserRecommendations> = outputs.into_iter().flatten().collect();
        let empty = results.iter().filter(|r| r.recommendations.is_empty()).count();
        let cancelled = cancel.is_cancelled() && skipped > 0;

        let report = BatchReport {
            processed: results.len(),
            results,
            skipped,
            empty,
            cancelled,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        if report.cancelled {
            warn!(processed = report.processed, skipped, "Batch run cancelled");
        } else {
            info!(
                processed = report.processed,
                empty = report.empty,
                elapsed_ms = report.elapsed_ms,
                "Batch run finished"
            );
        }

        Ok(report)
    }
}

impl BatchReport {
    /// Writes one JSON object per user.
    pub fn write_json_lines<W: Write>(&self, mut out: W) -> Result<()> {
        for entry in &self.results {
            serde_json::to_writer(&mut out, entry)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

/// True when `err` is a cooperative cancellation rather than a failure.
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<RecommenderError>(), Some(RecommenderError::Cancelled))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PreferenceStore {
        PreferenceStore::load(
            "1,10,5\n1,11,3\n2,10,5\n2,11,3\n2,12,4\n3,10,1\n3,11,5\n4,99,2\n".as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_batch_covers_every_user_in_order() {
        let batch = BatchRecommender::new(UserBasedRecommender::default(), 3, 2, 2);
        let report = batch.run(&store(), &CancellationFlag::new()).unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.processed, 4);
        assert_eq!(
            report.results.iter().map(|r| r.user_id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(report.results[0].recommendations[0].item_id, 12);
        assert!(report.results[3].recommendations.is_empty());
    }

    #[test]
    fn test_matches_single_user_path() {
        let store = store();
        let recommender = UserBasedRecommender::default();
        let report = BatchRecommender::new(recommender, 3, 2, 4)
            .run(&store, &CancellationFlag::new())
            .unwrap();

        for entry in &report.results {
            assert_eq!(entry.recommendations, recommender.recommend(&store, entry.user_id, 3, 2));
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let err = BatchRecommender::new(UserBasedRecommender::default(), 3, 2, 1)
            .run(&store(), &cancel)
            .unwrap_err();
        assert!(is_cancellation(&err));
    }

    #[test]
    fn test_write_json_lines() {
        let report = BatchRecommender::new(UserBasedRecommender::default(), 3, 2, 1)
            .run(&store(), &CancellationFlag::new())
            .unwrap();

        let mut out = Vec::new();
        report.write_json_lines(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), 4);
        let first: UserRecommendations = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first.user_id, 1);
    }
}
