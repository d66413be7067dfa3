use phonerec::algorithms::*;
use phonerec::services::batch::BatchRecommender;
use phonerec::services::catalog::ItemCatalog;
use phonerec::services::recommendation::RecommendationService;
use phonerec::services::serving::ServingService;
use phonerec::utils::CancellationFlag;
use phonerec::*;
use std::sync::Arc;
use tokio_test::assert_ok;

const ITEM_A: i64 = 1;
const ITEM_B: i64 = 2;
const ITEM_C: i64 = 3;

fn scenario_a() -> PreferenceStore {
    PreferenceStore::from_ratings(vec![
        Rating::new(1, ITEM_A, 5.0),
        Rating::new(1, ITEM_B, 3.0),
        Rating::new(2, ITEM_A, 5.0),
        Rating::new(2, ITEM_B, 3.0),
        Rating::new(2, ITEM_C, 4.0),
        Rating::new(3, ITEM_A, 1.0),
        Rating::new(3, ITEM_B, 5.0),
    ])
    .unwrap()
}

/// A denser store in the shape of the phone ratings file: users 1-12, phones 1-7.
fn phone_store() -> PreferenceStore {
    let mut ratings = Vec::new();
    for user in 1..=12i64 {
        for item in 1..=7i64 {
            if (user * 3 + item) % 4 != 0 {
                let value = ((user + item * 2) % 5 + 1) as f64;
                ratings.push(Rating::new(user, item, value));
            }
        }
    }
    PreferenceStore::from_ratings(ratings).unwrap()
}

fn temp_file(contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("phonerec-it-{}.csv", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_scenario_a_end_to_end() {
    let store = scenario_a();
    let metric = SimilarityMetric::PearsonCorrelation;

    let close = metric.similarity(&store, 1, 2).unwrap();
    let opposite = metric.similarity(&store, 1, 3).unwrap();
    assert!((close - 1.0).abs() < 1e-9);
    assert!(opposite < 0.0);

    let selector = NeighborhoodSelector::default();
    let neighborhood = selector.neighbors_of(&store, 1, 1);
    assert_eq!(neighborhood.len(), 1);
    assert_eq!(neighborhood[0].user_id, 2);

    let recommendations = RecommenderEngine::default().recommend(&store, 1, &neighborhood, 1);
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].item_id, ITEM_C);
    assert!((recommendations[0].value - 4.0).abs() < 1e-9);
}

#[test]
fn test_scenario_b_cold_user() {
    let store = scenario_a();
    let recommender = UserBasedRecommender::default();

    assert!(recommender.neighborhood(&store, 99, 3).is_empty());
    assert!(recommender.recommend(&store, 99, 3, 2).is_empty());
    assert!(store.ratings_of(99).is_empty());
}

#[test]
fn test_scenario_c_neighborhood_smaller_than_k() {
    let store = scenario_a();
    let neighborhood = NeighborhoodSelector::default().neighbors_of(&store, 1, 50);

    assert_eq!(neighborhood.len(), 2);
    assert_eq!(neighborhood[0].user_id, 2);
    assert_eq!(neighborhood[1].user_id, 3);
}

#[test]
fn test_scenario_d_malformed_file_fails_whole_load() {
    let path = temp_file("1,1,5\n1,2,3\n2,1,five\n2,2,3\n");
    let result = PreferenceStore::from_path(&path);
    std::fs::remove_file(&path).ok();

    match result {
        Err(RecommenderError::MalformedInput { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected malformed input error, got {:?}", other),
    }
}

#[test]
fn test_empty_file_is_rejected() {
    let path = temp_file("# header only\n\n");
    let result = PreferenceStore::from_path(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(RecommenderError::EmptyDataset)));
}

#[test]
fn test_load_from_file_with_comments_tabs_and_timestamps() {
    let path = temp_file("# user,item,value\n1,1,5\n1\t2\t3\n\n2,1,5,1700000000\n2,2,3\n2,3,4\n");
    let store = assert_ok!(PreferenceStore::from_path(&path));
    std::fs::remove_file(&path).ok();

    assert_eq!(store.num_users(), 2);
    assert_eq!(store.num_ratings(), 5);
    assert_eq!(store.rating(1, 2), Some(3.0));
    assert_eq!(store.raters_of(1).iter().copied().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_similarity_is_symmetric_and_bounded() {
    let store = phone_store();
    let users: Vec<i64> = store.all_user_ids().collect();

    for metric in [
        SimilarityMetric::PearsonCorrelation,
        SimilarityMetric::Cosine,
        SimilarityMetric::Euclidean,
    ] {
        for &a in &users {
            for &b in &users {
                if a == b {
                    continue;
                }
                let forward = metric.similarity(&store, a, b);
                let backward = metric.similarity(&store, b, a);
                match (forward, backward) {
                    (Some(x), Some(y)) => {
                        assert!((x - y).abs() < 1e-12, "{} not symmetric for {} and {}", metric.name(), a, b);
                        assert!((-1.0..=1.0).contains(&x));
                    }
                    (None, None) => {}
                    _ => panic!("{} defined in only one direction for {} and {}", metric.name(), a, b),
                }
            }
        }
    }
}

#[test]
fn test_neighborhood_bound_and_order() {
    let store = phone_store();
    let selector = NeighborhoodSelector::default();

    for user in store.all_user_ids() {
        for k in [1, 3, 5, 20] {
            let neighborhood = selector.neighbors_of(&store, user, k);
            assert!(neighborhood.len() <= k);
            assert!(neighborhood.iter().all(|n| n.user_id != user && n.similarity.is_finite()));
            for pair in neighborhood.windows(2) {
                assert!(
                    pair[0].similarity > pair[1].similarity
                        || (pair[0].similarity == pair[1].similarity && pair[0].user_id < pair[1].user_id)
                );
            }
        }
    }
}

#[test]
fn test_recommendations_exclude_rated_items_and_are_deterministic() {
    let store = phone_store();
    let recommender = UserBasedRecommender::default();

    for user in store.all_user_ids() {
        let first = recommender.recommend(&store, user, 3, 2);
        let second = recommender.recommend(&store, user, 3, 2);

        assert_eq!(first, second);
        assert!(first.len() <= 2);
        for item in &first {
            assert!(store.rating(user, item.item_id).is_none());
        }
        for pair in first.windows(2) {
            assert!(
                pair[0].value > pair[1].value
                    || (pair[0].value == pair[1].value && pair[0].item_id < pair[1].item_id)
            );
        }
    }
}

#[test]
fn test_include_policy_keeps_predictions_on_scale() {
    let store = scenario_a();
    let neighborhood = NeighborhoodSelector::default().neighbors_of(&store, 3, 2);
    assert!(neighborhood.iter().all(|n| n.similarity < 0.0));

    let excluded = RecommenderEngine::new(NegativeSimilarityPolicy::Exclude).recommend(&store, 3, &neighborhood, 5);
    assert!(excluded.is_empty());

    // User 2 rated item C at their own mean, so user 3 stays at theirs.
    let included = RecommenderEngine::new(NegativeSimilarityPolicy::Include).recommend(&store, 3, &neighborhood, 5);
    assert_eq!(included.len(), 1);
    assert_eq!(included[0].item_id, ITEM_C);
    assert!((included[0].value - 3.0).abs() < 1e-9);

    let phones = phone_store();
    let (lo, hi) = phones.value_range();
    let engine = RecommenderEngine::new(NegativeSimilarityPolicy::Include);
    for user in phones.all_user_ids() {
        let neighborhood = NeighborhoodSelector::default().neighbors_of(&phones, user, 5);
        for item in engine.recommend(&phones, user, &neighborhood, 7) {
            assert!((lo..=hi).contains(&item.value));
        }
    }
}

#[test]
fn test_batch_matches_per_user_results() {
    let store = phone_store();
    let recommender = UserBasedRecommender::default();
    let report = assert_ok!(BatchRecommender::new(recommender, 3, 2, 3).run(&store, &CancellationFlag::new()));

    assert_eq!(report.processed, store.num_users());
    for entry in &report.results {
        assert_eq!(entry.recommendations, recommender.recommend(&store, entry.user_id, 3, 2));
    }
}

#[tokio::test]
async fn test_serving_flow_with_reload() {
    let path = temp_file("1,1,5\n1,2,3\n2,1,5\n2,2,3\n2,3,4\n3,1,1\n3,2,5\n");
    let mut config = Config::default();
    config.data.ratings_path = path.clone();
    let config = Arc::new(config);

    let service = Arc::new(assert_ok!(RecommendationService::from_config(config.clone())));
    let state = AppState::with_service(config, service.clone());

    let response = assert_ok!(
        state
            .serving_service
            .serve_recommendations(RecommendationRequest::new(1).with_neighborhood_size(1))
            .await
    );
    assert_eq!(response.recommendations.len(), 1);
    let top = &response.recommendations[0];
    assert_eq!(top.item_id, ITEM_C);
    assert_eq!(
        ItemCatalog::phones().describe(top),
        "Brand: Google, Name: Pixel 7a, Category: Mid-range Excellence, Price: $449, Predicted Preference: 4.0"
    );

    std::fs::write(&path, "1,1,5\n1,2,3\n2,1,5\n2,2,3\n2,4,2\n").unwrap();
    let summary = assert_ok!(state.serving_service.reload().await);
    assert_eq!(summary.num_users, 2);
    assert_eq!(service.snapshot().generation, 1);

    let response = assert_ok!(
        state
            .serving_service
            .serve_recommendations(RecommendationRequest::new(1))
            .await
    );
    assert_eq!(response.recommendations[0].item_id, 4);

    std::fs::write(&path, "1,1,oops\n").unwrap();
    assert!(state.serving_service.reload().await.is_err());
    assert_eq!(service.snapshot().generation, 1);
    assert_eq!(service.store().num_ratings(), 5);

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_serving_stats_track_requests() {
    let service = RecommendationService::new(scenario_a(), ItemCatalog::phones(), Arc::new(Config::default())).unwrap();
    let serving = ServingService::new(Arc::new(service));

    for _ in 0..3 {
        assert_ok!(serving.serve_recommendations(RecommendationRequest::new(1)).await);
    }
    let stats = serving.get_serving_stats();

    assert_eq!(stats["total_requests"], 3);
    assert_eq!(stats["successful_requests"], 3);
    assert_eq!(stats["cached_responses"], 1);
}
