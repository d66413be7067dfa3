use phonerec::{init_tracing_with_level, AppState, Config, RecommenderError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve phone recommendations over HTTP", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Overrides `data.ratings_path` from the config file.
    #[arg(short, long)]
    ratings: Option<std::path::PathBuf>,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    neighborhood_size: Option<usize>,
    num_recommendations: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct NeighborQuery {
    k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

fn failure<T>(err: anyhow::Error) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match err.downcast_ref::<RecommenderError>() {
        Some(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(status = %status, "Request failed: {:#}", err);
    (status, Json(ApiResponse::error(err.to_string())))
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HashMap<String, serde_json::Value>>> {
    let mut status = state.serving_service.health_check();
    status.insert("service".to_string(), serde_json::json!("phonerec-recommendation"));
    status.insert("version".to_string(), serde_json::json!(env!("CARGO_PKG_VERSION")));

    Json(ApiResponse::success(status))
}

async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<RecommendationQuery>,
) -> ApiResult<phonerec::RecommendationResponse> {
    let request = phonerec::RecommendationRequest {
        user_id,
        neighborhood_size: params.neighborhood_size,
        num_recommendations: params.num_recommendations,
    };

    let response = state
        .serving_service
        .serve_recommendations(request)
        .await
        .map_err(failure)?;

    let message = if response.is_empty() {
        format!("No recommendations found for user {}", user_id)
    } else {
        "Success".to_string()
    };

    Ok(Json(ApiResponse {
        success: true,
        data: Some(response),
        message,
    }))
}

async fn get_neighbors(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<NeighborQuery>,
) -> ApiResult<Vec<phonerec::Neighbor>> {
    let k = params.k.unwrap_or(state.config.recommendation.neighborhood_size);
    let neighbors = state
        .serving_service
        .get_similar_users(user_id, k)
        .await
        .map_err(failure)?;

    Ok(Json(ApiResponse::success(neighbors)))
}

async fn estimate_preference(
    State(state): State<AppState>,
    Path((user_id, item_id)): Path<(i64, i64)>,
) -> ApiResult<f64> {
    match state.serving_service.estimate_preference(user_id, item_id).await {
        Ok(Some(value)) => Ok(Json(ApiResponse::success(value))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!(
                "No estimate available for user {} and item {}",
                user_id, item_id
            ))),
        )),
        Err(e) => Err(failure(e)),
    }
}

async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> ApiResult<phonerec::ItemMetadata> {
    match state.serving_service.item_metadata(item_id) {
        Some(metadata) => Ok(Json(ApiResponse::success(metadata))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Item {} not found", item_id))),
        )),
    }
}

async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<HashMap<String, u64>>> {
    Json(ApiResponse::success(state.serving_service.get_serving_stats()))
}

async fn reload_store(State(state): State<AppState>) -> ApiResult<phonerec::StoreSummary> {
    let summary = state.serving_service.reload().await.map_err(failure)?;
    info!(ratings = summary.num_ratings, "Preference store reloaded");
    Ok(Json(ApiResponse::success(summary)))
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/recommendations/:user_id", get(get_recommendations))
        .route("/users/:user_id/neighbors", get(get_neighbors))
        .route("/users/:user_id/items/:item_id/estimate", get(estimate_preference))
        .route("/items/:item_id", get(get_item))
        .route("/stats", get(get_stats))
        .route("/admin/reload", post(reload_store))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
        )
        .with_state(state)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing_with_level(&args.log_level);

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(ratings) = args.ratings {
        config.data.ratings_path = ratings;
    }
    info!("Starting phonerec recommendation server with config: {:?}", config.server);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()?
        .block_on(serve(config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.server.socket_addr()?;
    let state = tokio::task::spawn_blocking(move || AppState::new(config)).await??;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
