use phonerec::services::batch::{is_cancellation, BatchRecommender};
use phonerec::services::evaluation::Evaluator;
use phonerec::utils::CancellationFlag;
use phonerec::{init_tracing_with_level, Config, PreferenceStore};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Recommend for every user in the ratings file.
    Batch,
    /// Hold out ratings and report prediction and ranking quality.
    Evaluate,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[arg(short, long, value_enum, default_value_t = Mode::Batch)]
    mode: Mode,

    /// Overrides `data.ratings_path`.
    #[arg(short, long)]
    ratings: Option<PathBuf>,

    /// Overrides `batch.output_path`; batch results go to stdout when neither is set.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing_with_level(&args.log_level);

    info!("Starting phonerec worker: {:?}", args.mode);

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(ratings) = args.ratings {
        config.data.ratings_path = ratings;
    }
    if let Some(output) = args.output {
        config.batch.output_path = Some(output);
    }
    let config = Arc::new(config);

    let ratings_path = config.data.ratings_path.clone();
    let store = Arc::new(tokio::task::spawn_blocking(move || PreferenceStore::from_path(ratings_path)).await??);

    let cancel = CancellationFlag::new();
    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current users and stopping");
            signal_flag.cancel();
        }
    });

    let outcome = match args.mode {
        Mode::Batch => run_batch(config, store, cancel).await,
        Mode::Evaluate => run_evaluation(config, store, cancel).await,
    };

    match outcome {
        Err(e) if is_cancellation(&e) => {
            warn!("Worker cancelled before any work started");
            Ok(())
        }
        Err(e) => {
            error!("Worker failed: {:#}", e);
            Err(e)
        }
        Ok(()) => Ok(()),
    }
}

async fn run_batch(config: Arc<Config>, store: Arc<PreferenceStore>, cancel: CancellationFlag) -> Result<()> {
    let recommendation = &config.recommendation;
    let batch = BatchRecommender::new(
        recommendation.recommender(),
        recommendation.neighborhood_size,
        recommendation.num_recommendations,
        config.batch.workers,
    );

    let report = tokio::task::spawn_blocking(move || batch.run(&store, &cancel)).await??;

    match &config.batch.output_path {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            report.write_json_lines(BufWriter::new(file))?;
            info!(path = %path.display(), users = report.processed, "Wrote batch recommendations");
        }
        None => report.write_json_lines(std::io::stdout().lock())?,
    }

    info!(
        processed = report.processed,
        empty = report.empty,
        skipped = report.skipped,
        cancelled = report.cancelled,
        elapsed_ms = report.elapsed_ms,
        "Batch worker finished"
    );
    Ok(())
}

async fn run_evaluation(config: Arc<Config>, store: Arc<PreferenceStore>, cancel: CancellationFlag) -> Result<()> {
    let recommendation = &config.recommendation;
    let evaluator = Evaluator::new(
        recommendation.recommender(),
        config.evaluation.clone(),
        recommendation.neighborhood_size,
        recommendation.num_recommendations,
    )?;

    let metrics = tokio::task::spawn_blocking(move || evaluator.evaluate(&store, &cancel)).await??;

    println!("{}", serde_json::to_string_pretty(&metrics)?);
    info!(
        mae = ?metrics.mae,
        rmse = ?metrics.rmse,
        precision = metrics.precision_at_k,
        recall = metrics.recall_at_k,
        ndcg = metrics.ndcg_at_k,
        coverage = metrics.coverage,
        "Evaluation worker finished"
    );
    Ok(())
}
