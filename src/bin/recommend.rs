use phonerec::services::catalog::ItemCatalog;
use phonerec::{init_tracing_with_level, Config, PreferenceStore, RecommendationItem};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

const SEPARATOR: &str = "--------------------------------------------------";
const WELCOME: &str = "  Welcome to the AI Phone Recommendation System!  ";

#[derive(Parser, Debug)]
#[command(author, version, about = "Print phone recommendations for one user", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Ratings file; defaults to `data.ratings_path` from the config.
    #[arg(short, long)]
    ratings: Option<PathBuf>,

    /// JSON item metadata; the built-in phone table is used otherwise.
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[arg(short, long, default_value_t = 10)]
    user: i64,

    /// Neighborhood size.
    #[arg(short)]
    k: Option<usize>,

    /// Number of recommendations.
    #[arg(short)]
    n: Option<usize>,

    /// Decimals shown for predicted values.
    #[arg(long)]
    precision: Option<usize>,

    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing_with_level(&args.log_level);

    if let Err(e) = run(args) {
        error!("Recommendation run failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut config = Config::load_or_default(&args.config)?;
    if let Some(ratings) = args.ratings {
        config.data.ratings_path = ratings;
    }
    if let Some(catalog) = args.catalog {
        config.data.catalog_path = Some(catalog);
    }

    let request = phonerec::RecommendationRequest {
        user_id: args.user,
        neighborhood_size: args.k,
        num_recommendations: args.n,
    };
    let (k, n) = phonerec::utils::validation::validate_recommendation_request(&request, &config.recommendation)?;

    // Malformed ratings abort here, before anything is printed.
    let store = PreferenceStore::from_path(&config.data.ratings_path)?;
    let catalog = ItemCatalog::load(config.data.catalog_path.as_deref())?;
    let recommender = config.recommendation.recommender();

    info!(user_id = args.user, k, n, "Computing recommendations");
    let recommendations: Vec<RecommendationItem> = recommender
        .recommend(&store, args.user, k, n)
        .iter()
        .map(|r| catalog.annotate(r))
        .collect();

    print!("{}", render_report(args.user, &recommendations, &catalog, args.precision));

    Ok(())
}

/// The console report: banner, one line per recommendation (or the empty
/// notice), closing separator.
fn render_report(
    user_id: i64,
    recommendations: &[RecommendationItem],
    catalog: &ItemCatalog,
    precision: Option<usize>,
) -> String {
    let mut lines = vec![
        SEPARATOR.to_string(),
        WELCOME.to_string(),
        SEPARATOR.to_string(),
        String::new(),
        format!("--- Phone Recommendations for User {} ---", user_id),
    ];

    if recommendations.is_empty() {
        lines.push(format!("No recommendations found for user {}", user_id));
    } else {
        lines.extend(recommendations.iter().map(|item| match precision {
            Some(digits) => catalog.describe_with_precision(item, digits),
            None => catalog.describe(item),
        }));
    }
    lines.push(SEPARATOR.to_string());

    let mut report = lines.join("\n");
    report.push('\n');
    report
}
