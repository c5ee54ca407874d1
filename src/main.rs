use trust_graph::config::{Config, ENV_CONFIG};
use trust_graph::ingestion::{load_reviews, read_table, write_table};
use trust_graph::scoring::{build_business_risk_table, build_reviewer_risk_table};
use trust_graph::signals::{BusinessSignals, ReviewerSignals};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "trust-graph")]
#[command(about = "Rank reviewers and listings by review-fraud risk")]
#[command(version)]
struct Args {
    /// JSON config file (or set TRUST_GRAPH_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the six signal tables from a reviews file
    Signals {
        /// Reviews file (defaults to data_dir/review_file from the config)
        #[arg(short, long)]
        reviews: Option<PathBuf>,

        /// Directory for the signal tables
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,
    },
    /// Score entities from three precomputed signal tables
    Score {
        /// Burst signal table
        #[arg(long)]
        burst: PathBuf,

        /// Rating skew table (business) or 5-star rate table (reviewer)
        #[arg(long)]
        skew: PathBuf,

        /// Overlap table (business) or diversity table (reviewer)
        #[arg(long)]
        overlap: PathBuf,

        #[arg(long, value_enum, default_value_t = Profile::Business)]
        profile: Profile,

        /// Output table (.csv, .json or .parquet)
        #[arg(short, long, default_value = "risk.csv")]
        out: PathBuf,

        /// Rows to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Compute signals and both risk tables from a reviews file
    Run {
        #[arg(short, long)]
        reviews: Option<PathBuf>,

        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,

        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Profile {
    Business,
    Reviewer,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config_path = args
        .config
        .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from));
    let config = Config::resolve(config_path.as_deref()).context("Failed to load config")?;

    match args.command {
        Commands::Signals { reviews, out_dir } => {
            let reviews_path = reviews.unwrap_or_else(|| config.review_path());
            let (business, reviewer) = compute_signals(&reviews_path, &config)?;
            write_signals(&business, &reviewer, &out_dir)?;
        }
        Commands::Score {
            burst,
            skew,
            overlap,
            profile,
            out,
            top,
        } => {
            let burst = read_table(&burst)?;
            let skew = read_table(&skew)?;
            let overlap = read_table(&overlap)?;

            let mut risk = match profile {
                Profile::Business => {
                    build_business_risk_table(&burst, &skew, &overlap, Some(&config.business_weights))?
                }
                Profile::Reviewer => {
                    build_reviewer_risk_table(&burst, &skew, &overlap, Some(&config.reviewer_weights))?
                }
            };

            write_table(&mut risk, &out)?;
            print_top("Risk ranking", &risk, top);
        }
        Commands::Run {
            reviews,
            out_dir,
            top,
        } => {
            let reviews_path = reviews.unwrap_or_else(|| config.review_path());
            let (business, reviewer) = compute_signals(&reviews_path, &config)?;
            write_signals(&business, &reviewer, &out_dir)?;

            let mut business_risk = business.risk_table(&config)?;
            let mut reviewer_risk = reviewer.risk_table(&config)?;
            write_table(&mut business_risk, &out_dir.join("business_risk.csv"))?;
            write_table(&mut reviewer_risk, &out_dir.join("reviewer_risk.csv"))?;

            print_top("Riskiest businesses", &business_risk, top);
            print_top("Riskiest reviewers", &reviewer_risk, top);
        }
    }

    Ok(())
}

fn compute_signals(reviews_path: &Path, config: &Config) -> Result<(BusinessSignals, ReviewerSignals)> {
    info!("Loading reviews from {}", reviews_path.display());
    let reviews = load_reviews(reviews_path, config)
        .with_context(|| format!("Failed to load reviews from {}", reviews_path.display()))?;

    let business = BusinessSignals::compute(&reviews, config)?;
    let reviewer = ReviewerSignals::compute(&reviews, config)?;
    Ok((business, reviewer))
}

fn write_signals(business: &BusinessSignals, reviewer: &ReviewerSignals, out_dir: &Path) -> Result<()> {
    let tables = [
        ("business_burst.csv", &business.burst),
        ("business_rating_skew.csv", &business.skew),
        ("business_reviewer_overlap.csv", &business.overlap),
        ("reviewer_burst.csv", &reviewer.burst),
        ("reviewer_5star_rate.csv", &reviewer.five_star),
        ("reviewer_diversity.csv", &reviewer.diversity),
    ];

    for (name, table) in tables {
        let mut table = table.clone();
        write_table(&mut table, &out_dir.join(name))?;
    }
    info!("Signal tables written to {}", out_dir.display());
    Ok(())
}

fn print_top(title: &str, df: &DataFrame, n: usize) {
    println!("\n=== {} ({} entities) ===", title, df.height());
    println!("{}", df.head(Some(n)));
}
