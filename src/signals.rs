//! Per-entity fraud signals computed from review events.
//!
//! Each producer takes a reviews table (`user_id`, `business_id`, `stars`,
//! `date`) and emits one signal table sorted by its signal, highest first.
//! Rows missing a value the producer needs are skipped.

use crate::config::Config;
use crate::error::Result;
use crate::reconcile::require_column;
use crate::scoring::{build_business_risk_table, build_reviewer_risk_table, descending_stable};
use polars::prelude::*;
use tracing::info;

pub const BUSINESS_KEY: &str = "business_id";
pub const USER_KEY: &str = "user_id";

const DAY_MS: f64 = 86_400_000.0;
const TS: &str = "__ts_ms";

fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    for c in columns {
        require_column(df, c)?;
    }
    Ok(())
}

/// `{key, __ts_ms}` with the review date as epoch milliseconds.
fn review_times(reviews: &DataFrame, key: &str) -> Result<LazyFrame> {
    require_columns(reviews, &[key, "date"])?;
    Ok(reviews
        .clone()
        .lazy()
        .select([
            col(key),
            col("date")
                .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
                .cast(DataType::Int64)
                .alias(TS),
        ])
        .filter(col(key).is_not_null().and(col(TS).is_not_null())))
}

/// `{key, stars, __five}` where `__five` is 1.0 for a 5-star review.
fn star_ratings(reviews: &DataFrame, key: &str) -> Result<LazyFrame> {
    require_columns(reviews, &[key, "stars"])?;
    Ok(reviews
        .clone()
        .lazy()
        .select([col(key), col("stars").cast(DataType::Float64)])
        .filter(col(key).is_not_null().and(col("stars").is_not_null()))
        .with_column(col("stars").eq(lit(5.0)).cast(DataType::Float64).alias("__five")))
}

fn review_pairs(reviews: &DataFrame) -> Result<LazyFrame> {
    require_columns(reviews, &[BUSINESS_KEY, USER_KEY])?;
    Ok(reviews
        .clone()
        .lazy()
        .select([col(BUSINESS_KEY), col(USER_KEY)])
        .filter(col(BUSINESS_KEY).is_not_null().and(col(USER_KEY).is_not_null())))
}

/// Recent review rate over the entity's overall review rate.
///
/// The window covers the last `window_days` before the latest review in the
/// whole dataset. `active_days` is the whole number of days between the
/// entity's first and last review, at least 1.
pub fn burst_score(reviews: &DataFrame, key: &str, window_days: u32) -> Result<DataFrame> {
    let window_days = window_days.max(1) as f64;

    let out = review_times(reviews, key)?
        .with_column((col(TS).max().cast(DataType::Float64) - lit(window_days * DAY_MS)).alias("__window_start"))
        .group_by_stable([col(key)])
        .agg([
            len().alias("total_reviews"),
            col(TS)
                .cast(DataType::Float64)
                .gt_eq(col("__window_start"))
                .sum()
                .alias("window_reviews"),
            col(TS).min().alias("__first"),
            col(TS).max().alias("__last"),
        ])
        .with_column(
            ((col("__last") - col("__first")).cast(DataType::Float64) / lit(DAY_MS))
                .cast(DataType::Int64)
                .alias("active_days"),
        )
        .with_column(
            when(col("active_days").lt(lit(1i64)))
                .then(lit(1i64))
                .otherwise(col("active_days"))
                .alias("active_days"),
        )
        .with_columns([
            (col("window_reviews").cast(DataType::Float64) / lit(window_days)).alias("window_rate"),
            (col("total_reviews").cast(DataType::Float64) / col("active_days").cast(DataType::Float64))
                .alias("overall_rate"),
        ])
        .with_column(
            when(col("overall_rate").gt(lit(0.0)))
                .then(col("window_rate") / col("overall_rate"))
                .otherwise(lit(0.0))
                .alias("burst_score"),
        )
        .select([
            col(key),
            col("total_reviews"),
            col("window_reviews"),
            col("active_days"),
            col("window_rate"),
            col("overall_rate"),
            col("burst_score"),
        ])
        .sort_by_exprs([col("burst_score")], descending_stable())
        .collect()?;

    Ok(out)
}

pub fn business_burst_score(reviews: &DataFrame, window_days: u32) -> Result<DataFrame> {
    burst_score(reviews, BUSINESS_KEY, window_days)
}

pub fn reviewer_burst_score(reviews: &DataFrame, window_days: u32) -> Result<DataFrame> {
    burst_score(reviews, USER_KEY, window_days)
}

/// Share of a business's reviews that are 5-star, minus the same share over
/// all reviews.
pub fn business_rating_skew(reviews: &DataFrame) -> Result<DataFrame> {
    let out = star_ratings(reviews, BUSINESS_KEY)?
        .with_column(col("__five").mean().alias("global_pct_5star"))
        .group_by_stable([col(BUSINESS_KEY)])
        .agg([
            col("__five").mean().alias("pct_5star"),
            len().alias("n_reviews"),
            col("global_pct_5star").first(),
        ])
        .with_column((col("pct_5star") - col("global_pct_5star")).alias("rating_skew"))
        .select([
            col(BUSINESS_KEY),
            col("pct_5star"),
            col("n_reviews"),
            col("global_pct_5star"),
            col("rating_skew"),
        ])
        .sort_by_exprs([col("rating_skew")], descending_stable())
        .collect()?;

    Ok(out)
}

/// Fraction of a business's reviews written by heavy reviewers, i.e. users
/// with at least `heavy_reviewer_threshold` reviews in the dataset.
pub fn business_reviewer_overlap(reviews: &DataFrame, heavy_reviewer_threshold: u32) -> Result<DataFrame> {
    let pairs = review_pairs(reviews)?;

    let heavy_users = pairs
        .clone()
        .group_by([col(USER_KEY)])
        .agg([len().alias("__user_reviews")])
        .filter(col("__user_reviews").gt_eq(lit(heavy_reviewer_threshold)))
        .select([col(USER_KEY), lit(true).alias("__heavy")]);

    let out = pairs
        .join(
            heavy_users,
            [col(USER_KEY)],
            [col(USER_KEY)],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(col("__heavy").fill_null(lit(false)))
        .group_by_stable([col(BUSINESS_KEY)])
        .agg([
            len().alias("total_reviews"),
            col("__heavy").sum().alias("heavy_reviews"),
        ])
        .with_column(
            (col("heavy_reviews").cast(DataType::Float64) / col("total_reviews").cast(DataType::Float64))
                .fill_nan(lit(0.0))
                .alias("frac_heavy_reviewers"),
        )
        .sort_by_exprs([col("frac_heavy_reviewers")], descending_stable())
        .collect()?;

    Ok(out)
}

/// Share of each reviewer's ratings that are 5-star.
pub fn reviewer_5star_rate(reviews: &DataFrame) -> Result<DataFrame> {
    let out = star_ratings(reviews, USER_KEY)?
        .group_by_stable([col(USER_KEY)])
        .agg([col("__five").mean().alias("pct_5star"), len().alias("n_reviews")])
        .sort_by_exprs([col("pct_5star")], descending_stable())
        .collect()?;

    Ok(out)
}

/// Number of distinct businesses each reviewer reviewed.
pub fn reviewer_diversity(reviews: &DataFrame) -> Result<DataFrame> {
    let out = review_pairs(reviews)?
        .group_by_stable([col(USER_KEY)])
        .agg([col(BUSINESS_KEY).n_unique().alias("n_unique_businesses")])
        .sort_by_exprs([col("n_unique_businesses")], descending_stable())
        .collect()?;

    Ok(out)
}

/// The three listing signal tables, ready for scoring.
#[derive(Debug, Clone)]
pub struct BusinessSignals {
    pub burst: DataFrame,
    pub skew: DataFrame,
    pub overlap: DataFrame,
}

impl BusinessSignals {
    pub fn compute(reviews: &DataFrame, config: &Config) -> Result<Self> {
        let signals = Self {
            burst: business_burst_score(reviews, config.burst_window_days)?,
            skew: business_rating_skew(reviews)?,
            overlap: business_reviewer_overlap(reviews, config.heavy_reviewer_threshold)?,
        };
        info!("Computed signals for {} businesses", signals.burst.height());
        Ok(signals)
    }

    pub fn risk_table(&self, config: &Config) -> Result<DataFrame> {
        build_business_risk_table(
            &self.burst,
            &self.skew,
            &self.overlap,
            Some(&config.business_weights),
        )
    }
}

/// The three reviewer signal tables, ready for scoring.
#[derive(Debug, Clone)]
pub struct ReviewerSignals {
    pub burst: DataFrame,
    pub five_star: DataFrame,
    pub diversity: DataFrame,
}

impl ReviewerSignals {
    pub fn compute(reviews: &DataFrame, config: &Config) -> Result<Self> {
        let signals = Self {
            burst: reviewer_burst_score(reviews, config.burst_window_days)?,
            five_star: reviewer_5star_rate(reviews)?,
            diversity: reviewer_diversity(reviews)?,
        };
        info!("Computed signals for {} reviewers", signals.burst.height());
        Ok(signals)
    }

    pub fn risk_table(&self, config: &Config) -> Result<DataFrame> {
        build_reviewer_risk_table(
            &self.burst,
            &self.five_star,
            &self.diversity,
            Some(&config.reviewer_weights),
        )
    }
}
