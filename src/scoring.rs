//! Risk Aggregator
//!
//! Combines three per-entity signal tables into one ranked risk table:
//!
//! 1. reconcile each table's signal column to its canonical name
//! 2. project every table to `{key, signal}`
//! 3. full outer join on the key (stable union of keys, then left joins)
//! 4. zero-fill entities missing from a source
//! 5. z-score each signal
//! 6. weighted sum into `risk_score`
//! 7. average-rank `risk_percentile` in (0, 1]
//! 8. sort descending by `risk_score`, ties in first-seen key order
//!
//! The key set of the output is the union of the input key sets. Inputs are
//! never modified.

use crate::config::{BusinessWeights, ReviewerWeights};
use crate::error::Result;
use crate::normalize::{zscore, SignalStats};
use crate::reconcile::{require_column, SignalColumn};
use polars::prelude::*;
use tracing::{debug, info};

pub const RISK_SCORE: &str = "risk_score";
pub const RISK_PERCENTILE: &str = "risk_percentile";

/// Highest first; equal values keep their current row order.
pub(crate) fn descending_stable() -> SortMultipleOptions {
    SortMultipleOptions::default()
        .with_order_descending(true)
        .with_maintain_order(true)
}

/// One weighted signal of a risk profile.
#[derive(Debug, Clone)]
pub struct SignalSpec {
    pub column: SignalColumn,
    /// Name of the z-score column in the output.
    pub z_column: String,
    pub weight: f64,
}

impl SignalSpec {
    pub fn new(column: SignalColumn, z_column: &str, weight: f64) -> Self {
        Self {
            column,
            z_column: z_column.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskAggregator {
    key: String,
    signals: [SignalSpec; 3],
}

impl RiskAggregator {
    pub fn new(key: &str, signals: [SignalSpec; 3]) -> Self {
        Self {
            key: key.to_string(),
            signals,
        }
    }

    /// Listing profile: burst, rating skew and reviewer overlap.
    pub fn business(weights: &BusinessWeights) -> Self {
        Self::new(
            "business_id",
            [
                SignalSpec::new(SignalColumn::exact("burst_score"), "z_burst", weights.burst_score),
                SignalSpec::new(SignalColumn::exact("rating_skew"), "z_skew", weights.rating_skew),
                SignalSpec::new(SignalColumn::overlap(), "z_overlap", weights.overlap_score),
            ],
        )
    }

    /// Reviewer profile: burst, share of 5-star ratings and business diversity.
    pub fn reviewer(weights: &ReviewerWeights) -> Self {
        Self::new(
            "user_id",
            [
                SignalSpec::new(SignalColumn::exact("burst_score"), "z_burst", weights.burst_score),
                SignalSpec::new(SignalColumn::exact("pct_5star"), "z_pos", weights.pct_5star),
                SignalSpec::new(
                    SignalColumn::exact("n_unique_businesses"),
                    "z_div",
                    weights.n_unique_businesses,
                ),
            ],
        )
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn signals(&self) -> &[SignalSpec; 3] {
        &self.signals
    }

    /// Output column order: key, raw signals, z-scores, score, percentile.
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns = vec![self.key.clone()];
        columns.extend(self.signals.iter().map(|s| s.column.canonical.clone()));
        columns.extend(self.signals.iter().map(|s| s.z_column.clone()));
        columns.push(RISK_SCORE.to_string());
        columns.push(RISK_PERCENTILE.to_string());
        columns
    }

    /// Build the ranked risk table from one table per signal, in the order
    /// the profile declares its signals.
    pub fn aggregate(&self, tables: [&DataFrame; 3]) -> Result<DataFrame> {
        let key = self.key.as_str();

        let mut projections = Vec::with_capacity(self.signals.len());
        for (spec, table) in self.signals.iter().zip(tables) {
            require_column(table, key)?;
            let reconciled = spec.column.reconcile(table.clone())?;
            let signal = spec.column.canonical.as_str();

            projections.push(
                reconciled
                    .lazy()
                    .select([
                        col(key).cast(DataType::String),
                        col(signal).cast(DataType::Float64),
                    ])
                    .unique_stable(Some(vec![key.to_string()]), UniqueKeepStrategy::First),
            );
        }

        let keys = concat(
            projections
                .iter()
                .map(|p| p.clone().select([col(key)]))
                .collect::<Vec<_>>(),
            UnionArgs::default(),
        )?
        .unique_stable(None, UniqueKeepStrategy::First);

        let mut joined = keys;
        for projection in projections {
            joined = joined.join(
                projection,
                [col(key)],
                [col(key)],
                JoinArgs::new(JoinType::Left),
            );
        }

        let fills: Vec<Expr> = self
            .signals
            .iter()
            .map(|s| {
                let c = s.column.canonical.as_str();
                col(c).fill_nan(lit(0.0)).fill_null(lit(0.0)).alias(c)
            })
            .collect();
        let mut risk = joined.with_columns(fills).collect()?;

        for spec in &self.signals {
            let z = {
                let raw = risk.column(&spec.column.canonical)?;
                let stats = SignalStats::from_series(raw);
                if stats.is_degenerate() {
                    debug!("Signal '{}' has no variance, z-scores set to 0", spec.column.canonical);
                } else {
                    debug!(
                        "Signal '{}': n={} mean={:.4} std={:.4}",
                        spec.column.canonical, stats.count, stats.mean, stats.std_dev
                    );
                }
                zscore(raw).with_name(&spec.z_column)
            };
            risk.with_column(z)?;
        }

        let score = self
            .signals
            .iter()
            .fold(lit(0.0), |acc, s| acc + lit(s.weight) * col(&s.z_column));

        // average rank over N: ties share the same fraction
        let percentile = col(RISK_SCORE)
            .rank(
                RankOptions {
                    method: RankMethod::Average,
                    descending: false,
                },
                None,
            )
            .cast(DataType::Float64)
            / len().cast(DataType::Float64);

        let output: Vec<Expr> = self.output_columns().iter().map(|c| col(c)).collect();

        let ranked = risk
            .lazy()
            .with_column(score.alias(RISK_SCORE))
            .with_column(percentile.alias(RISK_PERCENTILE))
            .sort_by_exprs([col(RISK_SCORE)], descending_stable())
            .select(output)
            .collect()?;

        info!("Scored {} entities by '{}'", ranked.height(), key);
        Ok(ranked)
    }
}

/// Rank listings from their burst, rating-skew and overlap tables.
///
/// The overlap table may name its signal `overlap_score`, `overlap_ratio`,
/// `reviewer_overlap` or `frac_heavy_reviewers`. Weights default to
/// [`BusinessWeights::default`].
pub fn build_business_risk_table(
    burst_df: &DataFrame,
    skew_df: &DataFrame,
    overlap_df: &DataFrame,
    weights: Option<&BusinessWeights>,
) -> Result<DataFrame> {
    let weights = weights.copied().unwrap_or_default();
    RiskAggregator::business(&weights).aggregate([burst_df, skew_df, overlap_df])
}

/// Rank reviewers from their burst, 5-star-rate and diversity tables.
pub fn build_reviewer_risk_table(
    burst_df: &DataFrame,
    rate_df: &DataFrame,
    diversity_df: &DataFrame,
    weights: Option<&ReviewerWeights>,
) -> Result<DataFrame> {
    let weights = weights.copied().unwrap_or_default();
    RiskAggregator::reviewer(&weights).aggregate([burst_df, rate_df, diversity_df])
}
