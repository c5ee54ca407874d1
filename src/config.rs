//! Run configuration
//!
//! Loaded from a JSON file; every field has a production default, so a
//! partial file (or none at all) is valid. A few fields can be overridden
//! from the environment (see [`Config::apply_env`]).

use crate::error::{RiskError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const ENV_CONFIG: &str = "TRUST_GRAPH_CONFIG";
pub const ENV_DATA_DIR: &str = "TRUST_GRAPH_DATA_DIR";
pub const ENV_MAX_REVIEWS: &str = "TRUST_GRAPH_MAX_REVIEWS";
pub const ENV_SEED: &str = "TRUST_GRAPH_SEED";

/// Weights of the business (listing) risk profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessWeights {
    pub burst_score: f64,
    pub rating_skew: f64,
    pub overlap_score: f64,
}

impl Default for BusinessWeights {
    fn default() -> Self {
        Self {
            burst_score: 0.45,
            rating_skew: 0.35,
            overlap_score: 0.20,
        }
    }
}

/// Weights of the reviewer risk profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewerWeights {
    pub burst_score: f64,
    pub pct_5star: f64,
    pub n_unique_businesses: f64,
}

impl Default for ReviewerWeights {
    fn default() -> Self {
        Self {
            burst_score: 0.40,
            pct_5star: 0.25,
            n_unique_businesses: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub review_file: String,
    /// Reviews are sampled down to this many rows; `None` keeps them all.
    pub max_reviews: Option<usize>,
    pub seed: u64,
    pub burst_window_days: u32,
    pub heavy_reviewer_threshold: u32,
    pub business_weights: BusinessWeights,
    pub reviewer_weights: ReviewerWeights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/yelp"),
            review_file: "review.json".to_string(),
            max_reviews: Some(50_000),
            seed: 42,
            burst_window_days: 14,
            heavy_reviewer_threshold: 10,
            business_weights: BusinessWeights::default(),
            reviewer_weights: ReviewerWeights::default(),
        }
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults, then
    /// apply environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_MAX_REVIEWS) {
            self.max_reviews = match raw.trim() {
                "" | "all" | "none" => None,
                n => Some(n.parse().map_err(|_| {
                    RiskError::Config(format!("{} must be a row count, got '{}'", ENV_MAX_REVIEWS, n))
                })?),
            };
        }
        if let Some(raw) = lookup(ENV_SEED) {
            self.seed = raw.trim().parse().map_err(|_| {
                RiskError::Config(format!("{} must be an integer, got '{}'", ENV_SEED, raw))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.burst_window_days == 0 {
            return Err(RiskError::Config("burst_window_days must be positive".to_string()));
        }

        let b = &self.business_weights;
        let r = &self.reviewer_weights;
        let weights = [
            ("business_weights.burst_score", b.burst_score),
            ("business_weights.rating_skew", b.rating_skew),
            ("business_weights.overlap_score", b.overlap_score),
            ("reviewer_weights.burst_score", r.burst_score),
            ("reviewer_weights.pct_5star", r.pct_5star),
            ("reviewer_weights.n_unique_businesses", r.n_unique_businesses),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(RiskError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }

    pub fn review_path(&self) -> PathBuf {
        self.data_dir.join(&self.review_file)
    }
}
