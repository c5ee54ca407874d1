pub mod config;
pub mod error;
pub mod ingestion;
pub mod normalize;
pub mod reconcile;
pub mod scoring;
pub mod signals;

pub use config::{BusinessWeights, Config, ReviewerWeights};
pub use error::{Result, RiskError};
pub use normalize::{zscore, SignalStats};
pub use reconcile::SignalColumn;
pub use scoring::{build_business_risk_table, build_reviewer_risk_table, RiskAggregator, SignalSpec};
pub use signals::{BusinessSignals, ReviewerSignals};
