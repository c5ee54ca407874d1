use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Schema error: no column for signal '{signal}' (searched: {})", .searched.join(", "))]
    Schema {
        signal: String,
        searched: Vec<String>,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl RiskError {
    pub fn schema(signal: impl Into<String>, searched: &[String]) -> Self {
        RiskError::Schema {
            signal: signal.into(),
            searched: searched.to_vec(),
        }
    }
}

impl From<polars::error::PolarsError> for RiskError {
    fn from(err: polars::error::PolarsError) -> Self {
        RiskError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;
