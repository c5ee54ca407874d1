//! Signal Column Reconciler
//!
//! Signal tables come from independent producers that do not always agree on
//! column names. A [`SignalColumn`] lists the accepted spellings of one
//! logical signal in priority order; reconciliation renames the first match
//! to the canonical name so that scoring only ever sees canonical columns.

use crate::error::{RiskError, Result};
use polars::prelude::*;
use tracing::debug;

/// Accepted spellings of the overlap signal, highest priority first.
pub const OVERLAP_ALIASES: [&str; 4] = [
    "overlap_score",
    "overlap_ratio",
    "reviewer_overlap",
    "frac_heavy_reviewers",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalColumn {
    pub canonical: String,
    /// Scanned in order; the canonical name is not implied and must be
    /// listed if it is accepted.
    pub aliases: Vec<String>,
}

impl SignalColumn {
    pub fn new(canonical: &str, aliases: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// A signal accepted only under its canonical name.
    pub fn exact(canonical: &str) -> Self {
        Self::new(canonical, &[canonical])
    }

    pub fn overlap() -> Self {
        Self::new("overlap_score", &OVERLAP_ALIASES)
    }

    /// Find the column of `df` carrying this signal.
    pub fn resolve<'a>(&'a self, df: &DataFrame) -> Result<&'a str> {
        let present = df.get_column_names();
        self.aliases
            .iter()
            .find(|alias| present.contains(&alias.as_str()))
            .map(|alias| alias.as_str())
            .ok_or_else(|| RiskError::schema(&self.canonical, &self.aliases))
    }

    /// Rename the resolved column to the canonical name.
    pub fn reconcile(&self, mut df: DataFrame) -> Result<DataFrame> {
        let found = self.resolve(&df)?;
        if found != self.canonical {
            debug!("Reconciling column '{}' as '{}'", found, self.canonical);
            if df.get_column_names().contains(&self.canonical.as_str()) {
                // a lower-priority column already holds the canonical name
                let _ = df.drop_in_place(&self.canonical)?;
            }
            df.rename(found, &self.canonical)?;
        }
        Ok(df)
    }
}

/// Fail with a schema error unless `df` has a column named `name`.
pub fn require_column(df: &DataFrame, name: &str) -> Result<()> {
    if df.get_column_names().contains(&name) {
        Ok(())
    } else {
        Err(RiskError::schema(name, &[name.to_string()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_renames_alias() {
        let df = df![
            "business_id" => ["a", "b"],
            "overlap_ratio" => [0.5, 0.1]
        ]
        .unwrap();

        let out = SignalColumn::overlap().reconcile(df).unwrap();
        assert_eq!(out.get_column_names(), vec!["business_id", "overlap_score"]);
    }

    #[test]
    fn test_reconcile_priority_order() {
        let df = df![
            "business_id" => ["a"],
            "reviewer_overlap" => [0.2],
            "overlap_ratio" => [0.9]
        ]
        .unwrap();

        let column = SignalColumn::overlap();
        assert_eq!(column.resolve(&df).unwrap(), "overlap_ratio");

        let out = column.reconcile(df).unwrap();
        let v = out.column("overlap_score").unwrap().f64().unwrap().get(0);
        assert_eq!(v, Some(0.9));
    }

    #[test]
    fn test_canonical_wins_over_aliases() {
        let df = df![
            "business_id" => ["a"],
            "frac_heavy_reviewers" => [0.2],
            "overlap_score" => [0.7]
        ]
        .unwrap();

        let out = SignalColumn::overlap().reconcile(df).unwrap();
        assert_eq!(out.width(), 3);
        let v = out.column("overlap_score").unwrap().f64().unwrap().get(0);
        assert_eq!(v, Some(0.7));
    }

    #[test]
    fn test_missing_alias_is_schema_error() {
        let df = df![
            "business_id" => ["a"],
            "overlap" => [0.2]
        ]
        .unwrap();

        match SignalColumn::overlap().reconcile(df) {
            Err(RiskError::Schema { signal, searched }) => {
                assert_eq!(signal, "overlap_score");
                assert_eq!(searched.len(), OVERLAP_ALIASES.len());
                assert!(searched.contains(&"overlap_ratio".to_string()));
            }
            other => panic!("expected schema error, got {:?}", other.map(|d| d.shape())),
        }
    }

    #[test]
    fn test_require_column() {
        let df = df!["user_id" => ["u1"]].unwrap();
        assert!(require_column(&df, "user_id").is_ok());
        assert!(matches!(
            require_column(&df, "business_id"),
            Err(RiskError::Schema { .. })
        ));
    }
}
