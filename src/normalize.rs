//! Signal Normalizer
//!
//! Converts an arbitrary column into zero-mean, unit-variance z-scores.
//! Values that cannot be read as numbers are treated as missing: they are
//! left out of the statistics but keep their row in the output.
//!
//! Normalization never fails. A column whose standard deviation is zero or
//! undefined normalizes to exactly `0.0` on every row.

use polars::prelude::*;

/// Population statistics of the valid (present, non-NaN) values of a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation (divisor N).
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SignalStats {
    pub fn from_series(values: &Series) -> Self {
        Self::from_values(&coerce(values))
    }

    fn from_values(values: &Float64Chunked) -> Self {
        let valid: Vec<f64> = values
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();

        if valid.is_empty() {
            return Self {
                count: 0,
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }

        let n = valid.len() as f64;
        let mean = valid.iter().sum::<f64>() / n;
        let variance = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            count: valid.len(),
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        }
    }

    /// True when z-scores are undefined for this signal.
    ///
    /// A constant column is checked through `min == max` rather than the
    /// computed deviation, which can pick up rounding noise.
    pub fn is_degenerate(&self) -> bool {
        self.count == 0
            || self.min == self.max
            || !self.mean.is_finite()
            || !self.std_dev.is_finite()
            || self.std_dev == 0.0
    }
}

/// Normalize a column to z-scores using the population mean and deviation.
///
/// The output keeps the input's name and length. Missing or non-numeric
/// inputs stay null unless the column is degenerate, in which case every
/// row is `0.0`.
pub fn zscore(values: &Series) -> Series {
    let coerced = coerce(values);
    let stats = SignalStats::from_values(&coerced);
    let name = values.name();

    if stats.is_degenerate() {
        return Float64Chunked::full(name, 0.0, values.len()).into_series();
    }

    coerced
        .into_iter()
        .map(|v| {
            v.filter(|x| !x.is_nan())
                .map(|x| (x - stats.mean) / stats.std_dev)
        })
        .collect::<Float64Chunked>()
        .with_name(name)
        .into_series()
}

/// Non-strict cast to `Float64`; a dtype that cannot be cast at all reads as
/// an all-missing column.
fn coerce(values: &Series) -> Float64Chunked {
    values
        .cast(&DataType::Float64)
        .ok()
        .and_then(|s| s.f64().ok().cloned())
        .unwrap_or_else(|| Float64Chunked::full_null(values.name(), values.len()))
}
