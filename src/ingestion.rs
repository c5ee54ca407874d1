//! Table ingestion and export
//!
//! Reads review events and signal tables from CSV, newline-delimited JSON or
//! Parquet (chosen by file extension) and writes result tables back out.
//! `.json` files are treated as newline-delimited, which is how review dumps
//! are distributed.

use crate::config::Config;
use crate::error::{RiskError, Result};
use crate::reconcile::require_column;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Columns a reviews table must provide.
pub const REVIEW_COLUMNS: [&str; 4] = ["user_id", "business_id", "stars", "date"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    JsonLines,
    Parquet,
}

fn format_of(path: &Path) -> Result<Format> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("csv") => Ok(Format::Csv),
        Some("json") | Some("jsonl") | Some("ndjson") => Ok(Format::JsonLines),
        Some("parquet") => Ok(Format::Parquet),
        _ => Err(RiskError::Config(format!(
            "Unsupported table format: {} (expected .csv, .json, .jsonl, .ndjson or .parquet)",
            path.display()
        ))),
    }
}

pub fn scan_table(path: &Path) -> Result<LazyFrame> {
    let format = format_of(path)?;
    if !path.exists() {
        return Err(RiskError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Table file not found: {}", path.display()),
        )));
    }

    let lf = match format {
        Format::Csv => LazyCsvReader::new(path)
            .with_try_parse_dates(true)
            .with_infer_schema_length(Some(1000))
            .finish()?,
        Format::JsonLines => LazyJsonLineReader::new(path).finish()?,
        Format::Parquet => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?,
    };
    Ok(lf)
}

pub fn read_table(path: &Path) -> Result<DataFrame> {
    let df = scan_table(path)?.collect()?;
    info!("Read {} rows from {}", df.height(), path.display());
    Ok(df)
}

pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    let format = format_of(path)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    match format {
        Format::Csv => CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .finish(df)?,
        Format::JsonLines => JsonWriter::new(&mut file)
            .with_json_format(JsonFormat::JsonLines)
            .finish(df)?,
        Format::Parquet => {
            ParquetWriter::new(&mut file).finish(df)?;
        }
    }

    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Keep `n` rows chosen by a seeded shuffle, or everything when the table
/// already fits.
pub fn sample_rows(df: DataFrame, n: usize, seed: u64) -> Result<DataFrame> {
    let total = df.height();
    if total <= n {
        return Ok(df);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let picked: Vec<IdxSize> = rand::seq::index::sample(&mut rng, total, n)
        .into_iter()
        .map(|i| i as IdxSize)
        .collect();
    let idx = IdxCa::from_vec("idx", picked);
    Ok(df.take(&idx)?)
}

/// Load review events for signal computation.
///
/// Samples down to `config.max_reviews`, coerces `stars` to a float and
/// `date` to a millisecond datetime, and drops rows missing any of
/// [`REVIEW_COLUMNS`]. `review_id` is kept when present; other columns are
/// dropped.
pub fn load_reviews(path: &Path, config: &Config) -> Result<DataFrame> {
    let raw = read_table(path)?;
    for column in REVIEW_COLUMNS {
        require_column(&raw, column)?;
    }

    let raw = match config.max_reviews {
        Some(n) if raw.height() > n => {
            info!("Sampling {} of {} reviews (seed {})", n, raw.height(), config.seed);
            sample_rows(raw, n, config.seed)?
        }
        _ => raw,
    };

    let date = if matches!(raw.column("date")?.dtype(), DataType::String) {
        col("date").str().to_datetime(
            Some(TimeUnit::Milliseconds),
            None,
            StrptimeOptions {
                strict: false,
                ..Default::default()
            },
            lit("raise"),
        )
    } else {
        col("date").cast(DataType::Datetime(TimeUnit::Milliseconds, None))
    };

    let mut columns = Vec::with_capacity(REVIEW_COLUMNS.len() + 1);
    if raw.get_column_names().contains(&"review_id") {
        columns.push(col("review_id"));
    }
    columns.extend([
        col("user_id"),
        col("business_id"),
        col("stars").cast(DataType::Float64),
        date.alias("date"),
    ]);

    let before = raw.height();
    let reviews = raw
        .lazy()
        .select(columns)
        .filter(
            col("user_id")
                .is_not_null()
                .and(col("business_id").is_not_null())
                .and(col("stars").is_not_null())
                .and(col("date").is_not_null()),
        )
        .collect()?;

    let dropped = before - reviews.height();
    if dropped > 0 {
        warn!("Dropped {} reviews with missing user, business, stars or date", dropped);
    }
    info!("Loaded {} reviews from {}", reviews.height(), path.display());
    Ok(reviews)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("trust_graph_ingestion").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_format_by_extension() {
        assert_eq!(format_of(Path::new("a/review.json")).unwrap(), Format::JsonLines);
        assert_eq!(format_of(Path::new("b.CSV")).unwrap(), Format::Csv);
        assert_eq!(format_of(Path::new("c.parquet")).unwrap(), Format::Parquet);
        assert!(matches!(format_of(Path::new("d.xlsx")), Err(RiskError::Config(_))));
    }

    #[test]
    fn test_csv_round_trip_keeps_columns() {
        let dir = temp_dir("csv");
        let path = dir.join("burst.csv");
        let mut df = df![
            "business_id" => ["b1", "b2"],
            "burst_score" => [1.5, 0.0]
        ]
        .unwrap();

        write_table(&mut df, &path).unwrap();
        let back = read_table(&path).unwrap();

        assert_eq!(back.get_column_names(), vec!["business_id", "burst_score"]);
        assert_eq!(back.height(), 2);
    }

    #[test]
    fn test_sample_rows_is_seeded() {
        let df = df!["n" => (0..100i64).collect::<Vec<_>>()].unwrap();

        let a = sample_rows(df.clone(), 10, 42).unwrap();
        let b = sample_rows(df.clone(), 10, 42).unwrap();
        assert_eq!(a.height(), 10);
        assert!(a.equals(&b));

        let all = sample_rows(df, 500, 42).unwrap();
        assert_eq!(all.height(), 100);
    }

    #[test]
    fn test_load_reviews_from_json_lines() {
        let dir = temp_dir("jsonl");
        let path = dir.join("review.json");
        fs::write(
            &path,
            concat!(
                r#"{"review_id":"r1","user_id":"u1","business_id":"b1","stars":5,"date":"2018-07-07 22:09:11","text":"great"}"#,
                "\n",
                r#"{"review_id":"r2","user_id":"u2","business_id":"b1","stars":2,"date":"2019-01-02 10:00:00","text":"meh"}"#,
                "\n",
                r#"{"review_id":"r3","user_id":null,"business_id":"b2","stars":4,"date":"2019-02-02 10:00:00","text":"ok"}"#,
                "\n"
            ),
        )
        .unwrap();

        let config = Config::default();
        let reviews = load_reviews(&path, &config).unwrap();

        assert_eq!(
            reviews.get_column_names(),
            vec!["review_id", "user_id", "business_id", "stars", "date"]
        );
        assert_eq!(reviews.height(), 2);
        assert!(matches!(
            reviews.column("date").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, _)
        ));
    }

    #[test]
    fn test_load_reviews_requires_columns() {
        let dir = temp_dir("missing");
        let path = dir.join("review.csv");
        fs::write(&path, "user_id,business_id,date\nu1,b1,2020-01-01\n").unwrap();

        let err = load_reviews(&path, &Config::default()).unwrap_err();
        assert!(matches!(err, RiskError::Schema { ref signal, .. } if signal == "stars"));
    }
}
