use polars::prelude::*;
use std::fs;
use std::path::PathBuf;
use trust_graph::config::Config;
use trust_graph::ingestion::{load_reviews, read_table, write_table};
use trust_graph::scoring::build_business_risk_table;
use trust_graph::signals::{BusinessSignals, ReviewerSignals};

/// Write a small review dump: a ring of three accounts posting 5-star
/// reviews for b_ring within a few days, plus organic traffic elsewhere.
fn create_reviews_csv(dir: &PathBuf) -> Result<PathBuf, Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)?;
    let path = dir.join("reviews.csv");

    let mut lines = vec!["review_id,user_id,business_id,stars,date".to_string()];
    let organic = [
        ("o1", "b_cafe", 4, "2021-01-05"),
        ("o2", "b_cafe", 3, "2021-03-10"),
        ("o3", "b_cafe", 5, "2021-06-01"),
        ("o1", "b_deli", 2, "2021-02-14"),
        ("o4", "b_deli", 4, "2021-05-20"),
        ("o2", "b_gym", 4, "2021-04-01"),
        ("o5", "b_ring", 2, "2021-01-15"),
    ];
    let ring = [
        ("ring1", "b_ring", 5, "2021-06-20"),
        ("ring2", "b_ring", 5, "2021-06-21"),
        ("ring3", "b_ring", 5, "2021-06-22"),
        ("ring1", "b_gym", 5, "2021-06-23"),
        ("ring2", "b_gym", 5, "2021-06-24"),
        ("ring3", "b_deli", 5, "2021-06-25"),
    ];

    for (i, (user, business, stars, date)) in organic.iter().chain(ring.iter()).enumerate() {
        lines.push(format!("r{},{},{},{},{}", i, user, business, stars, date));
    }
    fs::write(&path, lines.join("\n"))?;
    Ok(path)
}

fn first_key(df: &DataFrame, key: &str) -> Result<String, PolarsError> {
    Ok(df.column(key)?.str()?.get(0).unwrap_or_default().to_string())
}

#[test]
fn test_reviews_to_risk_tables() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("trust_graph_pipeline_test");
    let _ = fs::remove_dir_all(&dir);
    let reviews_path = create_reviews_csv(&dir)?;

    let config = Config {
        heavy_reviewer_threshold: 2,
        ..Config::default()
    };
    config.validate()?;

    let reviews = load_reviews(&reviews_path, &config)?;
    assert_eq!(reviews.height(), 13);

    let business = BusinessSignals::compute(&reviews, &config)?;
    let mut business_risk = business.risk_table(&config)?;

    assert_eq!(business_risk.height(), 4);
    assert_eq!(first_key(&business_risk, "business_id")?, "b_ring");

    let reviewer = ReviewerSignals::compute(&reviews, &config)?;
    let reviewer_risk = reviewer.risk_table(&config)?;
    assert_eq!(reviewer_risk.height(), 8);
    assert!(first_key(&reviewer_risk, "user_id")?.starts_with("ring"));

    // the written table reads back with the same shape and ranking
    let out = dir.join("business_risk.csv");
    write_table(&mut business_risk, &out)?;
    let back = read_table(&out)?;
    assert_eq!(back.shape(), business_risk.shape());
    assert_eq!(first_key(&back, "business_id")?, "b_ring");

    Ok(())
}

#[test]
fn test_signal_tables_from_disk_with_renamed_overlap() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("trust_graph_signal_files_test");
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir)?;

    let mut burst = df!["business_id" => ["x", "y", "z"], "burst_score" => [3.0, 1.0, 0.5]]?;
    let mut skew = df!["business_id" => ["x", "y"], "rating_skew" => [0.4, -0.1]]?;
    let mut overlap = df!["business_id" => ["z", "x"], "reviewer_overlap" => [0.1, 0.7]]?;

    write_table(&mut burst, &dir.join("burst.parquet"))?;
    write_table(&mut skew, &dir.join("skew.json"))?;
    write_table(&mut overlap, &dir.join("overlap.csv"))?;

    let risk = build_business_risk_table(
        &read_table(&dir.join("burst.parquet"))?,
        &read_table(&dir.join("skew.json"))?,
        &read_table(&dir.join("overlap.csv"))?,
        None,
    )?;

    assert_eq!(risk.height(), 3);
    assert_eq!(first_key(&risk, "business_id")?, "x");
    Ok(())
}
