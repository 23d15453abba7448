//! Tests for the raw data preview

mod common;

use std::fs::File;

use polars::prelude::*;
use stmgraph::pipeline::preview::{guess_coordinate_columns, PREVIEW_ROWS};
use stmgraph::pipeline::{is_supported_data_file, load_preview};
use tempfile::TempDir;

#[test]
fn test_csv_preview_shows_head() {
    let dir = TempDir::new().unwrap();
    let path = common::write_events_csv(dir.path());

    let preview = load_preview(&path).unwrap();
    assert_eq!(
        preview.columns,
        vec!["pickup_time", "latitude", "longitude", "fare"]
    );
    assert_eq!(preview.scanned_rows, 20);
    assert_eq!(preview.rows.len(), PREVIEW_ROWS);
    assert_eq!(preview.rows[0].len(), 4);
    assert_eq!(preview.rows[0][0], "2024-01-01 08:00:00");
    assert_eq!(preview.rows[1][3], "1.5");
}

#[test]
fn test_parquet_preview() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.parquet");
    let mut df = polars::df! {
        "Timestamp" => ["2024-01-01", "2024-01-02"],
        "lat" => [40.7, 40.8],
        "lng" => [-73.9, -74.0],
    }
    .unwrap();
    ParquetWriter::new(File::create(&path).unwrap())
        .finish(&mut df)
        .unwrap();

    let preview = load_preview(&path).unwrap();
    assert_eq!(preview.columns, vec!["Timestamp", "lat", "lng"]);
    assert_eq!(preview.rows.len(), 2);
    assert_eq!(
        guess_coordinate_columns(&preview.columns),
        (Some(0), Some(1), Some(2))
    );
}

#[test]
fn test_unsupported_and_missing_files() {
    let dir = TempDir::new().unwrap();
    assert!(!is_supported_data_file(&dir.path().join("events.json")));

    let err = load_preview(&dir.path().join("events.json")).unwrap_err();
    assert!(err.to_string().contains("Unsupported file format"));

    assert!(load_preview(&dir.path().join("missing.csv")).is_err());
}

#[test]
fn test_guess_leaves_unknown_columns_unset() {
    let columns: Vec<String> = ["pickup_time", "y", "x"].iter().map(|s| s.to_string()).collect();
    assert_eq!(guess_coordinate_columns(&columns), (None, Some(1), Some(2)));
}
