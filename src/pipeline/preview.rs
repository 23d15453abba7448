//! Raw data preview for the Load step (CSV and Parquet)

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

/// Rows read from the file when building a preview.
pub const PREVIEW_SCAN_ROWS: u32 = 1000;
/// Rows shown in the preview table.
pub const PREVIEW_ROWS: usize = 15;

pub const SUPPORTED_DATA_EXTENSIONS: &[&str] = &["csv", "parquet"];

/// Column names and the first rows of a raw dataset, rendered as text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows scanned (capped at [`PREVIEW_SCAN_ROWS`]).
    pub scanned_rows: usize,
}

/// Check if a file has a supported raw-data extension
pub fn is_supported_data_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            SUPPORTED_DATA_EXTENSIONS
                .iter()
                .any(|ext| e.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Scan a dataset lazily (CSV or Parquet based on extension)
pub fn scan_dataset(path: &Path) -> Result<LazyFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    Ok(lf)
}

/// Read the head of a dataset for column selection and display.
pub fn load_preview(path: &Path) -> Result<DataPreview> {
    let df = scan_dataset(path)?
        .limit(PREVIEW_SCAN_ROWS)
        .collect()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let shown = df.height().min(PREVIEW_ROWS);
    let mut rows = vec![Vec::with_capacity(columns.len()); shown];
    for column in df.get_columns() {
        let text = column.cast(&DataType::String)?;
        let values = text.str()?;
        for (row, value) in values.into_iter().take(shown).enumerate() {
            rows[row].push(value.unwrap_or("").to_string());
        }
    }

    Ok(DataPreview {
        columns,
        rows,
        scanned_rows: df.height(),
    })
}

/// Guess the time/latitude/longitude columns from their names.
pub fn guess_coordinate_columns(columns: &[String]) -> (Option<usize>, Option<usize>, Option<usize>) {
    let find = |needles: &[&str]| {
        columns.iter().position(|c| {
            let lower = c.to_lowercase();
            needles.iter().any(|n| lower == *n)
        })
    };
    (
        find(&["time", "timestamp", "datetime", "date", "created_date", "crash_date"]),
        find(&["lat", "latitude", "y"]),
        find(&["lon", "lng", "long", "longitude", "x"]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_data_file(Path::new("events.csv")));
        assert!(is_supported_data_file(Path::new("events.PARQUET")));
        assert!(!is_supported_data_file(Path::new("events.xlsx")));
        assert!(!is_supported_data_file(Path::new("events")));
    }

    #[test]
    fn test_guess_columns() {
        let columns: Vec<String> = ["id", "Timestamp", "Latitude", "Longitude"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            guess_coordinate_columns(&columns),
            (Some(1), Some(2), Some(3))
        );
    }
}
