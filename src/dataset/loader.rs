//! CSV dataset loader
//!
//! Reads a file of wearable readings into a [`Dataset`]. The header row is
//! validated before any data row is parsed, so a file with a missing column
//! fails fast and names the column instead of producing partial results.

use crate::dataset::Dataset;
use crate::error::DatasetError;
use crate::readings::{Reading, REQUIRED_COLUMNS};
use log::{debug, info};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Load a dataset from a CSV file on disk
///
/// # Errors
///
/// Returns `DatasetError` if:
/// - The file cannot be opened or read
/// - A required column is missing from the header row
/// - A data row has a missing or malformed value
/// - The file contains a header but no data rows
pub fn load(path: &Path) -> Result<Dataset, DatasetError> {
    info!("Loading dataset from {}", path.display());
    let file = File::open(path)?;
    let mut dataset = load_from_reader(file)?;
    dataset.source = path.to_path_buf();
    info!(
        "Loaded {} readings from {}",
        dataset.len(),
        path.display()
    );
    Ok(dataset)
}

/// Load a dataset from any CSV byte stream
pub fn load_from_reader<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    validate_headers(&headers)?;
    debug!("Header row validated: {:?}", headers);

    let mut readings = Vec::new();
    let mut record = csv::StringRecord::new();

    while csv_reader.read_record(&mut record).map_err(read_error)? {
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let reading: Reading = record
            .deserialize(Some(&headers))
            .map_err(|e| row_error(line, e))?;

        if let Some(column) = reading.non_finite_field() {
            return Err(DatasetError::InvalidRow {
                line,
                reason: format!("column '{}' is not a finite number", column),
            });
        }

        readings.push(reading);
    }

    if readings.is_empty() {
        return Err(DatasetError::EmptyDataset);
    }

    Ok(Dataset::with_source(Default::default(), readings))
}

/// Check that every required column is present in the header row
///
/// Returns the first missing column in `REQUIRED_COLUMNS` order.
pub fn validate_headers(headers: &csv::StringRecord) -> Result<(), DatasetError> {
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DatasetError::SchemaMismatch {
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn row_error(line: u64, e: csv::Error) -> DatasetError {
    let reason = match e.kind() {
        csv::ErrorKind::Deserialize { err, .. } => Some(err.to_string()),
        _ => None,
    };

    match reason {
        Some(reason) => DatasetError::InvalidRow { line, reason },
        None => DatasetError::Csv(e),
    }
}

/// Map a record-level read failure, reporting short or long rows by line
fn read_error(e: csv::Error) -> DatasetError {
    let invalid = match e.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => Some((
            pos.as_ref().map(|p| p.line()).unwrap_or(0),
            format!("expected {} fields, found {}", expected_len, len),
        )),
        _ => None,
    };

    match invalid {
        Some((line, reason)) => DatasetError::InvalidRow { line, reason },
        None => DatasetError::Csv(e),
    }
}
