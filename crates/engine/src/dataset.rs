//! Product catalog loading from CSV.

use crate::types::ProductRecord;
use prodrec_core::{AppError, AppResult};
use std::io::Read;
use std::path::Path;

/// Columns every catalog must provide.
pub const REQUIRED_COLUMNS: [&str; 5] = ["productID", "description", "category", "unitprice", "country"];

/// Load product records from a CSV file with a header row.
///
/// Columns are located by name, so their order does not matter and extra
/// columns are ignored. Values are kept as text; a bad `unitprice` is left for
/// ingestion to reject for that record alone.
pub fn load_products(path: &Path) -> AppResult<Vec<ProductRecord>> {
    let file = std::fs::File::open(path)
        .map_err(|e| AppError::Dataset(format!("Failed to open dataset {:?}: {}", path, e)))?;

    let records = read_products(file)
        .map_err(|e| AppError::Dataset(format!("{:?}: {}", path, e)))?;

    tracing::info!("Loaded {} products from {:?}", records.len(), path);
    Ok(records)
}

/// Parse product records from any CSV reader.
pub fn read_products<R: Read>(reader: R) -> Result<Vec<ProductRecord>, String> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| format!("Failed to read header row: {}", e))?
        .clone();

    tracing::debug!(
        "Dataset columns: {}",
        headers.iter().collect::<Vec<_>>().join(", ")
    );

    let mut positions = [0usize; 5];
    for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| format!("Missing required column '{}'", column))?;
    }

    let mut records = Vec::new();
    for (row, result) in csv_reader.records().enumerate() {
        let line = result.map_err(|e| format!("Failed to read row {}: {}", row + 1, e))?;
        let field = |i: usize| line.get(positions[i]).unwrap_or_default().to_string();

        records.push(ProductRecord::new(field(0), field(1), field(2), field(3), field(4)));
    }

    Ok(records)
}
