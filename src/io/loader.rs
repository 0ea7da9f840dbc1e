//! Parser for the vendor "Neural Metrics" CSV export
//!
//! Only the "Well Averages" block is consumed: the row whose first cell is
//! "Well Averages" carries the well identifiers, the rows below carry one
//! metric each until the block ends at a blank line or the next major
//! section ("Measurement"). Section header rows without data cells and the
//! "Treatment/ID" row are skipped. Numeric coercion failures become absent
//! values, not errors.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::config::WellId;
use crate::error::{MeaError, Result};

/// One long-format row produced by the loader: (metric, well, value).
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub metric: String,
    pub well: WellId,
    pub value: Option<f64>,
}

fn first_cell(record: &StringRecord) -> &str {
    // The first cell of the file may carry a BOM (common in these exports).
    record
        .get(0)
        .unwrap_or("")
        .trim_start_matches('\u{feff}')
        .trim()
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|c| c.trim().is_empty())
}

/// Load the "Well Averages" block from a vendor export into long format.
pub fn load_well_averages(path: &Path) -> Result<Vec<LongRow>> {
    if !path.exists() {
        return Err(MeaError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut records: Vec<StringRecord> = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }

    // Find the "Well Averages" header row.
    let start = records
        .iter()
        .position(|r| first_cell(r) == "Well Averages")
        .ok_or_else(|| MeaError::WellAveragesNotFound {
            path: path.to_path_buf(),
        })?;

    // Well identifiers with their column positions. Cells that do not parse
    // as wells (e.g. stray annotation columns) are skipped with a warning.
    let mut well_columns: Vec<(usize, WellId)> = Vec::new();
    for (col, cell) in records[start].iter().enumerate().skip(1) {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        match WellId::parse(cell) {
            Ok(well) => well_columns.push((col, well)),
            Err(_) => log::warn!(
                "Ignoring non-well column '{}' in {}",
                cell,
                path.display()
            ),
        }
    }
    if well_columns.is_empty() {
        return Err(MeaError::InvalidInput {
            reason: format!(
                "'Well Averages' header in {} has no parseable well identifiers",
                path.display()
            ),
        });
    }

    let mut rows: Vec<LongRow> = Vec::new();
    let mut n_metrics = 0usize;

    for record in &records[start + 1..] {
        // The block ends at the first truly blank line.
        if is_blank(record) {
            break;
        }

        let first = first_cell(record);
        if first == "Measurement" {
            break;
        }
        if first == "Treatment/ID" {
            continue;
        }

        // Section headers like "Activity Metrics" carry no data cells.
        let has_data = record.iter().skip(1).any(|c| !c.trim().is_empty());
        if !has_data {
            continue;
        }

        for (col, well) in &well_columns {
            let value = record
                .get(*col)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse::<f64>().ok());
            rows.push(LongRow {
                metric: first.to_string(),
                well: well.clone(),
                value,
            });
        }
        n_metrics += 1;
    }

    if n_metrics == 0 {
        return Err(MeaError::NoMetricRows {
            path: path.to_path_buf(),
        });
    }

    log::debug!(
        "{}: parsed {} metrics for {} wells",
        path.display(),
        n_metrics,
        well_columns.len()
    );

    Ok(rows)
}
