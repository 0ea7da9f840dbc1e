//! The canonical long-format master table
//!
//! One record per (plate, time point, well, metric). This is the schema
//! every downstream operation (normalization, outlier flagging, time-point
//! statistics, export) consumes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{MetricType, WellId};

/// Canonical column order of the master table.
pub const MASTER_COLUMNS: [&str; 8] = [
    "plate_id",
    "time_point",
    "well",
    "condition",
    "condition_color",
    "metric",
    "value",
    "metric_type",
];

/// One row of the master table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRecord {
    pub plate_id: String,
    pub time_point: u32,
    pub well: WellId,
    /// None for wells not assigned to any condition. This is informational,
    /// not an error.
    pub condition: Option<String>,
    pub condition_color: Option<String>,
    pub metric: String,
    /// None means the measurement is absent (missing or non-numeric in the
    /// raw export).
    pub value: Option<f64>,
    pub metric_type: MetricType,
}

/// Long-format master table over all discovered time points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterTable {
    records: Vec<MasterRecord>,
}

impl MasterTable {
    pub fn new(records: Vec<MasterRecord>) -> Self {
        MasterTable { records }
    }

    pub fn records(&self) -> &[MasterRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MasterRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn time_points(&self) -> BTreeSet<u32> {
        self.records.iter().map(|r| r.time_point).collect()
    }

    pub fn metrics(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.metric.as_str()).collect()
    }

    pub fn wells(&self) -> BTreeSet<&WellId> {
        self.records.iter().map(|r| &r.well).collect()
    }

    pub fn conditions(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .filter_map(|r| r.condition.as_deref())
            .collect()
    }

    /// Number of rows whose well has no assigned condition.
    pub fn unassigned_condition_count(&self) -> usize {
        self.records.iter().filter(|r| r.condition.is_none()).count()
    }

    pub fn log_summary(&self) {
        log::info!("Master table: {} rows", self.len());
        log::info!("  unique time points: {}", self.time_points().len());
        log::info!("  unique metrics: {}", self.metrics().len());
        log::info!("  unique wells: {}", self.wells().len());
        log::info!("  unique conditions: {}", self.conditions().len());
        log::info!(
            "  rows with unassigned condition: {}",
            self.unassigned_condition_count()
        );
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_summary_accessors() {
        let table = MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(10.0), Some("Control")),
            record("A1", 1, "Bursts", Some(20.0), Some("Control")),
            record("B1", 0, "Bursts", Some(5.0), None),
        ]);

        assert_eq!(table.len(), 3);
        assert_eq!(table.time_points().len(), 2);
        assert_eq!(table.metrics().len(), 1);
        assert_eq!(table.wells().len(), 2);
        assert_eq!(table.conditions().len(), 1);
        assert_eq!(table.unassigned_condition_count(), 1);
    }
}
