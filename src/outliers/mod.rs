//! Cross-sectional outlier flagging and filtering
//!
//! Outliers are flagged, never silently removed: flagging is a read-only
//! annotation pass over the master table, and the user chooses a removal
//! policy afterwards. Scores are computed per group (default grouping:
//! plate, metric, condition, time point); groups with too few valid values
//! or zero spread are skipped, which is a documented no-op rather than an
//! error.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::{MasterRecord, MasterTable};
use crate::error::{MeaError, Result};
use crate::stats;

/// Scoring method for outlier detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierMethod {
    /// (x - mean) / sample std (n-1 denominator)
    ZScore,
    /// 0.6745 * (x - median) / MAD
    RobustZScore,
}

impl OutlierMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            OutlierMethod::ZScore => "zscore",
            OutlierMethod::RobustZScore => "robust_zscore",
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlierMethod {
    type Err = MeaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zscore" => Ok(OutlierMethod::ZScore),
            "robust_zscore" => Ok(OutlierMethod::RobustZScore),
            _ => Err(MeaError::UnknownMethod {
                what: "outlier method",
                value: s.to_string(),
                expected: "zscore, robust_zscore",
            }),
        }
    }
}

/// Fields a flagging group key can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    PlateId,
    Metric,
    Condition,
    TimePoint,
    Well,
}

#[derive(Debug, Clone)]
pub struct OutlierSpec {
    pub method: OutlierMethod,
    pub threshold: f64,
    pub min_group_n: usize,
    pub group_by: Vec<GroupField>,
}

impl Default for OutlierSpec {
    fn default() -> Self {
        OutlierSpec {
            method: OutlierMethod::ZScore,
            threshold: 3.0,
            min_group_n: 3,
            group_by: vec![
                GroupField::PlateId,
                GroupField::Metric,
                GroupField::Condition,
                GroupField::TimePoint,
            ],
        }
    }
}

/// Annotation attached to a master record by the flagger. Values are never
/// altered.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierFlag {
    pub is_outlier: bool,
    pub score: Option<f64>,
    pub method: OutlierMethod,
    pub threshold: f64,
    /// Number of valid values in the record's group (0 when the record
    /// belongs to no group, e.g. unassigned condition).
    pub group_n: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedRecord {
    pub record: MasterRecord,
    pub flag: OutlierFlag,
}

/// Master table with outlier annotations, in the original row order.
#[derive(Debug, Clone, Default)]
pub struct FlaggedTable {
    rows: Vec<FlaggedRecord>,
}

impl FlaggedTable {
    pub fn rows(&self) -> &[FlaggedRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_flagged(&self) -> usize {
        self.rows.iter().filter(|r| r.flag.is_outlier).count()
    }

    /// Flagged rows only, sorted by (metric, condition, well, time point).
    pub fn report(&self) -> Vec<&FlaggedRecord> {
        let mut flagged: Vec<&FlaggedRecord> =
            self.rows.iter().filter(|r| r.flag.is_outlier).collect();
        flagged.sort_by(|a, b| {
            (
                &a.record.metric,
                &a.record.condition,
                &a.record.well,
                a.record.time_point,
            )
                .cmp(&(
                    &b.record.metric,
                    &b.record.condition,
                    &b.record.well,
                    b.record.time_point,
                ))
        });
        flagged
    }
}

fn group_key(record: &MasterRecord, fields: &[GroupField]) -> Option<Vec<String>> {
    let mut key = Vec::with_capacity(fields.len());
    for field in fields {
        match field {
            GroupField::PlateId => key.push(record.plate_id.clone()),
            GroupField::Metric => key.push(record.metric.clone()),
            // Records without a condition belong to no group and are left
            // unflagged.
            GroupField::Condition => key.push(record.condition.clone()?),
            GroupField::TimePoint => key.push(record.time_point.to_string()),
            GroupField::Well => key.push(record.well.to_string()),
        }
    }
    Some(key)
}

/// Compute the flags for one group of rows. Returns one flag per index,
/// in the same order as `indices`.
fn flag_group(
    records: &[MasterRecord],
    indices: &[usize],
    spec: &OutlierSpec,
) -> Vec<OutlierFlag> {
    let valid: Vec<f64> = indices.iter().filter_map(|&i| records[i].value).collect();
    let n = valid.len();

    let no_scores = |n: usize| {
        indices
            .iter()
            .map(|_| OutlierFlag {
                is_outlier: false,
                score: None,
                method: spec.method,
                threshold: spec.threshold,
                group_n: n,
            })
            .collect::<Vec<_>>()
    };

    if n < spec.min_group_n {
        return no_scores(n);
    }

    let (center, spread, scale) = match spec.method {
        OutlierMethod::ZScore => (stats::mean(&valid), stats::sample_std(&valid), 1.0),
        OutlierMethod::RobustZScore => (stats::median(&valid), stats::mad(&valid), 0.6745),
    };

    if spread == 0.0 || spread.is_nan() {
        return no_scores(n);
    }

    indices
        .iter()
        .map(|&i| {
            let score = records[i].value.map(|v| scale * (v - center) / spread);
            OutlierFlag {
                is_outlier: score.map_or(false, |z| z.abs() >= spec.threshold),
                score,
                method: spec.method,
                threshold: spec.threshold,
                group_n: n,
            }
        })
        .collect()
}

/// Flag outliers per group. Pure annotation pass: idempotent, values
/// untouched, row order preserved.
pub fn flag_outliers(table: &MasterTable, spec: &OutlierSpec) -> FlaggedTable {
    let records = table.records();

    let mut groups: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    let mut ungrouped: Vec<usize> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        match group_key(record, &spec.group_by) {
            Some(key) => groups.entry(key).or_default().push(i),
            None => ungrouped.push(i),
        }
    }

    let mut flags: Vec<Option<OutlierFlag>> = vec![None; records.len()];
    for indices in groups.values() {
        for (idx, flag) in indices.iter().zip(flag_group(records, indices, spec)) {
            flags[*idx] = Some(flag);
        }
    }
    for idx in ungrouped {
        flags[idx] = Some(OutlierFlag {
            is_outlier: false,
            score: None,
            method: spec.method,
            threshold: spec.threshold,
            group_n: 0,
        });
    }

    // Every index was covered by either a group or the ungrouped list.
    let fallback = OutlierFlag {
        is_outlier: false,
        score: None,
        method: spec.method,
        threshold: spec.threshold,
        group_n: 0,
    };
    let rows: Vec<FlaggedRecord> = records
        .iter()
        .cloned()
        .zip(flags.into_iter().map(|f| f.unwrap_or(fallback.clone())))
        .map(|(record, flag)| FlaggedRecord { record, flag })
        .collect();

    let out = FlaggedTable { rows };
    log::info!(
        "Outlier flagging ({}, threshold {}): {} of {} rows flagged",
        spec.method,
        spec.threshold,
        out.n_flagged(),
        out.len()
    );
    out
}

/// Removal policy applied to a previously flagged table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Flagged cells' values become absent; rows are retained.
    PointToNan,
    /// Flagged rows are removed entirely.
    DropRows,
    /// A flagged row removes its whole (plate, well, metric) series.
    DropWellMetric,
}

impl FilterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::PointToNan => "point_to_nan",
            FilterMode::DropRows => "drop_rows",
            FilterMode::DropWellMetric => "drop_well_metric",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = MeaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "point_to_nan" => Ok(FilterMode::PointToNan),
            "drop_rows" => Ok(FilterMode::DropRows),
            "drop_well_metric" => Ok(FilterMode::DropWellMetric),
            _ => Err(MeaError::UnknownMethod {
                what: "outlier filter mode",
                value: s.to_string(),
                expected: "point_to_nan, drop_rows, drop_well_metric",
            }),
        }
    }
}

/// Apply a removal policy to a flagged table, producing a plain master
/// table again.
pub fn apply_outlier_filter(table: FlaggedTable, mode: FilterMode) -> MasterTable {
    match mode {
        FilterMode::PointToNan => {
            let records = table
                .rows
                .into_iter()
                .map(|mut row| {
                    if row.flag.is_outlier {
                        row.record.value = None;
                    }
                    row.record
                })
                .collect();
            MasterTable::new(records)
        }
        FilterMode::DropRows => {
            let records = table
                .rows
                .into_iter()
                .filter(|row| !row.flag.is_outlier)
                .map(|row| row.record)
                .collect();
            MasterTable::new(records)
        }
        FilterMode::DropWellMetric => {
            let bad: std::collections::BTreeSet<(String, String, String)> = table
                .rows
                .iter()
                .filter(|row| row.flag.is_outlier)
                .map(|row| {
                    (
                        row.record.plate_id.clone(),
                        row.record.well.to_string(),
                        row.record.metric.clone(),
                    )
                })
                .collect();
            let records = table
                .rows
                .into_iter()
                .filter(|row| {
                    !bad.contains(&(
                        row.record.plate_id.clone(),
                        row.record.well.to_string(),
                        row.record.metric.clone(),
                    ))
                })
                .map(|row| row.record)
                .collect();
            MasterTable::new(records)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::test_support::record;

    /// Five Control wells at one time point, one of them far from the rest.
    fn table_with_outlier() -> MasterTable {
        MasterTable::new(vec![
            record("A1", 1, "Bursts", Some(10.0), Some("Control")),
            record("A2", 1, "Bursts", Some(11.0), Some("Control")),
            record("A3", 1, "Bursts", Some(9.0), Some("Control")),
            record("A4", 1, "Bursts", Some(10.5), Some("Control")),
            record("A5", 1, "Bursts", Some(1000.0), Some("Control")),
        ])
    }

    #[test]
    fn test_flagging_detects_extreme_value() {
        let spec = OutlierSpec {
            method: OutlierMethod::RobustZScore,
            ..OutlierSpec::default()
        };
        let flagged = flag_outliers(&table_with_outlier(), &spec);

        assert_eq!(flagged.n_flagged(), 1);
        let report = flagged.report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].record.well.as_str(), "A5");
        assert_eq!(report[0].flag.group_n, 5);
        assert!(report[0].flag.score.unwrap() > 3.0);
    }

    #[test]
    fn test_flagging_is_idempotent_and_read_only() {
        let table = table_with_outlier();
        let spec = OutlierSpec::default();

        let first = flag_outliers(&table, &spec);
        let second = flag_outliers(&table, &spec);
        assert_eq!(first.rows(), second.rows());

        // values untouched
        for (row, original) in first.rows().iter().zip(table.records()) {
            assert_eq!(row.record.value, original.value);
        }
    }

    #[test]
    fn test_small_group_is_skipped() {
        let table = MasterTable::new(vec![
            record("A1", 1, "Bursts", Some(1.0), Some("Control")),
            record("A2", 1, "Bursts", Some(100.0), Some("Control")),
        ]);
        let flagged = flag_outliers(&table, &OutlierSpec::default());

        assert_eq!(flagged.n_flagged(), 0);
        for row in flagged.rows() {
            assert_eq!(row.flag.score, None);
            assert_eq!(row.flag.group_n, 2);
        }
    }

    #[test]
    fn test_zero_variance_group_is_skipped() {
        let table = MasterTable::new(vec![
            record("A1", 1, "Bursts", Some(5.0), Some("Control")),
            record("A2", 1, "Bursts", Some(5.0), Some("Control")),
            record("A3", 1, "Bursts", Some(5.0), Some("Control")),
        ]);
        let flagged = flag_outliers(&table, &OutlierSpec::default());
        assert_eq!(flagged.n_flagged(), 0);
        assert!(flagged.rows().iter().all(|r| r.flag.score.is_none()));
    }

    #[test]
    fn test_unassigned_condition_rows_are_ungrouped() {
        let table = MasterTable::new(vec![
            record("A1", 1, "Bursts", Some(10.0), None),
            record("A2", 1, "Bursts", Some(11.0), Some("Control")),
            record("A3", 1, "Bursts", Some(9.0), Some("Control")),
            record("A4", 1, "Bursts", Some(10.0), Some("Control")),
        ]);
        let flagged = flag_outliers(&table, &OutlierSpec::default());
        assert_eq!(flagged.rows()[0].flag.group_n, 0);
        assert_eq!(flagged.rows()[1].flag.group_n, 3);
    }

    #[test]
    fn test_point_to_nan_keeps_rows() {
        let spec = OutlierSpec {
            method: OutlierMethod::RobustZScore,
            ..OutlierSpec::default()
        };
        let flagged = flag_outliers(&table_with_outlier(), &spec);
        let filtered = apply_outlier_filter(flagged, FilterMode::PointToNan);

        assert_eq!(filtered.len(), 5);
        let a5 = filtered
            .records()
            .iter()
            .find(|r| r.well.as_str() == "A5")
            .unwrap();
        assert_eq!(a5.value, None);
    }

    #[test]
    fn test_drop_rows() {
        let spec = OutlierSpec {
            method: OutlierMethod::RobustZScore,
            ..OutlierSpec::default()
        };
        let flagged = flag_outliers(&table_with_outlier(), &spec);
        let filtered = apply_outlier_filter(flagged, FilterMode::DropRows);

        assert_eq!(filtered.len(), 4);
        assert!(filtered.records().iter().all(|r| r.well.as_str() != "A5"));
    }

    #[test]
    fn test_drop_well_metric_removes_whole_series() {
        // A5 is an outlier at time point 1 only; its whole Bursts series
        // must go, including the unremarkable time point 0 row.
        let mut records = table_with_outlier().into_records();
        records.push(record("A5", 0, "Bursts", Some(10.0), Some("Control")));
        records.push(record("A5", 0, "Spikes", Some(50.0), Some("Control")));
        let table = MasterTable::new(records);

        let spec = OutlierSpec {
            method: OutlierMethod::RobustZScore,
            ..OutlierSpec::default()
        };
        let flagged = flag_outliers(&table, &spec);
        let filtered = apply_outlier_filter(flagged, FilterMode::DropWellMetric);

        assert!(filtered
            .records()
            .iter()
            .all(|r| !(r.well.as_str() == "A5" && r.metric == "Bursts")));
        // other metrics of the same well survive
        assert!(filtered
            .records()
            .iter()
            .any(|r| r.well.as_str() == "A5" && r.metric == "Spikes"));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(
            "robust_zscore".parse::<OutlierMethod>().unwrap(),
            OutlierMethod::RobustZScore
        );
        assert!("mad".parse::<OutlierMethod>().is_err());
        assert!("drop_everything".parse::<FilterMode>().is_err());
    }
}
