//! Baseline normalization
//!
//! Adds a normalized value per record, computed per (plate, well, metric)
//! group relative to a baseline time point (default 0).
//!
//! Exclusion rules:
//! - baseline absent for the group -> `BaselineMissing` (cannot normalize)
//! - baseline exactly 0 with ratio/percent and zero-exclusion enabled ->
//!   `BaselineZero`; missing takes precedence over zero
//! - delta never divides, so a zero baseline does not exclude it

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::WellId;
use crate::data::{MasterRecord, MasterTable};
use crate::error::{MeaError, Result};

/// How the normalized value relates to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeMethod {
    /// value / baseline (baseline becomes ~1)
    Ratio,
    /// 100 * value / baseline (baseline becomes ~100)
    Percent,
    /// value - baseline (baseline becomes ~0)
    Delta,
}

impl NormalizeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            NormalizeMethod::Ratio => "ratio",
            NormalizeMethod::Percent => "percent",
            NormalizeMethod::Delta => "delta",
        }
    }

    fn divides_by_baseline(self) -> bool {
        matches!(self, NormalizeMethod::Ratio | NormalizeMethod::Percent)
    }
}

impl fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizeMethod {
    type Err = MeaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ratio" => Ok(NormalizeMethod::Ratio),
            "percent" => Ok(NormalizeMethod::Percent),
            "delta" => Ok(NormalizeMethod::Delta),
            _ => Err(MeaError::UnknownMethod {
                what: "normalization method",
                value: s.to_string(),
                expected: "ratio, percent, delta",
            }),
        }
    }
}

/// Why a (plate, well, metric) group was excluded from normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    BaselineMissing,
    BaselineZero,
}

impl ExclusionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExclusionReason::BaselineMissing => "baseline_missing",
            ExclusionReason::BaselineZero => "baseline_zero",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExclusionReason {
    type Err = MeaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "baseline_missing" => Ok(ExclusionReason::BaselineMissing),
            "baseline_zero" => Ok(ExclusionReason::BaselineZero),
            _ => Err(MeaError::UnknownMethod {
                what: "exclusion reason",
                value: s.to_string(),
                expected: "baseline_missing, baseline_zero",
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub baseline_time_point: u32,
    pub method: NormalizeMethod,
    /// Exclude groups whose baseline is exactly 0 (ratio/percent only).
    pub exclude_zero_baseline: bool,
    /// Keep excluded rows in the output with an absent normalized value
    /// instead of dropping them.
    pub keep_excluded_rows: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            baseline_time_point: 0,
            method: NormalizeMethod::Ratio,
            exclude_zero_baseline: true,
            keep_excluded_rows: false,
        }
    }
}

/// A master record with its group baseline and normalized value attached.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub record: MasterRecord,
    pub baseline: Option<f64>,
    pub value_norm: Option<f64>,
    pub exclusion: Option<ExclusionReason>,
}

/// One entry of the baseline QC table: an excluded (plate, well, metric)
/// group with its baseline value and the exclusion reason.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineQcEntry {
    pub plate_id: String,
    pub well: WellId,
    pub metric: String,
    pub baseline_value: Option<f64>,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    rows: Vec<NormalizedRecord>,
}

impl NormalizedTable {
    pub fn new(rows: Vec<NormalizedRecord>) -> Self {
        NormalizedTable { rows }
    }

    pub fn rows(&self) -> &[NormalizedRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct excluded groups with their reason, sorted by group key.
    pub fn qc_table(&self) -> Vec<BaselineQcEntry> {
        let mut seen: BTreeMap<(String, WellId, String), BaselineQcEntry> = BTreeMap::new();
        for row in &self.rows {
            let Some(reason) = row.exclusion else { continue };
            let key = (
                row.record.plate_id.clone(),
                row.record.well.clone(),
                row.record.metric.clone(),
            );
            seen.entry(key).or_insert_with(|| BaselineQcEntry {
                plate_id: row.record.plate_id.clone(),
                well: row.record.well.clone(),
                metric: row.record.metric.clone(),
                baseline_value: row.baseline,
                reason,
            });
        }
        seen.into_values().collect()
    }

    /// Convert back to a master table carrying the normalized values in the
    /// value column, for downstream statistics and export.
    pub fn to_master_with_normalized_values(&self) -> MasterTable {
        let records = self
            .rows
            .iter()
            .map(|row| MasterRecord {
                value: row.value_norm,
                ..row.record.clone()
            })
            .collect();
        MasterTable::new(records)
    }
}

/// Normalize values to baseline per (plate, well, metric) group.
///
/// The baseline is the mean of the group's values at the baseline time
/// point; duplicate baseline rows are averaged rather than rejected.
pub fn baseline_normalize(table: &MasterTable, opts: &NormalizeOptions) -> Result<NormalizedTable> {
    if table.is_empty() {
        return Err(MeaError::EmptyData {
            reason: "cannot normalize an empty table".to_string(),
        });
    }

    // Per-group baseline: mean over present values at the baseline time point.
    let mut sums: BTreeMap<(&str, &WellId, &str), (f64, usize)> = BTreeMap::new();
    for record in table.records() {
        if record.time_point != opts.baseline_time_point {
            continue;
        }
        let Some(value) = record.value else { continue };
        let key = (record.plate_id.as_str(), &record.well, record.metric.as_str());
        let entry = sums.entry(key).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    let baselines: BTreeMap<_, f64> = sums
        .into_iter()
        .map(|(key, (sum, n))| (key, sum / n as f64))
        .collect();

    let mut rows = Vec::with_capacity(table.len());
    for record in table.records() {
        let key = (record.plate_id.as_str(), &record.well, record.metric.as_str());
        let baseline = baselines.get(&key).copied();

        let exclusion = match baseline {
            None => Some(ExclusionReason::BaselineMissing),
            Some(b) => {
                if b == 0.0 && opts.exclude_zero_baseline && opts.method.divides_by_baseline() {
                    Some(ExclusionReason::BaselineZero)
                } else {
                    None
                }
            }
        };

        let value_norm = if exclusion.is_some() {
            None
        } else {
            match (record.value, baseline) {
                (Some(v), Some(b)) => Some(match opts.method {
                    NormalizeMethod::Ratio => v / b,
                    NormalizeMethod::Percent => 100.0 * v / b,
                    NormalizeMethod::Delta => v - b,
                }),
                _ => None,
            }
        };

        rows.push(NormalizedRecord {
            record: record.clone(),
            baseline,
            value_norm,
            exclusion,
        });
    }

    let table = NormalizedTable::new(rows);
    let n_excluded_groups = table.qc_table().len();
    if n_excluded_groups > 0 {
        log::warn!(
            "Baseline normalization excluded {} well x metric group(s); see the QC table",
            n_excluded_groups
        );
    }

    // Dropping happens after the QC bookkeeping so excluded groups are
    // still reported.
    if !opts.keep_excluded_rows {
        let qc = table.qc_table();
        let kept: Vec<NormalizedRecord> = table
            .rows
            .into_iter()
            .filter(|row| row.exclusion.is_none())
            .collect();
        let out = NormalizedTable::new(kept);
        log::info!(
            "Normalized {} rows ({} excluded group(s) dropped)",
            out.len(),
            qc.len()
        );
        return Ok(out);
    }

    log::info!("Normalized {} rows (excluded rows kept)", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::test_support::record;

    fn opts(method: NormalizeMethod) -> NormalizeOptions {
        NormalizeOptions {
            method,
            ..NormalizeOptions::default()
        }
    }

    fn norm_of(table: &NormalizedTable, well: &str, tp: u32) -> Option<f64> {
        table
            .rows()
            .iter()
            .find(|r| r.record.well.as_str() == well && r.record.time_point == tp)
            .and_then(|r| r.value_norm)
    }

    #[test]
    fn test_ratio_percent_delta_at_baseline() {
        let table = MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(10.0), Some("Control")),
            record("A1", 1, "Bursts", Some(20.0), Some("Control")),
        ]);

        let ratio = baseline_normalize(&table, &opts(NormalizeMethod::Ratio)).unwrap();
        assert!((norm_of(&ratio, "A1", 0).unwrap() - 1.0).abs() < 1e-12);
        assert!((norm_of(&ratio, "A1", 1).unwrap() - 2.0).abs() < 1e-12);

        let percent = baseline_normalize(&table, &opts(NormalizeMethod::Percent)).unwrap();
        assert!((norm_of(&percent, "A1", 0).unwrap() - 100.0).abs() < 1e-12);

        let delta = baseline_normalize(&table, &opts(NormalizeMethod::Delta)).unwrap();
        assert!(norm_of(&delta, "A1", 0).unwrap().abs() < 1e-12);
        assert!((norm_of(&delta, "A1", 1).unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_baseline_excludes_group() {
        let table = MasterTable::new(vec![
            // no time point 0 rows for B1
            record("B1", 1, "Bursts", Some(20.0), Some("Control")),
        ]);

        let out = baseline_normalize(&table, &opts(NormalizeMethod::Ratio)).unwrap();
        assert!(out.is_empty());

        let kept = baseline_normalize(
            &table,
            &NormalizeOptions {
                keep_excluded_rows: true,
                ..opts(NormalizeMethod::Ratio)
            },
        )
        .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.rows()[0].value_norm, None);
        assert_eq!(
            kept.rows()[0].exclusion,
            Some(ExclusionReason::BaselineMissing)
        );

        let qc = kept.qc_table();
        assert_eq!(qc.len(), 1);
        assert_eq!(qc[0].reason, ExclusionReason::BaselineMissing);
        assert_eq!(qc[0].baseline_value, None);
    }

    #[test]
    fn test_zero_baseline_excluded_for_percent_not_delta() {
        let table = MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(0.0), Some("Control")),
            record("A1", 1, "Bursts", Some(5.0), Some("Control")),
        ]);

        let percent = baseline_normalize(&table, &opts(NormalizeMethod::Percent)).unwrap();
        assert!(percent.is_empty());

        let kept = baseline_normalize(
            &table,
            &NormalizeOptions {
                keep_excluded_rows: true,
                ..opts(NormalizeMethod::Percent)
            },
        )
        .unwrap();
        let qc = kept.qc_table();
        assert_eq!(qc.len(), 1);
        assert_eq!(qc[0].reason, ExclusionReason::BaselineZero);
        assert_eq!(qc[0].well.as_str(), "A1");
        assert_eq!(qc[0].metric, "Bursts");

        // delta never divides by the baseline, so zero does not exclude
        let delta = baseline_normalize(&table, &opts(NormalizeMethod::Delta)).unwrap();
        assert_eq!(delta.len(), 2);
        assert!((norm_of(&delta, "A1", 1).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_baseline_kept_when_exclusion_disabled() {
        let table = MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(0.0), Some("Control")),
            record("A1", 1, "Bursts", Some(5.0), Some("Control")),
        ]);

        let out = baseline_normalize(
            &table,
            &NormalizeOptions {
                exclude_zero_baseline: false,
                ..opts(NormalizeMethod::Ratio)
            },
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert!(norm_of(&out, "A1", 1).unwrap().is_infinite());
    }

    #[test]
    fn test_duplicate_baseline_rows_are_averaged() {
        let table = MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(10.0), Some("Control")),
            record("A1", 0, "Bursts", Some(30.0), Some("Control")),
            record("A1", 1, "Bursts", Some(40.0), Some("Control")),
        ]);

        let out = baseline_normalize(&table, &opts(NormalizeMethod::Ratio)).unwrap();
        // baseline = mean(10, 30) = 20
        assert!((norm_of(&out, "A1", 1).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_groups_are_independent_per_plate() {
        let mut r1 = record("A1", 0, "Bursts", Some(10.0), Some("Control"));
        let mut r2 = record("A1", 1, "Bursts", Some(20.0), Some("Control"));
        let mut other1 = record("A1", 0, "Bursts", Some(100.0), Some("Control"));
        let mut other2 = record("A1", 1, "Bursts", Some(100.0), Some("Control"));
        r1.plate_id = "P1".into();
        r2.plate_id = "P1".into();
        other1.plate_id = "P2".into();
        other2.plate_id = "P2".into();

        let table = MasterTable::new(vec![r1, r2, other1, other2]);
        let out = baseline_normalize(&table, &opts(NormalizeMethod::Ratio)).unwrap();

        let p1 = out
            .rows()
            .iter()
            .find(|r| r.record.plate_id == "P1" && r.record.time_point == 1)
            .unwrap();
        let p2 = out
            .rows()
            .iter()
            .find(|r| r.record.plate_id == "P2" && r.record.time_point == 1)
            .unwrap();
        assert!((p1.value_norm.unwrap() - 2.0).abs() < 1e-12);
        assert!((p2.value_norm.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_absent_value_with_valid_baseline_not_excluded() {
        let table = MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(10.0), Some("Control")),
            record("A1", 1, "Bursts", None, Some("Control")),
        ]);

        let out = baseline_normalize(&table, &opts(NormalizeMethod::Ratio)).unwrap();
        assert_eq!(out.len(), 2);
        let t1 = out
            .rows()
            .iter()
            .find(|r| r.record.time_point == 1)
            .unwrap();
        assert_eq!(t1.value_norm, None);
        assert_eq!(t1.exclusion, None);
    }

    #[test]
    fn test_empty_table_is_error() {
        let err = baseline_normalize(&MasterTable::default(), &NormalizeOptions::default())
            .unwrap_err();
        assert!(matches!(err, MeaError::EmptyData { .. }));
    }
}
