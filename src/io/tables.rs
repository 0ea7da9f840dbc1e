//! CSV reading and writing for the long-format tables
//!
//! The master table round-trips through the canonical column order; absent
//! values and unassigned conditions are empty cells. Reading validates the
//! required columns up front, before any row is parsed.

use std::collections::HashMap;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::config::{MetricType, WellId};
use crate::data::{MasterRecord, MasterTable};
use crate::error::{MeaError, Result};
use crate::normalization::{BaselineQcEntry, NormalizedRecord, NormalizedTable};
use crate::outliers::FlaggedRecord;
use crate::testing::TimepointComparison;

fn fmt_f64(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        String::new()
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(fmt_f64).unwrap_or_default()
}

/// Header lookup for a CSV file; missing required columns are fatal before
/// any row is read.
struct Columns {
    index: HashMap<String, usize>,
    path: String,
}

impl Columns {
    fn new(headers: &StringRecord, path: &Path) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Columns {
            index,
            path: path.display().to_string(),
        }
    }

    fn require(&self, column: &str) -> Result<usize> {
        self.index
            .get(column)
            .copied()
            .ok_or_else(|| MeaError::MissingColumn {
                column: column.to_string(),
                path: self.path.clone(),
            })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
}

fn cell<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

fn opt_cell(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.map(|i| cell(record, i))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_f64(record: &StringRecord, idx: usize, column: &str) -> Result<Option<f64>> {
    let raw = cell(record, idx);
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| MeaError::InvalidValue {
            column: column.to_string(),
            value: raw.to_string(),
        })
}

fn parse_master_record(record: &StringRecord, cols: &MasterColumns) -> Result<MasterRecord> {
    let time_point_raw = cell(record, cols.time_point);
    let time_point: u32 = time_point_raw
        .parse()
        .map_err(|_| MeaError::InvalidValue {
            column: "time_point".to_string(),
            value: time_point_raw.to_string(),
        })?;

    let metric_type_raw = cell(record, cols.metric_type);
    let metric_type: MetricType = metric_type_raw.parse()?;

    Ok(MasterRecord {
        plate_id: cell(record, cols.plate_id).to_string(),
        time_point,
        well: WellId::parse(cell(record, cols.well))?,
        condition: opt_cell(record, cols.condition),
        condition_color: opt_cell(record, cols.condition_color),
        metric: cell(record, cols.metric).to_string(),
        value: parse_f64(record, cols.value, "value")?,
        metric_type,
    })
}

struct MasterColumns {
    plate_id: usize,
    time_point: usize,
    well: usize,
    condition: Option<usize>,
    condition_color: Option<usize>,
    metric: usize,
    value: usize,
    metric_type: usize,
}

impl MasterColumns {
    fn resolve(cols: &Columns) -> Result<Self> {
        Ok(MasterColumns {
            plate_id: cols.require("plate_id")?,
            time_point: cols.require("time_point")?,
            well: cols.require("well")?,
            condition: cols.optional("condition"),
            condition_color: cols.optional("condition_color"),
            metric: cols.require("metric")?,
            value: cols.require("value")?,
            metric_type: cols.require("metric_type")?,
        })
    }
}

fn master_row(record: &MasterRecord) -> Vec<String> {
    vec![
        record.plate_id.clone(),
        record.time_point.to_string(),
        record.well.to_string(),
        record.condition.clone().unwrap_or_default(),
        record.condition_color.clone().unwrap_or_default(),
        record.metric.clone(),
        fmt_opt(record.value),
        record.metric_type.to_string(),
    ]
}

/// Write the master table in the canonical column order.
pub fn write_master_table<P: AsRef<Path>>(path: P, table: &MasterTable) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path.as_ref())?;
    writer.write_record(crate::data::table::MASTER_COLUMNS)?;
    for record in table.records() {
        writer.write_record(master_row(record))?;
    }
    writer.flush()?;
    log::info!(
        "Wrote master table ({} rows): {}",
        table.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Read a master table CSV, validating required columns first.
pub fn read_master_table<P: AsRef<Path>>(path: P) -> Result<MasterTable> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new().from_path(path)?;
    let cols = Columns::new(reader.headers()?, path);
    let master_cols = MasterColumns::resolve(&cols)?;

    let mut records = Vec::new();
    for row in reader.records() {
        records.push(parse_master_record(&row?, &master_cols)?);
    }
    Ok(MasterTable::new(records))
}

const NORMALIZED_EXTRA: [&str; 3] = ["baseline_value", "value_norm", "exclusion_reason"];

/// Write a normalized table: the master columns plus baseline_value,
/// value_norm and exclusion_reason.
pub fn write_normalized_table<P: AsRef<Path>>(path: P, table: &NormalizedTable) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path.as_ref())?;
    let header: Vec<&str> = crate::data::table::MASTER_COLUMNS
        .iter()
        .copied()
        .chain(NORMALIZED_EXTRA)
        .collect();
    writer.write_record(&header)?;

    for row in table.rows() {
        let mut fields = master_row(&row.record);
        fields.push(fmt_opt(row.baseline));
        fields.push(fmt_opt(row.value_norm));
        fields.push(row.exclusion.map(|r| r.to_string()).unwrap_or_default());
        writer.write_record(fields)?;
    }
    writer.flush()?;
    log::info!(
        "Wrote normalized table ({} rows): {}",
        table.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Read a normalized table CSV (as written by [`write_normalized_table`]).
pub fn read_normalized_table<P: AsRef<Path>>(path: P) -> Result<NormalizedTable> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new().from_path(path)?;
    let cols = Columns::new(reader.headers()?, path);
    let master_cols = MasterColumns::resolve(&cols)?;
    let baseline_col = cols.optional("baseline_value");
    let norm_col = cols.require("value_norm")?;
    let exclusion_col = cols.optional("exclusion_reason");

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record = parse_master_record(&row, &master_cols)?;
        let baseline = match baseline_col {
            Some(i) => parse_f64(&row, i, "baseline_value")?,
            None => None,
        };
        let value_norm = parse_f64(&row, norm_col, "value_norm")?;
        let exclusion = opt_cell(&row, exclusion_col)
            .map(|s| s.parse())
            .transpose()?;
        rows.push(NormalizedRecord {
            record,
            baseline,
            value_norm,
            exclusion,
        });
    }
    Ok(NormalizedTable::new(rows))
}

/// Write the baseline QC table (one row per excluded well x metric group).
pub fn write_qc_table<P: AsRef<Path>>(path: P, entries: &[BaselineQcEntry]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path.as_ref())?;
    writer.write_record(["plate_id", "well", "metric", "baseline_value", "exclusion_reason"])?;
    for entry in entries {
        writer.write_record([
            entry.plate_id.clone(),
            entry.well.to_string(),
            entry.metric.clone(),
            fmt_opt(entry.baseline_value),
            entry.reason.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the flagged-outlier report.
pub fn write_outlier_report<P: AsRef<Path>>(path: P, rows: &[&FlaggedRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path.as_ref())?;
    writer.write_record([
        "plate_id",
        "condition",
        "well",
        "time_point",
        "metric",
        "value",
        "outlier_score",
        "outlier_group_n",
        "outlier_method",
        "outlier_threshold",
    ])?;
    for row in rows {
        writer.write_record([
            row.record.plate_id.clone(),
            row.record.condition.clone().unwrap_or_default(),
            row.record.well.to_string(),
            row.record.time_point.to_string(),
            row.record.metric.clone(),
            fmt_opt(row.record.value),
            fmt_opt(row.flag.score),
            row.flag.group_n.to_string(),
            row.flag.method.to_string(),
            row.flag.threshold.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the three result tables of a time-point comparison, using
/// `prefix` to derive the file names.
pub fn write_comparison<P: AsRef<Path>>(prefix: P, result: &TimepointComparison) -> Result<()> {
    let prefix = prefix.as_ref();
    let with_suffix = |suffix: &str| {
        let mut name = prefix.as_os_str().to_os_string();
        name.push(suffix);
        std::path::PathBuf::from(name)
    };

    let mut writer = WriterBuilder::new().from_path(with_suffix("_descriptives.csv"))?;
    writer.write_record(["condition", "n", "mean", "sem", "median", "std"])?;
    for d in &result.descriptives {
        writer.write_record([
            d.condition.clone(),
            d.n.to_string(),
            fmt_f64(d.mean),
            fmt_opt(d.sem),
            fmt_f64(d.median),
            fmt_opt(d.std),
        ])?;
    }
    writer.flush()?;

    let mut writer = WriterBuilder::new().from_path(with_suffix("_omnibus.csv"))?;
    writer.write_record([
        "metric",
        "time_point",
        "plate_id",
        "test_family",
        "test",
        "statistic",
        "p_value",
        "k_groups",
        "min_n_per_group",
    ])?;
    let o = &result.omnibus;
    writer.write_record([
        o.metric.clone(),
        o.time_point.to_string(),
        o.plate_id.clone().unwrap_or_else(|| "ALL".to_string()),
        o.family.to_string(),
        o.test.to_string(),
        fmt_f64(o.statistic),
        fmt_f64(o.p_value),
        o.k_groups.to_string(),
        o.min_n_per_group.to_string(),
    ])?;
    writer.flush()?;

    let mut writer = WriterBuilder::new().from_path(with_suffix("_pairwise.csv"))?;
    writer.write_record([
        "condition_a",
        "condition_b",
        "n_a",
        "n_b",
        "test",
        "statistic",
        "p_value",
        "p_adj",
        "effect_size",
    ])?;
    for p in &result.pairwise {
        writer.write_record([
            p.condition_a.clone(),
            p.condition_b.clone(),
            p.n_a.to_string(),
            p.n_b.to_string(),
            p.test.to_string(),
            fmt_f64(p.statistic),
            fmt_f64(p.p_value),
            fmt_f64(p.p_adj),
            fmt_opt(p.effect_size),
        ])?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::test_support::record;
    use crate::normalization::{baseline_normalize, NormalizeOptions};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn sample_table() -> MasterTable {
        MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(10.0), Some("Control")),
            record("A1", 1, "Bursts", Some(20.5), Some("Control")),
            record("B1", 0, "Bursts", None, None),
        ])
    }

    #[test]
    fn test_master_table_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("master.csv");

        let table = sample_table();
        write_master_table(&path, &table).unwrap();
        let loaded = read_master_table(&path).unwrap();

        assert_eq!(loaded, table);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "plate_id,time_point,well,metric,value").unwrap();
        writeln!(file, "P1,0,A1,Bursts,1.0").unwrap();

        let err = read_master_table(file.path()).unwrap_err();
        match err {
            MeaError::MissingColumn { column, .. } => assert_eq!(column, "metric_type"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_value_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "plate_id,time_point,well,condition,condition_color,metric,value,metric_type"
        )
        .unwrap();
        writeln!(file, "P1,0,A1,,,Bursts,not_a_number,count").unwrap();

        let err = read_master_table(file.path()).unwrap_err();
        assert!(matches!(err, MeaError::InvalidValue { .. }));
    }

    #[test]
    fn test_normalized_table_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("normalized.csv");

        let table = MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(10.0), Some("Control")),
            record("A1", 1, "Bursts", Some(20.0), Some("Control")),
        ]);
        let normalized = baseline_normalize(&table, &NormalizeOptions::default()).unwrap();

        write_normalized_table(&path, &normalized).unwrap();
        let loaded = read_normalized_table(&path).unwrap();

        assert_eq!(loaded.len(), normalized.len());
        assert_eq!(loaded.rows()[1].value_norm, Some(2.0));
        assert_eq!(loaded.rows()[1].baseline, Some(10.0));
    }
}
