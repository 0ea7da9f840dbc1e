//! Per-metric wide table export
//!
//! Writes one CSV per metric: rows indexed by time point, columns = well
//! identifiers, values = the table's (raw or normalized) measurement. The
//! layout is meant for downstream plotting tools that want one block per
//! metric.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use ndarray::Array2;

use crate::config::MetricsConfig;
use crate::data::MasterTable;
use crate::error::{MeaError, Result};

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Subdirectory label, conventionally "raw" or "normalized".
    pub mode: String,
    /// Restrict the export to one plate when the table holds several.
    pub plate_id: Option<String>,
    /// Drop rows whose well has no assigned condition.
    pub drop_unassigned_wells: bool,
    /// Optional time-point labels written as a leading column.
    pub timepoint_labels: BTreeMap<u32, String>,
}

/// Turn a metric or plate name into a safe filename chunk.
fn safe_filename(s: &str) -> String {
    s.chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '/' => Some('-'),
            '(' | ')' | ':' | ',' => None,
            other => Some(other),
        })
        .collect()
}

/// Export one wide CSV per configured metric. Returns the directory the
/// files were written to. Fails if no metric produced a table.
pub fn export_metric_tables(
    table: &MasterTable,
    out_dir: &Path,
    metrics: &MetricsConfig,
    opts: &ExportOptions,
) -> Result<PathBuf> {
    let records: Vec<_> = table
        .records()
        .iter()
        .filter(|r| {
            if opts.drop_unassigned_wells && r.condition.is_none() {
                return false;
            }
            match &opts.plate_id {
                Some(plate) => &r.plate_id == plate,
                None => true,
            }
        })
        .collect();

    let plate_name = opts
        .plate_id
        .clone()
        .or_else(|| records.first().map(|r| r.plate_id.clone()))
        .unwrap_or_else(|| "Plate".to_string());

    let write_dir = out_dir.join(safe_filename(&plate_name)).join(&opts.mode);
    std::fs::create_dir_all(&write_dir)?;

    let mut written = 0usize;
    for metric_name in metrics.all_metrics() {
        let sub: Vec<_> = records
            .iter()
            .filter(|r| r.metric == metric_name)
            .collect();
        if sub.is_empty() {
            continue;
        }

        let time_points: Vec<u32> = {
            let set: std::collections::BTreeSet<u32> =
                sub.iter().map(|r| r.time_point).collect();
            set.into_iter().collect()
        };
        let wells: Vec<String> = {
            let set: std::collections::BTreeSet<String> =
                sub.iter().map(|r| r.well.to_string()).collect();
            set.into_iter().collect()
        };

        // Pivot with mean aggregation; duplicates should not occur in a
        // well-formed master table but averaging is a safe fallback.
        let mut sums = Array2::<f64>::zeros((time_points.len(), wells.len()));
        let mut counts = Array2::<f64>::zeros((time_points.len(), wells.len()));
        for r in &sub {
            let Some(value) = r.value else { continue };
            let (Ok(row), Ok(col)) = (
                time_points.binary_search(&r.time_point),
                wells.binary_search(&r.well.to_string()),
            ) else {
                continue;
            };
            sums[[row, col]] += value;
            counts[[row, col]] += 1.0;
        }

        let fname = format!(
            "{}__{}__{}.csv",
            safe_filename(&plate_name),
            opts.mode,
            safe_filename(metric_name)
        );
        let mut writer = WriterBuilder::new().from_path(write_dir.join(&fname))?;

        let mut header = vec!["time_point".to_string()];
        if !opts.timepoint_labels.is_empty() {
            header.push("time_label".to_string());
        }
        header.extend(wells.iter().cloned());
        writer.write_record(&header)?;

        for (row, tp) in time_points.iter().enumerate() {
            let mut fields = vec![tp.to_string()];
            if !opts.timepoint_labels.is_empty() {
                fields.push(
                    opts.timepoint_labels
                        .get(tp)
                        .cloned()
                        .unwrap_or_else(|| tp.to_string()),
                );
            }
            for col in 0..wells.len() {
                let n = counts[[row, col]];
                // blank cell for missing values
                if n == 0.0 {
                    fields.push(String::new());
                } else {
                    fields.push((sums[[row, col]] / n).to_string());
                }
            }
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        written += 1;
    }

    if written == 0 {
        return Err(MeaError::EmptyData {
            reason: "no metric tables were exported; check metric names and table contents"
                .to_string(),
        });
    }

    log::info!(
        "Exported {} metric table(s) to {}",
        written,
        write_dir.display()
    );
    Ok(write_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::test_support::record;
    use tempfile::TempDir;

    fn metrics_config() -> MetricsConfig {
        serde_yaml::from_str(
            "\
metrics:
  count_metrics: [Bursts]
  rate_metrics: []
  interval_duration_metrics: []
  derived_metrics: []
",
        )
        .unwrap()
    }

    #[test]
    fn test_export_pivots_by_time_and_well() {
        let table = MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(10.0), Some("Control")),
            record("A2", 0, "Bursts", Some(12.0), Some("Control")),
            record("A1", 1, "Bursts", Some(20.0), Some("Control")),
            // A2 missing at time point 1: blank cell expected
        ]);

        let dir = TempDir::new().unwrap();
        let opts = ExportOptions {
            mode: "raw".to_string(),
            ..ExportOptions::default()
        };
        let write_dir = export_metric_tables(&table, dir.path(), &metrics_config(), &opts).unwrap();

        let content =
            std::fs::read_to_string(write_dir.join("P1__raw__Bursts.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "time_point,A1,A2");
        assert_eq!(lines[1], "0,10,12");
        assert_eq!(lines[2], "1,20,");
    }

    #[test]
    fn test_export_with_labels_and_unassigned_drop() {
        let table = MasterTable::new(vec![
            record("A1", 0, "Bursts", Some(10.0), Some("Control")),
            record("B1", 0, "Bursts", Some(99.0), None),
        ]);

        let dir = TempDir::new().unwrap();
        let mut labels = BTreeMap::new();
        labels.insert(0, "Baseline".to_string());
        let opts = ExportOptions {
            mode: "raw".to_string(),
            drop_unassigned_wells: true,
            timepoint_labels: labels,
            ..ExportOptions::default()
        };
        let write_dir = export_metric_tables(&table, dir.path(), &metrics_config(), &opts).unwrap();

        let content =
            std::fs::read_to_string(write_dir.join("P1__raw__Bursts.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "time_point,time_label,A1");
        assert_eq!(lines[1], "0,Baseline,10");
    }

    #[test]
    fn test_export_nothing_is_error() {
        let table = MasterTable::new(vec![record(
            "A1",
            0,
            "Unlisted Metric",
            Some(1.0),
            Some("Control"),
        )]);
        let dir = TempDir::new().unwrap();
        let err = export_metric_tables(
            &table,
            dir.path(),
            &metrics_config(),
            &ExportOptions {
                mode: "raw".to_string(),
                ..ExportOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, MeaError::EmptyData { .. }));
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(
            safe_filename("Weighted Mean Firing Rate (Hz)"),
            "Weighted_Mean_Firing_Rate_Hz"
        );
        assert_eq!(safe_filename("ISI/CoV"), "ISI-CoV");
    }
}
