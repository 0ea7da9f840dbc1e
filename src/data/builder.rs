//! Master table builder
//!
//! Folds per-time-point wide exports into one long-format table with plate,
//! condition and metric-type metadata attached, then applies the
//! metric-type-specific missing-value rules once to the combined table so
//! the result is independent of file order.

use std::collections::BTreeSet;
use std::path::Path;

use crate::config::{ExperimentConfig, MetricsConfig, WellConditionMap};
use crate::data::discover::discover_csv_files;
use crate::data::table::{MasterRecord, MasterTable};
use crate::error::{MeaError, Result};
use crate::io::loader::{load_well_averages, LongRow};

pub struct MasterTableBuilder<'a> {
    plate_id: String,
    wells: &'a WellConditionMap,
    metrics: &'a MetricsConfig,
    drop_ignored_wells: bool,
}

impl<'a> MasterTableBuilder<'a> {
    pub fn new(
        config: &ExperimentConfig,
        wells: &'a WellConditionMap,
        metrics: &'a MetricsConfig,
        drop_ignored_wells: bool,
    ) -> Self {
        MasterTableBuilder {
            plate_id: config.plate_id().to_string(),
            wells,
            metrics,
            drop_ignored_wells,
        }
    }

    /// Build the master table from all discovered files in `data_dir`,
    /// using the vendor well-averages parser.
    pub fn build(&self, data_dir: &Path) -> Result<MasterTable> {
        self.build_with(data_dir, |path| load_well_averages(path))
    }

    /// Build the master table with a caller-supplied per-file loader.
    ///
    /// A file that fails to load is skipped with a warning; the build fails
    /// only if every file fails.
    pub fn build_with<F>(&self, data_dir: &Path, loader: F) -> Result<MasterTable>
    where
        F: Fn(&Path) -> Result<Vec<LongRow>>,
    {
        let files = discover_csv_files(data_dir)?;
        let n_files = files.len();

        let mut records: Vec<MasterRecord> = Vec::new();
        let mut unknown_metrics: BTreeSet<String> = BTreeSet::new();
        let mut loaded_files = 0usize;

        for (time_point, path) in files {
            let rows = match loader(&path) {
                Ok(rows) => rows,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let mut n_rows = 0usize;
            for row in rows {
                if self.drop_ignored_wells && self.wells.is_ignored(&row.well) {
                    continue;
                }

                let condition = self.wells.condition_of(&row.well).map(str::to_string);
                let condition_color = condition
                    .as_deref()
                    .and_then(|c| self.wells.color_of(c))
                    .map(str::to_string);

                let metric_type = self.metrics.metric_type(&row.metric);
                if metric_type == crate::config::MetricType::Unknown
                    && unknown_metrics.insert(row.metric.clone())
                {
                    log::warn!(
                        "Metric '{}' is not listed in the metrics config; \
                         classifying as 'unknown' and keeping missing values absent",
                        row.metric
                    );
                }

                records.push(MasterRecord {
                    plate_id: self.plate_id.clone(),
                    time_point,
                    well: row.well,
                    condition,
                    condition_color,
                    metric: row.metric,
                    value: row.value,
                    metric_type,
                });
                n_rows += 1;
            }

            log::info!(
                "Time point {}: loaded {} rows from {}",
                time_point,
                n_rows,
                path.file_name().and_then(|n| n.to_str()).unwrap_or("?")
            );
            loaded_files += 1;
        }

        if loaded_files == 0 {
            return Err(MeaError::EmptyData {
                reason: format!("all {} discovered files failed to load", n_files),
            });
        }

        apply_missing_value_rules(&mut records);

        let table = MasterTable::new(records);
        table.log_summary();
        Ok(table)
    }
}

/// Apply the metric-type-specific missing-value rules to the combined
/// table: count/rate metrics with an absent value are filled with 0,
/// interval/duration, derived and unknown metrics keep the value absent.
pub fn apply_missing_value_rules(records: &mut [MasterRecord]) {
    let mut n_filled = 0usize;
    for record in records.iter_mut() {
        if record.value.is_none() && record.metric_type.missing_means_zero() {
            record.value = Some(0.0);
            n_filled += 1;
        }
    }
    let n_remaining = records.iter().filter(|r| r.value.is_none()).count();
    log::info!(
        "Missing-value rules: filled {} absent values with 0 (count/rate); \
         {} remain absent (duration/derived/unknown)",
        n_filled,
        n_remaining
    );
}
