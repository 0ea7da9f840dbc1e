//! mea_analysis: organization and statistics for multiwell MEA recordings
//!
//! This crate folds per-time-point "Neural Metrics" CSV exports from a
//! multielectrode-array plate reader into one long-format master table,
//! then runs the downstream analyses on it: baseline normalization,
//! outlier flagging and filtering, and between-condition hypothesis
//! testing with multiple-comparison correction.
//!
//! # Example
//!
//! ```ignore
//! use mea_analysis::prelude::*;
//!
//! // Build the master table from a config and its data directory
//! let table = organize_experiment("config.yaml", "metrics.yaml", None, true)?;
//!
//! // Normalize each well/metric series to its baseline time point
//! let normalized = baseline_normalize(&table, &NormalizeOptions::default())?;
//!
//! // Compare conditions at one time point
//! let result = compare_conditions_at_timepoint(
//!     &normalized.to_master_with_normalized_values(),
//!     "Number of Bursts",
//!     2,
//!     None,
//!     &TimepointSpec::default(),
//! )?;
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod normalization;
pub mod outliers;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        ExperimentConfig, MetricType, MetricsConfig, WellConditionMap, WellId,
    };
    pub use crate::data::{MasterRecord, MasterTable, MasterTableBuilder};
    pub use crate::error::{MeaError, Result};
    pub use crate::io::{
        export_metric_tables, load_well_averages, read_master_table, write_master_table,
        ExportOptions,
    };
    pub use crate::normalization::{
        baseline_normalize, ExclusionReason, NormalizeMethod, NormalizeOptions, NormalizedTable,
    };
    pub use crate::outliers::{
        apply_outlier_filter, flag_outliers, FilterMode, FlaggedTable, OutlierMethod, OutlierSpec,
    };
    pub use crate::testing::{
        compare_conditions_at_timepoint, p_adjust, PAdjustMethod, TestFamily, TimepointComparison,
        TimepointSpec,
    };
    pub use crate::organize_experiment;
}

use std::path::{Path, PathBuf};

use prelude::*;

/// Build the master table for one experiment: load both configs, map wells
/// to conditions, discover the per-time-point exports and fold them into
/// one long table with metadata attached and missing-value rules applied.
///
/// `data_dir` overrides the directory named in the experiment config
/// (which is otherwise resolved relative to the config file).
pub fn organize_experiment<P: AsRef<Path>>(
    experiment_config: P,
    metrics_config: P,
    data_dir: Option<PathBuf>,
    drop_ignored_wells: bool,
) -> Result<MasterTable> {
    let experiment_config = experiment_config.as_ref();
    let config = ExperimentConfig::from_yaml_file(experiment_config)?;
    let metrics = MetricsConfig::from_yaml_file(metrics_config)?;
    let wells = WellConditionMap::from_config(&config)?;

    let data_dir = data_dir.unwrap_or_else(|| config.resolve_data_dir(experiment_config));
    let builder = MasterTableBuilder::new(&config, &wells, &metrics, drop_ignored_wells);
    builder.build(&data_dir)
}
