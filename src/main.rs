//! mea_analysis command-line interface

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use mea_analysis::cli::{Cli, Commands};
use mea_analysis::io::tables::{
    write_comparison, write_normalized_table, write_outlier_report, write_qc_table,
};
use mea_analysis::outliers::GroupField;
use mea_analysis::prelude::*;

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli.command) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Build {
            config,
            metrics,
            data_dir,
            keep_ignored_wells,
            output,
        } => {
            let table = organize_experiment(
                &config,
                &metrics,
                data_dir.map(PathBuf::from),
                !keep_ignored_wells,
            )?;
            write_master_table(&output, &table)?;
            Ok(())
        }

        Commands::Normalize {
            input,
            method,
            baseline,
            keep_zero_baseline,
            keep_excluded_rows,
            output,
            qc_output,
        } => {
            let table = read_master_table(&input)?;
            let opts = NormalizeOptions {
                baseline_time_point: baseline,
                method: method.parse::<NormalizeMethod>()?,
                exclude_zero_baseline: !keep_zero_baseline,
                keep_excluded_rows,
            };
            let normalized = baseline_normalize(&table, &opts)?;

            let qc = normalized.qc_table();
            write_qc_table(&qc_output, &qc)?;
            write_normalized_table(&output, &normalized)?;
            log::info!(
                "Wrote {} normalized rows to {} ({} excluded series in {})",
                normalized.len(),
                output,
                qc.len(),
                qc_output
            );
            Ok(())
        }

        Commands::Outliers {
            input,
            method,
            threshold,
            min_group_n,
            filter,
            report,
            output,
        } => {
            let table = read_master_table(&input)?;
            let spec = OutlierSpec {
                method: method.parse::<OutlierMethod>()?,
                threshold,
                min_group_n,
                group_by: vec![
                    GroupField::PlateId,
                    GroupField::Metric,
                    GroupField::Condition,
                    GroupField::TimePoint,
                ],
            };
            let flagged = flag_outliers(&table, &spec);
            log::info!(
                "Flagged {} of {} rows as outliers",
                flagged.n_flagged(),
                flagged.len()
            );
            write_outlier_report(&report, &flagged.report())?;

            if let Some(mode) = filter {
                let mode = mode.parse::<FilterMode>()?;
                let filtered = apply_outlier_filter(flagged, mode);
                write_master_table(&output, &filtered)?;
            }
            Ok(())
        }

        Commands::Compare {
            input,
            metric,
            time_point,
            plate,
            family,
            p_adjust,
            min_n,
            output,
        } => {
            let table = read_master_table(&input)?;
            let spec = TimepointSpec {
                family: family.parse::<TestFamily>()?,
                p_adjust_method: p_adjust.parse::<PAdjustMethod>()?,
                min_n_per_group: min_n,
            };
            let result = compare_conditions_at_timepoint(
                &table,
                &metric,
                time_point,
                plate.as_deref(),
                &spec,
            )?;
            write_comparison(&output, &result)?;
            log::info!(
                "{} at t{}: {} = {:.4}, p = {:.4e} ({} pairwise comparisons)",
                metric,
                time_point,
                result.omnibus.test,
                result.omnibus.statistic,
                result.omnibus.p_value,
                result.pairwise.len()
            );
            Ok(())
        }

        Commands::Export {
            input,
            metrics,
            config,
            mode,
            plate,
            drop_unassigned,
            out_dir,
        } => {
            let table = read_master_table(&input)?;
            let metrics = MetricsConfig::from_yaml_file(&metrics)?;
            let timepoint_labels = match config {
                Some(path) => ExperimentConfig::from_yaml_file(&path)?.timepoint_labels(),
                None => Default::default(),
            };
            let opts = ExportOptions {
                mode,
                plate_id: plate,
                drop_unassigned_wells: drop_unassigned,
                timepoint_labels,
            };
            let dir = export_metric_tables(&table, PathBuf::from(out_dir).as_path(), &metrics, &opts)?;
            log::info!("Wrote metric tables under {}", dir.display());
            Ok(())
        }
    }
}
