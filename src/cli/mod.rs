//! Command-line interface for mea_analysis

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mea_analysis")]
#[command(version)]
#[command(about = "Organization and statistics for multiwell MEA recordings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the long-format master table from per-time-point exports
    #[command(
        about = "Build the long-format master table from per-time-point exports",
        long_about = "Build the long-format master table from per-time-point exports\n\n\
            Discovers '<index>_*.csv' files in the experiment's data directory, parses\n\
            the 'Well Averages' block of each, attaches plate, condition and metric-type\n\
            metadata from the configs, applies the metric-type missing-value rules and\n\
            writes one long CSV.",
        after_long_help = "\
Examples:
  # Build a master table next to the config
  mea_analysis build -c plate1/config.yaml -m metrics.yaml -o master.csv

  # Read exports from a different directory, keep ignored wells
  mea_analysis build -c config.yaml -m metrics.yaml \\
    --data-dir /data/plate1 --keep-ignored-wells -o master.csv"
    )]
    Build {
        /// Path to the experiment config YAML
        #[arg(short, long,
            long_help = "Path to the experiment config YAML.\n\
                Required sections: experiment (plate_id, data_dir) and conditions\n\
                (each with wells and color). Optional: ignore_wells, time_points.")]
        config: String,

        /// Path to the metrics classification YAML
        #[arg(short, long,
            long_help = "Path to the metrics classification YAML.\n\
                Lists metric names under count_metrics, rate_metrics,\n\
                interval_duration_metrics and derived_metrics. Unlisted metrics are\n\
                classified 'unknown' and keep missing values absent.")]
        metrics: String,

        /// Override the data directory from the config
        #[arg(long, value_name = "DIR",
            long_help = "Directory holding the per-time-point exports.\n\
                Without this, experiment.data_dir is resolved relative to the\n\
                directory containing the config file.")]
        data_dir: Option<String>,

        /// Keep wells listed in ignore_wells in the output
        #[arg(long)]
        keep_ignored_wells: bool,

        /// Output file path [default: master_table.csv]
        #[arg(short, long, default_value = "master_table.csv")]
        output: String,
    },

    /// Normalize each well/metric series to its baseline time point
    #[command(
        about = "Normalize each well/metric series to its baseline time point",
        long_about = "Normalize each well/metric series to its baseline time point\n\n\
            The baseline is the mean of the series' values at the baseline time point.\n\
            Methods: ratio (value/baseline), percent (100*value/baseline), delta\n\
            (value-baseline). Series with a missing baseline are excluded; series with\n\
            a zero baseline are excluded for ratio and percent unless\n\
            --keep-zero-baseline is given. A QC table of excluded series is written\n\
            alongside the output.",
        after_long_help = "\
Examples:
  # Ratio to time point 0
  mea_analysis normalize -i master.csv -o normalized.csv

  # Percent of a later baseline, keep excluded rows with empty values
  mea_analysis normalize -i master.csv --method percent --baseline 1 \\
    --keep-excluded-rows -o normalized.csv"
    )]
    Normalize {
        /// Master table CSV to normalize
        #[arg(short, long)]
        input: String,

        /// Normalization method [default: ratio]
        #[arg(long, default_value = "ratio",
            long_help = "Normalization method.\n\
                ratio:   value / baseline\n\
                percent: 100 * value / baseline\n\
                delta:   value - baseline (zero baselines are never excluded)")]
        method: String,

        /// Baseline time-point index [default: 0]
        #[arg(long, default_value_t = 0)]
        baseline: u32,

        /// Do not exclude series whose baseline is exactly 0
        #[arg(long)]
        keep_zero_baseline: bool,

        /// Keep excluded rows in the output with an empty normalized value
        #[arg(long)]
        keep_excluded_rows: bool,

        /// Output file path [default: normalized_table.csv]
        #[arg(short, long, default_value = "normalized_table.csv")]
        output: String,

        /// QC table path [default: baseline_qc.csv]
        #[arg(long, default_value = "baseline_qc.csv")]
        qc_output: String,
    },

    /// Flag outliers within groups, optionally filtering them out
    #[command(
        about = "Flag outliers within groups, optionally filtering them out",
        long_about = "Flag outliers within groups, optionally filtering them out\n\n\
            Groups rows by plate, metric, condition and time point, scores each value\n\
            with a z-score or a robust (median/MAD) z-score and flags values whose\n\
            absolute score exceeds the threshold. Groups smaller than --min-group-n\n\
            and rows without an assigned condition are never flagged. Flagging never\n\
            alters values; pass --filter to also remove what was flagged.",
        after_long_help = "\
Examples:
  # Report only
  mea_analysis outliers -i master.csv --report outliers.csv

  # Robust scoring, blank out flagged values in a filtered copy
  mea_analysis outliers -i master.csv --method robust_zscore \\
    --filter point_to_nan -o filtered.csv"
    )]
    Outliers {
        /// Master table CSV to scan
        #[arg(short, long)]
        input: String,

        /// Scoring method [default: zscore]
        #[arg(long, default_value = "zscore",
            long_help = "Scoring method.\n\
                zscore:        (x - mean) / std within the group\n\
                robust_zscore: 0.6745 * (x - median) / MAD within the group")]
        method: String,

        /// Absolute score above which a value is flagged [default: 3.0]
        #[arg(long, default_value_t = 3.0)]
        threshold: f64,

        /// Smallest group size that gets scored [default: 3]
        #[arg(long, default_value_t = 3)]
        min_group_n: usize,

        /// Remove flagged values and write the filtered table
        #[arg(long, value_name = "MODE",
            long_help = "Removal mode for flagged values.\n\
                point_to_nan:     blank out the flagged value, keep the row\n\
                drop_rows:        drop the flagged rows\n\
                drop_well_metric: drop the well's whole series for that metric")]
        filter: Option<String>,

        /// Flagged-rows report path [default: outlier_report.csv]
        #[arg(long, default_value = "outlier_report.csv")]
        report: String,

        /// Filtered table path, used with --filter [default: filtered_table.csv]
        #[arg(short, long, default_value = "filtered_table.csv")]
        output: String,
    },

    /// Compare conditions for one metric at one time point
    #[command(
        about = "Compare conditions for one metric at one time point",
        long_about = "Compare conditions for one metric at one time point\n\n\
            Runs an omnibus test across all conditions (Welch t / Mann-Whitney U for\n\
            2 groups, one-way ANOVA / Kruskal-Wallis for 3 or more, by --family),\n\
            then all pairwise comparisons with p-value adjustment. Conditions with\n\
            fewer than --min-n values are left out; fewer than 2 remaining conditions\n\
            is an error. Writes <prefix>_descriptives.csv, <prefix>_omnibus.csv and\n\
            <prefix>_pairwise.csv.",
        after_long_help = "\
Examples:
  # Nonparametric tests with BH correction (defaults)
  mea_analysis compare -i normalized.csv --metric \"Number of Bursts\" \\
    --time-point 2 -o bursts_t2

  # Parametric family with Holm correction, one plate only
  mea_analysis compare -i master.csv --metric \"Number of Spikes\" \\
    --time-point 1 --family parametric --p-adjust holm --plate Plate_VPA \\
    -o spikes_t1"
    )]
    Compare {
        /// Master or normalized table CSV
        #[arg(short, long)]
        input: String,

        /// Metric name to compare
        #[arg(long)]
        metric: String,

        /// Time-point index to compare at
        #[arg(long)]
        time_point: u32,

        /// Restrict the comparison to one plate
        #[arg(long)]
        plate: Option<String>,

        /// Test family [default: nonparametric]
        #[arg(long, default_value = "nonparametric",
            long_help = "Test family.\n\
                parametric:    Welch t-test / one-way ANOVA, Cohen's d effect sizes\n\
                nonparametric: Mann-Whitney U / Kruskal-Wallis")]
        family: String,

        /// Pairwise p-value adjustment [default: fdr_bh]
        #[arg(long, default_value = "fdr_bh",
            long_help = "Adjustment applied to the pairwise p-values.\n\
                bonferroni, holm, or fdr_bh (Benjamini-Hochberg)")]
        p_adjust: String,

        /// Smallest per-condition n that enters the comparison [default: 3]
        #[arg(long, default_value_t = 3)]
        min_n: usize,

        /// Output file prefix [default: comparison]
        #[arg(short, long, default_value = "comparison")]
        output: String,
    },

    /// Export one wide CSV per metric (rows = time points, columns = wells)
    #[command(
        about = "Export one wide CSV per metric (rows = time points, columns = wells)",
        long_about = "Export one wide CSV per metric (rows = time points, columns = wells)\n\n\
            Writes the tables under <out-dir>/<plate>/<mode>/. Passing the experiment\n\
            config adds a time_label column from its time_points section.",
        after_long_help = "\
Examples:
  mea_analysis export -i master.csv -m metrics.yaml --mode raw -o tables/

  # Labeled time points, assigned wells only
  mea_analysis export -i normalized.csv -m metrics.yaml -c config.yaml \\
    --mode normalized --drop-unassigned -o tables/"
    )]
    Export {
        /// Master or normalized table CSV
        #[arg(short, long)]
        input: String,

        /// Path to the metrics classification YAML
        #[arg(short, long)]
        metrics: String,

        /// Experiment config YAML, for time-point labels
        #[arg(short, long)]
        config: Option<String>,

        /// Subdirectory label, conventionally raw or normalized [default: raw]
        #[arg(long, default_value = "raw")]
        mode: String,

        /// Restrict the export to one plate
        #[arg(long)]
        plate: Option<String>,

        /// Drop wells without an assigned condition
        #[arg(long)]
        drop_unassigned: bool,

        /// Output directory [default: tables]
        #[arg(short, long, default_value = "tables")]
        out_dir: String,
    },
}
