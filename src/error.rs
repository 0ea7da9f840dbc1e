//! Error types for MEA analysis

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for MEA analysis operations
#[derive(Error, Debug)]
pub enum MeaError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Well {well} assigned to multiple conditions: '{first}' and '{second}'")]
    DuplicateWellAssignment {
        well: String,
        first: String,
        second: String,
    },

    #[error("Well {well} is listed in ignore_wells but assigned to condition '{condition}'")]
    IgnoredWellConflict { well: String, condition: String },

    #[error("Invalid well identifier: '{raw}' (expected A1-D6)")]
    InvalidWell { raw: String },

    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    #[error("Invalid value in column '{column}': '{value}'")]
    InvalidValue { column: String, value: String },

    #[error("Data directory not found: {path}")]
    DataDirNotFound { path: PathBuf },

    #[error("No CSV files with a numeric time-point prefix found in {dir}")]
    NoInputFiles { dir: PathBuf },

    #[error("'Well Averages' section not found in {path}")]
    WellAveragesNotFound { path: PathBuf },

    #[error("'Well Averages' section in {path} contains no metric rows")]
    NoMetricRows { path: PathBuf },

    #[error("Unknown {what}: '{value}' (expected one of: {expected})")]
    UnknownMethod {
        what: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Not enough conditions with n>={min_n} at time_point={time_point}: found {found}, need at least 2")]
    InsufficientConditions {
        found: usize,
        min_n: usize,
        time_point: u32,
    },

    #[error("Statistical test failed: {reason}")]
    TestFailed { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for MEA analysis operations
pub type Result<T> = std::result::Result<T, MeaError>;
