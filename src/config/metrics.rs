//! Metric classification and missing-value policy
//!
//! Metrics are classified into four types from a static YAML table. The
//! type decides what a missing value means: count and rate metrics read
//! "no detected events" (fill with 0), interval/duration and derived
//! metrics read "undefined" (keep absent).

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MeaError, Result};

/// Classification of a metric, driving the missing-value policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    Count,
    Rate,
    IntervalDuration,
    Derived,
    /// Metric name absent from all four configured lists.
    Unknown,
}

impl MetricType {
    /// Whether a missing value for this type means "zero events".
    pub fn missing_means_zero(self) -> bool {
        matches!(self, MetricType::Count | MetricType::Rate)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Count => "count",
            MetricType::Rate => "rate",
            MetricType::IntervalDuration => "interval_duration",
            MetricType::Derived => "derived",
            MetricType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = MeaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "count" => Ok(MetricType::Count),
            "rate" => Ok(MetricType::Rate),
            "interval_duration" => Ok(MetricType::IntervalDuration),
            "derived" => Ok(MetricType::Derived),
            "unknown" => Ok(MetricType::Unknown),
            _ => Err(MeaError::UnknownMethod {
                what: "metric type",
                value: s.to_string(),
                expected: "count, rate, interval_duration, derived, unknown",
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MetricLists {
    #[serde(default)]
    count_metrics: Vec<String>,
    #[serde(default)]
    rate_metrics: Vec<String>,
    #[serde(default)]
    interval_duration_metrics: Vec<String>,
    #[serde(default)]
    derived_metrics: Vec<String>,
}

/// Metric classification table loaded from YAML (`metrics:` section with
/// four name lists).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    metrics: MetricLists,
}

impl MetricsConfig {
    /// Load the metrics configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MeaError::InvalidConfig {
                reason: format!("metrics config not found: {}", path.display()),
            });
        }
        let file = File::open(path)?;
        let config: MetricsConfig = serde_yaml::from_reader(file)?;
        log::info!("Loaded metrics config: {}", path.display());
        Ok(config)
    }

    /// An empty classification table: every metric classifies as Unknown.
    pub fn empty() -> Self {
        MetricsConfig {
            metrics: MetricLists::default(),
        }
    }

    /// Classify a metric name. Names absent from all four lists are Unknown.
    pub fn metric_type(&self, name: &str) -> MetricType {
        let m = &self.metrics;
        if m.count_metrics.iter().any(|n| n == name) {
            MetricType::Count
        } else if m.rate_metrics.iter().any(|n| n == name) {
            MetricType::Rate
        } else if m.interval_duration_metrics.iter().any(|n| n == name) {
            MetricType::IntervalDuration
        } else if m.derived_metrics.iter().any(|n| n == name) {
            MetricType::Derived
        } else {
            MetricType::Unknown
        }
    }

    /// All configured metric names, in config order across the four lists.
    pub fn all_metrics(&self) -> Vec<&str> {
        let m = &self.metrics;
        m.count_metrics
            .iter()
            .chain(&m.rate_metrics)
            .chain(&m.interval_duration_metrics)
            .chain(&m.derived_metrics)
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> MetricsConfig {
        serde_yaml::from_str(
            "\
metrics:
  count_metrics:
    - Number of Bursts
    - Number of Spikes
  rate_metrics:
    - Weighted Mean Firing Rate (Hz)
  interval_duration_metrics:
    - Burst Duration - Avg (sec)
  derived_metrics:
    - Synchrony Index
",
        )
        .unwrap()
    }

    #[test]
    fn test_classification() {
        let config = sample_config();
        assert_eq!(config.metric_type("Number of Bursts"), MetricType::Count);
        assert_eq!(
            config.metric_type("Weighted Mean Firing Rate (Hz)"),
            MetricType::Rate
        );
        assert_eq!(
            config.metric_type("Burst Duration - Avg (sec)"),
            MetricType::IntervalDuration
        );
        assert_eq!(config.metric_type("Synchrony Index"), MetricType::Derived);
        assert_eq!(config.metric_type("Mystery Metric"), MetricType::Unknown);
    }

    #[test]
    fn test_missing_value_policy() {
        assert!(MetricType::Count.missing_means_zero());
        assert!(MetricType::Rate.missing_means_zero());
        assert!(!MetricType::IntervalDuration.missing_means_zero());
        assert!(!MetricType::Derived.missing_means_zero());
        assert!(!MetricType::Unknown.missing_means_zero());
    }

    #[test]
    fn test_all_metrics() {
        let config = sample_config();
        assert_eq!(config.all_metrics().len(), 5);
        assert_eq!(config.all_metrics()[0], "Number of Bursts");
    }

    #[test]
    fn test_metric_type_round_trip() {
        for t in [
            MetricType::Count,
            MetricType::Rate,
            MetricType::IntervalDuration,
            MetricType::Derived,
            MetricType::Unknown,
        ] {
            assert_eq!(t.as_str().parse::<MetricType>().unwrap(), t);
        }
        assert!("durations".parse::<MetricType>().is_err());
    }
}
