//! Experiment configuration (plate layout, conditions, time-point labels)

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MeaError, Result};

/// One experimental condition: the wells it occupies and its display color.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub wells: Vec<String>,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Optional mapping of a time-point index to a human-readable label
/// (e.g. 0 -> "Baseline", 1 -> "1h", 2 -> "24h").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimePointSpec {
    pub index: u32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExperimentSection {
    plate_id: String,
    data_dir: String,
}

/// Per-experiment configuration loaded from YAML.
///
/// Required sections: `experiment` (plate_id, data_dir) and `conditions`.
/// `ignore_wells` and `time_points` are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    experiment: ExperimentSection,
    pub conditions: BTreeMap<String, ConditionSpec>,
    #[serde(default)]
    pub ignore_wells: Vec<String>,
    #[serde(default)]
    pub time_points: Vec<TimePointSpec>,
}

impl ExperimentConfig {
    /// Load an experiment configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MeaError::InvalidConfig {
                reason: format!("experiment config not found: {}", path.display()),
            });
        }
        let file = File::open(path)?;
        let config: ExperimentConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        log::info!("Loaded experiment config: {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.experiment.plate_id.trim().is_empty() {
            return Err(MeaError::InvalidConfig {
                reason: "experiment.plate_id must not be empty".to_string(),
            });
        }
        if self.conditions.is_empty() {
            return Err(MeaError::InvalidConfig {
                reason: "at least one condition must be defined".to_string(),
            });
        }
        Ok(())
    }

    pub fn plate_id(&self) -> &str {
        &self.experiment.plate_id
    }

    /// Resolve the experiment's data directory relative to the directory
    /// containing the config file.
    pub fn resolve_data_dir<P: AsRef<Path>>(&self, config_path: P) -> PathBuf {
        let base = config_path
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        base.join(&self.experiment.data_dir)
    }

    /// Map from time-point index to label. Empty if no time_points section.
    pub fn timepoint_labels(&self) -> BTreeMap<u32, String> {
        self.time_points
            .iter()
            .map(|tp| (tp.index, tp.label.clone()))
            .collect()
    }
}
