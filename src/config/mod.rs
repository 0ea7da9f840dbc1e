//! Configuration loading for MEA analysis
//!
//! All configuration is YAML, loaded once at startup and passed explicitly
//! to the components that need it. There is no global configuration state.

mod experiment;
mod metrics;
mod wells;

pub use experiment::{ConditionSpec, ExperimentConfig, TimePointSpec};
pub use metrics::{MetricType, MetricsConfig};
pub use wells::{WellConditionMap, WellId};
