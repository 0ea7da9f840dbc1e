//! Between-condition statistics at a single time point
//!
//! Comparisons are cross-sectional: one metric, one time point, conditions
//! side by side. This matches common MEA reporting and avoids incorrect
//! repeated-measures assumptions.

pub mod hypothesis;
pub mod padjust;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use hypothesis::{kruskal_wallis, mann_whitney_u, oneway_anova, welch_ttest};
pub use padjust::{p_adjust, PAdjustMethod};

use crate::data::MasterTable;
use crate::error::{MeaError, Result};
use crate::stats;

/// Which family of tests to run.
///
/// Parametric: Welch t-test (2 groups) / one-way ANOVA (>=3).
/// Nonparametric: Mann-Whitney U (2 groups) / Kruskal-Wallis (>=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestFamily {
    Parametric,
    Nonparametric,
}

impl TestFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            TestFamily::Parametric => "parametric",
            TestFamily::Nonparametric => "nonparametric",
        }
    }
}

impl fmt::Display for TestFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestFamily {
    type Err = MeaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "parametric" => Ok(TestFamily::Parametric),
            "nonparametric" => Ok(TestFamily::Nonparametric),
            _ => Err(MeaError::UnknownMethod {
                what: "test family",
                value: s.to_string(),
                expected: "parametric, nonparametric",
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimepointSpec {
    pub family: TestFamily,
    /// Correction applied to the pairwise p-values only.
    pub p_adjust_method: PAdjustMethod,
    pub min_n_per_group: usize,
}

impl Default for TimepointSpec {
    fn default() -> Self {
        TimepointSpec {
            family: TestFamily::Nonparametric,
            p_adjust_method: PAdjustMethod::FdrBh,
            min_n_per_group: 3,
        }
    }
}

/// Per-condition descriptive statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionDescriptives {
    pub condition: String,
    pub n: usize,
    pub mean: f64,
    /// Undefined when n <= 1.
    pub sem: Option<f64>,
    pub median: f64,
    pub std: Option<f64>,
}

/// Result of the omnibus test across all surviving conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct OmnibusResult {
    pub metric: String,
    pub time_point: u32,
    pub plate_id: Option<String>,
    pub family: TestFamily,
    pub test: &'static str,
    pub statistic: f64,
    pub p_value: f64,
    pub k_groups: usize,
    pub min_n_per_group: usize,
}

/// One pairwise comparison between two conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseResult {
    pub condition_a: String,
    pub condition_b: String,
    pub n_a: usize,
    pub n_b: usize,
    pub test: &'static str,
    pub statistic: f64,
    pub p_value: f64,
    pub p_adj: f64,
    /// Cohen's d (pooled variance) on the parametric path; undefined for
    /// the nonparametric tests.
    pub effect_size: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TimepointComparison {
    pub descriptives: Vec<ConditionDescriptives>,
    pub omnibus: OmnibusResult,
    pub pairwise: Vec<PairwiseResult>,
}

/// Compare conditions for one metric at one time point.
///
/// Rows without an assigned condition are dropped (the comparison is only
/// meaningful across defined conditions). Conditions with fewer than
/// `min_n_per_group` valid values are hidden entirely; fewer than 2
/// surviving conditions is an error.
pub fn compare_conditions_at_timepoint(
    table: &MasterTable,
    metric: &str,
    time_point: u32,
    plate_id: Option<&str>,
    spec: &TimepointSpec,
) -> Result<TimepointComparison> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in table.records() {
        if record.metric != metric || record.time_point != time_point {
            continue;
        }
        if let Some(plate) = plate_id {
            if record.plate_id != plate {
                continue;
            }
        }
        let Some(condition) = &record.condition else { continue };
        let Some(value) = record.value else { continue };
        groups.entry(condition.clone()).or_default().push(value);
    }

    // Low-n conditions are dropped from both the descriptives and the
    // tests.
    groups.retain(|condition, values| {
        if values.len() < spec.min_n_per_group {
            log::warn!(
                "Condition '{}' has n={} < {} at time_point={}; excluded from comparison",
                condition,
                values.len(),
                spec.min_n_per_group,
                time_point
            );
            false
        } else {
            true
        }
    });

    let k = groups.len();
    if k < 2 {
        return Err(MeaError::InsufficientConditions {
            found: k,
            min_n: spec.min_n_per_group,
            time_point,
        });
    }

    let descriptives: Vec<ConditionDescriptives> = groups
        .iter()
        .map(|(condition, values)| {
            let sem = stats::sem(values);
            let std = stats::sample_std(values);
            ConditionDescriptives {
                condition: condition.clone(),
                n: values.len(),
                mean: stats::mean(values),
                sem: sem.is_finite().then_some(sem),
                median: stats::median(values),
                std: std.is_finite().then_some(std),
            }
        })
        .collect();

    let conditions: Vec<&String> = groups.keys().collect();
    let arrays: Vec<&[f64]> = groups.values().map(Vec::as_slice).collect();

    let (test, statistic, p_value) = if k == 2 {
        match spec.family {
            TestFamily::Parametric => {
                let (t, p) = welch_ttest(arrays[0], arrays[1])?;
                ("welch_ttest", t, p)
            }
            TestFamily::Nonparametric => {
                let (u, p) = mann_whitney_u(arrays[0], arrays[1])?;
                ("mannwhitney_u", u, p)
            }
        }
    } else {
        match spec.family {
            TestFamily::Parametric => {
                let (f, p) = oneway_anova(&arrays)?;
                ("oneway_anova", f, p)
            }
            TestFamily::Nonparametric => {
                let (h, p) = kruskal_wallis(&arrays)?;
                ("kruskal_wallis", h, p)
            }
        }
    };

    let omnibus = OmnibusResult {
        metric: metric.to_string(),
        time_point,
        plate_id: plate_id.map(str::to_string),
        family: spec.family,
        test,
        statistic,
        p_value,
        k_groups: k,
        min_n_per_group: spec.min_n_per_group,
    };

    // Pairwise comparisons are always computed; whether to act on them
    // given the omnibus result is the caller's decision.
    let mut pairwise: Vec<PairwiseResult> = Vec::new();
    for i in 0..k {
        for j in (i + 1)..k {
            let (a, b) = (arrays[i], arrays[j]);
            let (test, statistic, p_value, effect_size) = match spec.family {
                TestFamily::Parametric => {
                    let (t, p) = welch_ttest(a, b)?;
                    ("welch_ttest", t, p, stats::cohens_d(a, b))
                }
                TestFamily::Nonparametric => {
                    let (u, p) = mann_whitney_u(a, b)?;
                    ("mannwhitney_u", u, p, None)
                }
            };
            pairwise.push(PairwiseResult {
                condition_a: conditions[i].clone(),
                condition_b: conditions[j].clone(),
                n_a: a.len(),
                n_b: b.len(),
                test,
                statistic,
                p_value,
                p_adj: f64::NAN,
                effect_size,
            });
        }
    }

    let raw: Vec<f64> = pairwise.iter().map(|r| r.p_value).collect();
    let adjusted = p_adjust(&raw, spec.p_adjust_method);
    for (row, adj) in pairwise.iter_mut().zip(adjusted) {
        row.p_adj = adj;
    }
    pairwise.sort_by(|a, b| a.p_adj.total_cmp(&b.p_adj));

    Ok(TimepointComparison {
        descriptives,
        omnibus,
        pairwise,
    })
}
