//! P-value adjustment methods for multiple testing correction
//!
//! Implements the three corrections used for pairwise condition
//! comparisons:
//! - Bonferroni family-wise error rate correction
//! - Holm step-down procedure
//! - Benjamini-Hochberg (BH) FDR correction

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MeaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PAdjustMethod {
    Bonferroni,
    Holm,
    FdrBh,
}

impl PAdjustMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PAdjustMethod::Bonferroni => "bonferroni",
            PAdjustMethod::Holm => "holm",
            PAdjustMethod::FdrBh => "fdr_bh",
        }
    }
}

impl fmt::Display for PAdjustMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PAdjustMethod {
    type Err = MeaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bonferroni" => Ok(PAdjustMethod::Bonferroni),
            "holm" => Ok(PAdjustMethod::Holm),
            "fdr_bh" => Ok(PAdjustMethod::FdrBh),
            _ => Err(MeaError::UnknownMethod {
                what: "p-value adjustment method",
                value: s.to_string(),
                expected: "bonferroni, holm, fdr_bh",
            }),
        }
    }
}

/// Adjust p-values for multiple comparisons. Empty input returns empty
/// output.
pub fn p_adjust(pvalues: &[f64], method: PAdjustMethod) -> Vec<f64> {
    let m = pvalues.len();
    if m == 0 {
        return vec![];
    }

    match method {
        PAdjustMethod::Bonferroni => pvalues
            .iter()
            .map(|&p| (p * m as f64).min(1.0))
            .collect(),
        PAdjustMethod::Holm => {
            let order = sort_order(pvalues);
            let mut adjusted = vec![0.0; m];
            let mut running_max = 0.0_f64;
            for (rank, &i) in order.iter().enumerate() {
                // step-down: (m - rank) * p, monotone non-decreasing in rank
                let adj = ((m - rank) as f64 * pvalues[i]).min(1.0);
                running_max = running_max.max(adj);
                adjusted[i] = running_max;
            }
            adjusted
        }
        PAdjustMethod::FdrBh => {
            let order = sort_order(pvalues);
            let mut adjusted = vec![0.0; m];
            let mut running_min = f64::INFINITY;
            for (rank, &i) in order.iter().enumerate().rev() {
                // BH: p * m / rank, monotone from the largest rank down
                let adj = pvalues[i] * m as f64 / (rank + 1) as f64;
                running_min = running_min.min(adj);
                adjusted[i] = running_min.min(1.0);
            }
            adjusted
        }
    }
}

fn sort_order(pvalues: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pvalues.len()).collect();
    order.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));
    order
}
