//! Hypothesis tests for between-condition comparisons
//!
//! Two-group: Welch's unequal-variance t-test (parametric) and the
//! two-sided Mann-Whitney U test with tie and continuity correction
//! (nonparametric). k-group: one-way ANOVA and the tie-corrected
//! Kruskal-Wallis H-test.

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use crate::error::{MeaError, Result};
use crate::stats::{average_ranks, mean, sample_variance};

fn test_failed(reason: impl Into<String>) -> MeaError {
    MeaError::TestFailed {
        reason: reason.into(),
    }
}

/// Welch's unequal-variance t-test, two-sided.
///
/// Returns (t statistic, p-value). Degrees of freedom via the
/// Welch-Satterthwaite approximation.
pub fn welch_ttest(a: &[f64], b: &[f64]) -> Result<(f64, f64)> {
    let (na, nb) = (a.len(), b.len());
    if na < 2 || nb < 2 {
        return Err(test_failed(format!(
            "Welch t-test needs at least 2 values per group (got {} and {})",
            na, nb
        )));
    }

    let (va, vb) = (sample_variance(a), sample_variance(b));
    let (sa, sb) = (va / na as f64, vb / nb as f64);
    let se = (sa + sb).sqrt();
    if se == 0.0 || !se.is_finite() {
        return Err(test_failed("zero variance in both groups"));
    }

    let t = (mean(a) - mean(b)) / se;
    let df = (sa + sb) * (sa + sb)
        / (sa * sa / (na - 1) as f64 + sb * sb / (nb - 1) as f64);

    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| test_failed(format!("t-distribution: {}", e)))?;
    let p = (2.0 * (1.0 - dist.cdf(t.abs()))).min(1.0);
    Ok((t, p))
}

/// Two-sided Mann-Whitney U test, normal approximation with tie and
/// continuity correction.
///
/// Returns (U statistic for the first group, p-value).
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> Result<(f64, f64)> {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    if a.is_empty() || b.is_empty() {
        return Err(test_failed("Mann-Whitney U needs non-empty groups"));
    }

    let combined: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    let (ranks, tie_sizes) = average_ranks(&combined);

    let r1: f64 = ranks[..a.len()].iter().sum();
    let u1 = r1 - n1 * (n1 + 1.0) / 2.0;

    let n = n1 + n2;
    let tie_term: f64 = tie_sizes
        .iter()
        .map(|&t| (t * t * t - t) as f64)
        .sum();
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance <= 0.0 {
        return Err(test_failed("all values identical, U statistic degenerate"));
    }

    let mu = n1 * n2 / 2.0;
    // continuity correction toward the mean
    let z = ((u1 - mu).abs() - 0.5).max(0.0) / variance.sqrt();

    let normal = Normal::new(0.0, 1.0).map_err(|e| test_failed(e.to_string()))?;
    let p = (2.0 * (1.0 - normal.cdf(z))).min(1.0);
    Ok((u1, p))
}

/// One-way ANOVA F-test across k groups.
pub fn oneway_anova(groups: &[&[f64]]) -> Result<(f64, f64)> {
    let k = groups.len();
    if k < 2 || groups.iter().any(|g| g.is_empty()) {
        return Err(test_failed("ANOVA needs at least 2 non-empty groups"));
    }

    let n_total: usize = groups.iter().map(|g| g.len()).sum();
    if n_total <= k {
        return Err(test_failed("ANOVA needs more observations than groups"));
    }

    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n_total as f64;

    let ss_between: f64 = groups
        .iter()
        .map(|g| {
            let m = mean(g);
            g.len() as f64 * (m - grand_mean) * (m - grand_mean)
        })
        .sum();
    let ss_within: f64 = groups
        .iter()
        .map(|g| {
            let m = mean(g);
            g.iter().map(|v| (v - m) * (v - m)).sum::<f64>()
        })
        .sum();

    let df1 = (k - 1) as f64;
    let df2 = (n_total - k) as f64;
    let ms_within = ss_within / df2;
    if ms_within == 0.0 {
        return Err(test_failed("zero within-group variance"));
    }

    let f = (ss_between / df1) / ms_within;
    let dist = FisherSnedecor::new(df1, df2)
        .map_err(|e| test_failed(format!("F-distribution: {}", e)))?;
    let p = (1.0 - dist.cdf(f)).min(1.0);
    Ok((f, p))
}

/// Kruskal-Wallis H-test across k groups, with tie correction. The p-value
/// uses the chi-squared approximation with k-1 degrees of freedom.
pub fn kruskal_wallis(groups: &[&[f64]]) -> Result<(f64, f64)> {
    let k = groups.len();
    if k < 2 || groups.iter().any(|g| g.is_empty()) {
        return Err(test_failed(
            "Kruskal-Wallis needs at least 2 non-empty groups",
        ));
    }

    let combined: Vec<f64> = groups.iter().flat_map(|g| g.iter()).copied().collect();
    let n = combined.len() as f64;
    let (ranks, tie_sizes) = average_ranks(&combined);

    let mut h = 0.0;
    let mut offset = 0usize;
    for g in groups {
        let r: f64 = ranks[offset..offset + g.len()].iter().sum();
        h += r * r / g.len() as f64;
        offset += g.len();
    }
    h = 12.0 / (n * (n + 1.0)) * h - 3.0 * (n + 1.0);

    let tie_term: f64 = tie_sizes
        .iter()
        .map(|&t| (t * t * t - t) as f64)
        .sum();
    let correction = 1.0 - tie_term / (n * n * n - n);
    if correction == 0.0 {
        return Err(test_failed("all values identical, H statistic degenerate"));
    }
    h /= correction;

    let dist = ChiSquared::new((k - 1) as f64)
        .map_err(|e| test_failed(format!("chi-squared: {}", e)))?;
    let p = (1.0 - dist.cdf(h)).min(1.0);
    Ok((h, p))
}
