//! Statistical utility functions shared across modules
//!
//! Contains the descriptive statistics and ranking helpers used by the
//! outlier flagger and the time-point comparison tests.

/// Arithmetic mean. Returns NaN for an empty slice.
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Sample variance with n-1 denominator. Returns NaN when n < 2.
pub fn sample_variance(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - 1) as f64
}

/// Sample standard deviation with n-1 denominator. Returns NaN when n < 2.
pub fn sample_std(x: &[f64]) -> f64 {
    sample_variance(x).sqrt()
}

/// Standard error of the mean: sample std / sqrt(n). Undefined when n <= 1.
pub fn sem(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return f64::NAN;
    }
    sample_std(x) / (x.len() as f64).sqrt()
}

/// Median. Returns NaN for an empty slice.
pub fn median(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Median absolute deviation (unscaled): median(|x - median(x)|).
pub fn mad(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let med = median(x);
    let deviations: Vec<f64> = x.iter().map(|v| (v - med).abs()).collect();
    median(&deviations)
}

/// Cohen's d with pooled standard deviation.
///
/// Returns None when either group has fewer than 2 values or the pooled
/// standard deviation is zero or undefined.
pub fn cohens_d(a: &[f64], b: &[f64]) -> Option<f64> {
    let (na, nb) = (a.len(), b.len());
    if na < 2 || nb < 2 {
        return None;
    }
    let (va, vb) = (sample_variance(a), sample_variance(b));
    let pooled =
        (((na - 1) as f64 * va + (nb - 1) as f64 * vb) / (na + nb - 2) as f64).sqrt();
    if pooled == 0.0 || !pooled.is_finite() {
        return None;
    }
    Some((mean(a) - mean(b)) / pooled)
}

/// Assign average ranks (1-based) to values, with ties sharing the mean rank.
///
/// Also returns the tie-group sizes, used by the tie corrections in the
/// Mann-Whitney and Kruskal-Wallis tests.
pub fn average_ranks(x: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let n = x.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));

    let mut ranks = vec![0.0; n];
    let mut tie_sizes = Vec::new();

    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && x[order[j + 1]] == x[order[i]] {
            j += 1;
        }
        // average of ranks i+1 ..= j+1
        let avg = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        if j > i {
            tie_sizes.push(j - i + 1);
        }
        i = j + 1;
    }

    (ranks, tie_sizes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let x = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&x) - 5.0).abs() < 1e-12);
        // sample std with n-1 denominator
        assert!((sample_std(&x) - 2.138089935299395).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(mean(&[]).is_nan());
        assert!(sample_std(&[1.0]).is_nan());
        assert!(sem(&[1.0]).is_nan());
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn test_mad() {
        // median = 2, |x - 2| = [1, 0, 0, 1, 7], mad = 1
        let x = vec![1.0, 2.0, 2.0, 3.0, 9.0];
        assert_eq!(mad(&x), 1.0);
    }

    #[test]
    fn test_cohens_d_symmetry() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![3.0, 4.0, 5.0, 6.0];
        let d_ab = cohens_d(&a, &b).unwrap();
        let d_ba = cohens_d(&b, &a).unwrap();
        assert!((d_ab + d_ba).abs() < 1e-12);
        assert!(d_ab < 0.0);
    }

    #[test]
    fn test_cohens_d_undefined() {
        assert!(cohens_d(&[1.0], &[2.0, 3.0]).is_none());
        assert!(cohens_d(&[2.0, 2.0], &[2.0, 2.0]).is_none());
    }

    #[test]
    fn test_average_ranks_with_ties() {
        let x = vec![10.0, 20.0, 20.0, 30.0];
        let (ranks, ties) = average_ranks(&x);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
        assert_eq!(ties, vec![2]);
    }
}
