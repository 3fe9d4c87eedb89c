//! Statistics for a set of timing samples: moments, a least-squares time
//! trend, and 3-sigma outlier removal.
//!
//! `crunch` mirrors the classic libMicro `crunch_stats`/`fit_line` routines:
//! same moments, same lower-middle-index median, same least-squares slope
//! used as a "time correlation" signal for warming/cooling drift across a
//! run. `remove_outliers` mirrors the recursive 3-sigma compaction callers
//! apply until the sample set stabilizes.

pub mod histogram;

/// Computed statistics for one set of timing samples, all in the same
/// unit the caller passed in (this crate never does unit conversion).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
    pub stderr: f64,
    pub conf99: f64,
    pub skew: f64,
    pub kurtosis: f64,
    pub time_correlation: f64,
}

/// Computes mean, median, stddev, standard error, 99% confidence half-width,
/// skew, kurtosis, and a least-squares time-correlation slope over `data`.
///
/// The median follows the historical convention of indexing a sorted copy
/// at `len / 2` rather than averaging the two central elements for an even
/// count. `time_correlation` is the slope `b` of `y = a + b*i` fit against
/// sample index `i`, so a run that trends slower over time reports a
/// positive slope. Panics if `data` is empty.
pub fn crunch(data: &[f64]) -> Stats {
    let count = data.len();
    assert!(count > 0, "crunch requires at least one sample");

    let mean = data.iter().sum::<f64>() / count as f64;

    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = sorted[count / 2];

    let indices: Vec<f64> = (0..count).map(|i| i as f64).collect();
    let time_correlation = fit_line(&indices, data).map(|(_, b)| b).unwrap_or(0.0);

    let mut std = 0.0;
    let mut sk = 0.0;
    let mut ku = 0.0;
    let mut max = f64::MIN;
    let mut min = f64::MAX;

    for &v in data {
        if v > max {
            max = v;
        }
        if v < min {
            min = v;
        }
        let diff = v - mean;
        let diff2 = diff * diff;
        std += diff2;
        let diff3 = diff2 * diff;
        sk += diff3;
        ku += diff3 * diff;
    }

    let cm1 = (count - 1) as f64;
    let stddev = (std / cm1).sqrt();
    let stderr = stddev / (count as f64).sqrt();
    let conf99 = stderr * 2.326;
    let std3 = stddev * stddev * stddev;
    let skew = sk / (cm1 * std3);
    let kurtosis = ku / (cm1 * std3 * stddev) - 3.0;

    Stats {
        min,
        max,
        mean,
        median,
        stddev,
        stderr,
        conf99,
        skew,
        kurtosis,
        time_correlation,
    }
}

/// Least-squares fit of `y = a + b*x`. Returns `None` when `x` has no
/// variance (the fit is degenerate), matching points lying on a vertical
/// line having no slope.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    assert_eq!(x.len(), y.len());
    let count = x.len() as f64;
    let (mut sumx, mut sumy, mut sumxy, mut sumx2) = (0.0, 0.0, 0.0, 0.0);

    for i in 0..x.len() {
        sumx += x[i];
        sumx2 += x[i] * x[i];
        sumy += y[i];
        sumxy += x[i] * y[i];
    }

    let denom = count * sumx2 - sumx * sumx;
    if denom == 0.0 {
        return None;
    }

    let a = (sumy * sumx2 - sumx * sumxy) / denom;
    let b = (count * sumxy - sumx * sumy) / denom;
    Some((a, b))
}

/// Drops every sample more than 3 standard deviations from `stats.mean`,
/// preserving the relative order of what remains. Returns the number
/// removed so the caller can decide whether to re-`crunch` and retry.
pub fn remove_outliers(data: &mut Vec<f64>, stats: &Stats) -> usize {
    let outmin = stats.mean - 3.0 * stats.stddev;
    let outmax = stats.mean + 3.0 * stats.stddev;
    let before = data.len();
    data.retain(|&v| !(v > outmax || v < outmin));
    before - data.len()
}

/// Recursively removes 3-sigma outliers until a pass removes nothing or the
/// sample count drops to 40 or fewer, re-computing stats after every pass.
/// Below 40 samples the outlier rule is too noisy to trust, so the caller's
/// initial `raw` stats are returned unchanged and no samples are dropped.
pub fn crunch_with_outliers_removed(data: &[f64]) -> (Stats, Vec<f64>, usize) {
    let raw = crunch(data);
    let mut working = data.to_vec();

    if working.len() <= 40 {
        return (raw, working, 0);
    }

    let mut corrected = raw;
    let mut total_removed = 0;

    loop {
        let removed = remove_outliers(&mut working, &corrected);
        total_removed += removed;
        if working.is_empty() {
            break;
        }
        corrected = crunch(&working);
        if removed == 0 || working.len() <= 40 {
            break;
        }
    }

    (corrected, working, total_removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crunch_is_permutation_invariant() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut b = a.clone();
        b.reverse();

        let sa = crunch(&a);
        let sb = crunch(&b);

        assert!((sa.mean - sb.mean).abs() < 1e-9);
        assert!((sa.stddev - sb.stddev).abs() < 1e-9);
        assert!((sa.median - sb.median).abs() < 1e-9);
    }

    #[test]
    fn median_uses_lower_of_the_two_central_on_even_count() {
        let data = vec![10.0, 20.0, 30.0, 40.0];
        let s = crunch(&data);
        // sorted[len/2] == sorted[2] == 30.0
        assert_eq!(s.median, 30.0);
    }

    #[test]
    fn fit_line_detects_upward_trend() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 2.0 * xi + 1.0).collect();
        let (a, b) = fit_line(&x, &y).unwrap();
        assert!((a - 1.0).abs() < 1e-9);
        assert!((b - 2.0).abs() < 1e-9);
    }

    #[test]
    fn fit_line_degenerate_when_x_constant() {
        let x = vec![5.0, 5.0, 5.0];
        let y = vec![1.0, 2.0, 3.0];
        assert!(fit_line(&x, &y).is_none());
    }

    #[test]
    fn remove_outliers_strips_far_points_and_is_idempotent() {
        let mut data: Vec<f64> = (0..50).map(|_| 10.0).collect();
        data.push(10_000.0);
        let stats = crunch(&data);
        let removed = remove_outliers(&mut data, &stats);
        assert_eq!(removed, 1);

        let stats2 = crunch(&data);
        let removed2 = remove_outliers(&mut data, &stats2);
        assert_eq!(removed2, 0);
    }

    #[test]
    fn crunch_with_outliers_removed_keeps_small_samples_untouched() {
        let data: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let (stats, kept, removed) = crunch_with_outliers_removed(&data);
        assert_eq!(removed, 0);
        assert_eq!(kept.len(), 30);
        assert_eq!(stats.mean, crunch(&data).mean);
    }
}
