//! Good/bad labelling from the tail of the failure-magnitude distribution.

/// Failure magnitude at the `(1 − threshold)` order statistic of `all_fail`.
///
/// `threshold` is a tail fraction: a larger threshold gives a lower cutoff
/// and therefore a larger bad set. Returns `f64::INFINITY` for an empty history.
pub fn bad_cutoff(all_fail: &[f64], threshold: f64) -> f64 {
    if all_fail.is_empty() {
        return f64::INFINITY;
    }
    let mut sorted: Vec<f64> = all_fail.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let t = threshold.clamp(0.0, 1.0);
    let idx = ((1.0 - t) * (sorted.len() - 1) as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Label each failure magnitude: `true` = bad (strictly above the cutoff).
///
/// Failure magnitudes are non-negative, so an exact 0 is never bad.
pub fn good_bad(fail: &[f64], cutoff: f64) -> Vec<bool> {
    fail.iter().map(|&f| f > cutoff && f > 0.0).collect()
}

/// Convenience: label `fail` against the cutoff of `history` at `threshold`.
pub fn label_points(fail: &[f64], history: &[f64], threshold: f64) -> Vec<bool> {
    good_bad(fail, bad_cutoff(history, threshold))
}
