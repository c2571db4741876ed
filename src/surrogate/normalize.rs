//! Sign-preserving normalisation of surrogate predictions.

use ndarray::{Array1, ArrayView1};
use statrs::function::erf::erfc;

/// Standard normal CDF `Φ(z)`.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Scale negative predictions into `[-1, 0]` and non-negative ones into
/// `[0, 1]` independently, applying each branch's factor to the matching
/// standard deviations.
///
/// A branch whose largest magnitude is 0 (or that is empty) keeps factor 1.
pub fn split_normalize(mean: ArrayView1<f64>, std: ArrayView1<f64>) -> (Array1<f64>, Array1<f64>) {
    let neg_max = mean.iter().filter(|&&m| m < 0.0).fold(0.0f64, |a, &m| a.max(-m));
    let pos_max = mean.iter().filter(|&&m| m >= 0.0).fold(0.0f64, |a, &m| a.max(m));
    let neg_scale = if neg_max > 0.0 { 1.0 / neg_max } else { 1.0 };
    let pos_scale = if pos_max > 0.0 { 1.0 / pos_max } else { 1.0 };

    let scale: Array1<f64> = mean.mapv(|m| if m < 0.0 { neg_scale } else { pos_scale });
    (&mean * &scale, &std * &scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.0) - 0.841_344_746).abs() < 1e-8);
        assert!((normal_cdf(-1.0) + normal_cdf(1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_branches_scaled_independently() {
        let mean = array![-4.0, -1.0, 0.0, 0.5, 2.0];
        let std = array![2.0, 1.0, 1.0, 1.0, 1.0];
        let (m, s) = split_normalize(mean.view(), std.view());
        assert_eq!(m, array![-1.0, -0.25, 0.0, 0.25, 1.0]);
        assert_eq!(s, array![0.5, 0.25, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_sign_preserved() {
        let mean = array![-0.001, 10.0];
        let (m, _) = split_normalize(mean.view(), array![0.1, 0.1].view());
        assert_eq!(m[0], -1.0);
        assert!(m[1] > 0.0);
    }

    #[test]
    fn test_single_branch() {
        let mean = array![0.2, 0.4];
        let (m, s) = split_normalize(mean.view(), array![0.2, 0.2].view());
        assert_eq!(m, array![0.5, 1.0]);
        assert_eq!(s, array![0.5, 0.5]);
    }
}
