//! Exponential pace schedules.
//!
//! `calc_exponential(x, [p0, p1, p2, p3])` rises from 0 at `x = p0` to `p3`
//! at `x = p2` along `e^{p1·x}`, rescaled:
//!
//! ```text
//! f(x) = p3 · (e^{p1·x} − e^{p1·p0}) / (e^{p1·p2} − e^{p1·p0})
//! ```
//!
//! Outside `[p0, p2]` the curve extrapolates; callers clamp at 0.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::config;

/// Schedule parameters `[p0, p1, p2, p3]`: start, rate, end, height.
pub type ExpParams = [f64; 4];

/// Validate schedule parameters.
pub fn check_params(p: &ExpParams) -> Result<()> {
    let [p0, p1, p2, p3] = *p;
    ensure!(
        (0.0..=1.0).contains(&p0) && (0.0..=1.0).contains(&p2) && p0 < p2,
        "schedule needs 0 <= p0 < p2 <= 1, got p0 = {}, p2 = {}",
        p0,
        p2
    );
    ensure!(p1 != 0.0 && p1.is_finite(), "schedule rate p1 must be finite and non-zero, got {}", p1);
    ensure!(p3.is_finite() && p3 >= 0.0, "schedule height p3 must be finite and >= 0, got {}", p3);
    Ok(())
}

/// Evaluate the schedule at `x`.
pub fn calc_exponential(x: f64, p: &ExpParams) -> Result<f64> {
    check_params(p)?;
    let [p0, p1, p2, p3] = *p;
    let base = (p1 * p0).exp();
    Ok(p3 * ((p1 * x).exp() - base) / ((p1 * p2).exp() - base))
}

/// [`calc_exponential`] clamped below at 0.
pub fn floor_exponential(x: f64, p: &ExpParams) -> Result<f64> {
    Ok(calc_exponential(x, p)?.max(0.0))
}

/// Schedules driving the fragility threshold and the minimum reduction pace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleParams {
    /// Allowed added risk over elapsed time.
    pub risk: ExpParams,

    /// Constant added to the risk threshold.
    pub shift: f64,

    /// Minimum eliminated fraction over elapsed time.
    pub reduction: ExpParams,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            risk: config::DEFAULT_RISK_SCHEDULE,
            shift: config::DEFAULT_RISK_SHIFT,
            reduction: config::DEFAULT_REDUCTION_SCHEDULE,
        }
    }
}

impl ScheduleParams {
    pub fn validate(&self) -> Result<()> {
        check_params(&self.risk)?;
        check_params(&self.reduction)
    }

    /// Risk threshold `max(f(t), 0) + shift` at elapsed fraction `t`.
    pub fn risk_threshold(&self, t: f64) -> Result<f64> {
        Ok(floor_exponential(t, &self.risk)? + self.shift)
    }

    /// Minimum eliminated fraction expected at elapsed fraction `t`.
    pub fn min_reduction(&self, t: f64) -> Result<f64> {
        floor_exponential(t, &self.reduction)
    }
}

/// Elapsed fraction `iters / iters_max`, 1 when the budget is zero.
pub fn elapsed(iters: usize, iters_max: usize) -> f64 {
    if iters_max == 0 {
        1.0
    } else {
        iters as f64 / iters_max as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_value() {
        let v = calc_exponential(0.15, &[0.1, 2.0, 0.3, 0.8]).unwrap();
        assert!((v - 0.171_070_57).abs() < 1e-7, "v = {}", v);
    }

    #[test]
    fn test_boundaries() {
        let p = [0.1, 2.0, 0.3, 0.8];
        assert!(calc_exponential(0.1, &p).unwrap().abs() < 1e-12);
        assert!((calc_exponential(0.3, &p).unwrap() - 0.8).abs() < 1e-12);
        assert!(calc_exponential(0.0, &p).unwrap() < 0.0);
        assert_eq!(floor_exponential(0.0, &p).unwrap(), 0.0);
    }

    #[test]
    fn test_negative_rate_still_rises() {
        let p = [0.0, -3.0, 1.0, 1.0];
        let a = calc_exponential(0.2, &p).unwrap();
        let b = calc_exponential(0.6, &p).unwrap();
        assert!(0.0 < a && a < b && b < 1.0, "a = {}, b = {}", a, b);
    }

    #[test]
    fn test_rejects_bad_params() {
        assert!(calc_exponential(0.5, &[0.3, 2.0, 0.3, 1.0]).is_err());
        assert!(calc_exponential(0.5, &[0.0, 0.0, 1.0, 1.0]).is_err());
        assert!(calc_exponential(0.5, &[0.0, 2.0, 1.5, 1.0]).is_err());
        assert!(calc_exponential(0.5, &[0.0, 2.0, 1.0, -1.0]).is_err());
        assert!(calc_exponential(0.5, &[-0.1, 2.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_default_schedules_valid() {
        let s = ScheduleParams::default();
        s.validate().unwrap();
        assert!(s.risk_threshold(0.0).unwrap() >= s.shift);
        assert!(s.min_reduction(0.0).unwrap() >= 0.0);
        assert_eq!(elapsed(5, 0), 1.0);
        assert_eq!(elapsed(5, 10), 0.5);
    }
}
