//! Exploration-time allocation.

use serde::{Deserialize, Serialize};

/// Declining sampling budget between reduction cycles.
///
/// `params = [minimum, rate, peak]`: the budget is
/// `round(rate · peak · remaining / iters_max)`, kept within
/// `[minimum, remaining]`, and 0 once the iteration budget is spent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExploreSpace {
    pub iters: usize,
    pub iters_max: usize,
    pub params: [f64; 3],
}

impl ExploreSpace {
    pub fn new(iters: usize, iters_max: usize, params: [f64; 3]) -> Self {
        Self {
            iters,
            iters_max,
            params,
        }
    }

    /// Iterations to spend sampling before the next cycle.
    pub fn fixed_explore(&self) -> usize {
        let remaining = self.iters_max.saturating_sub(self.iters);
        if remaining == 0 {
            return 0;
        }
        let [minimum, rate, peak] = self.params;
        let fraction = remaining as f64 / self.iters_max as f64;
        let budget = (rate * peak * fraction).round().max(minimum.max(0.0).round());
        (budget.max(0.0) as usize).min(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_budgets() {
        assert_eq!(ExploreSpace::new(50, 100, [2.0, 3.0, 4.0]).fixed_explore(), 6);
        assert_eq!(ExploreSpace::new(100, 100, [2.0, 3.0, 4.0]).fixed_explore(), 0);
        assert_eq!(ExploreSpace::new(120, 100, [2.0, 3.0, 4.0]).fixed_explore(), 0);
    }

    #[test]
    fn test_declines_and_respects_bounds() {
        let mut last = usize::MAX;
        for iters in 0..100 {
            let n = ExploreSpace::new(iters, 100, [2.0, 3.0, 4.0]).fixed_explore();
            assert!(n <= last, "iters = {}: {} > {}", iters, n, last);
            assert!(n >= 1 && n <= 100 - iters);
            last = n;
        }
        assert_eq!(ExploreSpace::new(0, 100, [2.0, 3.0, 4.0]).fixed_explore(), 12);
        assert_eq!(ExploreSpace::new(99, 100, [2.0, 3.0, 4.0]).fixed_explore(), 1);
    }
}
