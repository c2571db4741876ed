//! Probability-based fragility model (PFM).
//!
//! A point's weight is the probability that the sign of its predicted margin
//! is wrong: `1 − Φ(|μ| / σ)`. A point with no predictive spread is never
//! wrong and weighs 0.

use anyhow::Result;
use ndarray::{Array1, ArrayView1};

use super::risk::RiskModel;
use crate::merging::Perception;
use crate::surrogate::normal_cdf;

/// Per-point probability of a wrong feasibility call.
pub fn pfm_weights(mean: ArrayView1<f64>, std: ArrayView1<f64>) -> Array1<f64> {
    mean.iter()
        .zip(std.iter())
        .map(|(&m, &s)| if s > 0.0 { 1.0 - normal_cdf(m.abs() / s) } else { 0.0 })
        .collect()
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PfmModel;

impl RiskModel for PfmModel {
    fn name(&self) -> &'static str {
        "pfm"
    }

    fn weights(&self, perceptions: &[Perception]) -> Result<Vec<Array1<f64>>> {
        Ok(perceptions
            .iter()
            .map(|p| pfm_weights(p.mean.view(), p.std.view()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragility::risk::assess;
    use crate::merging::SpaceSplit;
    use ndarray::array;

    #[test]
    fn test_weights() {
        let w = pfm_weights(array![0.0, 1.0, -1.0, 0.3].view(), array![1.0, 1.0, 1.0, 0.0].view());
        assert!((w[0] - 0.5).abs() < 1e-12);
        assert!((w[1] - 0.158_655_254).abs() < 1e-8);
        assert!((w[1] - w[2]).abs() < 1e-12);
        assert_eq!(w[3], 0.0);
    }

    #[test]
    fn test_assess_table_shape() {
        let p = Perception {
            discipline: "d".into(),
            ids: vec![0, 1, 2],
            mean: array![-0.8, 0.1, 0.9],
            std: array![0.2, 0.2, 0.2],
        };
        let combos = vec![vec![0]];
        let splits = vec![vec![SpaceSplit {
            reduced: vec![1, 2],
            leftover: vec![0],
        }]];
        let table = assess(&PfmModel, &[p], &combos, &splits).unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].len(), 1);
        // Discarding a confidently infeasible point moves its small weight to regret.
        let r = table.records[0][0];
        assert!(r.windfall == -1.0, "{:?}", r);
        assert!(r.regret > 0.0, "{:?}", r);
        assert_eq!(table.max_net(0), r.net());
    }
}
