//! Windfall/regret aggregation shared by both risk models.
//!
//! Each non-reduced grid point carries a weight (how likely the surrogate
//! is wrong about it). The weight is credited to the regret or windfall sum
//! of the non-reduced and reduced spaces according to the sign of its
//! predicted margin and whether the reduction keeps or discards it:
//!
//! | prediction | kept                 | discarded                          |
//! |------------|----------------------|------------------------------------|
//! | infeasible | windfall / windfall  | windfall / regret                  |
//! | feasible   | regret / regret      | regret / windfall                  |
//!
//! (non-reduced / reduced). The reported risk is `reduced / non_reduced − 1`.

use anyhow::{ensure, Result};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::merging::{Perception, SpaceSplit};

const EPS: f64 = 1e-10;

/// Relative change in regret and windfall potential caused by a reduction.
/// Positive values mean the reduction adds potential.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub regret: f64,
    pub windfall: f64,
}

impl RiskRecord {
    /// `regret − windfall`, the quantity compared against fragility thresholds.
    pub fn net(&self) -> f64 {
        self.regret - self.windfall
    }
}

/// Risk records for every combination (rows) and discipline (columns).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskTable {
    pub combos: Vec<Vec<usize>>,
    pub disciplines: Vec<String>,
    pub records: Vec<Vec<RiskRecord>>,
}

impl RiskTable {
    /// Largest net risk across disciplines for combination `c`.
    pub fn max_net(&self, c: usize) -> f64 {
        self.records[c]
            .iter()
            .map(RiskRecord::net)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

fn ratio(reduced: f64, non_reduced: f64) -> f64 {
    let denom = if non_reduced == 0.0 { EPS } else { non_reduced };
    reduced / denom - 1.0
}

/// Aggregate per-point `weights` into a risk record for one split.
pub fn quant_risk(mean: ArrayView1<f64>, split: &SpaceSplit, weights: ArrayView1<f64>) -> Result<RiskRecord> {
    ensure!(
        mean.len() == weights.len() && split.non_reduced_len() == mean.len(),
        "risk inputs disagree: {} predictions, {} weights, {} split rows",
        mean.len(),
        weights.len(),
        split.non_reduced_len()
    );
    let n = mean.len().max(1) as f64;
    let (mut nr_regret, mut nr_windfall, mut r_regret, mut r_windfall) = (0.0, 0.0, 0.0, 0.0);

    for &i in &split.reduced {
        let w = weights[i];
        if mean[i] < 0.0 {
            nr_windfall += w;
            r_windfall += w;
        } else {
            nr_regret += w;
            r_regret += w;
        }
    }
    for &i in &split.leftover {
        let w = weights[i];
        if mean[i] < 0.0 {
            nr_windfall += w;
            r_regret += w;
        } else {
            nr_regret += w;
            r_windfall += w;
        }
    }

    Ok(RiskRecord {
        regret: ratio(r_regret / n, nr_regret / n),
        windfall: ratio(r_windfall / n, nr_windfall / n),
    })
}

/// A source of per-point risk weights.
pub trait RiskModel {
    fn name(&self) -> &'static str;

    /// One weight per perception row, for each discipline.
    fn weights(&self, perceptions: &[Perception]) -> Result<Vec<Array1<f64>>>;
}

/// Assess every combination against every discipline.
///
/// `splits[c][d]` is the split of discipline `d`'s grid under combination `c`.
pub fn assess(
    model: &dyn RiskModel,
    perceptions: &[Perception],
    combos: &[Vec<usize>],
    splits: &[Vec<SpaceSplit>],
) -> Result<RiskTable> {
    ensure!(
        combos.len() == splits.len(),
        "{} combinations but {} split rows",
        combos.len(),
        splits.len()
    );
    let weights = model.weights(perceptions)?;
    let mut records = Vec::with_capacity(combos.len());
    for row in splits {
        ensure!(row.len() == perceptions.len(), "split row does not cover every discipline");
        let mut per_disc = Vec::with_capacity(row.len());
        for ((p, w), split) in perceptions.iter().zip(&weights).zip(row) {
            per_disc.push(quant_risk(p.mean.view(), split, w.view())?);
        }
        records.push(per_disc);
    }
    Ok(RiskTable {
        combos: combos.to_vec(),
        disciplines: perceptions.iter().map(|p| p.discipline.clone()).collect(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_no_reduction_is_neutral() {
        let mean = array![-0.5, 0.2, 0.8];
        let w = array![0.1, 0.3, 0.2];
        let split = SpaceSplit {
            reduced: vec![0, 1, 2],
            leftover: vec![],
        };
        let r = quant_risk(mean.view(), &split, w.view()).unwrap();
        assert!(r.regret.abs() < 1e-12 && r.windfall.abs() < 1e-12, "{:?}", r);
    }

    #[test]
    fn test_discarding_feasible_point() {
        let mean = array![-0.5, 0.2, 0.8];
        let w = array![0.1, 0.3, 0.2];
        let split = SpaceSplit {
            reduced: vec![0, 2],
            leftover: vec![1],
        };
        let r = quant_risk(mean.view(), &split, w.view()).unwrap();
        // Non-reduced: regret 0.5, windfall 0.1. Reduced: regret 0.2, windfall 0.4.
        assert!((r.regret - (0.2 / 0.5 - 1.0)).abs() < 1e-12);
        assert!((r.windfall - (0.4 / 0.1 - 1.0)).abs() < 1e-12);
        assert!(r.net() < 0.0);
    }

    #[test]
    fn test_discarding_infeasible_moves_to_regret() {
        let mean = array![-0.5, 0.2];
        let w = array![0.4, 0.1];
        let split = SpaceSplit {
            reduced: vec![1],
            leftover: vec![0],
        };
        let r = quant_risk(mean.view(), &split, w.view()).unwrap();
        assert!((r.regret - (0.5 / 0.1 - 1.0)).abs() < 1e-12);
        assert!((r.windfall - (-1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominator_guard() {
        let mean = array![0.2];
        let w = array![0.0];
        let split = SpaceSplit {
            reduced: vec![0],
            leftover: vec![],
        };
        let r = quant_risk(mean.view(), &split, w.view()).unwrap();
        assert_eq!(r.regret, -1.0);
        assert!(r.regret.is_finite() && r.windfall.is_finite());
    }

    #[test]
    fn test_shape_mismatch() {
        let split = SpaceSplit {
            reduced: vec![0],
            leftover: vec![],
        };
        assert!(quant_risk(array![0.1, 0.2].view(), &split, array![0.1, 0.2].view()).is_err());
    }
}
