//! Entropy-based fragility model (EFM).
//!
//! For each point still in a discipline's remaining space, the history of
//! its predicted margins forms a distribution, each value weighted by the
//! inverse of the standard deviation predicted with it. The generalised
//! cumulative residual entropy of that distribution, min-max normalised per
//! discipline, is the point's trajectory value entropy (TVE). Points whose
//! belief keeps moving weigh more in the risk aggregation.

use anyhow::Result;
use ndarray::{Array1, Array2};

use super::history::{PerceptionHistory, Snapshot};
use super::risk::RiskModel;
use crate::merging::Perception;

/// Prior margin before any observation.
pub const PRIOR_MEAN: f64 = 0.0;

/// Prior standard deviation: that of a uniform distribution on [-1, 1].
pub const PRIOR_STD: f64 = 0.577_350_269_189_625_8;

const MIN_STD: f64 = 1e-12;

/// Margin and std histories for `ids`, one row per point.
///
/// Column 0 is the prior; column `k` is snapshot `k − 1`. A point missing
/// from a snapshot gets `NaN` in both matrices.
pub fn trajectory_matrix(snapshots: &[Snapshot], ids: &[usize]) -> (Array2<f64>, Array2<f64>) {
    let cols = snapshots.len() + 1;
    let mut mean = Array2::from_elem((ids.len(), cols), f64::NAN);
    let mut std = Array2::from_elem((ids.len(), cols), f64::NAN);
    mean.column_mut(0).fill(PRIOR_MEAN);
    std.column_mut(0).fill(PRIOR_STD);
    for (k, snap) in snapshots.iter().enumerate() {
        for (r, &id) in ids.iter().enumerate() {
            if let Some(pos) = snap.position(id) {
                mean[[r, k + 1]] = snap.mean[pos];
                std[[r, k + 1]] = snap.std[pos];
            }
        }
    }
    (mean, std)
}

fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}

/// Generalised cumulative residual entropy of order `order` (≥ 1) of the
/// discrete distribution `values` with probability `weights`:
///
/// `E_n = (1/n!) ∫ F̄(x) (−ln F̄(x))^n dx`, `F̄(x) = P(X > x)`.
///
/// Order 1 is the cumulative residual entropy. Weights need not be
/// normalised; non-finite pairs are skipped.
pub fn generalized_cre(values: &[f64], weights: &[f64], order: u32) -> f64 {
    let mut pairs: Vec<(f64, f64)> = values
        .iter()
        .zip(weights)
        .filter(|(v, w)| v.is_finite() && w.is_finite() && **w > 0.0)
        .map(|(&v, &w)| (v, w))
        .collect();
    let total: f64 = pairs.iter().map(|p| p.1).sum();
    if pairs.len() < 2 || !(total > 0.0) {
        return 0.0;
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let order = order.max(1);
    let scale = factorial(order);
    let mut survival = 1.0;
    let mut entropy = 0.0;
    for k in 0..pairs.len() - 1 {
        survival -= pairs[k].1 / total;
        let width = pairs[k + 1].0 - pairs[k].0;
        if survival > 0.0 && width > 0.0 {
            entropy += width * survival * (-survival.ln()).powi(order as i32);
        }
    }
    entropy / scale
}

/// Normalised TVE for every remaining point of `perception`.
///
/// All-equal entropies (including an empty history) normalise to 0.
pub fn trajectory_value_entropy(history: &PerceptionHistory, perception: &Perception, order: u32) -> Array1<f64> {
    let (mean, std) = trajectory_matrix(history.snapshots(&perception.discipline), &perception.ids);
    let raw: Array1<f64> = mean
        .outer_iter()
        .zip(std.outer_iter())
        .map(|(m, s)| {
            let weights: Vec<f64> = s
                .iter()
                .map(|&sd| if sd.is_finite() { 1.0 / sd.max(MIN_STD) } else { f64::NAN })
                .collect();
            let values: Vec<f64> = m.to_vec();
            generalized_cre(&values, &weights, order)
        })
        .collect();

    let lo = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = hi - lo;
    if spread > 0.0 {
        raw.mapv(|v| (v - lo) / spread)
    } else {
        Array1::zeros(raw.len())
    }
}

/// EFM risk model over a recorded perception history.
#[derive(Clone, Copy, Debug)]
pub struct EntropyModel<'a> {
    pub history: &'a PerceptionHistory,
    pub order: u32,
}

impl<'a> EntropyModel<'a> {
    pub fn new(history: &'a PerceptionHistory) -> Self {
        Self { history, order: 1 }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

impl RiskModel for EntropyModel<'_> {
    fn name(&self) -> &'static str {
        "efm"
    }

    fn weights(&self, perceptions: &[Perception]) -> Result<Vec<Array1<f64>>> {
        Ok(perceptions
            .iter()
            .map(|p| trajectory_value_entropy(self.history, p, self.order))
            .collect())
    }
}
