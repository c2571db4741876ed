//! Per-discipline opinions on proposed rules, and the veto decision.
//!
//! An opinion blends two metrics over one discipline's perception:
//! infeasibility clearing (how confidently infeasible the discarded region
//! is) and feasibility preservation (how much feasible mass survives). The
//! weight of the second metric is read off a quadratic Bezier curve at the
//! value of the first.

use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::perception::{affects, partition_space, Perception, SpaceSplit};
use crate::discipline::Discipline;
use crate::rules::expr::Rule;
use crate::surrogate::normal_cdf;

/// Quadratic Bezier curve through three control points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BezierCurve {
    pub start: [f64; 2],
    pub control: [f64; 2],
    pub end: [f64; 2],
}

impl Default for BezierCurve {
    fn default() -> Self {
        Self {
            start: [0.0, 1.0],
            control: [0.5, 0.8],
            end: [1.0, 0.0],
        }
    }
}

impl BezierCurve {
    pub fn point(&self, t: f64) -> [f64; 2] {
        let u = 1.0 - t;
        let mut p = [0.0; 2];
        for k in 0..2 {
            p[k] = u * u * self.start[k] + 2.0 * u * t * self.control[k] + t * t * self.end[k];
        }
        p
    }

    /// The curve's y value where its x coordinate equals `x`.
    ///
    /// The x coordinate must be monotone in `t` (control x between the end
    /// points); `x` is clamped into the curve's x range.
    pub fn weight_at(&self, x: f64) -> f64 {
        let increasing = self.end[0] >= self.start[0];
        let (lo_x, hi_x) = if increasing {
            (self.start[0], self.end[0])
        } else {
            (self.end[0], self.start[0])
        };
        let x = x.clamp(lo_x, hi_x);
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..64 {
            let mid = 0.5 * (lo + hi);
            let below = self.point(mid)[0] < x;
            if below == increasing {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        self.point(0.5 * (lo + hi))[1]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpinionConfig {
    pub curve: BezierCurve,

    /// Half-width of the prediction interval, in standard deviations.
    pub sigma_span: f64,
}

impl Default for OpinionConfig {
    fn default() -> Self {
        Self {
            curve: BezierCurve::default(),
            sigma_span: 3.0,
        }
    }
}

/// Mean, over `leftover`, of the fraction of each `μ ± kσ` interval lying below 0.
///
/// A zero-width interval counts as fully infeasible when `μ < 0`. An empty
/// leftover set clears nothing.
pub fn infeasibility_clearing(
    mean: ArrayView1<f64>,
    std: ArrayView1<f64>,
    leftover: &[usize],
    sigma_span: f64,
) -> f64 {
    if leftover.is_empty() {
        return 0.0;
    }
    let total: f64 = leftover
        .iter()
        .map(|&i| {
            let half = sigma_span * std[i];
            if half > 0.0 {
                ((half - mean[i]) / (2.0 * half)).clamp(0.0, 1.0)
            } else if mean[i] < 0.0 {
                1.0
            } else {
                0.0
            }
        })
        .sum();
    total / leftover.len() as f64
}

fn feasible_probability(mean: f64, std: f64) -> f64 {
    if std > 0.0 {
        normal_cdf(mean / std)
    } else if mean > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Share of the non-reduced feasible probability mass kept in `reduced`.
///
/// 1 when the non-reduced space holds no feasible mass.
pub fn feasibility_preservation(mean: ArrayView1<f64>, std: ArrayView1<f64>, split: &SpaceSplit) -> f64 {
    let mass = |rows: &[usize]| -> f64 { rows.iter().map(|&i| feasible_probability(mean[i], std[i])).sum() };
    let kept = mass(&split.reduced);
    let total = kept + mass(&split.leftover);
    if total > 0.0 {
        kept / total
    } else {
        1.0
    }
}

/// One discipline's opinion of a split of its space.
pub fn opinion(perception: &Perception, split: &SpaceSplit, config: &OpinionConfig) -> f64 {
    let m1 = infeasibility_clearing(
        perception.mean.view(),
        perception.std.view(),
        &split.leftover,
        config.sigma_span,
    );
    let m2 = feasibility_preservation(perception.mean.view(), perception.std.view(), split);
    let w = config.curve.weight_at(m1);
    (1.0 - w) * m1 + w * m2
}

/// Opinions of every discipline (columns) on every rule (rows).
/// `NaN` marks a rule that does not affect a discipline.
#[derive(Clone, Debug, Serialize)]
pub struct OpinionTable {
    pub disciplines: Vec<String>,
    pub values: Array2<f64>,
}

/// Form opinions on single rules.
pub fn form_opinions(
    disciplines: &[Discipline],
    perceptions: &[Perception],
    rules: &[Rule],
    config: &OpinionConfig,
) -> Result<OpinionTable> {
    ensure!(
        disciplines.len() == perceptions.len(),
        "{} disciplines but {} perceptions",
        disciplines.len(),
        perceptions.len()
    );
    let mut values = Array2::from_elem((rules.len(), disciplines.len()), f64::NAN);
    for (r, rule) in rules.iter().enumerate() {
        for (d, (discipline, perception)) in disciplines.iter().zip(perceptions).enumerate() {
            if !affects(discipline, rule) {
                continue;
            }
            let split = partition_space(discipline, &[rule])?;
            values[[r, d]] = opinion(perception, &split, config);
        }
    }
    Ok(OpinionTable {
        disciplines: disciplines.iter().map(|d| d.name.clone()).collect(),
        values,
    })
}

/// Veto decision: which rules survive.
///
/// Rule `r`, proposed by discipline `proposers[r]`, is discarded if any other
/// discipline holds an opinion below the proposer's opinion minus the largest
/// `fail_crits` entry among disciplines with an opinion on `r`.
pub fn dom_decision(
    table: &OpinionTable,
    rules: &[Rule],
    proposers: &[usize],
    fail_crits: &[f64],
) -> Result<Vec<bool>> {
    let (n_rules, n_disc) = table.values.dim();
    ensure!(
        rules.len() == n_rules && proposers.len() == n_rules,
        "opinion table has {} rows, got {} rules and {} proposers",
        n_rules,
        rules.len(),
        proposers.len()
    );
    ensure!(
        fail_crits.len() == n_disc,
        "opinion table has {} columns, got {} criteria",
        n_disc,
        fail_crits.len()
    );

    let mut keep = vec![true; n_rules];
    for r in 0..n_rules {
        let row = table.values.row(r);
        let p = proposers[r];
        ensure!(p < n_disc, "proposer index {} out of range", p);
        let own = row[p];
        if own.is_nan() {
            continue;
        }
        let slack = (0..n_disc)
            .filter(|&d| !row[d].is_nan())
            .map(|d| fail_crits[d])
            .fold(f64::NEG_INFINITY, f64::max);
        let floor = own - slack;
        if let Some(d) = (0..n_disc).find(|&d| d != p && row[d] < floor) {
            info!(
                rule = %rules[r],
                proposer = %table.disciplines[p],
                vetoed_by = %table.disciplines[d],
                opinion = row[d],
                floor,
                "rule vetoed"
            );
            keep[r] = false;
        }
    }
    Ok(keep)
}
