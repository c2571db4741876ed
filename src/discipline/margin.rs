//! Pass/fail classification and constraint-distance magnitudes.
//!
//! Each output primitive's signed distance is normalised by the spread of its
//! cached left-hand sides over the active tested points. Failing points get
//! the RMS of their violated primitives' distances; passing points get the
//! distance to their nearest satisfied (binding) primitive.

use anyhow::Result;
use ndarray::Array1;

use super::state::PointSet;
use crate::rules::expr::{Ineq, Relation, Rule};

/// Classification of every row of a [`PointSet`].
#[derive(Clone, Debug)]
pub struct Amounts {
    pub pass: Vec<bool>,
    pub fail_amount: Array1<f64>,
    pub pass_amount: Array1<f64>,
}

struct Normaliser<'a> {
    ineq: &'a Ineq,
    lhs: &'a [f64],
    range: f64,
}

impl Normaliser<'_> {
    /// Signed normalised distance `(lhs − rhs) / range` at row `r`.
    fn distance(&self, r: usize) -> f64 {
        (self.lhs[r] - self.ineq.rhs) / self.range
    }

    /// Non-negative violation at row `r` (0 when satisfied).
    fn violation(&self, r: usize) -> f64 {
        let s = self.distance(r);
        match self.ineq.relation {
            Relation::Le => s.max(0.0),
            Relation::Gt => (-s).max(0.0),
        }
    }
}

fn spread(values: &[f64]) -> f64 {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;
    if range.is_finite() && range > 1e-12 {
        range
    } else {
        1.0
    }
}

/// Classify every point of `set` against `rules` (rules must only use `ins ∪ outs`).
pub fn classify(set: &PointSet, ins: &[String], outs: &[String], rules: &[Rule]) -> Result<Amounts> {
    let n = set.len();
    let mut pass = vec![true; n];
    let mut fail_amount = Array1::zeros(n);
    let mut pass_amount = Array1::zeros(n);
    if n == 0 {
        return Ok(Amounts {
            pass,
            fail_amount,
            pass_amount,
        });
    }

    let normalisers: Vec<Normaliser<'_>> = set
        .ineqs
        .iter()
        .filter(|e| e.lhs.len() == n)
        .map(|e| Normaliser {
            ineq: &e.ineq,
            lhs: &e.lhs,
            range: spread(&e.lhs),
        })
        .collect();
    let find = |ineq: &Ineq| normalisers.iter().find(|nm| nm.ineq.same_as(ineq));

    for r in 0..n {
        let lookup = |name: &str| {
            ins.iter()
                .position(|v| v == name)
                .map(|c| set.ins[[r, c]])
                .or_else(|| outs.iter().position(|v| v == name).map(|c| set.outs[[r, c]]))
        };

        let mut violations = Vec::new();
        let mut nearest = f64::INFINITY;
        for rule in rules {
            let holds = rule.evaluate(&lookup)?;
            for prim in rule.primitives() {
                let Some(nm) = find(prim) else { continue };
                let v = nm.violation(r);
                if v > 0.0 || !prim.evaluate(&lookup)? {
                    if !holds {
                        violations.push(v);
                    }
                } else {
                    nearest = nearest.min(nm.distance(r).abs());
                }
            }
            if !holds {
                pass[r] = false;
            }
        }

        if pass[r] {
            pass_amount[r] = if nearest.is_finite() { nearest } else { 0.0 };
        } else if !violations.is_empty() {
            let ms = violations.iter().map(|v| v * v).sum::<f64>() / violations.len() as f64;
            fail_amount[r] = ms.sqrt();
        }
    }

    Ok(Amounts {
        pass,
        fail_amount,
        pass_amount,
    })
}
