//! Per-discipline feasibility perceptions over the remaining space.

use anyhow::{Context, Result};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::discipline::sorter::check_points;
use crate::discipline::Discipline;
use crate::rules::expr::Rule;
use crate::rules::filter::controls;
use crate::surrogate::{split_normalize, GaussianProcess, GprConfig};

/// Normalised surrogate predictions at every remaining grid point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    pub discipline: String,

    /// Grid-point ids, one per prediction.
    pub ids: Vec<usize>,

    /// Predicted margin in `[-1, 1]` (positive = feasible).
    pub mean: Array1<f64>,

    /// Predicted standard deviation on the same scale.
    pub std: Array1<f64>,
}

impl Perception {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Fit a surrogate over every tested point of `discipline` (active and
/// eliminated) and predict its remaining grid.
pub fn perceive(discipline: &Discipline, config: &GprConfig) -> Result<Perception> {
    let x = discipline.all_tested_ins();
    let y = discipline.all_margins();
    let gp = GaussianProcess::fit(x.view(), y.view(), config)
        .with_context(|| format!("fitting surrogate for '{}'", discipline.name))?;
    let (mean, std) = gp.predict(discipline.space_remaining.points.view());
    let (mean, std) = split_normalize(mean.view(), std.view());
    Ok(Perception {
        discipline: discipline.name.clone(),
        ids: discipline.space_remaining.ids.clone(),
        mean,
        std,
    })
}

/// [`perceive`] for every discipline, fitted in parallel.
pub fn perceive_all(disciplines: &[Discipline], config: &GprConfig) -> Result<Vec<Perception>> {
    disciplines.par_iter().map(|d| perceive(d, config)).collect()
}

/// Positions into a discipline's non-reduced grid, split by a rule set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceSplit {
    /// Rows that survive every rule.
    pub reduced: Vec<usize>,

    /// Rows that at least one rule removes.
    pub leftover: Vec<usize>,
}

impl SpaceSplit {
    pub fn non_reduced_len(&self) -> usize {
        self.reduced.len() + self.leftover.len()
    }
}

/// Simulate applying `rules` to `discipline`'s remaining grid.
///
/// Rules over variables the discipline does not control have no effect.
pub fn partition_space(discipline: &Discipline, rules: &[&Rule]) -> Result<SpaceSplit> {
    let n = discipline.space_remaining.len();
    let mut removed = vec![false; n];
    let blocks = [(discipline.ins.as_slice(), discipline.space_remaining.points.view())];
    for rule in rules.iter().filter(|r| controls(&discipline.ins, r)) {
        for i in check_points(&blocks, rule)? {
            removed[i] = true;
        }
    }
    let (leftover, reduced): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| removed[i]);
    Ok(SpaceSplit { reduced, leftover })
}

/// Whether `rule` can reduce `discipline`'s grid at all.
pub fn affects(discipline: &Discipline, rule: &Rule) -> bool {
    controls(&discipline.ins, rule)
}
