//! Problem definitions and the evaluation seam.
//!
//! A problem file (JSON) lists disciplines with their input variables and
//! linear output analyses, plus the global input and output rule lists.
//! External analysis codes plug in through [`DisciplineAnalysis`].

use std::path::Path;

use anyhow::{ensure, Context, Result};
use ndarray::{Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cycle::ManagerConfig;
use crate::config;
use crate::discipline::Discipline;
use crate::partition::Criteria;
use crate::rules::expr::Rule;
use crate::sampling::uniform_grid;

/// Turns input points into output points for one discipline.
pub trait DisciplineAnalysis: Send + Sync {
    /// One output row per input row, columns in the discipline's `outs` order.
    fn evaluate(&self, ins: ArrayView2<f64>, rng: &mut dyn RngCore) -> Result<Array2<f64>>;
}

/// `y = intercept + Σ coefficients[i]·x_i + ε`, `ε ~ N(0, noise²)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearOutput {
    pub name: String,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub noise: f64,
}

/// Closed-form linear analysis over all of a discipline's outputs.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearAnalysis {
    pub outputs: Vec<LinearOutput>,
}

impl DisciplineAnalysis for LinearAnalysis {
    fn evaluate(&self, ins: ArrayView2<f64>, rng: &mut dyn RngCore) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((ins.nrows(), self.outputs.len()));
        for (c, spec) in self.outputs.iter().enumerate() {
            ensure!(
                spec.coefficients.len() == ins.ncols(),
                "output '{}' has {} coefficients for {} inputs",
                spec.name,
                spec.coefficients.len(),
                ins.ncols()
            );
            let noise = if spec.noise > 0.0 {
                Some(
                    Normal::new(0.0, spec.noise)
                        .with_context(|| format!("noise level of output '{}'", spec.name))?,
                )
            } else {
                None
            };
            for (r, row) in ins.outer_iter().enumerate() {
                let mut y = spec.intercept;
                for (x, k) in row.iter().zip(&spec.coefficients) {
                    y += x * k;
                }
                if let Some(n) = &noise {
                    y += n.sample(rng);
                }
                out[[r, c]] = y;
            }
        }
        Ok(out)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisciplineSpec {
    pub name: String,
    pub ins: Vec<String>,
    pub outputs: Vec<LinearOutput>,
    #[serde(default)]
    pub criteria: Criteria,
}

fn default_grid_points() -> usize {
    config::DEFAULT_GRID_POINTS
}

/// A complete design problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemDefinition {
    pub disciplines: Vec<DisciplineSpec>,

    /// Rules over input variables, applied to every grid at construction.
    #[serde(default)]
    pub input_rules: Vec<Rule>,

    /// Rules over outputs (and inputs) that decide pass/fail.
    #[serde(default)]
    pub output_rules: Vec<Rule>,

    /// Requested grid size per discipline.
    #[serde(default = "default_grid_points")]
    pub grid_points: usize,

    #[serde(default)]
    pub manager: ManagerConfig,
}

/// Disciplines and their analyses, index-aligned.
pub struct BuiltProblem {
    pub disciplines: Vec<Discipline>,
    pub analyses: Vec<Box<dyn DisciplineAnalysis>>,
}

impl ProblemDefinition {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing problem definition")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading problem file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Create every discipline with its filtered grid, plus its analysis.
    pub fn build(&self) -> Result<BuiltProblem> {
        ensure!(!self.disciplines.is_empty(), "problem has no disciplines");
        let mut disciplines = Vec::with_capacity(self.disciplines.len());
        let mut analyses: Vec<Box<dyn DisciplineAnalysis>> = Vec::with_capacity(self.disciplines.len());
        for spec in &self.disciplines {
            let grid = uniform_grid(self.grid_points, &spec.ins, &self.input_rules)
                .with_context(|| format!("building grid for '{}'", spec.name))?;
            debug!(
                discipline = %spec.name,
                requested = self.grid_points,
                realised = grid.grid_size,
                conforming = grid.num_points,
                "grid built"
            );
            let outs = spec.outputs.iter().map(|o| o.name.clone()).collect();
            disciplines.push(Discipline::new(
                &spec.name,
                spec.ins.clone(),
                outs,
                grid,
                &self.output_rules,
                spec.criteria.clone(),
            )?);
            analyses.push(Box::new(LinearAnalysis {
                outputs: spec.outputs.clone(),
            }));
        }
        Ok(BuiltProblem {
            disciplines,
            analyses,
        })
    }
}

/// Draw up to `n` untested rows of `discipline`'s remaining grid, returned
/// with their grid ids.
pub fn draw_candidates(discipline: &Discipline, n: usize, rng: &mut dyn RngCore) -> (Vec<usize>, Array2<f64>) {
    let grid = &discipline.space_remaining;
    let tested = discipline.tested_grid_ids();
    let mut free: Vec<usize> = (0..grid.len()).filter(|&r| !tested.contains(&grid.ids[r])).collect();
    free.shuffle(rng);
    free.truncate(n);
    free.sort_unstable();
    let ids = free.iter().map(|&r| grid.ids[r]).collect();
    (ids, grid.points.select(Axis(0), &free))
}

/// Sample and evaluate `n` new points for every discipline. Returns the
/// number of points added.
pub fn sample_and_evaluate(
    disciplines: &mut [Discipline],
    analyses: &[Box<dyn DisciplineAnalysis>],
    n: usize,
    rng: &mut dyn RngCore,
) -> Result<usize> {
    ensure!(
        disciplines.len() == analyses.len(),
        "{} disciplines but {} analyses",
        disciplines.len(),
        analyses.len()
    );
    let mut added = 0;
    for (d, analysis) in disciplines.iter_mut().zip(analyses) {
        let (grid_ids, ins) = draw_candidates(d, n, rng);
        if ins.nrows() == 0 {
            continue;
        }
        let outs = analysis
            .evaluate(ins.view(), rng)
            .with_context(|| format!("evaluating '{}'", d.name))?;
        added += d.add_tested_at(&grid_ids, ins, outs)?.len();
    }
    Ok(added)
}
