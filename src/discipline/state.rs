//! Per-discipline design state.
//!
//! A discipline owns its tested points (with every parallel per-point field),
//! the not-yet-eliminated part of its reference grid, and an always-present
//! bucket of eliminated rows. Rows stay correspondent across all parallel
//! fields, and every point lives in exactly one of {active, eliminated}.

use std::collections::BTreeSet;

use anyhow::{ensure, Result};
use ndarray::{concatenate, Array1, Array2, Axis};

use super::margin;
use super::rows::RowStore;
use crate::partition::review::Criteria;
use crate::rules::cache::{IneqCache, NamedColumns};
use crate::rules::expr::Rule;
use crate::rules::filter::{collect_inequalities, controls};
use crate::sampling::grid::GridSample;

/// Tested points and their parallel per-point fields.
#[derive(Clone, Debug)]
pub struct PointSet {
    /// Stable point identifiers, unique within the discipline.
    pub ids: Vec<u64>,

    /// Grid id each point was drawn from, `None` for off-grid points.
    pub grid_ids: Vec<Option<usize>>,

    /// Input coordinates, one row per point, normalised to [0, 1].
    pub ins: Array2<f64>,

    /// Output values, one row per point.
    pub outs: Array2<f64>,

    /// Whether each point satisfies every applicable output rule.
    pub pass: Vec<bool>,

    /// Normalised violation magnitude (0 for passing points).
    pub fail_amount: Array1<f64>,

    /// Normalised distance to the nearest binding constraint (0 for failing points).
    pub pass_amount: Array1<f64>,

    /// Left-hand-side cache of every relevant inequality.
    pub ineqs: IneqCache,
}

impl PointSet {
    /// Zero-row set with the right column counts.
    pub fn empty(n_ins: usize, n_outs: usize) -> Self {
        Self {
            ids: Vec::new(),
            grid_ids: Vec::new(),
            ins: Array2::zeros((0, n_ins)),
            outs: Array2::zeros((0, n_outs)),
            pass: Vec::new(),
            fail_amount: Array1::zeros(0),
            pass_amount: Array1::zeros(0),
            ineqs: IneqCache::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Signed margin `Pass_Amount − Fail_Amount` (positive = passing).
    pub fn margins(&self) -> Array1<f64> {
        &self.pass_amount - &self.fail_amount
    }

    /// Named column blocks for rule evaluation.
    pub fn blocks<'a>(&'a self, ins: &'a [String], outs: &'a [String]) -> [NamedColumns<'a>; 2] {
        [(ins, self.ins.view()), (outs, self.outs.view())]
    }
}

/// Grid points that have not been eliminated.
#[derive(Clone, Debug)]
pub struct GridPoints {
    /// Grid enumeration ids, stable for the life of the run.
    pub ids: Vec<usize>,

    /// Coordinates, one row per point.
    pub points: Array2<f64>,
}

impl GridPoints {
    pub fn empty(n_ins: usize) -> Self {
        Self {
            ids: Vec::new(),
            points: Array2::zeros((0, n_ins)),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub(crate) fn take(&mut self, indices: &[usize]) -> GridPoints {
        GridPoints {
            ids: self.ids.take_rows(indices),
            points: self.points.take_rows(indices),
        }
    }

    pub(crate) fn append(&mut self, other: GridPoints) {
        self.ids.append_rows(other.ids);
        self.points.append_rows(other.points);
    }
}

/// Rows ruled out by accepted reductions.
#[derive(Clone, Debug)]
pub struct EliminatedBucket {
    pub tested: PointSet,
    pub space_remaining: GridPoints,
}

impl EliminatedBucket {
    pub fn empty(n_ins: usize, n_outs: usize) -> Self {
        Self {
            tested: PointSet::empty(n_ins, n_outs),
            space_remaining: GridPoints::empty(n_ins),
        }
    }
}

/// One design discipline.
#[derive(Clone, Debug)]
pub struct Discipline {
    pub name: String,

    /// Controlled input variables, in column order.
    pub ins: Vec<String>,

    /// Output variables, in column order.
    pub outs: Vec<String>,

    /// Active tested points.
    pub tested: PointSet,

    /// Remaining reference grid.
    pub space_remaining: GridPoints,

    /// Eliminated tested points and grid rows.
    pub eliminated: EliminatedBucket,

    /// Conforming grid size at construction.
    pub tp_actual: usize,

    /// Partition acceptance criteria (relaxed by forced reductions).
    pub criteria: Criteria,

    /// Consecutive forced-reduction calls since the last committed reduction.
    pub forced_reductions: usize,

    /// Output rules that apply to this discipline's variables.
    pub output_rules: Vec<Rule>,

    next_id: u64,
}

impl Discipline {
    /// Build a discipline over a pre-filtered reference grid.
    ///
    /// Only the output rules whose variables lie in `ins ∪ outs` are kept; their
    /// primitive inequalities are registered in the left-hand-side cache.
    pub fn new(
        name: &str,
        ins: Vec<String>,
        outs: Vec<String>,
        grid: GridSample,
        output_rules: &[Rule],
        criteria: Criteria,
    ) -> Result<Self> {
        ensure!(!ins.is_empty(), "discipline '{}' has no input variables", name);
        ensure!(
            grid.points.ncols() == ins.len(),
            "grid for '{}' has {} columns, expected {}",
            name,
            grid.points.ncols(),
            ins.len()
        );

        let all_vars: Vec<String> = ins.iter().chain(outs.iter()).cloned().collect();
        let output_rules: Vec<Rule> = output_rules
            .iter()
            .filter(|r| controls(&all_vars, r))
            .cloned()
            .collect();

        let mut tested = PointSet::empty(ins.len(), outs.len());
        for rule in &output_rules {
            collect_inequalities(rule, &mut tested.ineqs);
        }

        let tp_actual = grid.points.nrows();
        let eliminated = EliminatedBucket::empty(ins.len(), outs.len());
        Ok(Self {
            name: name.to_string(),
            space_remaining: GridPoints {
                ids: grid.ids,
                points: grid.points,
            },
            tested,
            eliminated,
            tp_actual,
            criteria,
            forced_reductions: 0,
            output_rules,
            next_id: 0,
            ins,
            outs,
        })
    }

    /// Every input and output variable name.
    pub fn all_vars(&self) -> Vec<String> {
        self.ins.iter().chain(self.outs.iter()).cloned().collect()
    }

    /// Append newly evaluated points, extend the inequality cache and
    /// reclassify pass/fail for the active set.
    pub fn add_tested(&mut self, ins: Array2<f64>, outs: Array2<f64>) -> Result<Vec<u64>> {
        let n = ins.nrows();
        self.append_tested(vec![None; n], ins, outs)
    }

    /// [`Self::add_tested`] for points drawn from the reference grid, one
    /// grid id per row.
    pub fn add_tested_at(&mut self, grid_ids: &[usize], ins: Array2<f64>, outs: Array2<f64>) -> Result<Vec<u64>> {
        ensure!(
            grid_ids.len() == ins.nrows(),
            "{} grid ids for {} points",
            grid_ids.len(),
            ins.nrows()
        );
        self.append_tested(grid_ids.iter().copied().map(Some).collect(), ins, outs)
    }

    /// Grid ids of every tested point, active and eliminated.
    pub fn tested_grid_ids(&self) -> BTreeSet<usize> {
        self.tested
            .grid_ids
            .iter()
            .chain(&self.eliminated.tested.grid_ids)
            .flatten()
            .copied()
            .collect()
    }

    fn append_tested(&mut self, grid_ids: Vec<Option<usize>>, ins: Array2<f64>, outs: Array2<f64>) -> Result<Vec<u64>> {
        ensure!(
            ins.ncols() == self.ins.len() && outs.ncols() == self.outs.len(),
            "discipline '{}' expects {}x{} columns, got {}x{}",
            self.name,
            self.ins.len(),
            self.outs.len(),
            ins.ncols(),
            outs.ncols()
        );
        ensure!(
            ins.nrows() == outs.nrows(),
            "input and output row counts differ ({} vs {})",
            ins.nrows(),
            outs.nrows()
        );

        let n = ins.nrows();
        let ids: Vec<u64> = (self.next_id..self.next_id + n as u64).collect();
        self.next_id += n as u64;

        self.tested.ids.append_rows(ids.clone());
        self.tested.grid_ids.append_rows(grid_ids);
        self.tested.ins.append_rows(ins);
        self.tested.outs.append_rows(outs);
        self.tested.pass.append_rows(vec![false; n]);
        self.tested.fail_amount.append_rows(Array1::zeros(n));
        self.tested.pass_amount.append_rows(Array1::zeros(n));

        let blocks = [
            (self.ins.as_slice(), self.tested.ins.view()),
            (self.outs.as_slice(), self.tested.outs.view()),
        ];
        self.tested.ineqs.extend(&blocks)?;
        self.reclassify()?;
        Ok(ids)
    }

    /// Recompute pass flags and amounts of the active tested points.
    pub fn reclassify(&mut self) -> Result<()> {
        let amounts = margin::classify(&self.tested, &self.ins, &self.outs, &self.output_rules)?;
        self.tested.pass = amounts.pass;
        self.tested.fail_amount = amounts.fail_amount;
        self.tested.pass_amount = amounts.pass_amount;
        Ok(())
    }

    /// Fraction of the original grid that has not been eliminated.
    pub fn space_remaining_fraction(&self) -> f64 {
        if self.tp_actual == 0 {
            return 0.0;
        }
        self.space_remaining.len() as f64 / self.tp_actual as f64
    }

    /// Every tested input point seen so far (active rows first, then eliminated).
    pub fn all_tested_ins(&self) -> Array2<f64> {
        concatenate![Axis(0), self.tested.ins.view(), self.eliminated.tested.ins.view()]
    }

    /// Signed margins matching [`Self::all_tested_ins`].
    pub fn all_margins(&self) -> Array1<f64> {
        concatenate![Axis(0), self.tested.margins().view(), self.eliminated.tested.margins().view()]
    }

    /// Every failure magnitude seen so far.
    pub fn all_fail_amounts(&self) -> Vec<f64> {
        self.tested
            .fail_amount
            .iter()
            .chain(self.eliminated.tested.fail_amount.iter())
            .copied()
            .collect()
    }
}
