//! Point-elimination bookkeeping ("point sorter").
//!
//! When a rule is accepted, every row of a discipline's tested set or
//! reference grid that violates it moves into the discipline's eliminated
//! bucket. All parallel fields move together so row correspondence holds.

use anyhow::Result;
use ndarray::ArrayView2;

use super::rows::RowStore;
use super::state::Discipline;
use crate::rules::cache::NamedColumns;
use crate::rules::expr::Rule;
use crate::rules::filter::controls;

/// Which point array a rule is checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointArray {
    /// Tested input rows (rule over inputs only).
    TestedIns,
    /// Tested rows bound over inputs and outputs.
    TestedOuts,
    /// Remaining reference grid.
    SpaceRemaining,
}

/// A parallel per-point field that can be moved to the eliminated bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointField {
    /// Point ids together with their grid ids.
    Ids,
    TestedIns,
    TestedOuts,
    Pass,
    FailAmount,
    PassAmount,
    Ineqs,
    SpaceRemaining,
}

/// Every field belonging to the tested point set.
pub const TESTED_FIELDS: [PointField; 7] = [
    PointField::Ids,
    PointField::TestedIns,
    PointField::TestedOuts,
    PointField::Pass,
    PointField::FailAmount,
    PointField::PassAmount,
    PointField::Ineqs,
];

/// Rows of the named blocks at which `rule` evaluates false.
pub fn check_points(blocks: &[NamedColumns<'_>], rule: &Rule) -> Result<Vec<usize>> {
    let rows = blocks.first().map(|(_, a)| a.nrows()).unwrap_or(0);
    let mut violating = Vec::new();
    for r in 0..rows {
        let lookup = |name: &str| {
            blocks.iter().find_map(|(vars, arr)| {
                vars.iter().position(|v| v == name).map(|c| arr[[r, c]])
            })
        };
        if !rule.evaluate(&lookup)? {
            violating.push(r);
        }
    }
    Ok(violating)
}

impl Discipline {
    /// Indices of rows in `array` that violate `rule`.
    pub fn check_points(&self, rule: &Rule, array: PointArray) -> Result<Vec<usize>> {
        match array {
            PointArray::TestedIns => {
                check_points(&[(self.ins.as_slice(), self.tested.ins.view())], rule)
            }
            PointArray::TestedOuts => check_points(&self.tested.blocks(&self.ins, &self.outs), rule),
            PointArray::SpaceRemaining => check_points(
                &[(self.ins.as_slice(), self.space_remaining.points.view())],
                rule,
            ),
        }
    }

    /// Move the rows at `indices` of every field in `fields` into the
    /// eliminated bucket, preserving their relative order.
    pub fn update_points(&mut self, indices: &[usize], fields: &[PointField]) -> Result<()> {
        if indices.is_empty() {
            return Ok(());
        }

        if fields.contains(&PointField::Ineqs) {
            // Bring the bucket's cache up to its own row count before new rows land.
            let bucket = &mut self.eliminated.tested;
            bucket.ineqs.adopt_keys(&self.tested.ineqs);
            let blocks = [
                (self.ins.as_slice(), bucket.ins.view()),
                (self.outs.as_slice(), bucket.outs.view()),
            ];
            bucket.ineqs.extend(&blocks)?;
        }

        let active = &mut self.tested;
        let bucket = &mut self.eliminated.tested;
        for field in fields {
            match field {
                PointField::Ids => {
                    bucket.ids.append_rows(active.ids.take_rows(indices));
                    bucket.grid_ids.append_rows(active.grid_ids.take_rows(indices));
                }
                PointField::TestedIns => bucket.ins.append_rows(active.ins.take_rows(indices)),
                PointField::TestedOuts => bucket.outs.append_rows(active.outs.take_rows(indices)),
                PointField::Pass => bucket.pass.append_rows(active.pass.take_rows(indices)),
                PointField::FailAmount => bucket
                    .fail_amount
                    .append_rows(active.fail_amount.take_rows(indices)),
                PointField::PassAmount => bucket
                    .pass_amount
                    .append_rows(active.pass_amount.take_rows(indices)),
                PointField::Ineqs => bucket.ineqs.append_rows(active.ineqs.take_rows(indices)),
                PointField::SpaceRemaining => {
                    let moved = self.space_remaining.take(indices);
                    self.eliminated.space_remaining.append(moved);
                }
            }
        }
        Ok(())
    }
}

/// Rows moved for one discipline by [`sort_points`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortSummary {
    pub tested_moved: usize,
    pub space_moved: usize,
}

/// Apply each new rule to every discipline whose variables cover it.
///
/// Tested rows are checked over inputs and outputs; the reference grid is
/// only filtered by rules that lie entirely within the discipline's inputs.
pub fn sort_points(disciplines: &mut [Discipline], new_rules: &[Rule]) -> Result<Vec<SortSummary>> {
    let mut summaries = vec![SortSummary::default(); disciplines.len()];
    for rule in new_rules {
        for (d, summary) in disciplines.iter_mut().zip(summaries.iter_mut()) {
            if !controls(&d.all_vars(), rule) {
                continue;
            }
            let tested = d.check_points(rule, PointArray::TestedOuts)?;
            summary.tested_moved += tested.len();
            d.update_points(&tested, &TESTED_FIELDS)?;

            if controls(&d.ins, rule) {
                let grid = d.check_points(rule, PointArray::SpaceRemaining)?;
                summary.space_moved += grid.len();
                d.update_points(&grid, &[PointField::SpaceRemaining])?;
            }
            tracing::debug!(
                discipline = %d.name,
                rule = %rule,
                tested = summary.tested_moved,
                space = summary.space_moved,
                "sorted points"
            );
        }
    }
    Ok(summaries)
}

/// Indices of rows of `larger` equal (exactly) to some row of `subset`, ascending.
pub fn shared_indices(larger: ArrayView2<f64>, subset: ArrayView2<f64>) -> Vec<usize> {
    if subset.nrows() == 0 || larger.ncols() != subset.ncols() {
        return Vec::new();
    }
    larger
        .outer_iter()
        .enumerate()
        .filter(|(_, row)| subset.outer_iter().any(|s| s == *row))
        .map(|(i, _)| i)
        .collect()
}

/// Number of `true` flags at the given positions.
pub fn count_booleans(indices: &[usize], flags: &[bool]) -> usize {
    indices.iter().filter(|&&i| flags.get(i).copied().unwrap_or(false)).count()
}
