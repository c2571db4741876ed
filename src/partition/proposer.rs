//! Exploration check: propose an eliminable region for one discipline.
//!
//! Labels the active tested points from the tail of the failure-magnitude
//! history, fits a tree on them, picks the worst leaf, tightens its bounds,
//! reviews it, and turns an accepted region into a rule describing the
//! surviving space.

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use super::labels::{bad_cutoff, good_bad};
use super::region::{leaf_regions, redundant_ineqs, select_region};
use super::review::{review_partitions, Review};
use super::tree::{DecisionTree, TreeConfig};
use crate::discipline::Discipline;
use crate::rules::expr::{Ineq, Rule};

/// An accepted proposal.
#[derive(Clone, Debug, Serialize)]
pub struct Proposal {
    /// Name of the proposing discipline.
    pub discipline: String,

    /// The region to eliminate (conjunction of tightened bounds).
    pub region: Vec<Ineq>,

    /// The surviving space: `Or` of the flipped region bounds.
    pub rule: Rule,

    pub review: Review,
}

/// Per-discipline partition proposer.
#[derive(Clone, Debug, Default)]
pub struct ExplorationCheck {
    pub tree: TreeConfig,
}

impl ExplorationCheck {
    pub fn new(tree: TreeConfig) -> Self {
        Self { tree }
    }

    /// Try to propose a rule for `discipline`.
    ///
    /// Returns `Ok(None)` when there is nothing to propose or the candidate
    /// fails review; rejection is a normal outcome, not an error.
    pub fn propose(&self, discipline: &Discipline) -> Result<Option<Proposal>> {
        let tested = &discipline.tested;
        if tested.is_empty() {
            return Ok(None);
        }

        let criteria = &discipline.criteria;
        let cutoff = bad_cutoff(&discipline.all_fail_amounts(), criteria.cdf_crit);
        let fail: Vec<f64> = tested.fail_amount.to_vec();
        let labels = good_bad(&fail, cutoff);
        if !labels.iter().any(|&b| b) {
            debug!(discipline = %discipline.name, "no bad points above cutoff {:.4}", cutoff);
            return Ok(None);
        }

        let tree = DecisionTree::fit(tested.ins.view(), &labels, &self.tree)?;
        let regions = leaf_regions(&tree, &discipline.ins);
        let Some(selected) = select_region(&regions) else {
            debug!(discipline = %discipline.name, "tree produced no candidate leaf");
            return Ok(None);
        };
        let region = redundant_ineqs(&selected.ineqs);

        let review = review_partitions(
            Some(&region),
            &discipline.ins,
            tested.ins.view(),
            tested.fail_amount.view(),
            criteria,
        )?;
        if let Some(gate) = review.rejected_by {
            debug!(
                discipline = %discipline.name,
                ?gate,
                n_inside = review.n_inside,
                "candidate region rejected"
            );
            return Ok(None);
        }

        let rule = Rule::And(region.iter().cloned().map(Rule::Ineq).collect()).negate();
        debug!(discipline = %discipline.name, %rule, "proposal accepted by review");
        Ok(Some(Proposal {
            discipline: discipline.name.clone(),
            region,
            rule,
            review,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discipline::state::tests::toy_discipline;
    use crate::partition::review::Criteria;
    use ndarray::Array2;

    /// 6x6 tested grid with `y1 = x1`, so every point with `x1 > 0.5` fails.
    fn explored() -> Discipline {
        let mut d = toy_discipline();
        d.criteria = Criteria {
            cdf_crit: 0.5,
            fail_crit: 0.1,
            dist_crit: 0.3,
            disc_crit: 0.2,
        };
        let mut flat = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                flat.push(i as f64 / 5.0);
                flat.push(j as f64 / 5.0);
            }
        }
        let ins = Array2::from_shape_vec((36, 2), flat).unwrap();
        let outs = ins.column(0).to_owned().insert_axis(ndarray::Axis(1));
        d.add_tested(ins, outs).unwrap();
        d
    }

    #[test]
    fn test_proposes_failing_half() {
        let d = explored();
        let p = ExplorationCheck::default().propose(&d).unwrap().expect("proposal");
        assert_eq!(p.region.len(), 1);
        assert_eq!(p.region[0].axis_var(), Some("x1"));
        let keeps = |x1: f64| p.rule.evaluate(&|v: &str| match v {
            "x1" => Some(x1),
            "x2" => Some(0.5),
            _ => None,
        });
        assert!(keeps(0.3).unwrap());
        assert!(!keeps(0.9).unwrap());
        assert!(matches!(p.rule, Rule::Or(_)));
    }

    #[test]
    fn test_nothing_to_propose_without_failures() {
        let mut d = toy_discipline();
        let ins = ndarray::array![[0.1, 0.1], [0.2, 0.9]];
        let outs = ndarray::array![[0.1], [0.2]];
        d.add_tested(ins, outs).unwrap();
        assert!(ExplorationCheck::default().propose(&d).unwrap().is_none());
        assert!(ExplorationCheck::default().propose(&toy_discipline()).unwrap().is_none());
    }

    #[test]
    fn test_strict_criteria_reject() {
        let mut d = explored();
        d.criteria.dist_crit = 0.05;
        assert!(ExplorationCheck::default().propose(&d).unwrap().is_none());
    }
}
