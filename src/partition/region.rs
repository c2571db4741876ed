//! Leaf regions of a fitted tree and redundancy elimination.

use super::tree::{DecisionTree, Node};
use crate::rules::expr::{Ineq, Relation};

/// The axis-aligned box described by the path to one leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafRegion {
    /// Conjunction of the split inequalities from root to leaf.
    pub ineqs: Vec<Ineq>,

    /// Training samples in the leaf.
    pub n_samples: usize,

    /// Bad samples in the leaf.
    pub n_bad: usize,
}

impl LeafRegion {
    pub fn bad_fraction(&self) -> f64 {
        if self.n_samples == 0 {
            0.0
        } else {
            self.n_bad as f64 / self.n_samples as f64
        }
    }
}

/// Every leaf of `tree` in depth-first, left-before-right order.
pub fn leaf_regions(tree: &DecisionTree, vars: &[String]) -> Vec<LeafRegion> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, Vec<Ineq>)> = vec![(tree.root(), Vec::new())];
    while let Some((i, path)) = stack.pop() {
        match tree.node(i) {
            Node::Leaf { n_samples, n_bad } => out.push(LeafRegion {
                ineqs: path,
                n_samples: *n_samples,
                n_bad: *n_bad,
            }),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let var = &vars[*feature];
                let mut right_path = path.clone();
                right_path.push(Ineq::axis(var, Relation::Gt, *threshold));
                let mut left_path = path;
                left_path.push(Ineq::axis(var, Relation::Le, *threshold));
                stack.push((*right, right_path));
                stack.push((*left, left_path));
            }
        }
    }
    out
}

/// The leaf with the highest bad fraction, ties broken by bad count and then
/// traversal order. `None` if no leaf contains a bad point or the tree never split.
pub fn select_region(regions: &[LeafRegion]) -> Option<&LeafRegion> {
    let mut best: Option<&LeafRegion> = None;
    for r in regions {
        let better = match best {
            None => true,
            Some(b) => {
                r.bad_fraction() > b.bad_fraction()
                    || (r.bad_fraction() == b.bad_fraction() && r.n_bad > b.n_bad)
            }
        };
        if better {
            best = Some(r);
        }
    }
    best.filter(|b| b.n_bad > 0 && !b.ineqs.is_empty())
}

/// Merge same-variable, same-direction axis bounds to their tightest form.
///
/// For `>` bounds the largest threshold survives, for `<=` bounds the smallest.
/// Opposite directions on one variable are never merged against each other,
/// and non-axis inequalities pass through unchanged. Output order follows the
/// first appearance of each (variable, direction) group.
pub fn redundant_ineqs(ineqs: &[Ineq]) -> Vec<Ineq> {
    let mut out: Vec<Ineq> = Vec::new();
    for ineq in ineqs {
        let Some(var) = ineq.axis_var() else {
            out.push(ineq.clone());
            continue;
        };
        let existing = out
            .iter_mut()
            .find(|o| o.axis_var() == Some(var) && o.relation == ineq.relation);
        match existing {
            Some(o) => {
                o.rhs = match ineq.relation {
                    Relation::Gt => o.rhs.max(ineq.rhs),
                    Relation::Le => o.rhs.min(ineq.rhs),
                };
            }
            None => out.push(ineq.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::tree::TreeConfig;
    use ndarray::array;

    #[test]
    fn test_leaf_regions_paths() {
        let x = array![[0.1], [0.2], [0.8], [0.9]];
        let tree = DecisionTree::fit(x.view(), &[false, false, true, true], &TreeConfig::default())
            .unwrap();
        let vars = vec!["x1".to_string()];
        let regions = leaf_regions(&tree, &vars);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].ineqs[0].relation, Relation::Le);
        assert_eq!(regions[1].ineqs[0].relation, Relation::Gt);
        assert_eq!(regions[1].n_bad, 2);
        let best = select_region(&regions).unwrap();
        assert_eq!(best, &regions[1]);
    }

    #[test]
    fn test_select_tie_breaks() {
        let mk = |n_samples, n_bad, t| LeafRegion {
            ineqs: vec![Ineq::axis("x1", Relation::Le, t)],
            n_samples,
            n_bad,
        };
        let regions = vec![mk(2, 1, 0.1), mk(4, 2, 0.2), mk(6, 3, 0.3), mk(6, 3, 0.4)];
        let best = select_region(&regions).unwrap();
        assert_eq!(best.ineqs[0].rhs, 0.3);
    }

    #[test]
    fn test_select_none_without_bad() {
        let regions = vec![LeafRegion {
            ineqs: vec![Ineq::axis("x1", Relation::Le, 0.5)],
            n_samples: 3,
            n_bad: 0,
        }];
        assert!(select_region(&regions).is_none());
        let root_only = vec![LeafRegion {
            ineqs: vec![],
            n_samples: 3,
            n_bad: 3,
        }];
        assert!(select_region(&root_only).is_none());
    }

    #[test]
    fn test_redundant_tightens() {
        let ineqs = vec![
            Ineq::axis("x1", Relation::Gt, 0.2),
            Ineq::axis("x2", Relation::Le, 0.9),
            Ineq::axis("x1", Relation::Gt, 0.4),
            Ineq::axis("x1", Relation::Le, 0.8),
            Ineq::axis("x2", Relation::Le, 0.6),
        ];
        let merged = redundant_ineqs(&ineqs);
        assert_eq!(
            merged,
            vec![
                Ineq::axis("x1", Relation::Gt, 0.4),
                Ineq::axis("x2", Relation::Le, 0.6),
                Ineq::axis("x1", Relation::Le, 0.8),
            ]
        );
        assert_eq!(redundant_ineqs(&merged), merged);
    }

    #[test]
    fn test_redundant_passes_general_ineqs() {
        let general = Ineq::new(
            vec![("x1".into(), 1.0), ("x2".into(), 1.0)],
            Relation::Le,
            1.0,
        );
        let merged = redundant_ineqs(&[general.clone(), general.clone()]);
        assert_eq!(merged.len(), 2);
    }
}
