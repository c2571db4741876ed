//! CART decision-tree classifier over good/bad labels.
//!
//! Splits minimise weighted Gini impurity; thresholds sit midway between
//! consecutive distinct feature values. The left child holds `x <= t`, the
//! right child `x > t`, which maps directly onto the `Le`/`Gt` relations of
//! extracted rules. Feature scanning is deterministic, so equal-quality
//! splits resolve to the lowest feature index and lowest threshold.

use anyhow::{ensure, Result};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Tree growth limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum depth (`None` = grow until leaves are pure).
    pub max_depth: Option<usize>,

    /// Minimum samples a node needs to be split.
    pub min_samples_split: usize,

    /// Minimum samples in each child.
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// A tree node, stored in an arena.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        n_samples: usize,
        n_bad: usize,
    },
}

/// A fitted binary classification tree.
#[derive(Clone, Debug)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(n: usize, n_bad: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = n_bad as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

fn best_split(x: ArrayView2<f64>, labels: &[bool], idx: &[usize], min_leaf: usize) -> Option<Split> {
    let n = idx.len();
    let total_bad = idx.iter().filter(|&&i| labels[i]).count();
    let mut best: Option<Split> = None;

    for f in 0..x.ncols() {
        let mut column: Vec<(f64, bool)> = idx.iter().map(|&i| (x[[i, f]], labels[i])).collect();
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_bad = 0;
        for k in 0..n - 1 {
            if column[k].1 {
                left_bad += 1;
            }
            let (v, next) = (column[k].0, column[k + 1].0);
            if v == next {
                continue;
            }
            let n_left = k + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let impurity = (n_left as f64 * gini(n_left, left_bad)
                + n_right as f64 * gini(n_right, total_bad - left_bad))
                / n as f64;
            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = 0.5 * (v + next);
                if threshold >= next {
                    threshold = v;
                }
                best = Some(Split {
                    feature: f,
                    threshold,
                    impurity,
                });
            }
        }
    }
    best
}

impl DecisionTree {
    /// Fit on rows of `x` with boolean labels (`true` = bad).
    pub fn fit(x: ArrayView2<f64>, labels: &[bool], config: &TreeConfig) -> Result<Self> {
        ensure!(
            x.nrows() == labels.len(),
            "tree needs one label per row ({} rows, {} labels)",
            x.nrows(),
            labels.len()
        );
        ensure!(x.nrows() > 0, "cannot fit a tree on zero samples");

        let min_leaf = config.min_samples_leaf.max(1);
        let min_split = config.min_samples_split.max(2);
        let mut nodes: Vec<Node> = vec![Node::Leaf {
            n_samples: 0,
            n_bad: 0,
        }];
        let mut pending: Vec<(usize, Vec<usize>, usize)> = vec![(0, (0..x.nrows()).collect(), 0)];

        while let Some((slot, idx, depth)) = pending.pop() {
            let n = idx.len();
            let n_bad = idx.iter().filter(|&&i| labels[i]).count();
            let pure = n_bad == 0 || n_bad == n;
            let depth_reached = config.max_depth.map_or(false, |m| depth >= m);

            let split = if pure || depth_reached || n < min_split {
                None
            } else {
                best_split(x, labels, &idx, min_leaf)
            };

            match split {
                None => nodes[slot] = Node::Leaf { n_samples: n, n_bad },
                Some(s) => {
                    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                        idx.iter().copied().partition(|&i| x[[i, s.feature]] <= s.threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { n_samples: 0, n_bad: 0 });
                    nodes.push(Node::Leaf { n_samples: 0, n_bad: 0 });
                    nodes[slot] = Node::Split {
                        feature: s.feature,
                        threshold: s.threshold,
                        left,
                        right,
                    };
                    // Right pushed first so the left subtree is built first.
                    pending.push((right, right_idx, depth + 1));
                    pending.push((left, left_idx, depth + 1));
                }
            }
        }

        Ok(Self { nodes })
    }

    /// Root node index.
    pub fn root(&self) -> usize {
        0
    }

    pub fn node(&self, i: usize) -> &Node {
        &self.nodes[i]
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// Depth of the deepest leaf (a single-leaf tree has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(tree: &DecisionTree, i: usize) -> usize {
            match tree.node(i) {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(tree, *left).max(walk(tree, *right)),
            }
        }
        walk(self, self.root())
    }

    /// Majority label of the leaf containing `row` (ties predict good).
    pub fn predict(&self, row: ArrayView1<f64>) -> bool {
        let mut i = self.root();
        loop {
            match &self.nodes[i] {
                Node::Leaf { n_samples, n_bad } => return 2 * n_bad > *n_samples,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}
