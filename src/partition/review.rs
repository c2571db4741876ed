//! Acceptance review of a candidate eliminable region.
//!
//! A candidate passes only if all three gates hold over the tested points
//! inside it:
//! 1. failure rate: few passing (zero-failure) points are discarded;
//! 2. nearest neighbour: the region is locally well sampled relative to
//!    the whole tested set;
//! 3. uniformity: the points cover the region's bounding box evenly
//!    (centered L2 discrepancy after min-max normalisation).

use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::discipline::sorter::count_booleans;
use crate::rules::expr::Ineq;

/// Partition acceptance criteria for one discipline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    /// Tail fraction of failure magnitudes labelled bad.
    pub cdf_crit: f64,

    /// Maximum fraction of passing points inside a region.
    pub fail_crit: f64,

    /// Maximum nearest-neighbour distance for any point inside a region.
    pub dist_crit: f64,

    /// Maximum centered discrepancy of the region's normalised points.
    pub disc_crit: f64,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            cdf_crit: config::DEFAULT_CDF_CRIT,
            fail_crit: config::DEFAULT_FAIL_CRIT,
            dist_crit: config::DEFAULT_DIST_CRIT,
            disc_crit: config::DEFAULT_DISC_CRIT,
        }
    }
}

/// Why a candidate was turned down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gate {
    NoProposal,
    EmptyRegion,
    FailureRate,
    NearestNeighbour,
    Degenerate,
    Uniformity,
}

/// Review statistics for one candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// `None` when the candidate was accepted.
    pub rejected_by: Option<Gate>,
    pub n_inside: usize,
    pub pass_fraction: f64,
    pub max_nn_distance: f64,
    pub discrepancy: f64,
}

impl Review {
    fn rejected(gate: Gate) -> Self {
        Self {
            rejected_by: Some(gate),
            n_inside: 0,
            pass_fraction: f64::NAN,
            max_nn_distance: f64::NAN,
            discrepancy: f64::NAN,
        }
    }

    pub fn accepted(&self) -> bool {
        self.rejected_by.is_none()
    }
}

/// Rows of `points` satisfying every inequality of `region`.
pub fn points_inside(region: &[Ineq], vars: &[String], points: ArrayView2<f64>) -> Result<Vec<usize>> {
    let mut inside = Vec::new();
    for (r, row) in points.outer_iter().enumerate() {
        let lookup = |name: &str| vars.iter().position(|v| v == name).map(|c| row[c]);
        let mut all = true;
        for ineq in region {
            if !ineq.evaluate(&lookup)? {
                all = false;
                break;
            }
        }
        if all {
            inside.push(r);
        }
    }
    Ok(inside)
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// Distance from each of `rows` to its nearest other row of `all`.
/// A lone point has no neighbour and gets `f64::INFINITY`.
pub fn nearest_neighbour_distances(all: ArrayView2<f64>, rows: &[usize]) -> Vec<f64> {
    rows.iter()
        .map(|&i| {
            all.outer_iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| euclidean(all.row(i), other))
                .fold(f64::INFINITY, f64::min)
        })
        .collect()
}

/// Min-max normalise each column into [0, 1]. `None` if any column has zero spread.
pub fn min_max_normalise(points: ArrayView2<f64>) -> Option<Array2<f64>> {
    if points.nrows() == 0 {
        return None;
    }
    let mut out = points.to_owned();
    for mut col in out.axis_iter_mut(Axis(1)) {
        let lo = col.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let spread = hi - lo;
        if !(spread > 0.0) {
            return None;
        }
        col.mapv_inplace(|v| (v - lo) / spread);
    }
    Some(out)
}

/// Centered L2 discrepancy (squared form) of points in the unit hypercube.
///
/// `CD² = (13/12)^d − (2/n) Σ_i Π_k (1 + ½|z_ik| − ½z_ik²)
///        + (1/n²) Σ_i Σ_j Π_k (1 + ½|z_ik| + ½|z_jk| − ½|x_ik − x_jk|)`
/// with `z = x − ½`.
pub fn centered_discrepancy(points: ArrayView2<f64>) -> f64 {
    let n = points.nrows();
    let d = points.ncols();
    if n == 0 {
        return 0.0;
    }
    let z = points.mapv(|v| (v - 0.5).abs());

    let mut disc1 = 0.0;
    for row in z.outer_iter() {
        disc1 += row.iter().map(|&a| 1.0 + 0.5 * a - 0.5 * a * a).product::<f64>();
    }

    let mut disc2 = 0.0;
    for i in 0..n {
        for j in 0..n {
            let mut prod = 1.0;
            for k in 0..d {
                prod *= 1.0 + 0.5 * z[[i, k]] + 0.5 * z[[j, k]]
                    - 0.5 * (points[[i, k]] - points[[j, k]]).abs();
            }
            disc2 += prod;
        }
    }

    let nf = n as f64;
    (13.0f64 / 12.0).powi(d as i32) - 2.0 / nf * disc1 + disc2 / (nf * nf)
}

/// Review a candidate region against the acceptance criteria.
///
/// `points` is the full tested input set and `fail_amount` its failure
/// magnitudes. Returns a rejected review immediately when `region` is `None`.
pub fn review_partitions(
    region: Option<&[Ineq]>,
    vars: &[String],
    points: ArrayView2<f64>,
    fail_amount: ArrayView1<f64>,
    criteria: &Criteria,
) -> Result<Review> {
    let Some(region) = region else {
        return Ok(Review::rejected(Gate::NoProposal));
    };
    ensure!(
        points.nrows() == fail_amount.len(),
        "{} points but {} failure magnitudes",
        points.nrows(),
        fail_amount.len()
    );

    let inside = points_inside(region, vars, points)?;
    if inside.is_empty() {
        return Ok(Review::rejected(Gate::EmptyRegion));
    }
    let mut review = Review::rejected(Gate::FailureRate);
    review.n_inside = inside.len();

    let passes: Vec<bool> = fail_amount.iter().map(|&f| f == 0.0).collect();
    let passing = count_booleans(&inside, &passes);
    review.pass_fraction = passing as f64 / inside.len() as f64;
    if review.pass_fraction > criteria.fail_crit {
        return Ok(review);
    }

    review.max_nn_distance = nearest_neighbour_distances(points, &inside)
        .into_iter()
        .fold(0.0, f64::max);
    if review.max_nn_distance > criteria.dist_crit {
        review.rejected_by = Some(Gate::NearestNeighbour);
        return Ok(review);
    }

    let selected = points.select(Axis(0), &inside);
    let Some(normalised) = min_max_normalise(selected.view()) else {
        review.rejected_by = Some(Gate::Degenerate);
        return Ok(review);
    };
    review.discrepancy = centered_discrepancy(normalised.view());
    if review.discrepancy > criteria.disc_crit {
        review.rejected_by = Some(Gate::Uniformity);
        return Ok(review);
    }

    review.rejected_by = None;
    Ok(review)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::expr::Relation;
    use ndarray::{array, Array1};

    fn grid_points(steps: usize) -> Array2<f64> {
        let mut flat = Vec::new();
        for i in 0..steps {
            for j in 0..steps {
                flat.push(i as f64 / (steps - 1) as f64);
                flat.push(j as f64 / (steps - 1) as f64);
            }
        }
        Array2::from_shape_vec((steps * steps, 2), flat).unwrap()
    }

    fn vars() -> Vec<String> {
        vec!["x1".to_string(), "x2".to_string()]
    }

    fn loose() -> Criteria {
        Criteria {
            cdf_crit: 0.5,
            fail_crit: 0.1,
            dist_crit: 0.3,
            disc_crit: 0.2,
        }
    }

    #[test]
    fn test_no_proposal_rejected() {
        let pts = grid_points(3);
        let fail = Array1::zeros(9);
        let r = review_partitions(None, &vars(), pts.view(), fail.view(), &loose()).unwrap();
        assert_eq!(r.rejected_by, Some(Gate::NoProposal));
    }

    #[test]
    fn test_accepts_well_sampled_failing_region() {
        let pts = grid_points(6);
        let fail = pts.column(0).mapv(|x| if x > 0.5 { x } else { 0.0 });
        let region = vec![Ineq::axis("x1", Relation::Gt, 0.5)];
        let r = review_partitions(Some(&region), &vars(), pts.view(), fail.view(), &loose()).unwrap();
        assert!(r.accepted(), "{:?}", r);
        assert_eq!(r.n_inside, 18);
    }

    #[test]
    fn test_failure_rate_gate() {
        let pts = grid_points(6);
        let fail = Array1::zeros(36);
        let region = vec![Ineq::axis("x1", Relation::Gt, 0.5)];
        let r = review_partitions(Some(&region), &vars(), pts.view(), fail.view(), &loose()).unwrap();
        assert_eq!(r.rejected_by, Some(Gate::FailureRate));
    }

    #[test]
    fn test_nearest_neighbour_gate() {
        let pts = array![[0.0, 0.0], [0.05, 0.0], [0.9, 0.9]];
        let fail = array![0.0, 0.0, 1.0];
        let region = vec![Ineq::axis("x1", Relation::Gt, 0.5)];
        let r = review_partitions(Some(&region), &vars(), pts.view(), fail.view(), &loose()).unwrap();
        assert_eq!(r.rejected_by, Some(Gate::NearestNeighbour));
    }

    #[test]
    fn test_degenerate_gate() {
        let pts = array![[0.8, 0.1], [0.8, 0.2], [0.7, 0.15]];
        let fail = array![1.0, 1.0, 0.0];
        let region = vec![Ineq::axis("x1", Relation::Gt, 0.75)];
        let r = review_partitions(Some(&region), &vars(), pts.view(), fail.view(), &loose()).unwrap();
        assert_eq!(r.rejected_by, Some(Gate::Degenerate));
    }

    #[test]
    fn test_discrepancy_prefers_spread_points() {
        let spread = array![[0.25], [0.75]];
        let clumped = array![[0.0], [0.05]];
        assert!(centered_discrepancy(spread.view()) < centered_discrepancy(clumped.view()));
        let centre = array![[0.5]];
        assert!((centered_discrepancy(centre.view()) - 1.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_max_normalise() {
        let pts = array![[0.2, 1.0], [0.4, 3.0]];
        let n = min_max_normalise(pts.view()).unwrap();
        assert_eq!(n, array![[0.0, 0.0], [1.0, 1.0]]);
        assert!(min_max_normalise(array![[0.2], [0.2]].view()).is_none());
    }
}
