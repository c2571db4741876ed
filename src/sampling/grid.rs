//! Uniform grid over the unit hypercube.
//!
//! The grid is the per-discipline measuring stick for remaining volume and the
//! evaluation set for surrogate predictions. It is generated once and then
//! only filtered as rules accumulate.
//!
//! The number of steps per axis is `round(total_points^(1/N))`, so the
//! realised grid size `steps^N` can differ from the requested total.

use anyhow::{ensure, Result};
use ndarray::Array2;

use crate::rules::expr::Rule;
use crate::rules::filter::rules_for_vars;

/// Result of [`uniform_grid`].
#[derive(Clone, Debug)]
pub struct GridSample {
    /// Conforming grid points, one row per point.
    pub points: Array2<f64>,

    /// Enumeration index of every conforming point in the full grid.
    pub ids: Vec<usize>,

    /// Number of conforming points.
    pub num_points: usize,

    /// Full grid size before filtering (`steps^N`).
    pub grid_size: usize,

    /// Points per axis.
    pub steps: usize,
}

/// Evenly spaced coordinates in [0, 1]. A single step yields `[0.0]`.
pub fn linspace(steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..steps).map(|i| i as f64 / (steps - 1) as f64).collect(),
    }
}

/// Steps per axis for a requested total point count.
pub fn steps_per_axis(total_points: usize, dims: usize) -> usize {
    if dims == 0 {
        return 0;
    }
    ((total_points as f64).powf(1.0 / dims as f64).round() as usize).max(1)
}

/// Build a grid over `vars` and keep the points satisfying every rule in
/// `rules` that is fully controlled by `vars`.
///
/// Points are enumerated row-major with the last variable varying fastest.
pub fn uniform_grid(total_points: usize, vars: &[String], rules: &[Rule]) -> Result<GridSample> {
    ensure!(!vars.is_empty(), "grid needs at least one variable");
    ensure!(total_points > 0, "grid needs a positive point count");

    let dims = vars.len();
    let steps = steps_per_axis(total_points, dims);
    let coords = linspace(steps);
    let grid_size = steps
        .checked_pow(dims as u32)
        .ok_or_else(|| anyhow::anyhow!("grid of {}^{} points overflows", steps, dims))?;
    let applicable = rules_for_vars(vars, rules);

    let mut flat = Vec::new();
    let mut ids = Vec::new();
    let mut row = vec![0.0; dims];
    for id in 0..grid_size {
        let mut rem = id;
        for d in (0..dims).rev() {
            row[d] = coords[rem % steps];
            rem /= steps;
        }
        let lookup = |name: &str| vars.iter().position(|v| v == name).map(|c| row[c]);
        let mut keep = true;
        for rule in &applicable {
            if !rule.evaluate(&lookup)? {
                keep = false;
                break;
            }
        }
        if keep {
            flat.extend_from_slice(&row);
            ids.push(id);
        }
    }

    let num_points = ids.len();
    let points = Array2::from_shape_vec((num_points, dims), flat)?;
    Ok(GridSample {
        points,
        ids,
        num_points,
        grid_size,
        steps,
    })
}
