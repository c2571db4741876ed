//! Gaussian-process regression surrogate.
//!
//! RBF kernel on standardized inputs plus a white-noise term, fitted to
//! standardized targets. The length scale and noise level are chosen from a
//! small grid by maximising the log marginal likelihood. Linear algebra is a
//! dense Cholesky factorisation, adequate for a few thousand rows.

use anyhow::{ensure, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Hyperparameter search grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GprConfig {
    /// Candidate RBF length scales (standardized input units).
    pub length_scales: Vec<f64>,

    /// Candidate white-noise variances (standardized target units).
    pub noise_levels: Vec<f64>,
}

impl Default for GprConfig {
    fn default() -> Self {
        Self {
            length_scales: vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0],
            noise_levels: vec![1e-6, 1e-4, 1e-2, 1e-1],
        }
    }
}

impl GprConfig {
    pub fn with_length_scales(mut self, scales: Vec<f64>) -> Self {
        self.length_scales = scales;
        self
    }

    pub fn with_noise_levels(mut self, levels: Vec<f64>) -> Self {
        self.noise_levels = levels;
        self
    }
}

#[derive(Clone, Debug)]
enum Fit {
    /// No training data: prior mean 0, std 1.
    Empty,
    /// All targets equal.
    Constant { value: f64, std: f64 },
    Full {
        train: Array2<f64>,
        chol: Array2<f64>,
        alpha: Array1<f64>,
    },
}

/// A fitted GP regressor.
#[derive(Clone, Debug)]
pub struct GaussianProcess {
    x_mean: Array1<f64>,
    x_scale: Array1<f64>,
    y_mean: f64,
    y_scale: f64,
    length_scale: f64,
    noise: f64,
    log_marginal_likelihood: f64,
    fit: Fit,
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, length_scale: f64) -> f64 {
    let d2: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    (-0.5 * d2 / (length_scale * length_scale)).exp()
}

fn kernel_matrix(a: ArrayView2<f64>, b: ArrayView2<f64>, length_scale: f64) -> Array2<f64> {
    let mut k = Array2::zeros((a.nrows(), b.nrows()));
    for (i, ra) in a.outer_iter().enumerate() {
        for (j, rb) in b.outer_iter().enumerate() {
            k[[i, j]] = rbf(ra, rb, length_scale);
        }
    }
    k
}

/// Lower-triangular Cholesky factor, `None` if `a` is not positive definite.
pub fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut d = a[[j, j]];
        for k in 0..j {
            d -= l[[j, k]] * l[[j, k]];
        }
        if !(d > 0.0) {
            return None;
        }
        let d = d.sqrt();
        l[[j, j]] = d;
        for i in j + 1..n {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = s / d;
        }
    }
    Some(l)
}

/// Solve `L x = b` for lower-triangular `L`.
pub fn solve_lower(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::zeros(n);
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= l[[i, k]] * x[k];
        }
        x[i] = s / l[[i, i]];
    }
    x
}

/// Solve `Lᵀ x = b` for lower-triangular `L`.
pub fn solve_upper_t(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut s = b[i];
        for k in i + 1..n {
            s -= l[[k, i]] * x[k];
        }
        x[i] = s / l[[i, i]];
    }
    x
}

fn column_stats(x: ArrayView2<f64>) -> (Array1<f64>, Array1<f64>) {
    let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
    (mean, scale)
}

struct Candidate {
    length_scale: f64,
    noise: f64,
    lml: f64,
    chol: Array2<f64>,
    alpha: Array1<f64>,
}

fn try_fit(xs: ArrayView2<f64>, ys: ArrayView1<f64>, length_scale: f64, noise: f64) -> Option<Candidate> {
    let mut k = kernel_matrix(xs, xs, length_scale);
    k.diag_mut().mapv_inplace(|v| v + noise);
    let chol = cholesky(&k)?;
    let alpha = solve_upper_t(&chol, solve_lower(&chol, ys).view());
    let n = ys.len() as f64;
    let lml = -0.5 * ys.dot(&alpha) - chol.diag().mapv(f64::ln).sum() - 0.5 * n * LN_2PI;
    Some(Candidate {
        length_scale,
        noise,
        lml,
        chol,
        alpha,
    })
}

impl GaussianProcess {
    /// Fit on rows of `x` against `y`.
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>, config: &GprConfig) -> Result<Self> {
        ensure!(
            x.nrows() == y.len(),
            "GP needs one target per row ({} rows, {} targets)",
            x.nrows(),
            y.len()
        );
        ensure!(
            !config.length_scales.is_empty() && !config.noise_levels.is_empty(),
            "GP hyperparameter grid is empty"
        );

        let base_noise = config.noise_levels.iter().copied().fold(f64::INFINITY, f64::min);
        let mut gp = Self {
            x_mean: Array1::zeros(x.ncols()),
            x_scale: Array1::ones(x.ncols()),
            y_mean: 0.0,
            y_scale: 1.0,
            length_scale: config.length_scales[0],
            noise: base_noise,
            log_marginal_likelihood: f64::NAN,
            fit: Fit::Empty,
        };
        if x.nrows() == 0 {
            return Ok(gp);
        }

        let (x_mean, x_scale) = column_stats(x);
        gp.x_mean = x_mean;
        gp.x_scale = x_scale;
        gp.y_mean = y.mean().unwrap_or(0.0);
        let y_std = y.std(0.0);
        if !(y_std > 1e-12) {
            gp.fit = Fit::Constant {
                value: gp.y_mean,
                std: base_noise.sqrt(),
            };
            return Ok(gp);
        }
        gp.y_scale = y_std;

        let xs = gp.standardize(x);
        let ys = y.mapv(|v| (v - gp.y_mean) / gp.y_scale);

        let mut best: Option<Candidate> = None;
        for &ls in &config.length_scales {
            for &noise in &config.noise_levels {
                let Some(c) = try_fit(xs.view(), ys.view(), ls, noise) else {
                    continue;
                };
                if best.as_ref().map_or(true, |b| c.lml > b.lml) {
                    best = Some(c);
                }
            }
        }
        ensure!(
            best.is_some(),
            "GP kernel matrix is not positive definite for any hyperparameter pair"
        );
        if let Some(c) = best {
            gp.length_scale = c.length_scale;
            gp.noise = c.noise;
            gp.log_marginal_likelihood = c.lml;
            gp.fit = Fit::Full {
                train: xs,
                chol: c.chol,
                alpha: c.alpha,
            };
        }
        Ok(gp)
    }

    fn standardize(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (&x - &self.x_mean) / &self.x_scale
    }

    /// Predictive mean and standard deviation (target units) at rows of `x`.
    pub fn predict(&self, x: ArrayView2<f64>) -> (Array1<f64>, Array1<f64>) {
        let n = x.nrows();
        match &self.fit {
            Fit::Empty => (Array1::zeros(n), Array1::ones(n)),
            Fit::Constant { value, std } => (Array1::from_elem(n, *value), Array1::from_elem(n, *std)),
            Fit::Full { train, chol, alpha } => {
                let xs = self.standardize(x);
                let k_star = kernel_matrix(xs.view(), train.view(), self.length_scale);
                let mean = k_star.dot(alpha).mapv(|m| m * self.y_scale + self.y_mean);
                let std = k_star
                    .outer_iter()
                    .map(|row| {
                        let v = solve_lower(chol, row);
                        let var = (1.0 - v.dot(&v)).max(0.0);
                        var.sqrt() * self.y_scale
                    })
                    .collect();
                (mean, std)
            }
        }
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    /// `NaN` unless a full fit was performed.
    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_likelihood
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cholesky_reconstructs() {
        let a = array![[4.0, 2.0, 0.4], [2.0, 5.0, 1.0], [0.4, 1.0, 3.0]];
        let l = cholesky(&a).unwrap();
        let back = l.dot(&l.t());
        for (x, y) in back.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
        assert!(cholesky(&array![[1.0, 2.0], [2.0, 1.0]]).is_none());
    }

    #[test]
    fn test_triangular_solves() {
        let l = array![[2.0, 0.0], [1.0, 3.0]];
        let b = array![4.0, 11.0];
        let x = solve_lower(&l, b.view());
        assert_eq!(x, array![2.0, 3.0]);
        let y = solve_upper_t(&l, b.view());
        assert!((l.t().dot(&y) - &b).iter().all(|e| e.abs() < 1e-12));
    }

    #[test]
    fn test_interpolates_smooth_function() {
        let x = Array2::from_shape_fn((15, 1), |(i, _)| i as f64 / 14.0);
        let y = x.column(0).mapv(|v| (3.0 * v).sin());
        let gp = GaussianProcess::fit(x.view(), y.view(), &GprConfig::default()).unwrap();
        let (mean, std) = gp.predict(array![[0.5], [0.25]].view());
        assert!((mean[0] - 1.5f64.sin()).abs() < 0.05, "mean = {}", mean[0]);
        assert!((mean[1] - 0.75f64.sin()).abs() < 0.05, "mean = {}", mean[1]);
        assert!(std[0] < 0.2, "std = {}", std[0]);
        assert!(gp.log_marginal_likelihood().is_finite());
    }

    #[test]
    fn test_uncertainty_grows_away_from_data() {
        let x = array![[0.0], [0.1], [0.2]];
        let y = array![0.0, 0.5, 1.0];
        let gp = GaussianProcess::fit(x.view(), y.view(), &GprConfig::default()).unwrap();
        let (_, std) = gp.predict(array![[0.1], [3.0]].view());
        assert!(std[1] > std[0], "near = {}, far = {}", std[0], std[1]);
    }

    #[test]
    fn test_degenerate_training_sets() {
        let empty = Array2::<f64>::zeros((0, 2));
        let gp = GaussianProcess::fit(empty.view(), Array1::zeros(0).view(), &GprConfig::default()).unwrap();
        let (m, s) = gp.predict(array![[0.3, 0.3]].view());
        assert_eq!((m[0], s[0]), (0.0, 1.0));

        let x = array![[0.1, 0.2], [0.4, 0.9]];
        let gp = GaussianProcess::fit(x.view(), array![0.7, 0.7].view(), &GprConfig::default()).unwrap();
        let (m, s) = gp.predict(array![[0.5, 0.5]].view());
        assert_eq!(m[0], 0.7);
        assert!(s[0] < 0.01);
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let x = array![[0.1], [0.2]];
        assert!(GaussianProcess::fit(x.view(), array![1.0].view(), &GprConfig::default()).is_err());
    }
}
