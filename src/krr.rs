use crate::data::{Matrix, OutputMatrix};
use crate::executor::Executor;
use crate::gradient::GradientPairs;
use crate::linear::{linear_predict, newton_solve};
use crate::utils::format_vector;
use log::warn;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kernel ridge regression on a Nystrom approximation of the RBF kernel.
///
/// `n_components` training rows are kept as centers and every row is
/// mapped to its kernel values against them,
/// `k(x, c) = exp(-|x - c|^2 / (2 sigma^2))`. The model is then linear in
/// those features and fitted with the same Newton step as [`crate::linear::Linear`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelRidge {
    pub n_components: usize,
    /// L2 penalty on the coefficients.
    pub alpha: f64,
    /// Kernel bandwidth. When `None` the median distance between the
    /// centers is used.
    pub sigma: Option<f64>,
    pub n_features: usize,
    pub bandwidth: f64,
    /// Row major, `n_centers x n_features`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub centers: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bias: Vec<f64>,
    /// Row major, `n_centers x n_outputs`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub betas: Vec<f64>,
}

impl Default for KernelRidge {
    fn default() -> Self {
        KernelRidge::new(10)
    }
}

impl KernelRidge {
    pub fn new(n_components: usize) -> Self {
        KernelRidge {
            n_components,
            alpha: 1e-5,
            sigma: None,
            n_features: 0,
            bandwidth: 1.0,
            centers: Vec::new(),
            bias: Vec::new(),
            betas: Vec::new(),
        }
    }

    pub fn set_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn set_sigma(mut self, sigma: Option<f64>) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn n_centers(&self) -> usize {
        if self.n_features == 0 {
            0
        } else {
            self.centers.len() / self.n_features
        }
    }

    fn center(&self, c: usize) -> &[f64] {
        &self.centers[c * self.n_features..(c + 1) * self.n_features]
    }

    fn design_row<'a>(&'a self, data: &'a Matrix<'a, f64>) -> impl Fn(usize, &mut [f64]) + Sync + 'a {
        let scale = -0.5 / (self.bandwidth * self.bandwidth);
        move |row: usize, a: &mut [f64]| {
            a[0] = 1.0;
            for c in 0..self.n_centers() {
                let d2: f64 = self
                    .center(c)
                    .iter()
                    .enumerate()
                    .map(|(j, v)| (*data.get(row, j) - v).powi(2))
                    .sum();
                a[c + 1] = (scale * d2).exp();
            }
        }
    }

    /// Median of the distances between every pair of centers.
    fn median_distance(&self) -> Option<f64> {
        let n = self.n_centers();
        let mut distances = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for k in (i + 1)..n {
                let d2: f64 = self
                    .center(i)
                    .iter()
                    .zip(self.center(k))
                    .map(|(a, b)| (a - b).powi(2))
                    .sum();
                distances.push(d2.sqrt());
            }
        }
        if distances.is_empty() {
            return None;
        }
        distances.sort_by(|a, b| a.total_cmp(b));
        let mid = distances.len() / 2;
        let median = if distances.len() % 2 == 0 {
            (distances[mid - 1] + distances[mid]) / 2.0
        } else {
            distances[mid]
        };
        if median > 0.0 && median.is_finite() {
            Some(median)
        } else {
            None
        }
    }

    pub fn fit(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, rng: &mut StdRng, executor: &Executor) {
        let n_centers = self.n_components.min(data.rows);
        let mut rows = sample(rng, data.rows, n_centers).into_vec();
        rows.sort_unstable();
        self.n_features = data.cols;
        self.centers = rows.iter().flat_map(|r| data.get_row(*r)).collect();
        self.bandwidth = match self.sigma {
            Some(s) => s,
            None => self.median_distance().unwrap_or_else(|| {
                warn!("Kernel bandwidth could not be estimated from the centers, using 1.0.");
                1.0
            }),
        };
        self.solve(data, gradients, executor);
    }

    fn solve(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, executor: &Executor) {
        let n_outputs = gradients.n_outputs();
        let theta = newton_solve(
            data.rows,
            self.n_centers() + 1,
            self.design_row(data),
            gradients,
            self.alpha,
            executor,
        );
        self.bias = theta[..n_outputs].to_vec();
        self.betas = theta[n_outputs..].to_vec();
    }

    /// Keep the centers and the bandwidth, and solve for new coefficients.
    pub fn update(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, executor: &Executor) -> OutputMatrix {
        self.solve(data, gradients, executor);
        self.predict(data, executor)
    }

    pub fn predict(&self, data: &Matrix<f64>, executor: &Executor) -> OutputMatrix {
        let mut theta = self.bias.clone();
        theta.extend_from_slice(&self.betas);
        linear_predict(
            data.rows,
            self.n_centers() + 1,
            self.design_row(data),
            &theta,
            self.bias.len(),
            executor,
        )
    }

    pub fn clear(&mut self) {
        self.bias.iter_mut().for_each(|v| *v = 0.0);
        self.betas.iter_mut().for_each(|v| *v = 0.0);
    }
}

impl fmt::Display for KernelRidge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "krr: {} centers, sigma={:.4}", self.n_centers(), self.bandwidth)?;
        writeln!(f, "bias={}", format_vector(&self.bias))?;
        let n_outputs = self.bias.len();
        if n_outputs == 0 {
            return Ok(());
        }
        for (c, beta) in self.betas.chunks(n_outputs).enumerate() {
            writeln!(f, "c{}={}", c, format_vector(beta))?;
        }
        Ok(())
    }
}
