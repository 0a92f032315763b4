use crate::data::{Matrix, OutputMatrix};
use crate::executor::Executor;
use crate::gradient::GradientPairs;
use crate::utils::{format_vector, solve_spd};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rows per chunk of the parallel accumulations. Fixed, so the grouping of
/// the sums does not depend on the number of threads.
const CHUNK_ROWS: usize = 1024;

/// Solve the regularized Newton step of a model that is linear in its
/// parameters.
///
/// With `a` the design row of a sample (bias term first), each output is
/// fitted independently by minimizing `sum(g * p + 0.5 * h * p^2)` where
/// `p = a . theta`, which is the system `(A^T H A + alpha I) theta = -A^T g`.
/// The bias is not regularized. Returns `theta` row major,
/// `n_params x n_outputs`.
pub(crate) fn newton_solve<F>(
    n_rows: usize,
    n_params: usize,
    design_row: F,
    gradients: &GradientPairs,
    alpha: f64,
    executor: &Executor,
) -> Vec<f64>
where
    F: Fn(usize, &mut [f64]) + Sync,
{
    let n_outputs = gradients.n_outputs();
    // Lower triangle of A^T H A, followed by -A^T g, for every output.
    let block = n_params * n_params + n_params;
    let n_chunks = n_rows.div_ceil(CHUNK_ROWS);
    let partials: Vec<Vec<f64>> = executor.install(|| {
        (0..n_chunks)
            .into_par_iter()
            .map(|c| {
                let mut acc = vec![0.0; block * n_outputs];
                let mut a = vec![0.0; n_params];
                for row in c * CHUNK_ROWS..((c + 1) * CHUNK_ROWS).min(n_rows) {
                    design_row(row, &mut a);
                    for o in 0..n_outputs {
                        let g = gradients.grad.get(row, o);
                        let h = gradients.hess.get(row, o);
                        let acc_o = &mut acc[o * block..(o + 1) * block];
                        for i in 0..n_params {
                            let ha = h * a[i];
                            for j in 0..=i {
                                acc_o[i * n_params + j] += ha * a[j];
                            }
                            acc_o[n_params * n_params + i] -= g * a[i];
                        }
                    }
                }
                acc
            })
            .collect()
    });
    let mut total = vec![0.0; block * n_outputs];
    for p in partials {
        total.iter_mut().zip(p).for_each(|(t, v)| *t += v);
    }

    let mut theta = vec![0.0; n_params * n_outputs];
    for o in 0..n_outputs {
        let acc = &total[o * block..(o + 1) * block];
        let mut m = vec![0.0; n_params * n_params];
        for i in 0..n_params {
            for j in 0..=i {
                m[i * n_params + j] = acc[i * n_params + j];
                m[j * n_params + i] = acc[i * n_params + j];
            }
            if i > 0 {
                m[i * n_params + i] += alpha;
            }
        }
        let x = solve_spd(&m, &acc[n_params * n_params..], n_params);
        for (i, v) in x.iter().enumerate() {
            theta[i * n_outputs + o] = *v;
        }
    }
    theta
}

/// Evaluate a model that is linear in its parameters on every row.
pub(crate) fn linear_predict<F>(
    n_rows: usize,
    n_params: usize,
    design_row: F,
    theta: &[f64],
    n_outputs: usize,
    executor: &Executor,
) -> OutputMatrix
where
    F: Fn(usize, &mut [f64]) + Sync,
{
    let mut out = OutputMatrix::zeros(n_rows, n_outputs);
    if n_outputs == 0 {
        return out;
    }
    executor.install(|| {
        out.data
            .par_chunks_mut(CHUNK_ROWS * n_outputs)
            .enumerate()
            .for_each(|(c, chunk)| {
                let mut a = vec![0.0; n_params];
                for (i, out_row) in chunk.chunks_mut(n_outputs).enumerate() {
                    design_row(c * CHUNK_ROWS + i, &mut a);
                    for (o, p) in out_row.iter_mut().enumerate() {
                        *p = a
                            .iter()
                            .enumerate()
                            .map(|(k, a_)| a_ * theta[k * n_outputs + o])
                            .sum();
                    }
                }
            });
    });
    out
}

/// Linear model, `p = bias + X beta`, fitted by one Newton step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Linear {
    /// L2 penalty on the coefficients.
    pub alpha: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bias: Vec<f64>,
    /// Row major, `n_features x n_outputs`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub betas: Vec<f64>,
}

impl Default for Linear {
    fn default() -> Self {
        Linear::new(1e-5)
    }
}

impl Linear {
    pub fn new(alpha: f64) -> Self {
        Linear {
            alpha,
            bias: Vec::new(),
            betas: Vec::new(),
        }
    }

    fn design_row<'a>(data: &'a Matrix<'a, f64>) -> impl Fn(usize, &mut [f64]) + Sync + 'a {
        move |row: usize, a: &mut [f64]| {
            a[0] = 1.0;
            for j in 0..data.cols {
                a[j + 1] = *data.get(row, j);
            }
        }
    }

    pub fn fit(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, executor: &Executor) {
        let n_outputs = gradients.n_outputs();
        let theta = newton_solve(
            data.rows,
            data.cols + 1,
            Linear::design_row(data),
            gradients,
            self.alpha,
            executor,
        );
        self.bias = theta[..n_outputs].to_vec();
        self.betas = theta[n_outputs..].to_vec();
    }

    /// Refit from scratch, the model is fully determined by the gradients.
    pub fn update(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, executor: &Executor) -> OutputMatrix {
        self.fit(data, gradients, executor);
        self.predict(data, executor)
    }

    pub fn predict(&self, data: &Matrix<f64>, executor: &Executor) -> OutputMatrix {
        let mut theta = self.bias.clone();
        theta.extend_from_slice(&self.betas);
        linear_predict(
            data.rows,
            data.cols + 1,
            Linear::design_row(data),
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

impl fmt::Display for Linear {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let n_outputs = self.bias.len();
        writeln!(f, "bias={}", format_vector(&self.bias))?;
        if n_outputs == 0 {
            return Ok(());
        }
        for (j, beta) in self.betas.chunks(n_outputs).enumerate() {
            writeln!(f, "f{}={}", j, format_vector(beta))?;
        }
        Ok(())
    }
}
