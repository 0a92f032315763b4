/// Round every value in place so that any summation of the values,
/// in any order and with any grouping, produces the exact same bits.
///
/// This is the error-free transformation of Demmel & Nguyen
/// ("Fast Reproducible Floating-Point Summation"), using the sum of
/// absolute values as the bound on any partial sum. Every value is snapped
/// to a multiple of `ulp(M) / 2`, where `M` is a power of two larger than
/// any partial sum can become, so no addition of rounded values is ever
/// inexact.
pub fn preround(x: &mut [f64]) {
    let abs_sum: f64 = x.iter().map(|v| v.abs()).sum();
    if abs_sum == 0.0 || !abs_sum.is_finite() {
        return;
    }
    let n = x.len() as f64;
    let bound = abs_sum / (1.0 - 2.0 * n * f64::EPSILON);
    let m = 2.0_f64.powf(bound.log2().ceil());
    x.iter_mut().for_each(|v| *v = (*v + m) - m);
}

pub fn precision_round(n: f64, precision: i32) -> f64 {
    let p = (10.0_f64).powi(precision);
    (n * p).round() / p
}

pub fn items_to_strings(items: Vec<&str>) -> String {
    items.join(", ")
}

/// Render a vector the way model dumps expect, a single value as a
/// plain scalar, anything longer as a bracketed list.
pub fn format_vector(v: &[f64]) -> String {
    if v.len() == 1 {
        format!("{:.4}", v[0])
    } else {
        let items: Vec<String> = v.iter().map(|x| format!("{:.4}", x)).collect();
        format!("[{}]", items.join(","))
    }
}

/// Weighted mean of a slice.
pub fn weighted_mean(v: &[f64], sample_weight: &[f64]) -> f64 {
    let mut w_sum = 0.;
    let res = v
        .iter()
        .zip(sample_weight)
        .map(|(v_, w_)| {
            w_sum += *w_;
            *v_ * *w_
        })
        .sum::<f64>();
    res / w_sum
}

/// Lower triangular Cholesky factor of a row major `n x n` matrix,
/// with `jitter` added to the diagonal. Returns None if the matrix
/// is not positive definite.
fn cholesky(a: &[f64], n: usize, jitter: f64) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut s = a[i * n + j];
            if i == j {
                s += jitter;
            }
            for k in 0..j {
                s -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if s <= 0.0 || !s.is_finite() {
                    return None;
                }
                l[i * n + i] = s.sqrt();
            } else {
                l[i * n + j] = s / l[j * n + j];
            }
        }
    }
    Some(l)
}

/// Solve `A X = B` for a symmetric positive semi-definite `A`.
///
/// * `a` - Row major `n x n` matrix.
/// * `b` - Row major `n x k` right hand sides.
///
/// When the factorization breaks down an increasing diagonal jitter is
/// applied. If no factorization is possible (non-finite input) the zero
/// solution is returned.
pub fn solve_spd(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    assert_eq!(a.len(), n * n);
    let k = if n == 0 { 0 } else { b.len() / n };
    let scale = (0..n)
        .map(|i| a[i * n + i].abs())
        .fold(0.0, f64::max)
        .max(1.0);
    let mut jitter = 0.0;
    for _ in 0..16 {
        if let Some(l) = cholesky(a, n, jitter) {
            return cholesky_solve(&l, b, n, k);
        }
        jitter = if jitter == 0.0 {
            scale * 1e-12
        } else {
            jitter * 10.0
        };
    }
    vec![0.0; n * k]
}

fn cholesky_solve(l: &[f64], b: &[f64], n: usize, k: usize) -> Vec<f64> {
    let mut x = b.to_vec();
    for c in 0..k {
        // Forward substitution, L y = b
        for i in 0..n {
            let mut s = x[i * k + c];
            for j in 0..i {
                s -= l[i * n + j] * x[j * k + c];
            }
            x[i * k + c] = s / l[i * n + i];
        }
        // Back substitution, L^T x = y
        for i in (0..n).rev() {
            let mut s = x[i * k + c];
            for j in (i + 1)..n {
                s -= l[j * n + i] * x[j * k + c];
            }
            x[i * k + c] = s / l[i * n + i];
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_preround_sum_is_order_independent() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut v: Vec<f64> = (0..10_000)
            .map(|_| rng.gen_range(-1.0..1.0) * 10f64.powi(rng.gen_range(-8..4)))
            .collect();
        preround(&mut v);
        let forward: f64 = v.iter().sum();
        let reverse: f64 = v.iter().rev().sum();
        let tiled: f64 = v
            .chunks(37)
            .map(|c| c.iter().sum::<f64>())
            .collect::<Vec<_>>()
            .iter()
            .rev()
            .sum();
        assert_eq!(forward.to_bits(), reverse.to_bits());
        assert_eq!(forward.to_bits(), tiled.to_bits());
    }

    #[test]
    fn test_preround_keeps_values_close() {
        let mut v = vec![0.1, -0.25, 3.0, 1e-3];
        let original = v.clone();
        preround(&mut v);
        for (a, b) in v.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        let mut zeros = vec![0.0; 4];
        preround(&mut zeros);
        assert_eq!(zeros, vec![0.0; 4]);
    }

    #[test]
    fn test_format_vector() {
        assert_eq!(format_vector(&[1.23456]), "1.2346");
        assert_eq!(format_vector(&[1.0, -0.5]), "[1.0000,-0.5000]");
    }

    #[test]
    fn test_weighted_mean() {
        let v = vec![1., 3., 5.];
        let w = vec![1., 1., 2.];
        assert_eq!(precision_round(weighted_mean(&v, &w), 4), 3.5);
    }

    #[test]
    fn test_solve_spd() {
        // [[4, 2], [2, 3]] x = [[2], [1]] -> x = [0.5, 0]
        let a = vec![4.0, 2.0, 2.0, 3.0];
        let b = vec![2.0, 1.0];
        let x = solve_spd(&a, &b, 2);
        assert_eq!(precision_round(x[0], 8), 0.5);
        assert_eq!(precision_round(x[1], 8), 0.0);
    }

    #[test]
    fn test_solve_singular_uses_jitter() {
        let a = vec![1.0, 1.0, 1.0, 1.0];
        let b = vec![2.0, 2.0];
        let x = solve_spd(&a, &b, 2);
        assert!(x.iter().all(|v| v.is_finite()));
        assert_eq!(precision_round(x[0] + x[1], 4), 2.0);
    }
}
