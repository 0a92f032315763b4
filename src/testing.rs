//! Deterministic synthetic datasets shared by the unit tests.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Standard normal draw, Box-Muller.
pub fn normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// `n` evenly spaced points on `[0, 10]` with `y = x + 3 sin(x)`, a step of
/// 5 past the midpoint, and noise with a standard deviation of 0.5.
/// Returns a single feature column and the labels.
pub fn step_sine(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Vec<f64> = (0..n).map(|i| 10.0 * i as f64 / (n - 1) as f64).collect();
    let y = x
        .iter()
        .map(|x_| {
            let step = if *x_ > 5.0 { 5.0 } else { 0.0 };
            x_ + 3.0 * x_.sin() + step + 0.5 * normal(&mut rng)
        })
        .collect();
    (x, y)
}

/// Two uniform features on `[-1, 1]`, stored column major, labelled 1
/// when their sum is positive.
pub fn separable_binary(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x0: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let x1: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let y = x0
        .iter()
        .zip(x1.iter())
        .map(|(a, b)| if a + b > 0.0 { 1.0 } else { 0.0 })
        .collect();
    let mut x = x0;
    x.extend(x1);
    (x, y)
}

/// One uniform feature on `[0, 3]`, the label is its integer part.
pub fn three_class(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..3.0)).collect();
    let y = x.iter().map(|v: &f64| v.floor().min(2.0)).collect();
    (x, y)
}
